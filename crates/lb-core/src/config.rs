use std::sync::OnceLock;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

/// Reading an undeclared member degrades to a warning instead of a binding error.
pub fn lenient_members() -> bool {
    static LENIENT: OnceLock<bool> = OnceLock::new();
    *LENIENT.get_or_init(|| bool_from_env("LATEBIND_LENIENT_MEMBERS"))
}

/// Lossy conversions stay silent on the warning channel.
pub fn quiet_conversions() -> bool {
    static QUIET: OnceLock<bool> = OnceLock::new();
    *QUIET.get_or_init(|| bool_from_env("LATEBIND_QUIET_CONVERSIONS"))
}

pub fn trace_bindings() -> bool {
    static TRACE: OnceLock<bool> = OnceLock::new();
    *TRACE.get_or_init(|| bool_from_env("LATEBIND_TRACE_BINDINGS"))
}

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// A read of a member that is neither declared, held by a runtime-fields
    /// bag, nor intercepted by `__get` fails the bind.
    pub strict_undefined_members: bool,
    pub conversion_warnings: bool,
    /// Log a JSON summary of every binding at debug level.
    pub trace_bindings: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            strict_undefined_members: true,
            conversion_warnings: true,
            trace_bindings: false,
        }
    }
}

impl RuntimeOptions {
    /// Defaults adjusted by the `LATEBIND_*` environment switches.
    pub fn from_env() -> Self {
        Self {
            strict_undefined_members: !lenient_members(),
            conversion_warnings: !quiet_conversions(),
            trace_bindings: trace_bindings(),
        }
    }
}
