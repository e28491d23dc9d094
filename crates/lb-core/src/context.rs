use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use serde::Serialize;

use crate::config::RuntimeOptions;
use crate::diagnostics::{Diagnostic, DiagnosticManager};
use crate::metadata::{ClassRef, SymbolTable};
use crate::value::{ObjectId, ObjectRef};

/// Which family of magic accessor a recursion guard protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GuardBucket {
    Get,
    Set,
    Isset,
    Unset,
}

/// Guards are per thread: an accessor running on one thread never
/// short-circuits an unrelated access on another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuardKey {
    pub thread: ThreadId,
    pub object: ObjectId,
    pub member: String,
    pub bucket: GuardBucket,
}

/// Marks a magic accessor as active until dropped.
pub struct RecursionGuard<'a> {
    ctx: &'a Context,
    key: Option<GuardKey>,
}

impl GuardKey {
    fn current(object: &ObjectRef, member: &str, bucket: GuardBucket) -> Self {
        Self {
            thread: thread::current().id(),
            object: object.id(),
            member: member.to_string(),
            bucket,
        }
    }
}

impl Drop for RecursionGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.ctx.with_guards(|guards| guards.remove(&key));
        }
    }
}

/// One execution of a program: the symbols it sees, where its warnings go,
/// and the magic accessors active on its call stack.
pub struct Context {
    symbols: Arc<SymbolTable>,
    diagnostics: DiagnosticManager,
    options: RuntimeOptions,
    active_guards: Mutex<HashSet<GuardKey>>,
}

impl Context {
    pub fn new(symbols: Arc<SymbolTable>) -> Self {
        Self::with_options(symbols, RuntimeOptions::default())
    }

    pub fn with_options(symbols: Arc<SymbolTable>, options: RuntimeOptions) -> Self {
        Self {
            symbols,
            diagnostics: DiagnosticManager::new(),
            options,
            active_guards: Mutex::new(HashSet::new()),
        }
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    pub fn diagnostics(&self) -> &DiagnosticManager {
        &self.diagnostics
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.diagnostics.report(Diagnostic::warning(message));
    }

    /// Reports a lossy conversion unless conversion warnings are disabled.
    pub fn conversion_warning(&self, message: impl Into<String>) {
        if self.options.conversion_warnings {
            self.diagnostics
                .report(Diagnostic::warning(message).with_code("conversion"));
        }
    }

    pub fn new_std_object(&self) -> ObjectRef {
        ObjectRef::new(&self.symbols.std_class())
    }

    pub fn class(&self, name: &str) -> Option<ClassRef> {
        self.symbols.class(name)
    }

    fn with_guards<R>(&self, func: impl FnOnce(&mut HashSet<GuardKey>) -> R) -> R {
        match self.active_guards.lock() {
            Ok(mut guards) => func(&mut guards),
            Err(poison) => {
                let mut guards = poison.into_inner();
                func(&mut guards)
            }
        }
    }

    /// Enters the accessor identified by `(object, member, bucket)`. Returns
    /// `None` if it is already active on the calling thread's stack.
    pub fn enter_guard(
        &self,
        object: &ObjectRef,
        member: &str,
        bucket: GuardBucket,
    ) -> Option<RecursionGuard<'_>> {
        let key = GuardKey::current(object, member, bucket);
        let inserted = self.with_guards(|guards| guards.insert(key.clone()));
        if !inserted {
            tracing::trace!(member, ?bucket, "magic accessor re-entered, short-circuiting");
            return None;
        }
        Some(RecursionGuard {
            ctx: self,
            key: Some(key),
        })
    }

    pub fn is_guarded(&self, object: &ObjectRef, member: &str, bucket: GuardBucket) -> bool {
        let key = GuardKey::current(object, member, bucket);
        self.with_guards(|guards| guards.contains(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_released_on_drop() {
        let ctx = Context::new(Arc::new(SymbolTable::new()));
        let obj = ctx.new_std_object();
        {
            let _guard = ctx.enter_guard(&obj, "x", GuardBucket::Get).expect("first entry");
            assert!(ctx.enter_guard(&obj, "x", GuardBucket::Get).is_none());
            assert!(ctx.enter_guard(&obj, "x", GuardBucket::Set).is_some());
            assert!(ctx.enter_guard(&obj, "y", GuardBucket::Get).is_some());
        }
        assert!(!ctx.is_guarded(&obj, "x", GuardBucket::Get));
    }

    #[test]
    fn guards_do_not_cross_threads() {
        let ctx = Context::new(Arc::new(SymbolTable::new()));
        let obj = ctx.new_std_object();
        let _guard = ctx.enter_guard(&obj, "x", GuardBucket::Get).expect("first entry");
        thread::scope(|scope| {
            scope.spawn(|| {
                assert!(!ctx.is_guarded(&obj, "x", GuardBucket::Get));
                assert!(ctx.enter_guard(&obj, "x", GuardBucket::Get).is_some());
            });
        });
        assert!(ctx.is_guarded(&obj, "x", GuardBucket::Get));
    }
}
