use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{ClassBuilder, ClassRef, RoutineDescriptor, RoutineRef};
use crate::collections::ConcurrentMap;

pub const STD_CLASS: &str = "stdClass";

/// The overloads currently declared under one function name. Every
/// (re)declaration produces a group with a fresh id.
#[derive(Debug, Clone)]
pub struct RoutineGroup {
    pub id: u64,
    pub routines: Arc<[RoutineRef]>,
}

/// Global functions and classes known to one program.
pub struct SymbolTable {
    functions: ConcurrentMap<String, RoutineGroup>,
    classes: ConcurrentMap<String, ClassRef>,
    next_group: AtomicU64,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A table pre-populated with `stdClass`.
    pub fn new() -> Self {
        let table = Self {
            functions: ConcurrentMap::new(),
            classes: ConcurrentMap::new(),
            next_group: AtomicU64::new(1),
        };
        table.declare_class(ClassBuilder::new(STD_CLASS).runtime_fields(true).build());
        table
    }

    fn key(name: &str) -> String {
        name.trim_start_matches('\\').to_ascii_lowercase()
    }

    /// Declares `routines` as the complete overload set of `name`, replacing
    /// any previous declaration.
    pub fn declare_function(
        &self,
        name: &str,
        routines: impl IntoIterator<Item = RoutineDescriptor>,
    ) -> RoutineGroup {
        let group = RoutineGroup {
            id: self.next_group.fetch_add(1, Ordering::Relaxed),
            routines: routines.into_iter().map(Arc::new).collect(),
        };
        self.functions.insert(Self::key(name), group.clone());
        group
    }

    /// Adds one more overload to `name`.
    pub fn add_overload(&self, name: &str, routine: RoutineDescriptor) -> RoutineGroup {
        let routine = Arc::new(routine);
        self.functions.upsert(Self::key(name), |previous| {
            let mut routines: Vec<RoutineRef> = previous
                .map(|group| group.routines.to_vec())
                .unwrap_or_default();
            routines.push(routine);
            RoutineGroup {
                id: self.next_group.fetch_add(1, Ordering::Relaxed),
                routines: routines.into(),
            }
        })
    }

    pub fn function(&self, name: &str) -> Option<RoutineGroup> {
        self.functions.get_cloned(&Self::key(name))
    }

    pub fn remove_function(&self, name: &str) -> Option<RoutineGroup> {
        self.functions.remove(&Self::key(name))
    }

    pub fn declare_class(&self, class: ClassRef) -> Option<ClassRef> {
        self.classes.insert(Self::key(class.name()), class)
    }

    pub fn class(&self, name: &str) -> Option<ClassRef> {
        self.classes.get_cloned(&Self::key(name))
    }

    pub fn std_class(&self) -> ClassRef {
        match self.class(STD_CLASS) {
            Some(class) => class,
            None => {
                let class = ClassBuilder::new(STD_CLASS).runtime_fields(true).build();
                self.declare_class(Arc::clone(&class));
                class
            }
        }
    }
}
