use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};

use super::Value;

/// A reference cell (`&$x`). Every holder of a clone observes the same value.
#[derive(Clone, Default)]
pub struct Alias {
    storage: Arc<Mutex<Value>>,
}

impl Alias {
    pub fn new(value: Value) -> Self {
        // a reference never holds another reference directly
        Self {
            storage: Arc::new(Mutex::new(value.into_deref())),
        }
    }

    pub fn with_value_mut<R>(&self, func: impl FnOnce(&mut Value) -> R) -> R {
        match self.storage.lock() {
            Ok(mut storage) => func(&mut storage),
            Err(poison) => {
                // Recover from a poisoned lock by taking the inner value
                let mut storage = poison.into_inner();
                func(&mut storage)
            }
        }
    }

    pub fn with_value<R>(&self, func: impl FnOnce(&Value) -> R) -> R {
        self.with_value_mut(|v| func(v))
    }

    pub fn get(&self) -> Value {
        self.with_value(|v| v.clone())
    }

    pub fn set(&self, value: Value) {
        let value = value.into_deref();
        self.with_value_mut(|v| *v = value);
    }

    pub fn ptr_eq(&self, other: &Alias) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Number of holders; a count of one means nobody else can observe writes.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }
}

impl Debug for Alias {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // inner value is not printed: a cell may transitively contain itself
        write!(f, "&alias@{:p}", Arc::as_ptr(&self.storage))
    }
}
