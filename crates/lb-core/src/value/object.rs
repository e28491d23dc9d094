use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{ArrayKey, PhpArray, Value};
use crate::metadata::ClassRef;

pub type ObjectId = u64;

fn next_object_id() -> ObjectId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Mutable part of an instance.
#[derive(Default)]
pub struct ObjectState {
    /// Declared instance properties, indexed by `PropertyDescriptor::slot`.
    pub fields: Vec<Value>,
    /// Dynamic name → value bag, created on first use.
    pub runtime_fields: Option<PhpArray>,
}

impl ObjectState {
    pub fn runtime_fields_mut(&mut self) -> &mut PhpArray {
        self.runtime_fields.get_or_insert_with(PhpArray::new)
    }

    pub fn runtime_field(&self, name: &str) -> Option<&Value> {
        self.runtime_fields
            .as_ref()
            .and_then(|bag| bag.get(&ArrayKey::from_string(name)))
    }
}

struct ObjectData {
    id: ObjectId,
    class: ClassRef,
    state: Mutex<ObjectState>,
}

/// Handle to an instance; clones share identity.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Arc<ObjectData>,
}

impl ObjectRef {
    /// Instantiates `class` with its declared property defaults. No constructor
    /// is run.
    pub fn new(class: &ClassRef) -> Self {
        Self {
            inner: Arc::new(ObjectData {
                id: next_object_id(),
                class: Arc::clone(class),
                state: Mutex::new(ObjectState {
                    fields: class.instance_defaults(),
                    runtime_fields: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.inner.id
    }

    pub fn class(&self) -> &ClassRef {
        &self.inner.class
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn with_state<R>(&self, func: impl FnOnce(&mut ObjectState) -> R) -> R {
        match self.inner.state.lock() {
            Ok(mut state) => func(&mut state),
            Err(poison) => {
                let mut state = poison.into_inner();
                func(&mut state)
            }
        }
    }

    pub fn field(&self, slot: usize) -> Value {
        self.with_state(|state| state.fields.get(slot).cloned().unwrap_or_default())
    }

    pub fn set_field(&self, slot: usize, value: Value) {
        self.with_state(|state| {
            if let Some(field) = state.fields.get_mut(slot) {
                field.assign(value);
            }
        })
    }

    pub fn has_runtime_field(&self, name: &str) -> bool {
        self.with_state(|state| state.runtime_field(name).is_some())
    }

    pub fn runtime_field(&self, name: &str) -> Option<Value> {
        self.with_state(|state| state.runtime_field(name).cloned())
    }

    pub fn set_runtime_field(&self, name: &str, value: Value) {
        self.with_state(|state| {
            state
                .runtime_fields_mut()
                .set(ArrayKey::from_string(name), value)
        })
    }

    pub fn runtime_fields(&self) -> Option<PhpArray> {
        self.with_state(|state| state.runtime_fields.clone())
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "object({})#{}", self.inner.class.name(), self.inner.id)
    }
}
