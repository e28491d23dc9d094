use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::{DeclaringClass, RoutineDescriptor, RoutineRef, Visibility};
use crate::value::Value;

pub type ClassId = u64;
pub type ClassRef = Arc<ClassDescriptor>;

fn next_class_id() -> ClassId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Interception routines consulted when no declared member matches.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MagicMethod {
    #[display("__get")]
    Get,
    #[display("__set")]
    Set,
    #[display("__isset")]
    Isset,
    #[display("__unset")]
    Unset,
    #[display("__call")]
    Call,
    #[display("__callStatic")]
    CallStatic,
    #[display("__toString")]
    ToString,
}

impl MagicMethod {
    pub fn name(&self) -> &'static str {
        match self {
            MagicMethod::Get => "__get",
            MagicMethod::Set => "__set",
            MagicMethod::Isset => "__isset",
            MagicMethod::Unset => "__unset",
            MagicMethod::Call => "__call",
            MagicMethod::CallStatic => "__callStatic",
            MagicMethod::ToString => "__toString",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub is_static: bool,
    pub is_readonly: bool,
    pub visibility: Visibility,
    pub default: Value,
    /// Index into the instance field vector, or into the declaring class'
    /// static storage for static properties. Assigned by [`ClassBuilder`].
    pub slot: usize,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_static: false,
            is_readonly: false,
            visibility: Visibility::Public,
            default: Value::Null,
            slot: 0,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = value;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn static_(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConstantDescriptor {
    pub name: String,
    pub value: Value,
    pub visibility: Visibility,
}

impl ConstantDescriptor {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            visibility: Visibility::Public,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// A property found by name, together with the class that declares it.
#[derive(Clone, Copy)]
pub struct PropertyMatch<'a> {
    pub declaring: &'a ClassDescriptor,
    pub property: &'a PropertyDescriptor,
}

pub struct ClassDescriptor {
    id: ClassId,
    name: String,
    parent: Option<ClassRef>,
    properties: Vec<PropertyDescriptor>,
    constants: Vec<ConstantDescriptor>,
    methods: Vec<RoutineRef>,
    has_runtime_fields: bool,
    instance_field_count: usize,
    statics: Mutex<Vec<Value>>,
}

impl ClassDescriptor {
    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&ClassRef> {
        self.parent.as_ref()
    }

    /// Instances carry a dynamic name → value bag.
    pub fn has_runtime_fields(&self) -> bool {
        self.has_runtime_fields
    }

    /// `self` is `id` or derives from it.
    pub fn is_subclass_of(&self, id: ClassId) -> bool {
        self.ancestors().any(|class| class.id == id)
    }

    /// `self`, then its parents up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &ClassDescriptor> {
        std::iter::successors(Some(self), |class| class.parent.as_deref())
    }

    /// Derivation distance from `self` to the named ancestor.
    pub fn distance_to(&self, name: &str) -> Option<usize> {
        self.ancestors()
            .position(|class| class.name.eq_ignore_ascii_case(name))
    }

    pub fn instance_defaults(&self) -> Vec<Value> {
        let mut fields = match &self.parent {
            Some(parent) => parent.instance_defaults(),
            None => Vec::with_capacity(self.instance_field_count),
        };
        fields.extend(
            self.properties
                .iter()
                .filter(|p| !p.is_static)
                .map(|p| p.default.clone()),
        );
        fields
    }

    /// Case-sensitive property lookup, most derived declaration first.
    pub fn find_property(&self, name: &str) -> Option<PropertyMatch<'_>> {
        self.ancestors().find_map(|class| {
            class
                .properties
                .iter()
                .find(|p| p.name == name)
                .map(|property| PropertyMatch {
                    declaring: class,
                    property,
                })
        })
    }

    pub fn find_constant(&self, name: &str) -> Option<(&ClassDescriptor, &ConstantDescriptor)> {
        self.ancestors().find_map(|class| {
            class
                .constants
                .iter()
                .find(|c| c.name == name)
                .map(|constant| (class, constant))
        })
    }

    /// Overloads declared under `name` (case-insensitive) by the most derived
    /// class that declares any.
    pub fn find_methods(&self, name: &str) -> Vec<RoutineRef> {
        for class in self.ancestors() {
            let found: Vec<RoutineRef> = class
                .methods
                .iter()
                .filter(|m| m.name.eq_ignore_ascii_case(name))
                .cloned()
                .collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    pub fn magic(&self, magic: MagicMethod) -> Option<RoutineRef> {
        self.find_methods(magic.name()).into_iter().next()
    }

    /// The ancestor with the given id.
    pub fn ancestor(&self, id: ClassId) -> Option<&ClassDescriptor> {
        self.ancestors().find(|class| class.id == id)
    }

    pub fn static_value(&self, slot: usize) -> Value {
        self.with_statics(|statics| statics.get(slot).cloned().unwrap_or_default())
    }

    pub fn with_statics<R>(&self, func: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        match self.statics.lock() {
            Ok(mut statics) => func(&mut statics),
            Err(poison) => {
                let mut statics = poison.into_inner();
                func(&mut statics)
            }
        }
    }
}

impl Debug for ClassDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .finish()
    }
}

pub struct ClassBuilder {
    id: ClassId,
    name: String,
    parent: Option<ClassRef>,
    properties: Vec<PropertyDescriptor>,
    constants: Vec<ConstantDescriptor>,
    methods: Vec<RoutineDescriptor>,
    has_runtime_fields: Option<bool>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: next_class_id(),
            name: name.into(),
            parent: None,
            properties: Vec::new(),
            constants: Vec::new(),
            methods: Vec::new(),
            has_runtime_fields: None,
        }
    }

    pub fn extends(mut self, parent: &ClassRef) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn constant(mut self, constant: ConstantDescriptor) -> Self {
        self.constants.push(constant);
        self
    }

    pub fn method(mut self, method: RoutineDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Inherited from the parent unless set; root classes default to no bag.
    pub fn runtime_fields(mut self, enabled: bool) -> Self {
        self.has_runtime_fields = Some(enabled);
        self
    }

    pub fn build(self) -> ClassRef {
        let inherited = self
            .parent
            .as_ref()
            .map(|p| p.instance_field_count)
            .unwrap_or(0);
        let mut next_instance = inherited;
        let mut next_static = 0;
        let mut statics = Vec::new();
        let properties = self
            .properties
            .into_iter()
            .map(|mut property| {
                if property.is_static {
                    property.slot = next_static;
                    next_static += 1;
                    statics.push(property.default.clone());
                } else {
                    property.slot = next_instance;
                    next_instance += 1;
                }
                property
            })
            .collect();
        let declaring = DeclaringClass {
            id: self.id,
            name: self.name.clone(),
        };
        let methods = self
            .methods
            .into_iter()
            .map(|mut method| {
                method.declaring_class = Some(declaring.clone());
                Arc::new(method)
            })
            .collect();
        let has_runtime_fields = self.has_runtime_fields.unwrap_or_else(|| {
            self.parent
                .as_ref()
                .map(|p| p.has_runtime_fields)
                .unwrap_or(false)
        });
        Arc::new(ClassDescriptor {
            id: self.id,
            name: self.name,
            parent: self.parent,
            properties,
            constants: self.constants,
            methods,
            has_runtime_fields,
            instance_field_count: next_instance,
            statics: Mutex::new(statics),
        })
    }
}
