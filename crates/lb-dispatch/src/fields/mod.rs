//! Member access: declared properties with visibility and readonly rules,
//! static properties, class constants, runtime-fields bags and the magic
//! accessors `__get`, `__set`, `__isset` and `__unset`.
//!
//! Magic accessors are entered under a per-(object, member, accessor) guard.
//! A re-entered accessor is not called again; the access falls back to the
//! bag (`__set`), null (`__get`), false (`__isset`) or nothing (`__unset`).

mod binder;
mod place;

pub use binder::{AccessKind, FieldBinder, FieldBinding, FieldOutput, FieldRequest, FieldShape};
pub use place::FieldPlace;

pub(crate) use place::vivify_object;

use lb_core::context::GuardBucket;
use lb_core::error::{language_error, BindError, Error, LanguageErrorKind};
use lb_core::metadata::{
    is_visible, ClassDescriptor, ClassId, Invocation, MagicMethod, ParamRole, RoutineDescriptor,
    Visibility,
};
use lb_core::{
    trace, Alias, ArrayKey, ClassRef, Context, ObjectRef, PhpArray, Result, RoutineRef, Value,
};

use crate::convert::convert;

/// The magic accessors a class declares.
#[derive(Debug, Clone, Default)]
pub struct MagicSet {
    pub get: Option<RoutineRef>,
    pub set: Option<RoutineRef>,
    pub isset: Option<RoutineRef>,
    pub unset: Option<RoutineRef>,
}

impl MagicSet {
    pub fn of(class: &ClassDescriptor) -> Self {
        Self {
            get: class.magic(MagicMethod::Get),
            set: class.magic(MagicMethod::Set),
            isset: class.magic(MagicMethod::Isset),
            unset: class.magic(MagicMethod::Unset),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldStorage {
    Instance(usize),
    Static { class: ClassRef, slot: usize },
}

#[derive(Debug, Clone)]
pub struct DeclaredField {
    /// Declaring class.
    pub class: String,
    pub name: String,
    pub visibility: Visibility,
    pub storage: FieldStorage,
    pub is_readonly: bool,
    /// The accessing scope may initialize the readonly property.
    pub init_scope: bool,
}

impl DeclaredField {
    fn inaccessible(&self) -> Error {
        language_error(
            LanguageErrorKind::InaccessibleMember,
            format!(
                "Cannot access {} property {}::${}",
                self.visibility, self.class, self.name
            ),
        )
    }

    fn readonly(&self) -> Error {
        language_error(
            LanguageErrorKind::ReadonlyProperty,
            format!("Cannot modify readonly property {}::${}", self.class, self.name),
        )
    }

    fn place(&self, obj: Option<&ObjectRef>) -> Result<FieldPlace> {
        match &self.storage {
            FieldStorage::Instance(slot) => Ok(FieldPlace::Declared {
                obj: instance(obj, &self.name)?.clone(),
                slot: *slot,
            }),
            FieldStorage::Static { class, slot } => Ok(FieldPlace::Static {
                class: class.clone(),
                slot: *slot,
            }),
        }
    }

    fn load(&self, obj: Option<&ObjectRef>) -> Result<Value> {
        match &self.storage {
            FieldStorage::Instance(slot) => Ok(instance(obj, &self.name)?.field(*slot)),
            FieldStorage::Static { class, slot } => Ok(class.static_value(*slot)),
        }
    }

    fn check_writable(&self, obj: Option<&ObjectRef>) -> Result<()> {
        if self.is_readonly && !(self.init_scope && self.load(obj)?.is_null()) {
            return Err(self.readonly());
        }
        Ok(())
    }
}

fn instance<'o>(obj: Option<&'o ObjectRef>, name: &str) -> Result<&'o ObjectRef> {
    obj.ok_or_else(|| {
        language_error(
            LanguageErrorKind::NotAnObject,
            format!("Accessing property ${} without an instance", name),
        )
    })
}

/// How a member name resolved against a class from a given scope.
#[derive(Debug, Clone)]
pub enum FieldResolution {
    Declared(DeclaredField),
    /// Declared but not visible from the accessing scope.
    Inaccessible { field: DeclaredField, magic: MagicSet },
    /// Not declared; lives in the bag or is handled by magic accessors.
    Dynamic {
        class: String,
        has_bag: bool,
        magic: MagicSet,
    },
}

fn class_ref_for(class: &ClassRef, id: ClassId) -> ClassRef {
    std::iter::successors(Some(class), |c| c.parent())
        .find(|c| c.id() == id)
        .unwrap_or(class)
        .clone()
}

fn declared_field(
    class: &ClassRef,
    name: &str,
    caller: Option<&ClassRef>,
    static_: bool,
) -> Option<(DeclaredField, bool)> {
    let found = class.find_property(name)?;
    if found.property.is_static != static_ {
        return None;
    }
    let declaring = found.declaring;
    let storage = if static_ {
        FieldStorage::Static {
            class: class_ref_for(class, declaring.id()),
            slot: found.property.slot,
        }
    } else {
        FieldStorage::Instance(found.property.slot)
    };
    let field = DeclaredField {
        class: declaring.name().to_string(),
        name: name.to_string(),
        visibility: found.property.visibility,
        storage,
        is_readonly: found.property.is_readonly,
        init_scope: caller.is_some_and(|caller| caller.id() == declaring.id()),
    };
    let visible = is_visible(found.property.visibility, declaring, caller.map(|c| c.as_ref()));
    Some((field, visible))
}

/// Resolves instance member `name` of `class`.
pub fn resolve_field(class: &ClassRef, name: &str, caller: Option<&ClassRef>) -> FieldResolution {
    match declared_field(class, name, caller, false) {
        Some((field, true)) => FieldResolution::Declared(field),
        Some((field, false)) => FieldResolution::Inaccessible {
            field,
            magic: MagicSet::of(class),
        },
        None => FieldResolution::Dynamic {
            class: class.name().to_string(),
            has_bag: class.has_runtime_fields(),
            magic: MagicSet::of(class),
        },
    }
}

/// Resolves static property `name` of `class`. Static properties exist only
/// when declared.
pub fn resolve_static_field(
    class: &ClassRef,
    name: &str,
    caller: Option<&ClassRef>,
) -> Result<FieldResolution> {
    match declared_field(class, name, caller, true) {
        Some((field, true)) => Ok(FieldResolution::Declared(field)),
        Some((field, false)) => Ok(FieldResolution::Inaccessible {
            field,
            magic: MagicSet::default(),
        }),
        None => Err(BindError::UndefinedProperty {
            class: class.name().to_string(),
            name: name.to_string(),
        }
        .into()),
    }
}

/// Calls a magic accessor with the binder-filled implicit parameters.
pub fn invoke_magic(
    ctx: &Context,
    routine: &RoutineDescriptor,
    obj: &ObjectRef,
    member: &str,
    explicit: Vec<Value>,
) -> Result<Value> {
    let mut explicit = explicit.into_iter();
    let mut args = Vec::with_capacity(routine.params.len());
    for param in &routine.params {
        let value = match param.role {
            ParamRole::Regular => match explicit.next() {
                Some(value) if param.is_by_ref => Value::Alias(Alias::new(value)),
                Some(value) => convert(ctx, value, &param.ty)?,
                None => match (&param.default_provider, &param.default_value) {
                    (Some(provider), _) => provider.provide(ctx),
                    (None, Some(value)) => value.clone(),
                    (None, None) => Value::Null,
                },
            },
            ParamRole::ReceiverType | ParamRole::LateStatic => {
                Value::string(obj.class().name())
            }
            ParamRole::IndirectName => Value::string(member),
            ParamRole::Generic | ParamRole::CallerArgs => Value::Array(PhpArray::empty()),
            ParamRole::Context | ParamRole::CallerClass => Value::Null,
        };
        args.push(value);
    }
    routine.invoke(Invocation {
        ctx,
        this: Some(obj.clone()),
        args,
    })
}

/// Runs a magic accessor unless it is already active for this member.
/// `None` means the call was short-circuited.
fn guarded(
    ctx: &Context,
    routine: &RoutineRef,
    obj: &ObjectRef,
    name: &str,
    bucket: GuardBucket,
    args: Vec<Value>,
) -> Result<Option<Value>> {
    let Some(_guard) = ctx.enter_guard(obj, name, bucket) else {
        return Ok(None);
    };
    trace!(class = obj.class().name(), name, ?bucket, "entering magic accessor");
    invoke_magic(ctx, routine, obj, name, args).map(Some)
}

fn cannot_create(class: &str, name: &str) -> Error {
    language_error(
        LanguageErrorKind::InvalidOperand,
        format!("Cannot create dynamic property {}::${}", class, name),
    )
}

fn bag_key(name: &str) -> ArrayKey {
    ArrayKey::from_string(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Normal,
    /// No warnings, and magic reads go through `__isset` first.
    Quiet,
}

impl FieldResolution {
    pub fn is_declared(&self) -> bool {
        matches!(self, FieldResolution::Declared(_))
    }

    /// A plain read would fail at bind time: nothing can ever answer it.
    pub fn is_undefined(&self) -> bool {
        matches!(self, FieldResolution::Dynamic { has_bag: false, magic, .. } if magic.get.is_none())
    }

    fn magic(&self) -> Option<&MagicSet> {
        match self {
            FieldResolution::Declared(_) => None,
            FieldResolution::Inaccessible { magic, .. } | FieldResolution::Dynamic { magic, .. } => {
                Some(magic)
            }
        }
    }

    pub fn read(
        &self,
        ctx: &Context,
        obj: Option<&ObjectRef>,
        name: &str,
        mode: ReadMode,
    ) -> Result<Value> {
        if let FieldResolution::Declared(field) = self {
            return Ok(field.load(obj)?.into_deref());
        }
        if mode == ReadMode::Quiet {
            return self.read_quiet(ctx, obj, name);
        }
        if let FieldResolution::Dynamic { .. } = self {
            if let Some(value) = instance(obj, name)?.runtime_field(name) {
                return Ok(value.into_deref());
            }
        }
        if let (Some(get), Some(obj)) = (self.magic().and_then(|m| m.get.as_ref()), obj) {
            let value = guarded(ctx, get, obj, name, GuardBucket::Get, vec![Value::string(name)])?;
            return Ok(value.unwrap_or_default().into_deref());
        }
        match self {
            FieldResolution::Inaccessible { field, .. } => Err(field.inaccessible()),
            FieldResolution::Dynamic { class, has_bag, .. } => {
                if !has_bag && ctx.options().strict_undefined_members {
                    return Err(BindError::UndefinedProperty {
                        class: class.clone(),
                        name: name.to_string(),
                    }
                    .into());
                }
                ctx.warn(format!("Undefined property: {}::${}", class, name));
                Ok(Value::Null)
            }
            FieldResolution::Declared(_) => Ok(Value::Null),
        }
    }

    fn read_quiet(&self, ctx: &Context, obj: Option<&ObjectRef>, name: &str) -> Result<Value> {
        let obj = instance(obj, name)?;
        if let FieldResolution::Dynamic { .. } = self {
            if let Some(value) = obj.runtime_field(name) {
                return Ok(value.into_deref());
            }
        }
        let Some(magic) = self.magic() else {
            return Ok(Value::Null);
        };
        match (&magic.isset, &magic.get) {
            (Some(_), Some(get)) if self.magic_isset(ctx, obj, name)? => {
                let value =
                    guarded(ctx, get, obj, name, GuardBucket::Get, vec![Value::string(name)])?;
                Ok(value.unwrap_or_default().into_deref())
            }
            _ => Ok(Value::Null),
        }
    }

    pub fn isset(&self, ctx: &Context, obj: Option<&ObjectRef>, name: &str) -> Result<bool> {
        if let FieldResolution::Declared(field) = self {
            return Ok(!field.load(obj)?.is_null());
        }
        let obj = instance(obj, name)?;
        if let FieldResolution::Dynamic { .. } = self {
            if let Some(value) = obj.runtime_field(name) {
                return Ok(!value.is_null());
            }
        }
        if !self.magic_isset(ctx, obj, name)? {
            return Ok(false);
        }
        // a member `__isset` reports must also read as non-null through `__get`
        match self.magic().and_then(|m| m.get.as_ref()) {
            Some(get) => Ok(
                guarded(ctx, get, obj, name, GuardBucket::Get, vec![Value::string(name)])?
                    .is_some_and(|value| !value.is_null()),
            ),
            None => Ok(true),
        }
    }

    fn magic_isset(&self, ctx: &Context, obj: &ObjectRef, name: &str) -> Result<bool> {
        match self.magic().and_then(|m| m.isset.as_ref()) {
            Some(isset) => Ok(
                guarded(ctx, isset, obj, name, GuardBucket::Isset, vec![Value::string(name)])?
                    .is_some_and(|result| result.to_bool()),
            ),
            None => Ok(false),
        }
    }

    pub fn write(
        &self,
        ctx: &Context,
        obj: Option<&ObjectRef>,
        name: &str,
        value: Value,
    ) -> Result<()> {
        let value = value.into_deref();
        match self {
            FieldResolution::Declared(field) => {
                field.check_writable(obj)?;
                let mut place = field.place(obj)?;
                place.with_value_mut(|slot| slot.assign(value));
                Ok(())
            }
            FieldResolution::Inaccessible { field, magic } => {
                let obj = instance(obj, name)?;
                match &magic.set {
                    Some(set) => guarded(
                        ctx,
                        set,
                        obj,
                        name,
                        GuardBucket::Set,
                        vec![Value::string(name), value],
                    )?
                    .map(|_| ())
                    .ok_or_else(|| field.inaccessible()),
                    None => Err(field.inaccessible()),
                }
            }
            FieldResolution::Dynamic {
                class,
                has_bag,
                magic,
            } => {
                let obj = instance(obj, name)?;
                if obj.has_runtime_field(name) {
                    obj.set_runtime_field(name, value);
                    return Ok(());
                }
                if let Some(set) = &magic.set {
                    let args = vec![Value::string(name), value.clone()];
                    if guarded(ctx, set, obj, name, GuardBucket::Set, args)?.is_some() {
                        return Ok(());
                    }
                }
                if *has_bag {
                    obj.set_runtime_field(name, value);
                    Ok(())
                } else {
                    Err(cannot_create(class, name))
                }
            }
        }
    }

    /// Binds the member to `alias` instead of assigning through it.
    pub fn write_ref(
        &self,
        _ctx: &Context,
        obj: Option<&ObjectRef>,
        name: &str,
        alias: Alias,
    ) -> Result<()> {
        match self {
            FieldResolution::Declared(field) => {
                field.check_writable(obj)?;
                let mut place = field.place(obj)?;
                place.with_value_mut(|slot| *slot = Value::Alias(alias));
                Ok(())
            }
            FieldResolution::Inaccessible { field, .. } => Err(field.inaccessible()),
            FieldResolution::Dynamic {
                class,
                has_bag,
                magic,
            } => {
                let obj = instance(obj, name)?;
                if obj.has_runtime_field(name) || (*has_bag && magic.set.is_none()) {
                    let mut place = FieldPlace::Bag {
                        obj: obj.clone(),
                        key: bag_key(name),
                    };
                    place.with_value_mut(|slot| *slot = Value::Alias(alias));
                    return Ok(());
                }
                if magic.set.is_some() {
                    return Err(language_error(
                        LanguageErrorKind::InvalidOperand,
                        format!("Cannot assign by reference to overloaded object {}", class),
                    ));
                }
                Err(cannot_create(class, name))
            }
        }
    }

    pub fn unset(&self, ctx: &Context, obj: Option<&ObjectRef>, name: &str) -> Result<()> {
        match self {
            FieldResolution::Declared(field) => {
                if field.is_readonly {
                    return Err(language_error(
                        LanguageErrorKind::ReadonlyProperty,
                        format!("Cannot unset readonly property {}::${}", field.class, name),
                    ));
                }
                let mut place = field.place(obj)?;
                place.with_value_mut(|slot| *slot = Value::Null);
                Ok(())
            }
            FieldResolution::Inaccessible { field, magic } => {
                let obj = instance(obj, name)?;
                match &magic.unset {
                    Some(unset) => {
                        guarded(ctx, unset, obj, name, GuardBucket::Unset, vec![Value::string(name)])?;
                        Ok(())
                    }
                    None => Err(field.inaccessible()),
                }
            }
            FieldResolution::Dynamic { magic, .. } => {
                let obj = instance(obj, name)?;
                let removed = obj.with_state(|state| {
                    state
                        .runtime_fields
                        .as_mut()
                        .and_then(|bag| bag.remove(&bag_key(name)))
                        .is_some()
                });
                if !removed {
                    if let Some(unset) = &magic.unset {
                        guarded(ctx, unset, obj, name, GuardBucket::Unset, vec![Value::string(name)])?;
                    }
                }
                Ok(())
            }
        }
    }

    /// The location a reference or nested write goes through. `container`
    /// says the caller is about to treat the member as an object or array.
    pub fn place(
        &self,
        ctx: &Context,
        obj: Option<&ObjectRef>,
        name: &str,
        container: bool,
    ) -> Result<FieldPlace> {
        match self {
            FieldResolution::Declared(field) => {
                if field.is_readonly {
                    let holds_object = matches!(field.load(obj)?.deref(), Value::Object(_));
                    if !(container && holds_object) {
                        return Err(field.readonly());
                    }
                }
                field.place(obj)
            }
            FieldResolution::Inaccessible { field, magic } => {
                let obj = instance(obj, name)?;
                match &magic.get {
                    Some(get) => Ok(FieldPlace::Temp(
                        guarded(ctx, get, obj, name, GuardBucket::Get, vec![Value::string(name)])?
                            .unwrap_or_default(),
                    )),
                    None => Err(field.inaccessible()),
                }
            }
            FieldResolution::Dynamic {
                class,
                has_bag,
                magic,
            } => {
                let obj = instance(obj, name)?;
                let bag = FieldPlace::Bag {
                    obj: obj.clone(),
                    key: bag_key(name),
                };
                if obj.has_runtime_field(name) {
                    return Ok(bag);
                }
                if let Some(get) = &magic.get {
                    let args = vec![Value::string(name)];
                    match guarded(ctx, get, obj, name, GuardBucket::Get, args)? {
                        Some(value) => {
                            if !matches!(value, Value::Object(_) | Value::Alias(_)) {
                                ctx.warn(format!(
                                    "Indirect modification of overloaded property {}::${} has no effect",
                                    class, name
                                ));
                            }
                            return Ok(FieldPlace::Temp(value));
                        }
                        None if *has_bag => return Ok(bag),
                        None => return Ok(FieldPlace::Temp(Value::Null)),
                    }
                }
                if *has_bag {
                    Ok(bag)
                } else {
                    Err(cannot_create(class, name))
                }
            }
        }
    }

    /// An existing location, without creating bag entries or calling
    /// magic accessors.
    pub fn existing_place(&self, obj: Option<&ObjectRef>, name: &str) -> Result<Option<FieldPlace>> {
        match self {
            FieldResolution::Declared(field) => field.place(obj).map(Some),
            FieldResolution::Inaccessible { field, .. } => Err(field.inaccessible()),
            FieldResolution::Dynamic { .. } => {
                let obj = instance(obj, name)?;
                Ok(obj.has_runtime_field(name).then(|| FieldPlace::Bag {
                    obj: obj.clone(),
                    key: bag_key(name),
                }))
            }
        }
    }
}

/// `Class::NAME`, with `Class::class` naming the class itself.
pub fn read_class_constant(
    class: &ClassRef,
    name: &str,
    caller: Option<&ClassRef>,
) -> Result<Value> {
    if name.eq_ignore_ascii_case("class") {
        return Ok(Value::string(class.name()));
    }
    let Some((declaring, constant)) = class.find_constant(name) else {
        lb_core::throw!(UndefinedConstant, "Undefined constant {}::{}", class.name(), name);
    };
    if !is_visible(constant.visibility, declaring, caller.map(|c| c.as_ref())) {
        lb_core::throw!(
            InaccessibleMember,
            "Cannot access {} constant {}::{}",
            constant.visibility,
            declaring.name(),
            name
        );
    }
    Ok(constant.value.clone())
}
