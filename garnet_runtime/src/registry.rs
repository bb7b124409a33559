//! The class registry.
//!
//! Owns every class and module of one runtime and is the only place the
//! class graph is mutated. Every mutation that can change the outcome of a
//! method lookup replaces the serial of the affected class and of every
//! class that reads through it (subclasses, includers, singleton classes),
//! so a call cache keyed on an old serial can never match again.

use crate::ancestors::{self, Ancestors};
use crate::builtins;
use crate::class::{ClassId, ClassKind, ClassRef, RClass};
use crate::method::{Arity, Invoke, MethodBody, MethodEntry, MethodFn, NativeFn, Visibility};
use crate::object::RObject;
use crate::value::Value;
use garnet_core::{GarnetError, GarnetResult, Ident, Serial, SerialAuthority};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Built-in Classes
// =============================================================================

/// Handles to the classes created at bootstrap.
#[derive(Debug, Clone)]
pub struct Builtins {
    /// `BasicObject`.
    pub basic_object: ClassRef,
    /// `Object`.
    pub object: ClassRef,
    /// `Module`.
    pub module: ClassRef,
    /// `Class`.
    pub class: ClassRef,
    /// `Kernel`, included into `Object`.
    pub kernel: ClassRef,
    /// Class of `nil`.
    pub nil: ClassRef,
    /// Class of `true`.
    pub true_class: ClassRef,
    /// Class of `false`.
    pub false_class: ClassRef,
    /// `Integer`.
    pub integer: ClassRef,
    /// `Float`.
    pub float: ClassRef,
    /// `String`.
    pub string: ClassRef,
    /// `Symbol`.
    pub symbol: ClassRef,
}

// =============================================================================
// Registry
// =============================================================================

/// Registry of all classes in one runtime.
pub struct ClassRegistry {
    serials: Arc<SerialAuthority>,
    classes: RwLock<Vec<ClassRef>>,
    by_name: RwLock<FxHashMap<Arc<str>, ClassRef>>,
    builtins: Builtins,
    /// Serializes structural mutations.
    mutation: Mutex<()>,
}

impl ClassRegistry {
    /// Create a registry with the built-in classes installed.
    pub fn new(serials: Arc<SerialAuthority>) -> Self {
        let mut classes = Vec::with_capacity(64);
        let mut make = |name: &str, kind: ClassKind, superclass: Option<&ClassRef>| {
            let class = Arc::new(RClass::new(
                ClassId(classes.len() as u32),
                name,
                kind,
                superclass.cloned(),
                serials.next_serial(),
            ));
            if let Some(sup) = superclass {
                sup.add_dependent(&class);
            }
            classes.push(Arc::clone(&class));
            class
        };

        // Creation order fixes the well-known ids in `ClassId`.
        let basic_object = make("BasicObject", ClassKind::Class, None);
        let object = make("Object", ClassKind::Class, Some(&basic_object));
        let module = make("Module", ClassKind::Class, Some(&object));
        let class = make("Class", ClassKind::Class, Some(&module));
        let kernel = make("Kernel", ClassKind::Module, None);
        let nil = make("NilClass", ClassKind::Class, Some(&object));
        let true_class = make("TrueClass", ClassKind::Class, Some(&object));
        let false_class = make("FalseClass", ClassKind::Class, Some(&object));
        let integer = make("Integer", ClassKind::Class, Some(&object));
        let float = make("Float", ClassKind::Class, Some(&object));
        let string = make("String", ClassKind::Class, Some(&object));
        let symbol = make("Symbol", ClassKind::Class, Some(&object));
        debug_assert_eq!(classes.len() as u32, ClassId::FIRST_USER_CLASS);

        object.mixins.write().includes.push(Arc::clone(&kernel));
        kernel.add_dependent(&object);

        let by_name = classes
            .iter()
            .map(|c| (Arc::from(c.name()), Arc::clone(c)))
            .collect();

        let registry = Self {
            serials,
            classes: RwLock::new(classes),
            by_name: RwLock::new(by_name),
            builtins: Builtins {
                basic_object,
                object,
                module,
                class,
                kernel,
                nil,
                true_class,
                false_class,
                integer,
                float,
                string,
                symbol,
            },
            mutation: Mutex::new(()),
        };

        let bootstrap: Vec<ClassRef> = registry.classes.read().clone();
        for class in &bootstrap {
            if !class.is_module() {
                registry.metaclass(class);
            }
        }
        builtins::install(&registry);
        tracing::debug!(classes = registry.class_count(), "class registry bootstrapped");
        registry
    }

    /// The serial authority this registry draws from.
    #[inline]
    pub fn serials(&self) -> &Arc<SerialAuthority> {
        &self.serials
    }

    /// Built-in classes.
    #[inline]
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Class by id.
    pub fn get(&self, id: ClassId) -> Option<ClassRef> {
        self.classes.read().get(id.0 as usize).cloned()
    }

    /// Class or module by name.
    pub fn lookup(&self, name: &str) -> Option<ClassRef> {
        self.by_name.read().get(name).cloned()
    }

    /// Number of classes, modules and singleton classes.
    pub fn class_count(&self) -> usize {
        self.classes.read().len()
    }

    // =========================================================================
    // Class Creation
    // =========================================================================

    fn register(&self, name: String, kind: ClassKind, superclass: Option<&ClassRef>) -> ClassRef {
        let mut classes = self.classes.write();
        let class = Arc::new(RClass::new(
            ClassId(classes.len() as u32),
            name,
            kind,
            superclass.cloned(),
            self.serials.next_serial(),
        ));
        if let Some(sup) = superclass {
            sup.add_dependent(&class);
        }
        classes.push(Arc::clone(&class));
        class
    }

    /// Define (or reopen) class `name`.
    ///
    /// `superclass` defaults to `Object`. Reopening with a different
    /// superclass is a type error.
    pub fn define_class(&self, name: &str, superclass: Option<&ClassRef>) -> GarnetResult<ClassRef> {
        let _guard = self.mutation.lock();
        if let Some(existing) = self.lookup(name) {
            if existing.kind() != ClassKind::Class {
                return Err(GarnetError::type_error(format!("{name} is not a class")));
            }
            if let Some(sup) = superclass {
                if existing.superclass().map(|s| s.id()) != Some(sup.id()) {
                    return Err(GarnetError::type_error(format!(
                        "superclass mismatch for class {name}"
                    )));
                }
            }
            return Ok(existing);
        }

        let superclass = superclass.unwrap_or(&self.builtins.object);
        if superclass.kind() != ClassKind::Class {
            return Err(GarnetError::type_error(format!(
                "superclass must be a Class ({} given)",
                superclass.name()
            )));
        }

        let class = self.register(name.to_string(), ClassKind::Class, Some(superclass));
        self.by_name
            .write()
            .insert(Arc::from(name), Arc::clone(&class));
        self.metaclass(&class);
        tracing::debug!(class = name, superclass = %superclass.name(), "class defined");
        Ok(class)
    }

    /// Define (or reopen) module `name`.
    pub fn define_module(&self, name: &str) -> GarnetResult<ClassRef> {
        let _guard = self.mutation.lock();
        if let Some(existing) = self.lookup(name) {
            if !existing.is_module() {
                return Err(GarnetError::type_error(format!("{name} is not a module")));
            }
            return Ok(existing);
        }
        let module = self.register(name.to_string(), ClassKind::Module, None);
        self.by_name
            .write()
            .insert(Arc::from(name), Arc::clone(&module));
        tracing::debug!(module = name, "module defined");
        Ok(module)
    }

    /// Allocate an instance of `class`.
    pub fn new_object(&self, class: &ClassRef) -> GarnetResult<Value> {
        if class.kind() != ClassKind::Class {
            return Err(GarnetError::type_error(format!(
                "can't instantiate {}",
                class.name()
            )));
        }
        Ok(Value::Object(RObject::new(Arc::clone(class))))
    }

    /// Singleton class of a class or module, created on demand.
    ///
    /// A class's singleton inherits from its superclass's singleton, so
    /// class methods are inherited.
    fn metaclass(&self, class: &ClassRef) -> ClassRef {
        if let Some(meta) = class.singleton() {
            return Arc::clone(meta);
        }
        let parent = match (class.superclass(), class.kind()) {
            (Some(sup), _) => self.metaclass(sup),
            (None, ClassKind::Module) => Arc::clone(&self.builtins.module),
            (None, _) => Arc::clone(&self.builtins.class),
        };
        let meta = self.register(
            format!("#<Class:{}>", class.name()),
            ClassKind::Singleton,
            Some(&parent),
        );
        match class.singleton.set(Arc::clone(&meta)) {
            Ok(()) => meta,
            // Lost a creation race; the orphan is never reachable.
            Err(_) => class.singleton().map_or(meta, Arc::clone),
        }
    }

    /// Singleton class of `value`, created on demand.
    pub fn singleton_class(&self, value: &Value) -> GarnetResult<ClassRef> {
        match value {
            Value::Class(class) => {
                let _guard = self.mutation.lock();
                Ok(self.metaclass(class))
            }
            Value::Object(obj) => {
                if let Some(s) = obj.singleton() {
                    return Ok(Arc::clone(s));
                }
                let _guard = self.mutation.lock();
                let cell = obj.singleton_cell();
                if let Some(s) = cell.get() {
                    return Ok(Arc::clone(s));
                }
                let singleton = self.register(
                    format!("#<Class:#<{}>>", obj.class().name()),
                    ClassKind::Singleton,
                    Some(obj.class()),
                );
                let _ = cell.set(Arc::clone(&singleton));
                tracing::debug!(class = %obj.class().name(), "singleton class created");
                Ok(singleton)
            }
            other => Err(GarnetError::type_error(format!(
                "can't define singleton for {}",
                other.inspect()
            ))),
        }
    }

    /// The class method lookup for `value` starts from.
    pub fn class_of(&self, value: &Value) -> ClassRef {
        let b = &self.builtins;
        let class = match value {
            Value::Nil => &b.nil,
            Value::Bool(true) => &b.true_class,
            Value::Bool(false) => &b.false_class,
            Value::Int(_) => &b.integer,
            Value::Float(_) => &b.float,
            Value::Str(_) => &b.string,
            Value::Symbol(_) => &b.symbol,
            Value::Object(obj) => obj.dispatch_class(),
            Value::Class(c) => match c.singleton() {
                Some(meta) => meta,
                None if c.is_module() => &b.module,
                None => &b.class,
            },
        };
        Arc::clone(class)
    }

    /// The class of `value`, skipping singleton classes.
    pub fn real_class_of(&self, value: &Value) -> ClassRef {
        let mut class = self.class_of(value);
        while class.is_singleton() {
            match class.superclass() {
                Some(sup) => class = Arc::clone(sup),
                None => break,
            }
        }
        class
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Lookup order for `class`.
    #[inline]
    pub fn ancestors(&self, class: &ClassRef) -> Ancestors {
        ancestors::ancestors(class)
    }

    /// Find `mid` starting at `class`.
    ///
    /// Returns `None` if no ancestor defines it or if the first match is an
    /// undef marker. Visibility is not checked.
    pub fn search_method(&self, class: &ClassRef, mid: Ident) -> Option<Arc<MethodEntry>> {
        search_in(&ancestors::ancestors(class), mid)
    }

    /// Find `mid` in the ancestors of `class` strictly after `owner`.
    ///
    /// This is the lookup `super` performs from a method owned by `owner`.
    pub fn search_super(
        &self,
        class: &ClassRef,
        owner: ClassId,
        mid: Ident,
    ) -> Option<Arc<MethodEntry>> {
        let list = ancestors::ancestors(class);
        let start = ancestors::position(&list, owner)? + 1;
        search_in(&list[start..], mid)
    }

    /// Whether `class` has `target` among its ancestors.
    pub fn is_kind_of(&self, class: &ClassRef, target: ClassId) -> bool {
        ancestors::contains(&ancestors::ancestors(class), target)
    }

    /// Whether `mid` as seen from `class` still resolves to the definition
    /// installed at bootstrap.
    ///
    /// Always true for [`ClassId::HIDDEN`].
    pub fn is_basic_definition(&self, class: ClassId, mid: Ident) -> bool {
        if class == ClassId::HIDDEN {
            return true;
        }
        self.get(class)
            .and_then(|c| self.search_method(&c, mid))
            .is_some_and(|entry| entry.is_basic())
    }

    // =========================================================================
    // Method Table Mutation
    // =========================================================================

    fn install(&self, class: &ClassRef, entry: MethodEntry) -> Arc<MethodEntry> {
        let entry = Arc::new(entry);
        class
            .methods
            .write()
            .insert(entry.name, Arc::clone(&entry));
        self.invalidate(class, "method table changed");
        entry
    }

    fn fresh_entry(
        &self,
        class: &ClassRef,
        mid: Ident,
        visibility: Visibility,
        body: MethodBody,
        basic: bool,
    ) -> MethodEntry {
        MethodEntry::new(
            mid,
            class.id(),
            visibility,
            body,
            self.serials.next_serial(),
            basic,
        )
    }

    /// Define `mid` in `class`.
    pub fn define_method(
        &self,
        class: &ClassRef,
        mid: Ident,
        body: MethodBody,
        visibility: Visibility,
    ) -> Arc<MethodEntry> {
        let _guard = self.mutation.lock();
        tracing::trace!(class = %class.name(), method = %mid, %visibility, "define method");
        let entry = self.fresh_entry(class, mid, visibility, body, false);
        self.install(class, entry)
    }

    pub(crate) fn define_basic(
        &self,
        class: &ClassRef,
        name: &str,
        arity: Arity,
        func: NativeFn,
        visibility: Visibility,
    ) {
        let _guard = self.mutation.lock();
        let entry = self.fresh_entry(
            class,
            Ident::new(name),
            visibility,
            MethodBody::Native { arity, func },
            true,
        );
        self.install(class, entry);
    }

    /// Define a native method.
    pub fn define_native(
        &self,
        class: &ClassRef,
        name: &str,
        arity: Arity,
        func: NativeFn,
    ) -> Arc<MethodEntry> {
        self.define_method(
            class,
            Ident::new(name),
            MethodBody::Native { arity, func },
            Visibility::Public,
        )
    }

    /// Define a user method from a compiled body.
    pub fn define_user<F>(&self, class: &ClassRef, name: &str, arity: Arity, body: F) -> Arc<MethodEntry>
    where
        F: Fn(&mut dyn Invoke, &Value, &[Value]) -> GarnetResult<Value>
            + Send
            + Sync
            + 'static,
    {
        let body: Arc<MethodFn> = Arc::new(body);
        self.define_method(
            class,
            Ident::new(name),
            MethodBody::Iseq { arity, body },
            Visibility::Public,
        )
    }

    /// Define a reader `name` for instance variable `@name`.
    pub fn define_attr_reader(&self, class: &ClassRef, name: &str) -> Arc<MethodEntry> {
        self.define_method(
            class,
            Ident::new(name),
            MethodBody::AttrReader(Ident::new(&format!("@{name}"))),
            Visibility::Public,
        )
    }

    /// Define a writer `name=` for instance variable `@name`.
    pub fn define_attr_writer(&self, class: &ClassRef, name: &str) -> Arc<MethodEntry> {
        self.define_method(
            class,
            Ident::new(&format!("{name}=")),
            MethodBody::AttrWriter(Ident::new(&format!("@{name}"))),
            Visibility::Public,
        )
    }

    /// Define both reader and writer for `@name`.
    pub fn define_attr_accessor(&self, class: &ClassRef, name: &str) {
        self.define_attr_reader(class, name);
        self.define_attr_writer(class, name);
    }

    /// Remove `mid` from `class`'s own table; lookup continues upward.
    pub fn remove_method(&self, class: &ClassRef, mid: Ident) -> GarnetResult<()> {
        let _guard = self.mutation.lock();
        let removed = {
            let mut methods = class.methods.write();
            let defined = methods.get(&mid).is_some_and(|e| !e.is_undefined());
            if defined { methods.remove(&mid) } else { None }
        };
        if removed.is_none() {
            return Err(GarnetError::NameError {
                kind: "method not defined",
                name: mid.to_string(),
                owner: class.name().to_string(),
            });
        }
        tracing::trace!(class = %class.name(), method = %mid, "remove method");
        self.invalidate(class, "method removed");
        Ok(())
    }

    /// Make `mid` undefined for `class` and everything below it.
    pub fn undef_method(&self, class: &ClassRef, mid: Ident) -> GarnetResult<()> {
        let _guard = self.mutation.lock();
        if self.search_method(class, mid).is_none() {
            return Err(GarnetError::undefined_method(mid.to_string(), class.name()));
        }
        tracing::trace!(class = %class.name(), method = %mid, "undef method");
        let entry = self.fresh_entry(class, mid, Visibility::Public, MethodBody::Undefined, false);
        self.install(class, entry);
        Ok(())
    }

    /// Change the visibility of `mid` as seen from `class`.
    ///
    /// An inherited method is copied into `class` with the new visibility,
    /// leaving the ancestor's binding untouched.
    pub fn set_visibility(
        &self,
        class: &ClassRef,
        mid: Ident,
        visibility: Visibility,
    ) -> GarnetResult<()> {
        let _guard = self.mutation.lock();
        let Some(current) = self.search_method(class, mid) else {
            return Err(GarnetError::undefined_method(mid.to_string(), class.name()));
        };
        if current.visibility == visibility && current.owner == class.id() {
            return Ok(());
        }
        self.install(class, current.rebind(mid, class.id(), visibility));
        Ok(())
    }

    /// Bind `new_name` in `class` to the current definition of `old_name`.
    pub fn alias_method(&self, class: &ClassRef, new_name: Ident, old_name: Ident) -> GarnetResult<()> {
        let _guard = self.mutation.lock();
        let Some(original) = self.search_method(class, old_name) else {
            return Err(GarnetError::undefined_method(old_name.to_string(), class.name()));
        };
        self.install(class, original.rebind(new_name, class.id(), original.visibility));
        Ok(())
    }

    // =========================================================================
    // Mixins
    // =========================================================================

    fn check_mixin(&self, class: &ClassRef, module: &ClassRef) -> GarnetResult<bool> {
        if !module.is_module() {
            return Err(GarnetError::type_error(format!(
                "wrong argument type {} (expected Module)",
                module.name()
            )));
        }
        if ancestors::contains(&ancestors::ancestors(module), class.id()) {
            return Err(GarnetError::CyclicInclude {
                module: module.name().to_string(),
                target: class.name().to_string(),
            });
        }
        Ok(!ancestors::contains(&ancestors::ancestors(class), module.id()))
    }

    /// Include `module` into `class`. Returns false if it was already an
    /// ancestor.
    pub fn include_module(&self, class: &ClassRef, module: &ClassRef) -> GarnetResult<bool> {
        let _guard = self.mutation.lock();
        if !self.check_mixin(class, module)? {
            return Ok(false);
        }
        class.mixins.write().includes.push(Arc::clone(module));
        module.add_dependent(class);
        tracing::debug!(class = %class.name(), module = %module.name(), "module included");
        self.invalidate(class, "module included");
        Ok(true)
    }

    /// Prepend `module` to `class`. Returns false if it was already prepended.
    pub fn prepend_module(&self, class: &ClassRef, module: &ClassRef) -> GarnetResult<bool> {
        let _guard = self.mutation.lock();
        self.check_mixin(class, module)?;
        {
            let mut mixins = class.mixins.write();
            if mixins.prepends.iter().any(|m| m.id() == module.id()) {
                return Ok(false);
            }
            mixins.prepends.push(Arc::clone(module));
        }
        module.add_dependent(class);
        tracing::debug!(class = %class.name(), module = %module.name(), "module prepended");
        self.invalidate(class, "module prepended");
        Ok(true)
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Give `class` and everything that reads through it a fresh serial.
    fn invalidate(&self, class: &ClassRef, why: &'static str) {
        let mut seen = FxHashSet::default();
        let mut pending = vec![Arc::clone(class)];
        while let Some(c) = pending.pop() {
            if !seen.insert(c.id()) {
                continue;
            }
            c.set_serial(self.serials.next_serial());
            pending.extend(c.live_dependents());
        }
        tracing::debug!(class = %class.name(), classes = seen.len(), why, "class serials invalidated");
    }

    /// Invalidate every call cache at once by bumping the global method
    /// state. Used when a process-wide hook changes.
    pub fn invalidate_all(&self, why: &str) -> Serial {
        let state = self.serials.bump_global_method_state();
        tracing::debug!(%state, why, "all call caches invalidated");
        state
    }
}

fn search_in(list: &[ClassRef], mid: Ident) -> Option<Arc<MethodEntry>> {
    for class in list {
        if let Some(entry) = class.own_method(mid) {
            return (!entry.is_undefined()).then_some(entry);
        }
    }
    None
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new(Arc::new(SerialAuthority::new()))
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.class_count())
            .field("global_method_state", &self.serials.global_method_state())
            .finish()
    }
}
