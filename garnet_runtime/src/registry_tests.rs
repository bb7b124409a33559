//! Tests for class-graph mutation and serial invalidation.

use crate::class::{ClassId, ClassKind, ClassRef};
use crate::method::{Arity, Invoke, MethodBody, Visibility};
use crate::registry::ClassRegistry;
use crate::value::Value;
use garnet_core::{GarnetError, GarnetResult, Ident, SerialAuthority};
use std::sync::Arc;

fn registry() -> ClassRegistry {
    ClassRegistry::new(Arc::new(SerialAuthority::new()))
}

fn ret_int(n: i64) -> MethodBody {
    MethodBody::Iseq {
        arity: Arity::exact(0),
        body: Arc::new(move |_: &mut dyn Invoke, _: &Value, _: &[Value]| Ok(Value::Int(n))),
    }
}

fn names(list: &[ClassRef]) -> Vec<String> {
    list.iter().map(|c| c.name().to_string()).collect()
}

/// Minimal context for calling natives directly.
struct Ctx<'a>(&'a ClassRegistry);

impl Invoke for Ctx<'_> {
    fn registry(&self) -> &ClassRegistry {
        self.0
    }

    fn send(&mut self, _: &Value, mid: Ident, _: &[Value]) -> GarnetResult<Value> {
        Err(GarnetError::raised("NotImplementedError", mid.to_string()))
    }

    fn call_super(&mut self, _: &[Value]) -> GarnetResult<Value> {
        Err(GarnetError::raised("NotImplementedError", "super"))
    }
}

// =============================================================================
// Bootstrap
// =============================================================================

#[test]
fn test_bootstrap_fixed_ids() {
    let reg = registry();
    let b = reg.builtins();
    assert_eq!(b.basic_object.id(), ClassId::BASIC_OBJECT);
    assert_eq!(b.object.id(), ClassId::OBJECT);
    assert_eq!(b.kernel.id(), ClassId::KERNEL);
    assert_eq!(b.integer.id(), ClassId::INTEGER);
    assert_eq!(b.symbol.id(), ClassId::SYMBOL);
    assert!(b.kernel.is_module());
    assert_eq!(reg.lookup("String").map(|c| c.id()), Some(ClassId::STRING));
}

#[test]
fn test_object_ancestors_include_kernel() {
    let reg = registry();
    let list = reg.ancestors(&reg.builtins().integer);
    assert_eq!(names(&list), ["Integer", "Object", "Kernel", "BasicObject"]);
}

#[test]
fn test_builtin_method_missing_is_basic_and_private() {
    let reg = registry();
    let mm = Ident::new("method_missing");
    let entry = reg
        .search_method(&reg.builtins().object, mm)
        .expect("method_missing is defined");
    assert!(entry.is_basic());
    assert_eq!(entry.visibility, Visibility::Private);
    assert_eq!(entry.owner, ClassId::BASIC_OBJECT);
    assert!(reg.is_basic_definition(ClassId::OBJECT, mm));
}

#[test]
fn test_hidden_class_is_always_basic() {
    let reg = registry();
    assert!(reg.is_basic_definition(ClassId::HIDDEN, Ident::new("anything_at_all")));
    assert!(!reg.is_basic_definition(ClassId::OBJECT, Ident::new("anything_at_all")));
}

// =============================================================================
// Classes
// =============================================================================

#[test]
fn test_define_class_reopen_and_mismatch() {
    let reg = registry();
    let base = reg.define_class("Base", None).unwrap();
    let child = reg.define_class("Child", Some(&base)).unwrap();
    assert_eq!(child.superclass().map(|c| c.id()), Some(base.id()));

    let again = reg.define_class("Child", None).unwrap();
    assert!(Arc::ptr_eq(&child, &again));

    let err = reg
        .define_class("Child", Some(&reg.builtins().object))
        .unwrap_err();
    assert!(err.to_string().contains("superclass mismatch"));

    reg.define_module("Mod").unwrap();
    assert!(matches!(
        reg.define_class("Mod", None),
        Err(GarnetError::TypeError { .. })
    ));
}

#[test]
fn test_modules_cannot_be_instantiated() {
    let reg = registry();
    let m = reg.define_module("Helpers").unwrap();
    assert!(reg.new_object(&m).is_err());

    let c = reg.define_class("Widget", None).unwrap();
    let obj = reg.new_object(&c).unwrap();
    assert_eq!(reg.class_of(&obj).id(), c.id());
}

#[test]
fn test_class_methods_are_inherited_through_metaclasses() {
    let reg = registry();
    let base = reg.define_class("Factory", None).unwrap();
    let child = reg.define_class("SubFactory", Some(&base)).unwrap();
    let meta = reg.singleton_class(&Value::Class(Arc::clone(&base))).unwrap();
    reg.define_method(&meta, Ident::new("build"), ret_int(1), Visibility::Public);

    let child_meta = reg.class_of(&Value::Class(child));
    assert!(child_meta.is_singleton());
    assert!(reg.search_method(&child_meta, Ident::new("build")).is_some());
}

#[test]
fn test_singleton_class_of_object() {
    let reg = registry();
    let c = reg.define_class("Thing", None).unwrap();
    let obj = reg.new_object(&c).unwrap();
    let other = reg.new_object(&c).unwrap();

    let single = reg.singleton_class(&obj).unwrap();
    assert_eq!(single.kind(), ClassKind::Singleton);
    assert!(Arc::ptr_eq(&single, &reg.singleton_class(&obj).unwrap()));
    assert_eq!(reg.class_of(&obj).id(), single.id());
    assert_eq!(reg.real_class_of(&obj).id(), c.id());

    reg.define_method(&single, Ident::new("only_me"), ret_int(1), Visibility::Public);
    assert!(reg.search_method(&reg.class_of(&obj), Ident::new("only_me")).is_some());
    assert!(reg.search_method(&reg.class_of(&other), Ident::new("only_me")).is_none());

    assert!(reg.singleton_class(&Value::Int(3)).is_err());
}

// =============================================================================
// Serials
// =============================================================================

#[test]
fn test_define_method_bumps_class_and_subclasses_only() {
    let reg = registry();
    let base = reg.define_class("Animal", None).unwrap();
    let dog = reg.define_class("Dog", Some(&base)).unwrap();
    let other = reg.define_class("Rock", None).unwrap();

    let (b0, d0, o0) = (base.serial(), dog.serial(), other.serial());
    reg.define_method(&base, Ident::new("speak"), ret_int(1), Visibility::Public);

    assert!(base.serial() > b0);
    assert!(dog.serial() > d0);
    assert_eq!(other.serial(), o0);
    assert_ne!(base.serial(), dog.serial());
}

#[test]
fn test_module_change_invalidates_includers() {
    let reg = registry();
    let m = reg.define_module("Greeting").unwrap();
    let c = reg.define_class("Person", None).unwrap();
    let sub = reg.define_class("Student", Some(&c)).unwrap();
    assert!(reg.include_module(&c, &m).unwrap());

    let (c0, s0) = (c.serial(), sub.serial());
    reg.define_method(&m, Ident::new("hello"), ret_int(1), Visibility::Public);
    assert!(c.serial() > c0);
    assert!(sub.serial() > s0);
    assert!(reg.search_method(&sub, Ident::new("hello")).is_some());
}

#[test]
fn test_invalidate_all_moves_global_state_not_classes() {
    let reg = registry();
    let c = reg.define_class("Quiet", None).unwrap();
    let s0 = c.serial();
    let g0 = reg.serials().global_method_state();
    let g1 = reg.invalidate_all("trace hook installed");
    assert!(g1 > g0);
    assert_eq!(reg.serials().global_method_state(), g1);
    assert_eq!(c.serial(), s0);
}

// =============================================================================
// Method Table Mutation
// =============================================================================

#[test]
fn test_remove_reveals_superclass_method() {
    let reg = registry();
    let base = reg.define_class("Shape", None).unwrap();
    let sq = reg.define_class("Square", Some(&base)).unwrap();
    let area = Ident::new("area");
    let base_entry = reg.define_method(&base, area, ret_int(1), Visibility::Public);
    reg.define_method(&sq, area, ret_int(2), Visibility::Public);

    reg.remove_method(&sq, area).unwrap();
    let found = reg.search_method(&sq, area).unwrap();
    assert!(Arc::ptr_eq(&found, &base_entry));

    assert!(matches!(
        reg.remove_method(&sq, area),
        Err(GarnetError::NameError { .. })
    ));
}

#[test]
fn test_undef_blocks_superclass_method() {
    let reg = registry();
    let base = reg.define_class("Vehicle", None).unwrap();
    let car = reg.define_class("Car", Some(&base)).unwrap();
    let sub = reg.define_class("SportsCar", Some(&car)).unwrap();
    let honk = Ident::new("honk");
    reg.define_method(&base, honk, ret_int(1), Visibility::Public);

    reg.undef_method(&car, honk).unwrap();
    assert!(reg.search_method(&car, honk).is_none());
    assert!(reg.search_method(&sub, honk).is_none());
    assert!(reg.search_method(&base, honk).is_some());

    assert!(reg.undef_method(&car, honk).is_err());
    assert!(reg.remove_method(&car, honk).is_err());
}

#[test]
fn test_set_visibility_copies_inherited_entry() {
    let reg = registry();
    let base = reg.define_class("Account", None).unwrap();
    let sub = reg.define_class("Savings", Some(&base)).unwrap();
    let balance = Ident::new("balance");
    let original = reg.define_method(&base, balance, ret_int(10), Visibility::Public);

    reg.set_visibility(&sub, balance, Visibility::Private).unwrap();
    let copied = reg.search_method(&sub, balance).unwrap();
    assert_eq!(copied.visibility, Visibility::Private);
    assert_eq!(copied.owner, sub.id());
    assert_eq!(copied.method_serial(), original.method_serial());
    assert_eq!(
        reg.search_method(&base, balance).unwrap().visibility,
        Visibility::Public
    );
}

#[test]
fn test_alias_shares_definition() {
    let reg = registry();
    let c = reg.define_class("Printer", None).unwrap();
    let print = reg.define_method(&c, Ident::new("print"), ret_int(1), Visibility::Public);
    reg.alias_method(&c, Ident::new("puts"), Ident::new("print"))
        .unwrap();

    let alias = reg.search_method(&c, Ident::new("puts")).unwrap();
    assert!(Arc::ptr_eq(&alias.definition, &print.definition));
    assert!(reg
        .alias_method(&c, Ident::new("x"), Ident::new("missing"))
        .is_err());
}

#[test]
fn test_redefining_builtin_is_not_basic() {
    let reg = registry();
    let c = reg.define_class("Ghost", None).unwrap();
    let mm = Ident::new("method_missing");
    assert!(reg.is_basic_definition(c.id(), mm));
    reg.define_method(&c, mm, ret_int(0), Visibility::Private);
    assert!(!reg.is_basic_definition(c.id(), mm));
    assert!(reg.is_basic_definition(ClassId::OBJECT, mm));
}

#[test]
fn test_attr_accessor_entries() {
    let reg = registry();
    let c = reg.define_class("Point", None).unwrap();
    reg.define_attr_accessor(&c, "x");
    let reader = reg.search_method(&c, Ident::new("x")).unwrap();
    let writer = reg.search_method(&c, Ident::new("x=")).unwrap();
    assert!(matches!(&reader.definition.body, MethodBody::AttrReader(iv) if *iv == Ident::new("@x")));
    assert!(matches!(&writer.definition.body, MethodBody::AttrWriter(iv) if *iv == Ident::new("@x")));
}

// =============================================================================
// Mixins
// =============================================================================

#[test]
fn test_prepend_wins_over_class() {
    let reg = registry();
    let c = reg.define_class("Service", None).unwrap();
    let logging = reg.define_module("Logging").unwrap();
    let run = Ident::new("run");
    reg.define_method(&c, run, ret_int(1), Visibility::Public);
    let wrapped = reg.define_method(&logging, run, ret_int(2), Visibility::Public);

    assert!(reg.prepend_module(&c, &logging).unwrap());
    assert!(!reg.prepend_module(&c, &logging).unwrap());
    let found = reg.search_method(&c, run).unwrap();
    assert!(Arc::ptr_eq(&found, &wrapped));

    let list = reg.ancestors(&c);
    assert_eq!(names(&list[..2]), ["Logging", "Service"]);

    let sup = reg.search_super(&c, logging.id(), run).unwrap();
    assert_eq!(sup.owner, c.id());
    assert!(reg.search_super(&c, c.id(), run).is_none());
}

#[test]
fn test_include_rejects_cycles_and_classes() {
    let reg = registry();
    let a = reg.define_module("A").unwrap();
    let b = reg.define_module("B").unwrap();
    reg.include_module(&b, &a).unwrap();
    assert!(matches!(
        reg.include_module(&a, &b),
        Err(GarnetError::CyclicInclude { .. })
    ));
    assert!(matches!(
        reg.include_module(&a, &a),
        Err(GarnetError::CyclicInclude { .. })
    ));

    let c = reg.define_class("Plain", None).unwrap();
    assert!(matches!(
        reg.include_module(&a, &c),
        Err(GarnetError::TypeError { .. })
    ));
}

#[test]
fn test_include_already_ancestor_is_noop() {
    let reg = registry();
    let m = reg.define_module("Shared").unwrap();
    let base = reg.define_class("Parent", None).unwrap();
    let child = reg.define_class("Kid", Some(&base)).unwrap();
    assert!(reg.include_module(&base, &m).unwrap());
    let s0 = child.serial();
    assert!(!reg.include_module(&child, &m).unwrap());
    assert_eq!(child.serial(), s0);
    assert!(reg.is_kind_of(&child, m.id()));
}

// =============================================================================
// Built-ins
// =============================================================================

#[test]
fn test_respond_to_reports_public_methods_only() {
    let reg = registry();
    let c = reg.define_class("Safe", None).unwrap();
    reg.define_method(&c, Ident::new("open"), ret_int(1), Visibility::Public);
    reg.define_method(&c, Ident::new("combo"), ret_int(2), Visibility::Private);
    let obj = reg.new_object(&c).unwrap();

    let entry = reg
        .search_method(&reg.class_of(&obj), Ident::new("respond_to?"))
        .unwrap();
    let MethodBody::Native { func, .. } = &entry.definition.body else {
        panic!("respond_to? should be native");
    };
    let mut ctx = Ctx(&reg);
    assert_eq!(func(&mut ctx, &obj, &[Value::sym("open")]).unwrap(), Value::Bool(true));
    assert_eq!(func(&mut ctx, &obj, &[Value::sym("combo")]).unwrap(), Value::Bool(false));
    assert_eq!(func(&mut ctx, &obj, &[Value::sym("nope")]).unwrap(), Value::Bool(false));
}

#[test]
fn test_explicit_basic_method_missing_raises() {
    let reg = registry();
    let entry = reg
        .search_method(&reg.builtins().integer, Ident::new("method_missing"))
        .unwrap();
    let MethodBody::Native { func, .. } = &entry.definition.body else {
        panic!("method_missing should be native");
    };
    let err = func(&mut Ctx(&reg), &Value::Int(1), &[Value::sym("frob")]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "NoMethodError: undefined method `frob' for an instance of Integer"
    );
}
