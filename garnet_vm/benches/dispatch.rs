//! Method Dispatch Benchmarks
//!
//! Measures the cost of a call through an inline cache.
//!
//! # Benchmark Categories
//!
//! 1. **Cache hit**: monomorphic and polymorphic sites with a warm cache
//! 2. **Slow path**: resolution forced on every call by invalidation
//! 3. **Ad hoc**: host calls through a source-location site
//! 4. **Missing**: cached missing-method outcomes

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use garnet_core::Ident;
use garnet_runtime::{Arity, ClassRef, Invoke, Value};
use garnet_vm::{CallData, CallInfo, Vm, VmConfig};

// =============================================================================
// Fixtures
// =============================================================================

fn base_with_subclasses(vm: &Vm, count: usize) -> (ClassRef, Vec<Value>) {
    let reg = vm.registry();
    let base = reg.define_class("Node", None).unwrap();
    reg.define_user(&base, "weight", Arity::exact(0), |_: &mut dyn Invoke, _: &Value, _: &[Value]| {
        Ok(Value::Int(1))
    });
    let receivers = (0..count)
        .map(|i| {
            let sub = reg.define_class(&format!("Node{i}"), Some(&base)).unwrap();
            reg.new_object(&sub).unwrap()
        })
        .collect();
    (base, receivers)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_cache_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_hit");
    let vm = Vm::with_config(VmConfig::default().with_compaction_guard(false));

    group.bench_function("native_integer_plus", |b| {
        let mut cd = CallData::new(CallInfo::method(Ident::new("+"), 1));
        let args = [Value::Int(2)];
        b.iter(|| black_box(vm.call(&mut cd, black_box(&Value::Int(40)), &args).unwrap()));
    });

    for count in [1usize, 2, 3] {
        let vm = Vm::with_config(VmConfig::default().with_compaction_guard(false));
        let (_, receivers) = base_with_subclasses(&vm, count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("user_method", count), &receivers, |b, receivers| {
            let mut cd = CallData::new(CallInfo::method(Ident::new("weight"), 0));
            let mut ec = vm.context();
            b.iter(|| {
                for recv in receivers {
                    black_box(ec.call(&mut cd, recv, &[]).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_slow_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("slow_path");
    let vm = Vm::new();
    let (_, receivers) = base_with_subclasses(&vm, 1);
    let recv = &receivers[0];

    group.bench_function("invalidate_and_resolve", |b| {
        let mut cd = CallData::new(CallInfo::method(Ident::new("weight"), 0));
        b.iter(|| {
            vm.registry().invalidate_all("bench");
            black_box(vm.call(&mut cd, recv, &[]).unwrap())
        });
    });

    group.bench_function("uncached", |b| {
        b.iter(|| {
            let mut cd = CallData::new(CallInfo::method(Ident::new("weight"), 0));
            black_box(vm.call(&mut cd, recv, &[]).unwrap())
        });
    });

    group.finish();
}

fn bench_adhoc(c: &mut Criterion) {
    let mut group = c.benchmark_group("adhoc");
    let vm = Vm::new();
    let to_s = Ident::new("to_s");

    group.bench_function("funcall", |b| {
        let mut ec = vm.context();
        b.iter(|| black_box(ec.funcall(black_box(&Value::Int(5)), to_s, &[]).unwrap()));
    });

    group.finish();
}

fn bench_missing(c: &mut Criterion) {
    let mut group = c.benchmark_group("missing");
    let vm = Vm::new();

    group.bench_function("cached_no_method", |b| {
        let mut cd = CallData::new(CallInfo::method(Ident::new("absent"), 0));
        b.iter(|| black_box(vm.call(&mut cd, &Value::Int(1), &[]).is_err()));
    });

    group.finish();
}

criterion_group!(benches, bench_cache_hit, bench_slow_path, bench_adhoc, bench_missing);
criterion_main!(benches);
