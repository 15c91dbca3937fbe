//! Concurrent factory use: one implementation per contract, no matter how
//! many threads ask for it at once

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{Counting, Fixture};
use veil_engine::{ProxyFactory, Value};

fn thread_count() -> usize {
    num_cpus::get().max(4)
}

#[test]
fn test_concurrent_requests_share_one_type() {
    let fx = Fixture::new();
    let factory = Arc::new(ProxyFactory::new(fx.runtime.clone()));
    let threads = thread_count();
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let factory = factory.clone();
            let barrier = barrier.clone();
            let (base, audit, parse) = (fx.calculator, fx.audit, fx.parse);
            thread::spawn(move || {
                barrier.wait();
                // Vary the requested order; the contract is the same
                let interfaces = if i % 2 == 0 { [audit, parse] } else { [parse, audit] };
                factory.create_implementation(base, &interfaces).unwrap()
            })
        })
        .collect();

    let types: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for ty in &types[1..] {
        assert!(Arc::ptr_eq(&types[0], ty));
    }

    // Exactly one class was registered for the contract
    let registered = fx.runtime.types().lookup("app.CalculatorProxy$2");
    assert!(registered.is_none());
}

#[test]
fn test_concurrent_distinct_contracts() {
    let fx = Fixture::new();
    let factory = Arc::new(ProxyFactory::new(fx.runtime.clone()));
    let contracts = [
        (fx.calculator, vec![]),
        (fx.calculator, vec![fx.audit]),
        (fx.audit, vec![]),
        (fx.parse, vec![fx.label]),
    ];
    let barrier = Arc::new(Barrier::new(contracts.len() * 2));

    let handles: Vec<_> = contracts
        .iter()
        .cloned()
        .chain(contracts.iter().cloned())
        .map(|(base, interfaces)| {
            let factory = factory.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                factory.create_implementation(base, &interfaces).unwrap()
            })
        })
        .collect();
    let types: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let (first, second) = types.split_at(contracts.len());
    for (a, b) in first.iter().zip(second) {
        assert!(Arc::ptr_eq(a, b));
    }
    for i in 0..first.len() {
        for j in (i + 1)..first.len() {
            assert_ne!(first[i].handle(), first[j].handle());
        }
    }
}

#[test]
fn test_concurrent_calls_on_one_instance() {
    let fx = Fixture::new();
    let factory = ProxyFactory::new(fx.runtime.clone());
    let counting = Counting::new(Value::I32(7));
    let proxy = factory
        .create_instance(fx.calculator, counting.clone(), &[])
        .unwrap();
    let threads = thread_count();

    thread::scope(|scope| {
        for _ in 0..threads {
            let proxy = proxy.clone();
            scope.spawn(move || {
                for _ in 0..100 {
                    let result = proxy
                        .call_named("add", &mut [Value::I32(1), Value::I32(2)])
                        .unwrap();
                    assert_eq!(result, Value::I32(7));
                }
            });
        }
    });

    assert_eq!(counting.calls(), threads * 100);
}
