//! Persisting proxies and rebuilding them from their persisted form

mod common;

use std::sync::Arc;

use common::{Counting, Fixture, Labeler, LABELER_KIND};
use veil_engine::proxy::persist::{BASE_TYPE_KEY, INTERCEPTOR_KEY, INTERFACE_COUNT_KEY};
use veil_engine::{
    FactoryOptions, Interceptor, InterceptorRegistry, ProxyError, ProxyFactory, SerialValue,
    SerializationInfo, Value,
};
use veil_types::{MethodDefinition, TypeDefinition, TypeRef};

fn registry() -> InterceptorRegistry {
    let mut registry = InterceptorRegistry::new();
    registry.register(LABELER_KIND, |state| {
        let text = state
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProxyError::Reconstruction("labeler state has no text".to_string()))?;
        Ok(Arc::new(Labeler {
            text: text.to_string(),
        }) as Arc<dyn Interceptor>)
    });
    registry
}

fn labeler(text: &str) -> Arc<dyn Interceptor> {
    Arc::new(Labeler {
        text: text.to_string(),
    })
}

#[test]
fn test_persisted_layout() {
    let fx = Fixture::new();
    let factory = ProxyFactory::new(fx.runtime.clone());
    let proxy = factory
        .create_instance(fx.calculator, labeler("a"), &[fx.audit])
        .unwrap();

    let info = proxy.get_object_data().unwrap();
    assert_eq!(
        info.to_json().unwrap(),
        concat!(
            r#"{"__kind":"veil.proxy","#,
            r#""__interceptor":{"kind":"test.labeler","state":{"text":"a"}},"#,
            r#""__baseType":"app.Calculator","#,
            r#""__baseInterfaceCount":1,"#,
            r#""__baseInterface0":"app.IAudit"}"#
        )
    );
}

#[test]
fn test_round_trip_through_json() {
    let fx = Fixture::new();
    let factory = ProxyFactory::new(fx.runtime.clone());
    let proxy = factory
        .create_instance(fx.calculator, labeler("restored"), &[fx.label, fx.parse])
        .unwrap();

    let text = proxy.get_object_data().unwrap().to_json().unwrap();
    let info = SerializationInfo::from_json(&text).unwrap();
    // Interface entries keep the requested order
    assert_eq!(info.get_string("__baseInterface0").unwrap(), "app.ILabel");
    assert_eq!(info.get_string("__baseInterface1").unwrap(), "app.IParse");

    let rebuilt = factory.reconstruct(&info, &registry()).unwrap();
    assert!(Arc::ptr_eq(rebuilt.proxy_type(), proxy.proxy_type()));
    assert_eq!(
        rebuilt.call_named("label", &mut []).unwrap(),
        Value::string("restored")
    );
    assert_eq!(rebuilt.get_object_data().unwrap().to_json().unwrap(), text);
}

#[test]
fn test_reconstruct_in_fresh_factory() {
    let fx = Fixture::new();
    let info = ProxyFactory::new(fx.runtime.clone())
        .create_instance(fx.audit, labeler("x"), &[])
        .unwrap()
        .get_object_data()
        .unwrap();

    let other = ProxyFactory::new(fx.runtime.clone());
    let rebuilt = other.reconstruct(&info, &registry()).unwrap();
    assert_eq!(rebuilt.proxy_type().contract().base(), fx.audit);
    assert!(rebuilt.interceptor().is_some());
}

#[test]
fn test_closed_generic_names_resolve() {
    let fx = Fixture::new();
    let string = fx.string();
    let lookup = fx
        .runtime
        .define(
            TypeDefinition::interface("ILookup")
                .in_namespace("app")
                .generic_param("K")
                .method(
                    MethodDefinition::new("find")
                        .param("key", TypeRef::TypeParam(0))
                        .returns(string),
                ),
        )
        .unwrap();
    let closed = fx.runtime.types_mut().instantiate(lookup, &[string]).unwrap();

    let factory = ProxyFactory::new(fx.runtime.clone());
    let proxy = factory.create_instance(closed, labeler("hit"), &[]).unwrap();
    let info = proxy.get_object_data().unwrap();
    assert_eq!(info.get_string(BASE_TYPE_KEY).unwrap(), "app.ILookup<string>");

    let rebuilt = factory.reconstruct(&info, &registry()).unwrap();
    assert!(Arc::ptr_eq(rebuilt.proxy_type(), proxy.proxy_type()));
    assert_eq!(
        rebuilt.call_named("find", &mut [Value::string("k")]).unwrap(),
        Value::string("hit")
    );
}

#[test]
fn test_object_data_through_dispatch() {
    let fx = Fixture::new();
    let counting = Counting::new(Value::Null);
    let factory = ProxyFactory::new(fx.runtime.clone());
    let proxy = factory.create_instance(fx.audit, labeler("x"), &[]).unwrap();

    let obj = proxy.as_object().unwrap();
    let json = fx.runtime.call(&obj, "get_object_data", &mut []).unwrap();
    assert_eq!(
        json.as_str().unwrap(),
        proxy.get_object_data().unwrap().to_json().unwrap()
    );

    // The marker method is never handed to the interceptor
    proxy.set_interceptor(counting.clone());
    assert!(fx.runtime.call(&obj, "get_object_data", &mut []).is_err());
    assert_eq!(counting.calls(), 0);
}

#[test]
fn test_object_data_rejects_arguments() {
    let fx = Fixture::new();
    let factory = ProxyFactory::new(fx.runtime.clone());
    let proxy = factory.create_instance(fx.audit, labeler("x"), &[]).unwrap();
    let persistable = fx.runtime.types().builtins().persistable;
    let method = fx.runtime.method(persistable, "get_object_data").unwrap();

    let err = proxy.call(method, &mut [Value::I32(1)]).unwrap_err();
    match err {
        ProxyError::ArgumentCount {
            method,
            expected,
            actual,
        } => {
            assert_eq!(method, "veil.Persistable.get_object_data() -> string");
            assert_eq!((expected, actual), (0, 1));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_not_serializable() {
    let fx = Fixture::new();
    let factory = ProxyFactory::new(fx.runtime.clone())
        .with_options(FactoryOptions::default().with_serializable(false));
    let proxy = factory
        .create_instance(fx.calculator, labeler("x"), &[])
        .unwrap();

    assert!(!proxy.proxy_type().is_serializable());
    let err = proxy.get_object_data().unwrap_err();
    assert!(matches!(err, ProxyError::Serialization(_)));

    let persistable = fx.runtime.types().builtins().persistable;
    assert!(!fx.runtime.types().is_assignable(proxy.proxy_type().handle(), persistable));

    // Asking for the marker interface explicitly turns support back on
    let explicit = factory
        .create_instance(fx.calculator, labeler("x"), &[persistable])
        .unwrap();
    assert!(explicit.proxy_type().is_serializable());
    assert!(explicit.get_object_data().is_ok());
}

#[test]
fn test_interceptor_must_be_persistable() {
    let fx = Fixture::new();
    let factory = ProxyFactory::new(fx.runtime.clone());

    let proxy = factory
        .create_instance(fx.audit, Counting::new(Value::Null), &[])
        .unwrap();
    assert!(matches!(proxy.get_object_data(), Err(ProxyError::Serialization(_))));

    let bare = factory.create_uninitialized(fx.audit, &[]).unwrap();
    assert!(matches!(bare.get_object_data(), Err(ProxyError::Serialization(_))));
}

#[test]
fn test_reconstruction_failures() {
    let fx = Fixture::new();
    let factory = ProxyFactory::new(fx.runtime.clone());
    let info = factory
        .create_instance(fx.calculator, labeler("x"), &[fx.audit])
        .unwrap()
        .get_object_data()
        .unwrap();

    let mut unknown_type = info.clone();
    unknown_type.add_value(BASE_TYPE_KEY, SerialValue::String("app.Missing".to_string()));
    let err = factory.reconstruct(&unknown_type, &registry()).unwrap_err();
    assert!(matches!(err, ProxyError::Reconstruction(_)));
    assert!(err.to_string().contains("app.Missing"));

    let err = factory.reconstruct(&info, &InterceptorRegistry::new()).unwrap_err();
    assert!(matches!(err, ProxyError::Reconstruction(_)));

    let mut bad_interceptor = info.clone();
    bad_interceptor.add_value(INTERCEPTOR_KEY, SerialValue::I32(3));
    assert!(factory.reconstruct(&bad_interceptor, &registry()).is_err());

    // A sealed base is rejected when the contract is rebuilt
    let mut sealed = info.clone();
    sealed.add_value(BASE_TYPE_KEY, SerialValue::String("app.Token".to_string()));
    let err = factory.reconstruct(&sealed, &registry()).unwrap_err();
    assert!(matches!(err, ProxyError::Reconstruction(_)));

    let err = factory
        .reconstruct(&SerializationInfo::new(), &registry())
        .unwrap_err();
    assert!(matches!(err, ProxyError::Reconstruction(_)));
}

#[test]
fn test_hostile_entries_fail_cleanly() {
    let fx = Fixture::new();
    let factory = ProxyFactory::new(fx.runtime.clone());
    let info = factory
        .create_instance(fx.calculator, labeler("x"), &[fx.audit])
        .unwrap()
        .get_object_data()
        .unwrap();

    let mut huge_count = info.clone();
    huge_count.add_value(INTERFACE_COUNT_KEY, SerialValue::I32(i32::MAX));
    let err = factory.reconstruct(&huge_count, &registry()).unwrap_err();
    assert!(matches!(err, ProxyError::Reconstruction(_)));

    let mut deep_name = info.clone();
    let name = format!("{}{}", "object<".repeat(200_000), ">".repeat(200_000));
    deep_name.add_value(BASE_TYPE_KEY, SerialValue::String(name));
    let err = factory.reconstruct(&deep_name, &registry()).unwrap_err();
    assert!(matches!(err, ProxyError::Reconstruction(_)));
}
