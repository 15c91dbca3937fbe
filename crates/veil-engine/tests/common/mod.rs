//! Shared fixtures for the engine integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use veil_engine::{
    interceptor_fn, ClassBuilder, Interceptor, InvocationRecord, PersistedInterceptor,
    ProxyResult, Runtime, Value,
};
use veil_types::{MethodDefinition, PrimitiveType, TypeDefinition, TypeHandle};

/// Types used across the tests
pub struct Fixture {
    pub runtime: Runtime,
    /// `app.Calculator`: virtual `add`, `accumulate(ref total, amount)`,
    /// non-virtual `version`
    pub calculator: TypeHandle,
    /// `app.IAudit`: `audit(string entry)`
    pub audit: TypeHandle,
    /// `app.IParse`: `try_parse(string text, out i32 value) -> bool`
    pub parse: TypeHandle,
    /// `app.ILabel` extends `app.IAudit`: `label() -> string`
    pub label: TypeHandle,
    /// `app.Shape`: abstract `area() -> i32`
    pub shape: TypeHandle,
    /// `app.Token`: sealed class
    pub token: TypeHandle,
}

impl Fixture {
    pub fn new() -> Self {
        let runtime = Runtime::new();
        let (i32_ty, bool_ty, string) = {
            let types = runtime.types();
            let b = types.builtins();
            (b.primitive(PrimitiveType::I32), b.primitive(PrimitiveType::Bool), b.string)
        };

        let calculator = runtime
            .define_class(
                ClassBuilder::new(TypeDefinition::class("Calculator").in_namespace("app"))
                    .field("precision", Value::I32(2))
                    .method(
                        MethodDefinition::new("add")
                            .param("a", i32_ty)
                            .param("b", i32_ty)
                            .returns(i32_ty),
                        |frame| {
                            let a: i32 = frame.arg_as(0)?;
                            let b: i32 = frame.arg_as(1)?;
                            Ok(Value::I32(a + b))
                        },
                    )
                    .method(
                        MethodDefinition::new("accumulate")
                            .ref_param("total", i32_ty)
                            .param("amount", i32_ty),
                        |frame| {
                            let total: i32 = frame.arg_as(0)?;
                            let amount: i32 = frame.arg_as(1)?;
                            frame.set_arg(0, Value::I32(total + amount))?;
                            Ok(Value::Null)
                        },
                    )
                    .method(
                        MethodDefinition::new("version").returns(string).non_virtual(),
                        |_| Ok(Value::string("1.0")),
                    ),
            )
            .unwrap();

        let audit = runtime
            .define(
                TypeDefinition::interface("IAudit")
                    .in_namespace("app")
                    .method(MethodDefinition::new("audit").param("entry", string)),
            )
            .unwrap();
        let parse = runtime
            .define(
                TypeDefinition::interface("IParse").in_namespace("app").method(
                    MethodDefinition::new("try_parse")
                        .param("text", string)
                        .out_param("value", i32_ty)
                        .returns(bool_ty),
                ),
            )
            .unwrap();
        let label = runtime
            .define(
                TypeDefinition::interface("ILabel")
                    .in_namespace("app")
                    .implements(audit)
                    .method(MethodDefinition::new("label").returns(string)),
            )
            .unwrap();
        let shape = runtime
            .define_class(
                ClassBuilder::new(TypeDefinition::class("Shape").in_namespace("app").as_abstract())
                    .abstract_method(MethodDefinition::new("area").returns(i32_ty)),
            )
            .unwrap();
        let token = runtime
            .define_class(ClassBuilder::new(
                TypeDefinition::class("Token").in_namespace("app").sealed(),
            ))
            .unwrap();

        Self {
            runtime,
            calculator,
            audit,
            parse,
            label,
            shape,
            token,
        }
    }

    pub fn primitive(&self, primitive: PrimitiveType) -> TypeHandle {
        self.runtime.types().builtins().primitive(primitive)
    }

    pub fn string(&self) -> TypeHandle {
        self.runtime.types().builtins().string
    }
}

/// Interceptor that counts calls and answers with a fixed value
pub struct Counting {
    pub calls: AtomicUsize,
    pub answer: Value,
}

impl Counting {
    pub fn new(answer: Value) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            answer,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Interceptor for Counting {
    fn intercept(&self, _record: &mut InvocationRecord) -> ProxyResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

/// Interceptor that calls the inherited implementation
pub fn proceeding() -> Arc<dyn Interceptor> {
    interceptor_fn(|record| record.proceed())
}

/// Persistable interceptor answering with a fixed label
#[derive(Debug)]
pub struct Labeler {
    pub text: String,
}

pub const LABELER_KIND: &str = "test.labeler";

impl Interceptor for Labeler {
    fn intercept(&self, _record: &mut InvocationRecord) -> ProxyResult<Value> {
        Ok(Value::string(&self.text))
    }

    fn persist(&self) -> Option<PersistedInterceptor> {
        Some(PersistedInterceptor::new(
            LABELER_KIND,
            serde_json::json!({ "text": self.text }),
        ))
    }
}
