//! Handler traits and method descriptors
//!
//! A registered method is a [`MethodDescriptor`], which is one of two
//! variants:
//!
//! - **NoParams**: the handler is called with only a [`CallContext`]; any
//!   params on the request are ignored.
//! - **TypedParams**: the descriptor declares a params schema. The payload is
//!   parsed into it before invocation and a parse failure becomes an error
//!   response without the handler ever running.
//!
//! Handlers are async functions whose output implements [`IntoOutcome`]:
//!
//! | handler returns     | response                                      |
//! |---------------------|-----------------------------------------------|
//! | `()`                | void success: no `result`, no `error`         |
//! | `Result<(), E>`     | void success or `error = e.to_string()`       |
//! | `Result<T, E>`      | `result = T` or `error`; the error wins       |
//! | bare value          | `result = value` (`Value`, `String`, `bool`,  |
//! |                     | numbers, `Option<T>`, `Vec<T>`)               |
//!
//! A result that serializes to JSON `null` (for example `Option::None`) is
//! treated as unset and produces no `result` field.
//!
//! # Creating Handlers
//!
//! ```rust
//! use serde::Deserialize;
//! use wirecall_server::{from_fn, from_typed_fn, MethodResult, Registry};
//!
//! #[derive(Deserialize)]
//! struct EchoParams {
//!     #[serde(rename = "Msg")]
//!     msg: String,
//! }
//!
//! let registry = Registry::builder()
//!     .handler("ping", from_fn(|_ctx| async {}))
//!     .handler("echo", from_typed_fn(|_ctx, p: EchoParams| async move {
//!         MethodResult::Ok(p.msg)
//!     }))
//!     .build();
//! assert!(registry.contains("echo"));
//! ```

use crate::context::CallContext;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use wirecall_core::{DispatchError, Params, ParamsError};

/// What a finished handler produced: an optional result or a failure
pub type Outcome = std::result::Result<Option<Value>, DispatchError>;

/// Boxed future returned by every handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// A typed call with its params already parsed, waiting for a context
pub type BoundCall = Box<dyn FnOnce(CallContext) -> HandlerFuture + Send>;

/// Convenience error type for handlers that just want to fail with a message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError(message.into())
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError(message.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError(message)
    }
}

/// Result alias for handler return values
pub type MethodResult<T = ()> = std::result::Result<T, HandlerError>;

/// Conversion from a handler's return value into an [`Outcome`]
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Ok(None)
    }
}

impl<T, E> IntoOutcome for std::result::Result<T, E>
where
    T: Serialize,
    E: Display,
{
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(value) => serialize_outcome(value),
            Err(e) => Err(DispatchError::Handler(e.to_string())),
        }
    }
}

impl<T: Serialize> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Outcome {
        serialize_outcome(self)
    }
}

impl<T: Serialize> IntoOutcome for Vec<T> {
    fn into_outcome(self) -> Outcome {
        serialize_outcome(self)
    }
}

macro_rules! bare_outcome {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOutcome for $ty {
                fn into_outcome(self) -> Outcome {
                    serialize_outcome(self)
                }
            }
        )*
    };
}

bare_outcome!(
    Value, String, &'static str, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32,
    f64,
);

fn serialize_outcome<T: Serialize>(value: T) -> Outcome {
    match serde_json::to_value(value) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        // Unserializable results are a server bug, not a client error
        Err(e) => Err(DispatchError::Internal(format!(
            "failed to serialize result: {}",
            e
        ))),
    }
}

/// A handler that takes no params
pub trait Handler: Send + Sync {
    fn call(&self, ctx: CallContext) -> HandlerFuture;
}

/// A handler with a declared params schema
pub trait TypedHandler: Send + Sync {
    /// Name of the params type, for logs and introspection
    fn schema(&self) -> &'static str;

    /// Parse the payload into the schema and bind it to the handler
    fn bind(&self, params: Params) -> std::result::Result<BoundCall, ParamsError>;
}

/// Registry entry for one method
#[derive(Clone)]
pub enum MethodDescriptor {
    NoParams(Arc<dyn Handler>),
    TypedParams(Arc<dyn TypedHandler>),
}

impl MethodDescriptor {
    /// Declared params schema, if any
    pub fn schema(&self) -> Option<&'static str> {
        match self {
            MethodDescriptor::NoParams(_) => None,
            MethodDescriptor::TypedParams(handler) => Some(handler.schema()),
        }
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.schema() {
            None => f.write_str("NoParams"),
            Some(schema) => write!(f, "TypedParams({})", schema),
        }
    }
}

struct FnHandler<F> {
    func: F,
}

impl<F, Fut, R> Handler for FnHandler<F>
where
    F: Fn(CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome,
{
    fn call(&self, ctx: CallContext) -> HandlerFuture {
        let fut = (self.func)(ctx);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

struct TypedFnHandler<P, F> {
    func: Arc<F>,
    _params: PhantomData<fn() -> P>,
}

impl<P, F, Fut, R> TypedHandler for TypedFnHandler<P, F>
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(CallContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome,
{
    fn schema(&self) -> &'static str {
        std::any::type_name::<P>()
    }

    fn bind(&self, params: Params) -> std::result::Result<BoundCall, ParamsError> {
        let typed: P = params.parse_into()?;
        let func = Arc::clone(&self.func);
        Ok(Box::new(move |ctx: CallContext| -> HandlerFuture {
            let fut = func(ctx, typed);
            Box::pin(async move { fut.await.into_outcome() })
        }))
    }
}

/// Create a method that takes no params
pub fn from_fn<F, Fut, R>(func: F) -> MethodDescriptor
where
    F: Fn(CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome,
{
    MethodDescriptor::NoParams(Arc::new(FnHandler { func }))
}

/// Create a method whose params are parsed into `P` before invocation
pub fn from_typed_fn<P, F, Fut, R>(func: F) -> MethodDescriptor
where
    P: DeserializeOwned + Send + 'static,
    F: Fn(CallContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome,
{
    MethodDescriptor::TypedParams(Arc::new(TypedFnHandler {
        func: Arc::new(func),
        _params: PhantomData,
    }))
}

/// Create a no-params method bound to a shared receiver
///
/// The receiver is handed to every invocation, so one service object can
/// back several methods.
///
/// ```rust
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use wirecall_server::{from_method, MethodResult, Registry};
///
/// struct Counter { hits: AtomicU64 }
///
/// let counter = Arc::new(Counter { hits: AtomicU64::new(0) });
/// let registry = Registry::builder()
///     .handler("hit", from_method(Arc::clone(&counter), |svc: Arc<Counter>, _ctx| async move {
///         MethodResult::Ok(svc.hits.fetch_add(1, Ordering::SeqCst) + 1)
///     }))
///     .build();
/// assert!(registry.contains("hit"));
/// ```
pub fn from_method<S, F, Fut, R>(receiver: Arc<S>, func: F) -> MethodDescriptor
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome,
{
    from_fn(move |ctx| func(Arc::clone(&receiver), ctx))
}

/// Create a typed-params method bound to a shared receiver
pub fn from_typed_method<S, P, F, Fut, R>(receiver: Arc<S>, func: F) -> MethodDescriptor
where
    S: Send + Sync + 'static,
    P: DeserializeOwned + Send + 'static,
    F: Fn(Arc<S>, CallContext, P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome,
{
    from_typed_fn(move |ctx, params: P| func(Arc::clone(&receiver), ctx, params))
}
