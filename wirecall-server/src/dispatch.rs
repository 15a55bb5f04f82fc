//! Request dispatch
//!
//! The dispatcher turns one [`Request`] into exactly one [`Response`]:
//!
//! 1. Look the method up in the registry; unknown names fail with
//!    `method not found: <method>`.
//! 2. For typed methods, parse the params into the declared schema; a parse
//!    failure is answered with serde's message and the handler is not run.
//! 3. Invoke the handler with its [`CallContext`].
//! 4. Map the outcome onto the response envelope.
//!
//! All of this runs inside a `catch_unwind` boundary. A panicking handler
//! produces an internal-fault response for its own request and nothing else:
//! the connection and every sibling request carry on.
//!
//! [`Dispatcher::spawn`] runs a request on its own task and pushes the
//! response into the connection's sink, which is how connections fan out.

use crate::context::CallContext;
use crate::handler::{MethodDescriptor, Outcome};
use crate::metrics::ServerMetrics;
use crate::registry::Registry;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, OwnedSemaphorePermit};
use tokio::task::JoinHandle;
use wirecall_core::{DispatchError, Id, Request, Response};

/// Per-request dispatch over a shared registry
///
/// Cloning is cheap; every dispatch unit owns a clone.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    registry: Registry,
    expose_internal_errors: bool,
    metrics: Option<Arc<ServerMetrics>>,
}

impl Dispatcher {
    /// Create a dispatcher that exposes internal fault text to clients
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            expose_internal_errors: true,
            metrics: None,
        }
    }

    /// Choose whether caught faults report their raw text or the generic
    /// `"internal server error"`
    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn exposes_internal_errors(&self) -> bool {
        self.expose_internal_errors
    }

    /// Resolve and run the handler for a request, without fault isolation
    pub async fn invoke(&self, request: Request, ctx: CallContext) -> Outcome {
        let descriptor = self
            .registry
            .lookup(&request.method)
            .cloned()
            .ok_or_else(|| DispatchError::MethodNotFound(request.method.clone()))?;

        match descriptor {
            MethodDescriptor::NoParams(handler) => handler.call(ctx).await,
            MethodDescriptor::TypedParams(handler) => {
                let call = handler.bind(request.params)?;
                call(ctx).await
            }
        }
    }

    /// Produce the response for a request
    ///
    /// Never fails and never unwinds: a panic anywhere in lookup, params
    /// parsing or the handler is caught and turned into an error response.
    pub async fn dispatch(&self, request: Request, ctx: CallContext) -> Response {
        let conn_id = ctx.conn_id();
        let id = request.id.clone();
        let method = request.method.clone();
        let started = Instant::now();

        tracing::debug!(
            conn_id,
            id = %id,
            method = %method,
            params = ?request.params.as_value(),
            "Request received"
        );

        let (outcome, panicked) = match AssertUnwindSafe(self.invoke(request, ctx))
            .catch_unwind()
            .await
        {
            Ok(outcome) => (outcome, false),
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                tracing::error!(
                    conn_id,
                    id = %id,
                    method = %method,
                    panic = %detail,
                    "Handler panicked"
                );
                if let Some(ref metrics) = self.metrics {
                    metrics.record_panic(&method);
                }
                (Err(DispatchError::Internal(detail)), true)
            }
        };

        let response = self.respond(conn_id, id, &method, outcome, panicked);
        if let Some(ref metrics) = self.metrics {
            let status = if response.is_success() { "success" } else { "error" };
            metrics.record_request(&method, status, started.elapsed().as_secs_f64());
        }
        response
    }

    /// Map an outcome onto the envelope, logging each failure once
    ///
    /// `panicked` means the fault was already logged at the unwind boundary.
    fn respond(
        &self,
        conn_id: u64,
        id: Id,
        method: &str,
        outcome: Outcome,
        panicked: bool,
    ) -> Response {
        match outcome {
            Ok(result) => {
                tracing::debug!(conn_id, id = %id, method, "Request succeeded");
                Response::success(id, result)
            }
            Err(error) => {
                let error = match error {
                    DispatchError::Internal(detail) => {
                        if !panicked {
                            tracing::error!(conn_id, id = %id, method, error = %detail, "Internal fault");
                        }
                        DispatchError::internal(detail, self.expose_internal_errors)
                    }
                    other => {
                        tracing::warn!(
                            conn_id,
                            id = %id,
                            method,
                            kind = other.kind(),
                            error = %other,
                            "Request failed"
                        );
                        other
                    }
                };
                if let Some(ref metrics) = self.metrics {
                    metrics.record_error(error.kind());
                }
                Response::failure(id, &error)
            }
        }
    }

    /// Run a request on its own task and emit the response onto `sink`
    ///
    /// `permit`, if any, is held until the response has been queued.
    pub fn spawn(
        &self,
        request: Request,
        ctx: CallContext,
        sink: mpsc::Sender<Response>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let conn_id = ctx.conn_id();
            let response = dispatcher.dispatch(request, ctx).await;
            let id = response.id.clone();
            if sink.send(response).await.is_err() {
                tracing::debug!(conn_id, id = %id, "Sink closed, response dropped");
            }
            drop(permit);
        })
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{from_fn, from_typed_fn, MethodResult};
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;
    use wirecall_core::{Params, INTERNAL_SERVER_ERROR};

    #[derive(Deserialize)]
    struct EchoParams {
        #[serde(rename = "Msg")]
        msg: String,
    }

    fn registry() -> Registry {
        Registry::builder()
            .handler("ping", from_fn(|_ctx| async {}))
            .handler("echo", from_typed_fn(|_ctx, p: EchoParams| async move {
                MethodResult::Ok(p.msg)
            }))
            .handler("fail", from_fn(|_ctx| async {
                MethodResult::<()>::Err("disk on fire".into())
            }))
            .handler("nothing", from_fn(|_ctx| async {
                MethodResult::<Option<u32>>::Ok(None)
            }))
            .handler("explode", from_fn(|_ctx| async {
                if true {
                    panic!("kaboom");
                }
            }))
            .build()
    }

    async fn run(dispatcher: &Dispatcher, request: Request) -> Response {
        let ctx = CallContext::detached(request.id.clone(), request.method.clone());
        dispatcher.dispatch(request, ctx).await
    }

    #[tokio::test]
    async fn test_void_success() {
        let dispatcher = Dispatcher::new(registry());
        let response = run(&dispatcher, Request::new(1, "ping", Params::none())).await;
        assert_eq!(response, Response::success(Id::Number(1), None));
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_method_not_found() {
        let dispatcher = Dispatcher::new(registry());
        let response = run(&dispatcher, Request::new(2, "bogus", Params::none())).await;
        assert_eq!(response.id, Id::Number(2));
        assert_eq!(response.error.as_deref(), Some("method not found: bogus"));
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn test_typed_echo() {
        let dispatcher = Dispatcher::new(registry());
        let response = run(
            &dispatcher,
            Request::new(3, "echo", Params::new(json!({"Msg": "hi"}))),
        )
        .await;
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"id":3,"result":"hi"}"#
        );
    }

    #[tokio::test]
    async fn test_params_parse_failure() {
        let dispatcher = Dispatcher::new(registry());
        let response = run(
            &dispatcher,
            Request::new(4, "echo", Params::new(json!({"Msg": 5}))),
        )
        .await;

        let expected = serde_json::from_value::<EchoParams>(json!({"Msg": 5}))
            .err()
            .map(|e| e.to_string());
        assert_eq!(response.error, expected);
    }

    #[tokio::test]
    async fn test_missing_params_for_typed_method() {
        let dispatcher = Dispatcher::new(registry());
        let response = run(&dispatcher, Request::new(5, "echo", Params::none())).await;
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn test_handler_error_verbatim() {
        let dispatcher = Dispatcher::new(registry());
        let response = run(&dispatcher, Request::new(6, "fail", Params::none())).await;
        assert_eq!(response.error.as_deref(), Some("disk on fire"));
    }

    #[tokio::test]
    async fn test_unset_result_is_absent() {
        let dispatcher = Dispatcher::new(registry());
        let response = run(&dispatcher, Request::new(7, "nothing", Params::none())).await;
        assert!(response.is_success());
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn test_panic_exposed() {
        let dispatcher = Dispatcher::new(registry());
        let response = run(&dispatcher, Request::new(8, "explode", Params::none())).await;
        assert_eq!(response.id, Id::Number(8));
        assert_eq!(response.error.as_deref(), Some("kaboom"));
    }

    #[tokio::test]
    async fn test_panic_hidden() {
        let dispatcher = Dispatcher::new(registry()).expose_internal_errors(false);
        let response = run(&dispatcher, Request::new(9, "explode", Params::none())).await;
        assert_eq!(response.error.as_deref(), Some(INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_spawn_emits_once() {
        let dispatcher = Dispatcher::new(registry());
        let (tx, mut rx) = mpsc::channel(4);

        let request = Request::new("a", "explode", Params::none());
        let ctx = CallContext::detached(request.id.clone(), "explode");
        dispatcher.spawn(request, ctx, tx, None).await.unwrap();

        let response = rx.recv().await.unwrap();
        assert_eq!(response.id, Id::String("a".into()));
        assert!(response.is_error());
        // The only sender went away with the task
        assert!(rx.recv().await.is_none());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl CapturedLogs {
        fn loud_lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .filter(|line| line.contains("ERROR") || line.contains("WARN"))
                .map(str::to_string)
                .collect()
        }
    }

    #[tokio::test]
    async fn test_each_failure_logged_once() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        let dispatcher = Dispatcher::new(registry());

        run(&dispatcher, Request::new(1, "explode", Params::none())).await;
        let lines = logs.loud_lines();
        assert_eq!(lines.len(), 1, "{:?}", lines);
        assert!(lines[0].contains("Handler panicked"));

        run(&dispatcher, Request::new(2, "fail", Params::none())).await;
        let lines = logs.loud_lines();
        assert_eq!(lines.len(), 2, "{:?}", lines);
        assert!(lines[1].contains("Request failed"));
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
