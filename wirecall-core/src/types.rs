//! Request and response envelopes
//!
//! These are the only two message shapes on a wirecall connection. A request
//! names a method and carries an opaque params payload; the response echoes
//! the request's id and carries either a result or an error string.
//!
//! # Request IDs
//!
//! The id is a client-chosen correlation token. The server never interprets
//! it beyond echoing it back; responses may arrive in any order, so clients
//! must correlate strictly by id.

use crate::error::{DispatchError, ParamsError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Request correlation token
///
/// Any JSON scalar. Serialized untagged, so it appears on the wire exactly as
/// the client sent it. Implements `Hash` and `Eq` so clients can key pending
/// requests by it.
///
/// # Examples
///
/// ```rust
/// use wirecall_core::Id;
///
/// let id1: Id = "req-123".into();
/// let id2: Id = 42i64.into();
///
/// assert_eq!(id1.to_string(), "\"req-123\"");
/// assert_eq!(id2.to_string(), "42");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// String identifier
    String(String),
    /// Integer identifier
    Number(i64),
    /// Integer identifier above `i64::MAX`
    Unsigned(u64),
    /// Non-integral numeric identifier
    Float(Number),
    /// Boolean identifier
    Bool(bool),
    /// Absent or explicit null identifier
    #[default]
    Null,
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::String(s) => write!(f, "\"{}\"", s),
            Id::Number(n) => write!(f, "{}", n),
            Id::Unsigned(n) => write!(f, "{}", n),
            Id::Float(n) => write!(f, "{}", n),
            Id::Bool(b) => write!(f, "{}", b),
            Id::Null => write!(f, "null"),
        }
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<i64> for Id {
    fn from(n: i64) -> Self {
        Id::Number(n)
    }
}

impl From<i32> for Id {
    fn from(n: i32) -> Self {
        Id::Number(n as i64)
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(n) => Id::Number(n),
            Err(_) => Id::Unsigned(n),
        }
    }
}

impl From<bool> for Id {
    fn from(b: bool) -> Self {
        Id::Bool(b)
    }
}

/// Opaque params payload of a request
///
/// Kept as raw JSON until a handler with a declared schema asks for it to be
/// parsed. A missing `params` field and an explicit `null` are both
/// represented as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Option<Value>);

impl Params {
    pub fn new(value: Value) -> Self {
        Params(Some(value))
    }

    pub fn none() -> Self {
        Params(None)
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_value(&self) -> Option<&Value> {
        self.0.as_ref()
    }

    /// Parse the payload into the target schema type
    ///
    /// An absent payload is parsed as JSON `null`, so schemas that accept
    /// null (`()`, `Option<T>`, `serde_json::Value`) succeed and struct
    /// schemas fail with serde's own message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Deserialize;
    /// use wirecall_core::Params;
    ///
    /// #[derive(Deserialize)]
    /// struct Echo {
    ///     #[serde(rename = "Msg")]
    ///     msg: String,
    /// }
    ///
    /// let params = Params::new(serde_json::json!({"Msg": "hi"}));
    /// let echo: Echo = params.parse_into().unwrap();
    /// assert_eq!(echo.msg, "hi");
    /// ```
    pub fn parse_into<T: DeserializeOwned>(self) -> Result<T, ParamsError> {
        let value = self.0.unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(ParamsError::from)
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        Params::new(value)
    }
}

impl From<Option<Value>> for Params {
    fn from(value: Option<Value>) -> Self {
        Params(value)
    }
}

/// A request frame
///
/// A missing `id` decodes as [`Id::Null`]; a missing `params` decodes as
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation token echoed in the response
    #[serde(default)]
    pub id: Id,
    /// Name of the method to invoke
    pub method: String,
    /// Opaque payload, parsed only if the method declares a schema
    #[serde(default, skip_serializing_if = "Params::is_absent")]
    pub params: Params,
}

impl Request {
    pub fn new(id: impl Into<Id>, method: impl Into<String>, params: impl Into<Params>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params: params.into(),
        }
    }
}

/// A response frame
///
/// Exactly one of `result` and `error` is set, except for a void success
/// where both are absent. Absent fields are omitted from the wire object;
/// `result` is never serialized as `null`.
///
/// # Examples
///
/// ```rust
/// use wirecall_core::{Id, Response, DispatchError};
/// use serde_json::json;
///
/// let ok = Response::success(Id::Number(3), Some(json!("hi")));
/// assert!(ok.is_success());
///
/// let failed = Response::failure(Id::Number(2), &DispatchError::MethodNotFound("bogus".into()));
/// assert_eq!(failed.error.as_deref(), Some("method not found: bogus"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the originating request
    pub id: Id,
    /// Handler result, present only on a non-void success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure text, present iff the request failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Create a success response
    ///
    /// A `Some(Value::Null)` result collapses to an absent result, so unset
    /// nullable results and void successes look identical on the wire.
    pub fn success(id: Id, result: Option<Value>) -> Self {
        Self {
            id,
            result: result.filter(|value| !value.is_null()),
            error: None,
        }
    }

    /// Create an error response from a dispatch failure
    pub fn failure(id: Id, error: &DispatchError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error.to_string()),
        }
    }

    /// True when no error is set (void successes included)
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_display() {
        assert_eq!(Id::String("test".to_string()).to_string(), "\"test\"");
        assert_eq!(Id::Number(42).to_string(), "42");
        assert_eq!(Id::Null.to_string(), "null");
        assert_eq!(Id::Bool(true).to_string(), "true");
    }

    #[test]
    fn test_id_accepts_every_scalar() {
        for raw in ["\"a\"", "-7", "18446744073709551615", "1.5", "true", "false", "null"] {
            let id: Id = serde_json::from_str(raw).unwrap();
            assert_eq!(serde_json::to_string(&id).unwrap(), raw);
        }

        let id: Id = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(id, Id::Unsigned(u64::MAX));
        let id: Id = serde_json::from_str("3").unwrap();
        assert_eq!(id, Id::Number(3));
    }

    #[test]
    fn test_id_rejects_compound_values() {
        assert!(serde_json::from_str::<Id>("[1]").is_err());
        assert!(serde_json::from_str::<Id>("{}").is_err());
    }

    #[test]
    fn test_large_u64_does_not_wrap() {
        assert_eq!(Id::from(u64::MAX), Id::Unsigned(u64::MAX));
        assert_eq!(Id::from(5u64), Id::Number(5));
        assert_eq!(Id::from(u64::MAX).to_string(), "18446744073709551615");
    }

    #[test]
    fn test_request_defaults() {
        let req: Request = serde_json::from_str(r#"{"method":"ping"}"#).unwrap();
        assert_eq!(req.id, Id::Null);
        assert!(req.params.is_absent());
    }

    #[test]
    fn test_request_null_params_is_absent() {
        let req: Request = serde_json::from_str(r#"{"id":1,"method":"ping","params":null}"#).unwrap();
        assert!(req.params.is_absent());
    }

    #[test]
    fn test_request_without_params_omits_field() {
        let req = Request::new(1, "ping", Params::none());
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("params"));
    }

    #[test]
    fn test_params_parse_absent_into_struct_fails() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            msg: String,
        }

        let err = Params::none().parse_into::<Needs>().unwrap_err();
        assert!(!err.message().is_empty());
    }

    #[test]
    fn test_params_parse_absent_into_option() {
        let parsed: Option<u32> = Params::none().parse_into().unwrap();
        assert_eq!(parsed, None);
    }

    #[test]
    fn test_success_null_collapses() {
        let resp = Response::success(Id::Number(1), Some(Value::Null));
        assert_eq!(resp.result, None);
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"id":1}"#);
    }

    #[test]
    fn test_success_keeps_falsy_values() {
        let resp = Response::success(Id::Number(1), Some(json!(false)));
        assert_eq!(resp.result, Some(json!(false)));

        let resp = Response::success(Id::Number(1), Some(json!(0)));
        assert_eq!(serde_json::to_string(&resp).unwrap(), r#"{"id":1,"result":0}"#);
    }

    #[test]
    fn test_failure_response() {
        let resp = Response::failure(
            Id::String("a".into()),
            &DispatchError::Handler("nope".into()),
        );
        assert!(resp.is_error());
        assert!(!resp.is_success());
        assert_eq!(
            serde_json::to_string(&resp).unwrap(),
            r#"{"id":"a","error":"nope"}"#
        );
    }
}
