//! Codec for envelope serialization and deserialization
//!
//! Thin wrappers over `serde_json` that map failures into the crate's
//! [`Error`] type. Transports use these to turn frames into [`Request`]s and
//! [`Response`]s into frames; they never see raw serde errors.
//!
//! # Examples
//!
//! ```rust
//! use wirecall_core::{codec, Id, Response};
//! use serde_json::json;
//!
//! let response = Response::success(Id::Number(3), Some(json!("hi")));
//! let text = codec::encode_response(&response).unwrap();
//! assert_eq!(text, r#"{"id":3,"result":"hi"}"#);
//!
//! let decoded = codec::decode_response(&text).unwrap();
//! assert_eq!(decoded, response);
//! ```

use crate::error::{Error, Result};
use crate::types::{Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode any serializable value to a JSON string
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be represented as JSON
/// (for example a map with non-string keys).
pub fn encode<T: Serialize>(msg: &T) -> Result<String> {
    serde_json::to_string(msg).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a response frame
pub fn encode_response(resp: &Response) -> Result<String> {
    encode(resp)
}

/// Encode a request frame
pub fn encode_request(req: &Request) -> Result<String> {
    encode(req)
}

/// Decode a text frame into a request
///
/// # Errors
///
/// Returns `Error::Decode` when the text is not JSON or does not have the
/// request shape (e.g. `method` missing or not a string).
///
/// # Examples
///
/// ```rust
/// use wirecall_core::{codec, Id};
///
/// let req = codec::decode_request(r#"{"id":"a","method":"echo","params":{"Msg":"hi"}}"#).unwrap();
/// assert_eq!(req.id, Id::String("a".into()));
/// assert!(codec::decode_request("not json").is_err());
/// ```
pub fn decode_request(data: &str) -> Result<Request> {
    decode_as(data.as_bytes())
}

/// Decode a binary frame into a request
pub fn decode_request_slice(data: &[u8]) -> Result<Request> {
    decode_as(data)
}

/// Decode a text frame into a response
pub fn decode_response(data: &str) -> Result<Response> {
    decode_as(data.as_bytes())
}

fn decode_as<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(|e| Error::Decode(e.to_string()))
}
