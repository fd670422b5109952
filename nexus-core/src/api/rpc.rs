//! JSON-RPC 2.0 envelope types (spec.md §6 "Wire protocol").

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;

/// Binary payloads have no native JSON representation, so the wire protocol
/// carries them as a tagged object: `{"__type__":"bytes","data":"<base64>"}`
/// (spec.md §6 "Wire protocol").
pub fn encode_bytes(bytes: &[u8]) -> Value {
	serde_json::json!({ "__type__": "bytes", "data": BASE64.encode(bytes) })
}

/// Decode a bytes envelope produced by [`encode_bytes`]. Returns `None` if
/// `value` isn't one (wrong tag, missing field, or invalid base64).
pub fn decode_bytes(value: &Value) -> Option<Vec<u8>> {
	let obj = value.as_object()?;
	if obj.get("__type__")?.as_str()? != "bytes" {
		return None;
	}
	BASE64.decode(obj.get("data")?.as_str()?).ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
	pub jsonrpc: String,
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default)]
	pub id: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
	pub code: i64,
	pub message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl From<&ApiError> for RpcError {
	fn from(err: &ApiError) -> Self {
		Self {
			code: err.json_rpc_code(),
			message: err.to_string(),
			data: None,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
	pub jsonrpc: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<RpcError>,
	pub id: Option<Value>,
}

impl RpcResponse {
	pub fn success(id: Option<Value>, result: Value) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			result: Some(result),
			error: None,
			id,
		}
	}

	pub fn failure(id: Option<Value>, err: &ApiError) -> Self {
		Self {
			jsonrpc: "2.0".to_string(),
			result: None,
			error: Some(err.into()),
			id,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_parses_with_default_params() {
		let raw = r#"{"jsonrpc":"2.0","method":"list_mounts","id":1}"#;
		let req: RpcRequest = serde_json::from_str(raw).unwrap();
		assert_eq!(req.method, "list_mounts");
		assert_eq!(req.params, Value::Null);
	}

	#[test]
	fn failure_response_carries_stable_code() {
		let resp = RpcResponse::failure(Some(Value::from(1)), &ApiError::MethodNotFound("bogus".to_string()));
		assert_eq!(resp.error.unwrap().code, -32601);
	}

	#[test]
	fn bytes_envelope_round_trips() {
		let encoded = encode_bytes(b"hello world");
		assert_eq!(decode_bytes(&encoded).unwrap(), b"hello world");
	}

	#[test]
	fn decode_bytes_rejects_plain_values() {
		assert!(decode_bytes(&Value::from("not an envelope")).is_none());
	}
}
