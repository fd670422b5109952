//! API-layer error types: JSON-RPC protocol errors plus a wrapper around
//! every core error, so the dispatcher has one place to map exceptions to
//! stable numeric codes (spec.md §7, grounded on the teacher's
//! `infra/api/error.rs` `ApiError`/`status_code` split, generalized from
//! HTTP status codes to JSON-RPC 2.0 error codes).

use thiserror::Error;

use crate::error::NexusError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
	#[error("parse error")]
	Parse,

	#[error("invalid request")]
	InvalidRequest(String),

	#[error("method not found: {0}")]
	MethodNotFound(String),

	#[error("invalid params: {0}")]
	InvalidParams(String),

	#[error(transparent)]
	Core(#[from] NexusError),
}

impl ApiError {
	/// Stable JSON-RPC 2.0 error code (spec.md §7). Protocol-level failures
	/// use the reserved `-326xx` range; everything else delegates to
	/// [`NexusError::json_rpc_code`] so enforcement and RPC errors share one
	/// numbering scheme.
	pub fn json_rpc_code(&self) -> i64 {
		match self {
			Self::Parse => -32700,
			Self::InvalidRequest(_) => -32600,
			Self::MethodNotFound(_) => -32601,
			Self::InvalidParams(_) => -32602,
			Self::Core(err) => err.json_rpc_code(),
		}
	}
}

impl From<serde_json::Error> for ApiError {
	fn from(err: serde_json::Error) -> Self {
		Self::InvalidParams(err.to_string())
	}
}
