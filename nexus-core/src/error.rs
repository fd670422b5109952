//! Unified error taxonomy for Nexus core operations.
//!
//! Every subsystem (router, ReBAC engine, filesystem core, RPC surface)
//! returns a [`NexusError`] so that the RPC layer can map a single enum to
//! stable JSON-RPC error codes without re-deriving error kinds per module.

use thiserror::Error;

/// Result alias used throughout the core.
pub type NexusResult<T> = Result<T, NexusError>;

/// Error taxonomy from the spec's error handling design. Each variant is
/// retriable or not per the table it documents; only [`NexusError::Internal`]
/// should ever be constructed from an unexpected state rather than a routine
/// denial.
#[derive(Debug, Error)]
pub enum NexusError {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("unauthenticated")]
	Unauthenticated,

	#[error("permission denied: subject={subject} permission={permission} object={object}")]
	PermissionDenied {
		subject: String,
		permission: String,
		object: String,
	},

	#[error("not found: {0}")]
	NotFound(String),

	#[error("already exists: {0}")]
	AlreadyExists(String),

	#[error("failed precondition: {0}")]
	FailedPrecondition(String),

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("unavailable: {0}")]
	Unavailable(String),

	#[error("deadline exceeded")]
	Timeout,

	#[error("internal error: {0}")]
	Internal(String),
}

impl NexusError {
	pub fn invalid_argument<S: Into<String>>(s: S) -> Self {
		Self::InvalidArgument(s.into())
	}

	pub fn internal<S: Into<String>>(s: S) -> Self {
		Self::Internal(s.into())
	}

	/// Whether a client may retry the request as-is (possibly with backoff).
	pub fn is_retriable(&self) -> bool {
		matches!(
			self,
			Self::Conflict(_) | Self::Unavailable(_) | Self::Timeout
		)
	}

	/// Stable JSON-RPC 2.0 error code per spec.md §7.
	pub fn json_rpc_code(&self) -> i64 {
		match self {
			Self::InvalidArgument(_) => -32602,
			Self::Unauthenticated => -32001,
			Self::PermissionDenied { .. } => -32002,
			Self::NotFound(_) => -32003,
			Self::AlreadyExists(_) => -32004,
			Self::FailedPrecondition(_) => -32005,
			Self::Conflict(_) => -32006,
			Self::Unavailable(_) => -32007,
			Self::Timeout => -32008,
			Self::Internal(_) => -32603,
		}
	}
}

impl From<sea_orm::DbErr> for NexusError {
	fn from(err: sea_orm::DbErr) -> Self {
		Self::Unavailable(err.to_string())
	}
}

impl From<anyhow::Error> for NexusError {
	fn from(err: anyhow::Error) -> Self {
		Self::Internal(err.to_string())
	}
}

impl From<std::io::Error> for NexusError {
	fn from(err: std::io::Error) -> Self {
		match err.kind() {
			std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
			std::io::ErrorKind::AlreadyExists => Self::AlreadyExists(err.to_string()),
			_ => Self::Unavailable(err.to_string()),
		}
	}
}
