//! Per-request metadata for audit trails and tracing, grounded on the
//! teacher's `infra/api/context.rs` `RequestMetadata` (request_id, timestamp,
//! source, client_ip, user_agent, metadata map), adapted from an
//! app-platform source enum (Cli/Swift/GraphQL) to a transport one (Http/
//! InProcess) since Nexus has one RPC surface rather than several client
//! shells.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{IdentitySubject, OperationContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
	Http,
	InProcess,
}

/// Everything about an inbound call beyond the authenticated subject: where
/// it came from, when, and any headers worth keeping for the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetadata {
	pub request_id: Uuid,
	pub timestamp: chrono::DateTime<chrono::Utc>,
	pub source: RequestSource,
	pub client_ip: Option<String>,
	pub user_agent: Option<String>,
	pub metadata: HashMap<String, String>,
}

impl RequestMetadata {
	pub fn http_request(client_ip: Option<String>, user_agent: Option<String>) -> Self {
		Self {
			request_id: Uuid::new_v4(),
			timestamp: chrono::Utc::now(),
			source: RequestSource::Http,
			client_ip,
			user_agent,
			metadata: HashMap::new(),
		}
	}

	pub fn in_process() -> Self {
		Self {
			request_id: Uuid::new_v4(),
			timestamp: chrono::Utc::now(),
			source: RequestSource::InProcess,
			client_ip: None,
			user_agent: None,
			metadata: HashMap::new(),
		}
	}

	/// Build the [`OperationContext`] the rest of the core threads through a
	/// call, carrying this request's id as its correlation id and applying
	/// the process's default deadline.
	pub fn into_context(self, subject: IdentitySubject, default_deadline_ms: u64) -> OperationContext {
		OperationContext::new(subject)
			.with_correlation_id(self.request_id.to_string())
			.with_deadline(std::time::Duration::from_millis(default_deadline_ms))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::Entity;

	#[test]
	fn in_process_request_carries_a_fresh_id() {
		let a = RequestMetadata::in_process();
		let b = RequestMetadata::in_process();
		assert_ne!(a.request_id, b.request_id);
	}

	#[test]
	fn context_correlation_id_matches_request_id() {
		let meta = RequestMetadata::http_request(Some("127.0.0.1".to_string()), None);
		let request_id = meta.request_id;
		let subject = IdentitySubject::new(Entity::user("bob"), "t1");
		let ctx = meta.into_context(subject, 30_000);
		assert_eq!(ctx.correlation_id.as_deref(), Some(request_id.to_string().as_str()));
		assert!(ctx.deadline.is_some());
	}
}
