//! Identity and per-request operation context (spec.md §3, §6).
//!
//! `OperationContext` is threaded explicitly through every core call instead
//! of living in a thread-local, mirroring how the RPC dispatcher builds one
//! per inbound request and passes it down to the router/engine/fs layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::entity::Entity;

/// An authenticated caller. Constructed by the auth layer from an API key or
/// JWT and carried for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySubject {
	pub entity: Entity,
	pub tenant_id: String,
	pub is_admin: bool,
	pub scopes: Vec<String>,
}

impl IdentitySubject {
	pub fn new(entity: Entity, tenant_id: impl Into<String>) -> Self {
		Self {
			entity,
			tenant_id: tenant_id.into(),
			is_admin: false,
			scopes: Vec::new(),
		}
	}

	pub fn admin(mut self) -> Self {
		self.is_admin = true;
		self
	}

	pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
		self.scopes = scopes;
		self
	}

	pub fn has_scope(&self, scope: &str) -> bool {
		self.is_admin || self.scopes.iter().any(|s| s == scope)
	}
}

/// Everything downstream of the RPC dispatcher needs to know about the
/// current request: who's calling, which tenant they're scoped to, and the
/// tracing/cancellation metadata that ties log lines and error responses
/// back to one inbound call.
#[derive(Debug, Clone)]
pub struct OperationContext {
	pub subject: IdentitySubject,
	pub trace_id: Uuid,
	pub correlation_id: Option<String>,
	pub deadline: Option<DateTime<Utc>>,
}

impl OperationContext {
	pub fn new(subject: IdentitySubject) -> Self {
		Self {
			subject,
			trace_id: Uuid::new_v4(),
			correlation_id: None,
			deadline: None,
		}
	}

	pub fn with_deadline(mut self, timeout: Duration) -> Self {
		self.deadline = Some(Utc::now() + chrono::Duration::from_std(timeout).unwrap_or_default());
		self
	}

	pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
		self.correlation_id = Some(id.into());
		self
	}

	pub fn tenant_id(&self) -> &str {
		&self.subject.tenant_id
	}

	/// Whether the deadline, if any, has already passed — checked at the
	/// start of each blocking step so long chains (e.g. bulk permission
	/// checks) fail fast with `Timeout` rather than running to completion
	/// past their budget.
	pub fn is_expired(&self) -> bool {
		self.deadline.is_some_and(|d| Utc::now() >= d)
	}

	/// Time left until the deadline, if one is set. `None` means no deadline;
	/// `Some(Duration::ZERO)` means it has already passed.
	pub fn remaining(&self) -> Option<Duration> {
		self.deadline.map(|d| (d - Utc::now()).to_std().unwrap_or(Duration::ZERO))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn admin_subject_has_every_scope() {
		let s = IdentitySubject::new(Entity::user("root"), "t1").admin();
		assert!(s.has_scope("anything"));
	}

	#[test]
	fn non_admin_subject_requires_explicit_scope() {
		let s = IdentitySubject::new(Entity::user("bob"), "t1").with_scopes(vec!["fs.read".to_string()]);
		assert!(s.has_scope("fs.read"));
		assert!(!s.has_scope("fs.write"));
	}

	#[test]
	fn context_without_deadline_never_expires() {
		let ctx = OperationContext::new(IdentitySubject::new(Entity::user("bob"), "t1"));
		assert!(!ctx.is_expired());
	}

	#[test]
	fn context_with_past_deadline_is_expired() {
		let mut ctx = OperationContext::new(IdentitySubject::new(Entity::user("bob"), "t1"));
		ctx.deadline = Some(Utc::now() - chrono::Duration::seconds(1));
		assert!(ctx.is_expired());
	}
}
