//! Relationship tuples — the facts the ReBAC engine reasons over.

use super::entity::{Entity, Subject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A `(subject, relation, object)` fact, scoped to a tenant.
///
/// Invariant: no duplicate `(tenant, subject, relation, object)`. Tuples
/// with an expired `expires_at` are ignored by checks but remain until GC
/// (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuple {
	pub tuple_id: Uuid,
	pub tenant_id: String,
	pub subject: Subject,
	pub relation: String,
	pub object: Entity,
	pub created_at: DateTime<Utc>,
	pub expires_at: Option<DateTime<Utc>>,
}

impl Tuple {
	pub fn new(
		tenant_id: impl Into<String>,
		subject: Subject,
		relation: impl Into<String>,
		object: Entity,
	) -> Self {
		Self {
			tuple_id: Uuid::new_v4(),
			tenant_id: tenant_id.into(),
			subject,
			relation: relation.into(),
			object,
			created_at: Utc::now(),
			expires_at: None,
		}
	}

	pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
		self.expires_at = Some(expires_at);
		self
	}

	/// A tuple with an expiry in the past is ignored by checks but kept
	/// around until a GC pass reaps it.
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|exp| exp <= now)
	}

	/// The hierarchy-tuple relation name used to link a child object to its
	/// parent directory (spec.md §4.4, "Hierarchy maintenance").
	pub const PARENT_RELATION: &'static str = "parent";

	pub fn parent_tuple(tenant_id: impl Into<String>, child: Entity, parent: Entity) -> Self {
		Self::new(
			tenant_id,
			Subject::Entity(parent),
			Self::PARENT_RELATION,
			child,
		)
	}
}

/// A filter used by `list_tuples`/GC passes.
#[derive(Debug, Clone, Default)]
pub struct TupleFilter {
	pub tenant_id: Option<String>,
	pub subject: Option<Subject>,
	pub relation: Option<String>,
	pub object: Option<Entity>,
	/// Matches any object of this type, ignored if `object` is also set.
	pub object_type: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expired_tuple_is_detected() {
		let t = Tuple::new(
			"t1",
			Subject::Entity(Entity::user("bob")),
			"owner",
			Entity::file("/a"),
		)
		.with_expiry(Utc::now() - chrono::Duration::seconds(1));
		assert!(t.is_expired(Utc::now()));
	}

	#[test]
	fn non_expiring_tuple_never_expires() {
		let t = Tuple::new(
			"t1",
			Subject::Entity(Entity::user("bob")),
			"owner",
			Entity::file("/a"),
		);
		assert!(!t.is_expired(Utc::now()));
	}
}
