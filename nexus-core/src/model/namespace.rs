//! Namespace schema: per-object-type relations, rewrites, and permissions.

use super::tuple::Tuple;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PARENT_RELATION: &str = Tuple::PARENT_RELATION;

/// The hard cap on rewrite-graph traversal depth (spec.md §3, §4.4). Applies
/// uniformly to union/tuple-to-userset recursion and protects against
/// cyclic or adversarial namespace configuration.
pub const MAX_REWRITE_DEPTH: usize = 50;

/// How a relation resolves beyond direct tuple lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rewrite {
	/// Direct tuples only — no further rewriting.
	This,
	/// Union of other relation names on the same object.
	Union(Vec<String>),
	/// "Follow relation `via` of this object, then check `relation` on the
	/// resulting entity" — the Zanzibar tuple-to-userset indirection.
	TupleToUserset { via: String, relation: String },
}

/// A single relation's definition within a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDef {
	pub name: String,
	pub rewrite: Rewrite,
}

/// A permission is always a union of relations (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionDef {
	pub name: String,
	pub relations: Vec<String>,
}

/// Per-object-type configuration: relations plus the permissions built from
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
	pub object_type: String,
	pub relations: HashMap<String, RelationDef>,
	pub permissions: HashMap<String, PermissionDef>,
}

#[derive(Debug, thiserror::Error)]
pub enum NamespaceError {
	#[error("relation '{0}' is not defined in namespace '{1}'")]
	UndefinedRelation(String, String),
	#[error("permission '{0}' is not defined in namespace '{1}'")]
	UndefinedPermission(String, String),
}

impl From<NamespaceError> for crate::error::NexusError {
	fn from(err: NamespaceError) -> Self {
		match err {
			NamespaceError::UndefinedPermission(..) => crate::error::NexusError::InvalidArgument(err.to_string()),
			NamespaceError::UndefinedRelation(..) => crate::error::NexusError::internal(err.to_string()),
		}
	}
}

impl Namespace {
	pub fn new(object_type: impl Into<String>) -> Self {
		Self {
			object_type: object_type.into(),
			relations: HashMap::new(),
			permissions: HashMap::new(),
		}
	}

	pub fn with_relation(mut self, name: impl Into<String>, rewrite: Rewrite) -> Self {
		let name = name.into();
		self.relations.insert(
			name.clone(),
			RelationDef {
				name,
				rewrite,
			},
		);
		self
	}

	pub fn with_permission(mut self, name: impl Into<String>, relations: Vec<String>) -> Self {
		let name = name.into();
		self.permissions.insert(
			name.clone(),
			PermissionDef {
				name,
				relations,
			},
		);
		self
	}

	/// Validate that every relation referenced by a rewrite or permission is
	/// defined in this namespace (spec.md §3 invariant). Cross-namespace
	/// relation references — used by tuple-to-userset traversal — are
	/// validated lazily by the engine at query time since they depend on the
	/// *target* object's type, which isn't known until a tuple is read.
	pub fn validate(&self) -> Result<(), NamespaceError> {
		for relation in self.relations.values() {
			match &relation.rewrite {
				Rewrite::This => {}
				Rewrite::Union(members) => {
					for m in members {
						if !self.relations.contains_key(m) {
							return Err(NamespaceError::UndefinedRelation(
								m.clone(),
								self.object_type.clone(),
							));
						}
					}
				}
				Rewrite::TupleToUserset { via, .. } => {
					if !self.relations.contains_key(via) {
						return Err(NamespaceError::UndefinedRelation(
							via.clone(),
							self.object_type.clone(),
						));
					}
				}
			}
		}
		for perm in self.permissions.values() {
			for r in &perm.relations {
				if !self.relations.contains_key(r) {
					return Err(NamespaceError::UndefinedRelation(
						r.clone(),
						self.object_type.clone(),
					));
				}
			}
		}
		Ok(())
	}

	pub fn permission_relations(&self, permission: &str) -> Result<&[String], NamespaceError> {
		self.permissions
			.get(permission)
			.map(|p| p.relations.as_slice())
			.ok_or_else(|| NamespaceError::UndefinedPermission(permission.to_string(), self.object_type.clone()))
	}
}

/// The standard "hierarchy" namespace shape used throughout the tests and
/// the default file/directory namespace: direct + parent-inherited unions,
/// exactly S3 in spec.md §8.
pub fn hierarchical_namespace(object_type: &str) -> Namespace {
	Namespace::new(object_type)
		.with_relation("direct_owner", Rewrite::This)
		.with_relation("direct_editor", Rewrite::This)
		.with_relation("direct_viewer", Rewrite::This)
		.with_relation(
			"parent_owner",
			Rewrite::TupleToUserset {
				via: PARENT_RELATION.to_string(),
				relation: "owner".to_string(),
			},
		)
		.with_relation(
			"parent_editor",
			Rewrite::TupleToUserset {
				via: PARENT_RELATION.to_string(),
				relation: "editor".to_string(),
			},
		)
		.with_relation(
			"parent_viewer",
			Rewrite::TupleToUserset {
				via: PARENT_RELATION.to_string(),
				relation: "viewer".to_string(),
			},
		)
		.with_relation(
			"owner",
			Rewrite::Union(vec!["direct_owner".to_string(), "parent_owner".to_string()]),
		)
		.with_relation(
			"editor",
			Rewrite::Union(vec![
				"direct_editor".to_string(),
				"parent_editor".to_string(),
				"owner".to_string(),
			]),
		)
		.with_relation(
			"viewer",
			Rewrite::Union(vec![
				"direct_viewer".to_string(),
				"parent_viewer".to_string(),
				"editor".to_string(),
			]),
		)
		.with_permission("read", vec!["viewer".to_string()])
		.with_permission("write", vec!["editor".to_string()])
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hierarchical_namespace_validates() {
		let ns = hierarchical_namespace("file");
		ns.validate().unwrap();
	}

	#[test]
	fn undefined_relation_fails_validation() {
		let ns = Namespace::new("file").with_permission("read", vec!["ghost".to_string()]);
		assert!(ns.validate().is_err());
	}
}
