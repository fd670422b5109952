//! Entity and userset types — the atoms ReBAC tuples are built from.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `(type, id)` pair drawn from a closed set of object types. IDs are
/// opaque strings; equality is byte-exact (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
	#[serde(rename = "type")]
	pub kind: String,
	pub id: String,
}

impl Entity {
	pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			id: id.into(),
		}
	}

	pub fn user(id: impl Into<String>) -> Self {
		Self::new("user", id)
	}

	pub fn file(path: impl Into<String>) -> Self {
		Self::new("file", path)
	}
}

impl fmt::Display for Entity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.kind, self.id)
	}
}

impl std::str::FromStr for Entity {
	type Err = crate::error::NexusError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (kind, id) = s
			.split_once(':')
			.ok_or_else(|| crate::error::NexusError::invalid_argument(format!("malformed entity: {s}")))?;
		Ok(Entity::new(kind, id))
	}
}

/// A subject in a tuple: either a concrete entity, or a *userset* —
/// `entity#relation`, meaning "everyone who has `relation` on `entity`".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subject {
	Entity(Entity),
	Userset { entity: Entity, relation: String },
}

impl fmt::Display for Subject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Subject::Entity(e) => write!(f, "{e}"),
			Subject::Userset { entity, relation } => write!(f, "{entity}#{relation}"),
		}
	}
}

impl std::str::FromStr for Subject {
	type Err = crate::error::NexusError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		if let Some((entity_part, relation)) = s.split_once('#') {
			Ok(Subject::Userset {
				entity: entity_part.parse()?,
				relation: relation.to_string(),
			})
		} else {
			Ok(Subject::Entity(s.parse()?))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn entity_round_trips_through_display_and_parse() {
		let e = Entity::new("workspace", "ws_1");
		let parsed: Entity = e.to_string().parse().unwrap();
		assert_eq!(e, parsed);
	}

	#[test]
	fn subject_parses_userset() {
		let s: Subject = "group:eng#member".parse().unwrap();
		assert_eq!(
			s,
			Subject::Userset {
				entity: Entity::new("group", "eng"),
				relation: "member".to_string(),
			}
		);
	}

	#[test]
	fn subject_parses_plain_entity() {
		let s: Subject = "user:bob".parse().unwrap();
		assert_eq!(s, Subject::Entity(Entity::user("bob")));
	}
}
