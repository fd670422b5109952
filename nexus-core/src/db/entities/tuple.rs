//! Relationship-tuple rows. A `(tenant, subject, relation, object)` fact,
//! indexed both forward (object lookups, for `check`) and reverse (subject
//! lookups, for `list_objects_for_subject`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tuples")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i64,

	#[sea_orm(indexed)]
	pub tenant_id: String,

	#[sea_orm(indexed)]
	pub subject_type: String,
	#[sea_orm(indexed)]
	pub subject_id: String,
	/// The userset relation (`entity#relation`), or `""` when the subject is
	/// a plain entity. Stored as a non-null sentinel rather than `NULL` so
	/// the fact-uniqueness index actually rejects duplicates — SQLite and
	/// Postgres both treat `NULL` as distinct from `NULL` in a UNIQUE index.
	pub subject_relation: String,

	#[sea_orm(indexed)]
	pub relation: String,

	#[sea_orm(indexed)]
	pub object_type: String,
	#[sea_orm(indexed)]
	pub object_id: String,

	pub created_at: DateTimeUtc,
	pub expires_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
