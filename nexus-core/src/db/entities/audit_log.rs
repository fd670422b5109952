//! Append-only audit trail. No entity method updates or deletes a row here,
//! and the migration that creates this table also installs a BEFORE
//! UPDATE/DELETE trigger so the database itself refuses the mutation even if
//! a future caller tries (spec.md §9).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i64,

	#[sea_orm(indexed)]
	pub tenant_id: String,
	pub actor_type: String,
	pub actor_id: String,

	#[sea_orm(indexed)]
	pub action: String,
	pub object_type: Option<String>,
	pub object_id: Option<String>,

	#[sea_orm(column_type = "Json")]
	pub payload: Json,

	#[sea_orm(indexed)]
	pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
