//! File/directory metadata rows (spec.md §3 "File/Directory Record").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "records")]
pub struct Model {
	#[sea_orm(primary_key)]
	pub id: i64,

	#[sea_orm(indexed)]
	pub tenant_id: String,
	#[sea_orm(indexed)]
	pub path: String,
	#[sea_orm(indexed, nullable)]
	pub parent_path: Option<String>,

	pub kind: RecordKind,
	#[sea_orm(nullable)]
	pub content_hash: Option<String>,
	pub size: i64,
	pub etag: String,

	pub owner_type: String,
	pub owner_id: String,

	#[sea_orm(column_type = "Json")]
	pub metadata: Json,

	pub created_at: DateTimeUtc,
	pub updated_at: DateTimeUtc,
	pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum RecordKind {
	#[sea_orm(string_value = "file")]
	File,
	#[sea_orm(string_value = "directory")]
	Directory,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
