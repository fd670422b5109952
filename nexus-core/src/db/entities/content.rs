//! Content-addressed blob rows: one per distinct hash, ref-counted across
//! the file records that point at it (spec.md §4.2 "Backend").

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub content_hash: String,

	pub size: i64,
	pub ref_count: i64,
	pub backend_locator: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
