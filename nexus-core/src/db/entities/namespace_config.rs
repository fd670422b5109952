//! Stored namespace configuration, keyed by object type (and optionally a
//! tenant override). Loaded once and held in the engine's namespace cache
//! (spec.md §4.4 "namespace-config caching"); rows here are the source of
//! truth a cache miss falls back to.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "namespace_configs")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub object_type: String,
	/// `None` means this is the global default for the object type; a
	/// tenant-scoped row overrides it when present.
	#[sea_orm(primary_key, auto_increment = false)]
	pub tenant_id: String,

	#[sea_orm(column_type = "Text")]
	pub config_json: String,

	pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Sentinel `tenant_id` used for the global (non-tenant-scoped) default.
pub const GLOBAL_TENANT: &str = "*";
