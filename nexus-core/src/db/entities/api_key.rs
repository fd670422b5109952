//! API key rows backing `sk-<tenant>_<subject>_<random>_<hmac>` bearer
//! authentication (spec.md §6). Only the prefix and an HMAC digest are
//! stored — never the raw key material.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_keys")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub key_id: String,

	#[sea_orm(indexed)]
	pub tenant_id: String,
	pub subject_type: String,
	pub subject_id: String,

	/// The non-secret routing prefix (`sk-<tenant>_<subject>_`), used to
	/// find the candidate row before the HMAC comparison.
	#[sea_orm(indexed, unique)]
	pub prefix: String,
	/// HMAC-SHA256 digest of the full key, compared in constant time.
	pub hmac_digest: String,

	#[sea_orm(column_type = "Json")]
	pub scopes: Json,

	pub created_at: DateTimeUtc,
	pub revoked_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
