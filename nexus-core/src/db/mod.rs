//! Transactional metadata store over sea-orm: tuples, namespace configs,
//! file/directory records, content rows, API keys, users and the audit log.
//!
//! SQLite is supported for single-process development only. Configuring a
//! [`WriterRole::Multi`] store against a `sqlite://` URL is refused at
//! connect time rather than allowed to silently corrupt a shared file under
//! concurrent writers (spec.md §9, "single-writer cache corruption").

pub mod entities;
pub mod migration;

use chrono::Utc;
use sea_orm::{
	ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectOptions, Database as SeaDatabase,
	DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

use crate::error::{NexusError, NexusResult};
use crate::model::{ContentRow, Entity as ModelEntity, Record as ModelRecord, RecordKind, Subject, Tuple, TupleFilter};
use entities::{namespace_config::GLOBAL_TENANT, record::RecordKind as DbRecordKind};

/// How many writers are allowed to hold this store open concurrently.
/// SQLite's single-file-lock model makes [`WriterRole::Multi`] unsafe there;
/// Postgres is required once more than one process writes (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterRole {
	Single,
	Multi,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
	pub url: String,
	pub role: WriterRole,
	pub max_connections: u32,
}

impl StoreConfig {
	pub fn sqlite(path: impl AsRef<std::path::Path>) -> Self {
		Self {
			url: format!("sqlite://{}?mode=rwc", path.as_ref().display()),
			role: WriterRole::Single,
			max_connections: 5,
		}
	}

	pub fn postgres(url: impl Into<String>, role: WriterRole) -> Self {
		Self {
			url: url.into(),
			role,
			max_connections: 20,
		}
	}
}

pub struct MetadataStore {
	conn: DatabaseConnection,
}

impl MetadataStore {
	pub async fn connect(config: StoreConfig) -> NexusResult<Self> {
		let is_sqlite = config.url.starts_with("sqlite:");
		if is_sqlite && config.role == WriterRole::Multi {
			return Err(NexusError::FailedPrecondition(
				"sqlite cannot serve a multi-writer role; configure postgres instead".to_string(),
			));
		}

		let mut opt = ConnectOptions::new(config.url);
		opt.max_connections(config.max_connections)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.idle_timeout(Duration::from_secs(8))
			.sqlx_logging(false);

		let conn = SeaDatabase::connect(opt)
			.await
			.map_err(|e| NexusError::Unavailable(e.to_string()))?;

		if is_sqlite {
			for pragma in [
				"PRAGMA journal_mode=WAL",
				"PRAGMA synchronous=NORMAL",
				"PRAGMA foreign_keys=ON",
			] {
				conn.execute(Statement::from_string(sea_orm::DatabaseBackend::Sqlite, pragma))
					.await
					.map_err(|e| NexusError::Unavailable(e.to_string()))?;
			}
		}

		info!(sqlite = is_sqlite, "connected to metadata store");
		Ok(Self { conn })
	}

	pub async fn migrate(&self) -> NexusResult<()> {
		migration::Migrator::up(&self.conn, None)
			.await
			.map_err(|e| NexusError::internal(e.to_string()))?;
		info!("metadata store migrations applied");
		Ok(())
	}

	pub fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}

	// ---- tuples ---------------------------------------------------------

	pub async fn insert_tuple(&self, tuple: &Tuple) -> NexusResult<()> {
		let (subject_type, subject_id, subject_relation) = split_subject(&tuple.subject);
		let am = entities::tuple::ActiveModel {
			id: NotSet,
			tenant_id: Set(tuple.tenant_id.clone()),
			subject_type: Set(subject_type),
			subject_id: Set(subject_id),
			subject_relation: Set(subject_relation),
			relation: Set(tuple.relation.clone()),
			object_type: Set(tuple.object.kind.clone()),
			object_id: Set(tuple.object.id.clone()),
			created_at: Set(tuple.created_at),
			expires_at: Set(tuple.expires_at),
		};
		am.insert(&self.conn).await.map_err(|e| match e {
			DbErr::RecordNotInserted => NexusError::AlreadyExists(format!("tuple already exists: {tuple:?}")),
			other => map_db_err(other, "tuple already exists"),
		})?;
		Ok(())
	}

	pub async fn delete_tuple(&self, tenant_id: &str, tuple: &Tuple) -> NexusResult<()> {
		use entities::tuple::Column;
		let (subject_type, subject_id, subject_relation) = split_subject(&tuple.subject);
		let query = entities::Tuple::delete_many()
			.filter(Column::TenantId.eq(tenant_id))
			.filter(Column::SubjectType.eq(subject_type))
			.filter(Column::SubjectId.eq(subject_id))
			.filter(Column::Relation.eq(tuple.relation.clone()))
			.filter(Column::ObjectType.eq(tuple.object.kind.clone()))
			.filter(Column::ObjectId.eq(tuple.object.id.clone()))
			.filter(Column::SubjectRelation.eq(subject_relation));
		let res = query.exec(&self.conn).await.map_err(NexusError::from)?;
		if res.rows_affected == 0 {
			return Err(NexusError::NotFound(format!("no such tuple: {tuple:?}")));
		}
		Ok(())
	}

	/// Delete every tuple naming `object` as its object — used when an
	/// object is removed and its relationships should not linger.
	pub async fn delete_object_tuples(&self, tenant_id: &str, object: &ModelEntity) -> NexusResult<u64> {
		use entities::tuple::Column;
		let res = entities::Tuple::delete_many()
			.filter(Column::TenantId.eq(tenant_id))
			.filter(Column::ObjectType.eq(object.kind.clone()))
			.filter(Column::ObjectId.eq(object.id.clone()))
			.exec(&self.conn)
			.await
			.map_err(NexusError::from)?;
		Ok(res.rows_affected)
	}

	pub async fn list_tuples(&self, filter: &TupleFilter) -> NexusResult<Vec<Tuple>> {
		use entities::tuple::Column;
		let mut query = entities::Tuple::find();
		if let Some(tenant_id) = &filter.tenant_id {
			query = query.filter(Column::TenantId.eq(tenant_id.clone()));
		}
		if let Some(object) = &filter.object {
			query = query
				.filter(Column::ObjectType.eq(object.kind.clone()))
				.filter(Column::ObjectId.eq(object.id.clone()));
		} else if let Some(object_type) = &filter.object_type {
			query = query.filter(Column::ObjectType.eq(object_type.clone()));
		}
		if let Some(relation) = &filter.relation {
			query = query.filter(Column::Relation.eq(relation.clone()));
		}
		if let Some(subject) = &filter.subject {
			let (subject_type, subject_id, subject_relation) = split_subject(subject);
			query = query
				.filter(Column::SubjectType.eq(subject_type))
				.filter(Column::SubjectId.eq(subject_id))
				.filter(Column::SubjectRelation.eq(subject_relation));
		}
		let rows = query.all(&self.conn).await.map_err(NexusError::from)?;
		Ok(rows.into_iter().map(row_to_tuple).collect())
	}

	// ---- namespace configs -----------------------------------------------

	pub async fn get_namespace_config(&self, object_type: &str, tenant_id: &str) -> NexusResult<Option<String>> {
		use entities::namespace_config::Column;
		if let Some(row) = entities::NamespaceConfig::find()
			.filter(Column::ObjectType.eq(object_type))
			.filter(Column::TenantId.eq(tenant_id))
			.one(&self.conn)
			.await
			.map_err(NexusError::from)?
		{
			return Ok(Some(row.config_json));
		}
		if tenant_id != GLOBAL_TENANT {
			return Box::pin(self.get_namespace_config(object_type, GLOBAL_TENANT)).await;
		}
		Ok(None)
	}

	pub async fn put_namespace_config(&self, object_type: &str, tenant_id: &str, config_json: String) -> NexusResult<()> {
		use entities::namespace_config::{ActiveModel, Column};
		let existing = entities::NamespaceConfig::find()
			.filter(Column::ObjectType.eq(object_type))
			.filter(Column::TenantId.eq(tenant_id))
			.one(&self.conn)
			.await
			.map_err(NexusError::from)?;
		let am = ActiveModel {
			object_type: Set(object_type.to_string()),
			tenant_id: Set(tenant_id.to_string()),
			config_json: Set(config_json),
			updated_at: Set(Utc::now()),
		};
		match existing {
			Some(_) => {
				am.update(&self.conn).await.map_err(NexusError::from)?;
			}
			None => {
				am.insert(&self.conn).await.map_err(NexusError::from)?;
			}
		}
		Ok(())
	}

	// ---- records ----------------------------------------------------------

	pub async fn get_record(&self, tenant_id: &str, path: &str) -> NexusResult<Option<ModelRecord>> {
		use entities::record::Column;
		let row = entities::Record::find()
			.filter(Column::TenantId.eq(tenant_id))
			.filter(Column::Path.eq(path))
			.one(&self.conn)
			.await
			.map_err(NexusError::from)?;
		Ok(row.map(row_to_record).transpose()?)
	}

	/// Every record (file or directory) under `path_prefix`, including the
	/// prefix itself if it names a record. Used by `glob`/`grep`, which
	/// operate recursively rather than one directory level at a time.
	pub async fn list_records_under(&self, tenant_id: &str, path_prefix: &str) -> NexusResult<Vec<ModelRecord>> {
		use entities::record::Column;
		let rows = entities::Record::find()
			.filter(Column::TenantId.eq(tenant_id))
			.filter(Column::Path.starts_with(path_prefix))
			.order_by_asc(Column::Path)
			.all(&self.conn)
			.await
			.map_err(NexusError::from)?;
		rows.into_iter().map(row_to_record).collect()
	}

	pub async fn list_children(&self, tenant_id: &str, parent_path: &str) -> NexusResult<Vec<ModelRecord>> {
		use entities::record::Column;
		let rows = entities::Record::find()
			.filter(Column::TenantId.eq(tenant_id))
			.filter(Column::ParentPath.eq(parent_path))
			.order_by_asc(Column::Path)
			.all(&self.conn)
			.await
			.map_err(NexusError::from)?;
		rows.into_iter().map(row_to_record).collect()
	}

	/// Insert a new record and its hierarchy-parent tuple in one
	/// transaction, so the tuple is never visible before the row (or vice
	/// versa) — the documented race this fixes (spec.md §9).
	pub async fn insert_record_with_parent_tuple(
		&self,
		record: &ModelRecord,
		parent_tuple: Option<&Tuple>,
	) -> NexusResult<()> {
		let txn = self.conn.begin().await.map_err(NexusError::from)?;
		let am = record_to_active_model(record);
		am.insert(&txn).await.map_err(|e| match e {
			DbErr::RecordNotInserted => NexusError::AlreadyExists(format!("record already exists: {}", record.path)),
			other => map_db_err(other, "record already exists"),
		})?;
		if let Some(tuple) = parent_tuple {
			let (subject_type, subject_id, subject_relation) = split_subject(&tuple.subject);
			entities::tuple::ActiveModel {
				id: NotSet,
				tenant_id: Set(tuple.tenant_id.clone()),
				subject_type: Set(subject_type),
				subject_id: Set(subject_id),
				subject_relation: Set(subject_relation),
				relation: Set(tuple.relation.clone()),
				object_type: Set(tuple.object.kind.clone()),
				object_id: Set(tuple.object.id.clone()),
				created_at: Set(tuple.created_at),
				expires_at: Set(tuple.expires_at),
			}
			.insert(&txn)
			.await
			.map_err(NexusError::from)?;
		}
		txn.commit().await.map_err(NexusError::from)?;
		Ok(())
	}

	/// Replace a record's content, failing with `Conflict` if `expected_version`
	/// does not match the stored version (optimistic concurrency, spec.md §3).
	pub async fn update_record_content(
		&self,
		tenant_id: &str,
		path: &str,
		expected_version: u64,
		content_hash: String,
		size: u64,
	) -> NexusResult<ModelRecord> {
		use entities::record::Column;
		let txn = self.conn.begin().await.map_err(NexusError::from)?;
		let row = entities::Record::find()
			.filter(Column::TenantId.eq(tenant_id))
			.filter(Column::Path.eq(path))
			.one(&txn)
			.await
			.map_err(NexusError::from)?
			.ok_or_else(|| NexusError::NotFound(format!("no such record: {path}")))?;

		if row.version as u64 != expected_version {
			return Err(NexusError::Conflict(format!(
				"record {path} is at version {} but caller expected {expected_version}",
				row.version
			)));
		}

		let now = Utc::now();
		let mut am: entities::record::ActiveModel = row.into();
		am.content_hash = Set(Some(content_hash.clone()));
		am.etag = Set(content_hash);
		am.size = Set(size as i64);
		am.updated_at = Set(now);
		am.version = Set(expected_version as i64 + 1);
		let updated = am.update(&txn).await.map_err(NexusError::from)?;
		txn.commit().await.map_err(NexusError::from)?;
		row_to_record(updated)
	}

	pub async fn delete_record(&self, tenant_id: &str, path: &str) -> NexusResult<ModelRecord> {
		use entities::record::Column;
		let row = entities::Record::find()
			.filter(Column::TenantId.eq(tenant_id))
			.filter(Column::Path.eq(path))
			.one(&self.conn)
			.await
			.map_err(NexusError::from)?
			.ok_or_else(|| NexusError::NotFound(format!("no such record: {path}")))?;
		let record = row_to_record(row.clone())?;
		entities::Record::delete_by_id(row.id)
			.exec(&self.conn)
			.await
			.map_err(NexusError::from)?;
		Ok(record)
	}

	// ---- content ------------------------------------------------------------

	pub async fn get_content(&self, content_hash: &str) -> NexusResult<Option<ContentRow>> {
		let row = entities::Content::find_by_id(content_hash.to_string())
			.one(&self.conn)
			.await
			.map_err(NexusError::from)?;
		Ok(row.map(|r| ContentRow {
			content_hash: r.content_hash,
			size: r.size as u64,
			ref_count: r.ref_count,
			backend_locator: r.backend_locator,
		}))
	}

	/// Insert a content row if absent, otherwise bump its ref count.
	/// Returns the row's ref count after this call.
	pub async fn acquire_content_ref(&self, content_hash: &str, size: u64, backend_locator: &str) -> NexusResult<i64> {
		let txn = self.conn.begin().await.map_err(NexusError::from)?;
		let existing = entities::Content::find_by_id(content_hash.to_string())
			.one(&txn)
			.await
			.map_err(NexusError::from)?;
		let ref_count = match existing {
			Some(row) => {
				let new_count = row.ref_count + 1;
				let mut am: entities::content::ActiveModel = row.into();
				am.ref_count = Set(new_count);
				am.update(&txn).await.map_err(NexusError::from)?;
				new_count
			}
			None => {
				entities::content::ActiveModel {
					content_hash: Set(content_hash.to_string()),
					size: Set(size as i64),
					ref_count: Set(1),
					backend_locator: Set(backend_locator.to_string()),
				}
				.insert(&txn)
				.await
				.map_err(NexusError::from)?;
				1
			}
		};
		txn.commit().await.map_err(NexusError::from)?;
		Ok(ref_count)
	}

	/// Decrement a content row's ref count; returns `Some(new_count)`, or
	/// `None` if the row didn't exist. Callers delete the underlying bytes
	/// once `new_count` reaches zero, then remove the row.
	pub async fn release_content_ref(&self, content_hash: &str) -> NexusResult<Option<i64>> {
		let txn = self.conn.begin().await.map_err(NexusError::from)?;
		let existing = entities::Content::find_by_id(content_hash.to_string())
			.one(&txn)
			.await
			.map_err(NexusError::from)?;
		let Some(row) = existing else {
			return Ok(None);
		};
		let new_count = (row.ref_count - 1).max(0);
		if new_count == 0 {
			entities::Content::delete_by_id(content_hash.to_string())
				.exec(&txn)
				.await
				.map_err(NexusError::from)?;
		} else {
			let mut am: entities::content::ActiveModel = row.into();
			am.ref_count = Set(new_count);
			am.update(&txn).await.map_err(NexusError::from)?;
		}
		txn.commit().await.map_err(NexusError::from)?;
		Ok(Some(new_count))
	}

	// ---- api keys -----------------------------------------------------------

	pub async fn insert_api_key(&self, am: entities::api_key::ActiveModel) -> NexusResult<()> {
		am.insert(&self.conn).await.map_err(NexusError::from)?;
		Ok(())
	}

	pub async fn find_api_key_by_prefix(&self, prefix: &str) -> NexusResult<Option<entities::api_key::Model>> {
		use entities::api_key::Column;
		entities::ApiKey::find()
			.filter(Column::Prefix.eq(prefix))
			.one(&self.conn)
			.await
			.map_err(NexusError::from)
	}

	// ---- users --------------------------------------------------------------

	pub async fn insert_user(&self, am: entities::user::ActiveModel) -> NexusResult<()> {
		am.insert(&self.conn).await.map_err(|e| match e {
			DbErr::RecordNotInserted => NexusError::AlreadyExists("user already exists".to_string()),
			other => map_db_err(other, "user already exists"),
		})?;
		Ok(())
	}

	pub async fn get_user(&self, tenant_id: &str, user_id: &str) -> NexusResult<Option<entities::user::Model>> {
		use entities::user::Column;
		entities::User::find()
			.filter(Column::TenantId.eq(tenant_id))
			.filter(Column::UserId.eq(user_id))
			.one(&self.conn)
			.await
			.map_err(NexusError::from)
	}

	// ---- audit log ----------------------------------------------------------

	pub async fn append_audit_log(&self, am: entities::audit_log::ActiveModel) -> NexusResult<()> {
		am.insert(&self.conn).await.map_err(NexusError::from)?;
		Ok(())
	}

	pub async fn list_audit_log(&self, tenant_id: &str, limit: u64) -> NexusResult<Vec<entities::audit_log::Model>> {
		use entities::audit_log::Column;
		entities::AuditLog::find()
			.filter(Column::TenantId.eq(tenant_id))
			.order_by_desc(Column::CreatedAt)
			.limit(limit)
			.all(&self.conn)
			.await
			.map_err(NexusError::from)
	}

	/// Append one audit row for a mutating call (spec.md §4.3, §9
	/// "append-only trail"). Convenience wrapper over [`Self::append_audit_log`]
	/// that builds the `ActiveModel` from caller/object entities.
	pub async fn record_audit(
		&self,
		tenant_id: &str,
		actor: &ModelEntity,
		action: &str,
		object: Option<&ModelEntity>,
		payload: serde_json::Value,
	) -> NexusResult<()> {
		let am = entities::audit_log::ActiveModel {
			id: NotSet,
			tenant_id: Set(tenant_id.to_string()),
			actor_type: Set(actor.kind.clone()),
			actor_id: Set(actor.id.clone()),
			action: Set(action.to_string()),
			object_type: Set(object.map(|o| o.kind.clone())),
			object_id: Set(object.map(|o| o.id.clone())),
			payload: Set(payload),
			created_at: Set(Utc::now()),
		};
		self.append_audit_log(am).await
	}
}

fn map_db_err(err: DbErr, conflict_hint: &str) -> NexusError {
	let msg = err.to_string();
	if msg.contains("UNIQUE constraint") || msg.contains("duplicate key") {
		NexusError::AlreadyExists(conflict_hint.to_string())
	} else {
		NexusError::Unavailable(msg)
	}
}

/// The sentinel stored for `subject_relation` when the subject is a plain
/// entity rather than a userset — a non-null value so the row still
/// participates in the fact-uniqueness index (`NULL` is distinct from
/// `NULL` in a UNIQUE index in both SQLite and Postgres).
const NO_SUBJECT_RELATION: &str = "";

fn split_subject(subject: &Subject) -> (String, String, String) {
	match subject {
		Subject::Entity(e) => (e.kind.clone(), e.id.clone(), NO_SUBJECT_RELATION.to_string()),
		Subject::Userset { entity, relation } => (entity.kind.clone(), entity.id.clone(), relation.clone()),
	}
}

fn row_to_tuple(row: entities::tuple::Model) -> Tuple {
	let subject = if row.subject_relation.is_empty() {
		Subject::Entity(ModelEntity::new(row.subject_type, row.subject_id))
	} else {
		Subject::Userset {
			entity: ModelEntity::new(row.subject_type, row.subject_id),
			relation: row.subject_relation,
		}
	};
	Tuple {
		tuple_id: uuid::Uuid::new_v4(),
		tenant_id: row.tenant_id,
		subject,
		relation: row.relation,
		object: ModelEntity::new(row.object_type, row.object_id),
		created_at: row.created_at,
		expires_at: row.expires_at,
	}
}

fn row_to_record(row: entities::record::Model) -> NexusResult<ModelRecord> {
	let metadata = match row.metadata {
		serde_json::Value::Object(map) => map.into_iter().collect(),
		_ => Default::default(),
	};
	Ok(ModelRecord {
		path: row.path,
		parent_path: row.parent_path,
		tenant_id: row.tenant_id,
		kind: match row.kind {
			DbRecordKind::File => RecordKind::File,
			DbRecordKind::Directory => RecordKind::Directory,
		},
		content_hash: row.content_hash,
		size: row.size as u64,
		etag: row.etag,
		owner: ModelEntity::new(row.owner_type, row.owner_id),
		metadata,
		created_at: row.created_at,
		updated_at: row.updated_at,
		version: row.version as u64,
	})
}

fn record_to_active_model(record: &ModelRecord) -> entities::record::ActiveModel {
	entities::record::ActiveModel {
		id: NotSet,
		tenant_id: Set(record.tenant_id.clone()),
		path: Set(record.path.clone()),
		parent_path: Set(record.parent_path.clone()),
		kind: Set(match record.kind {
			RecordKind::File => DbRecordKind::File,
			RecordKind::Directory => DbRecordKind::Directory,
		}),
		content_hash: Set(record.content_hash.clone()),
		size: Set(record.size as i64),
		etag: Set(record.etag.clone()),
		owner_type: Set(record.owner.kind.clone()),
		owner_id: Set(record.owner.id.clone()),
		metadata: Set(serde_json::Value::Object(record.metadata.clone().into_iter().collect())),
		created_at: Set(record.created_at),
		updated_at: Set(record.updated_at),
		version: Set(record.version as i64),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::Entity as ModelEntity2;

	async fn test_store() -> MetadataStore {
		let store = MetadataStore::connect(StoreConfig {
			url: "sqlite::memory:".to_string(),
			role: WriterRole::Single,
			max_connections: 1,
		})
		.await
		.unwrap();
		store.migrate().await.unwrap();
		store
	}

	#[tokio::test]
	async fn multi_writer_sqlite_is_refused() {
		let err = MetadataStore::connect(StoreConfig {
			url: "sqlite::memory:".to_string(),
			role: WriterRole::Multi,
			max_connections: 1,
		})
		.await
		.unwrap_err();
		assert!(matches!(err, NexusError::FailedPrecondition(_)));
	}

	#[tokio::test]
	async fn insert_and_list_tuples_round_trip() {
		let store = test_store().await;
		let t = Tuple::new(
			"t1",
			Subject::Entity(ModelEntity2::user("bob")),
			"owner",
			ModelEntity2::file("/a"),
		);
		store.insert_tuple(&t).await.unwrap();
		let found = store
			.list_tuples(&TupleFilter {
				tenant_id: Some("t1".to_string()),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(found.len(), 1);
	}

	#[tokio::test]
	async fn duplicate_tuple_is_already_exists() {
		let store = test_store().await;
		let t = Tuple::new(
			"t1",
			Subject::Entity(ModelEntity2::user("bob")),
			"owner",
			ModelEntity2::file("/a"),
		);
		store.insert_tuple(&t).await.unwrap();
		let err = store.insert_tuple(&t).await.unwrap_err();
		assert!(matches!(err, NexusError::AlreadyExists(_)));
	}

	#[tokio::test]
	async fn stale_version_update_conflicts() {
		let store = test_store().await;
		let record = ModelRecord::new_file("/a.txt", "t1", "hash1", 10, ModelEntity2::user("bob"));
		store.insert_record_with_parent_tuple(&record, None).await.unwrap();

		store
			.update_record_content("t1", "/a.txt", 1, "hash2".to_string(), 20)
			.await
			.unwrap();

		let err = store
			.update_record_content("t1", "/a.txt", 1, "hash3".to_string(), 30)
			.await
			.unwrap_err();
		assert!(matches!(err, NexusError::Conflict(_)));
	}

	#[tokio::test]
	async fn content_ref_counting_deletes_row_at_zero() {
		let store = test_store().await;
		store.acquire_content_ref("hash1", 10, "aa/bb/hash1").await.unwrap();
		let count = store.acquire_content_ref("hash1", 10, "aa/bb/hash1").await.unwrap();
		assert_eq!(count, 2);
		store.release_content_ref("hash1").await.unwrap();
		let remaining = store.release_content_ref("hash1").await.unwrap();
		assert_eq!(remaining, Some(0));
		assert!(store.get_content("hash1").await.unwrap().is_none());
	}
}
