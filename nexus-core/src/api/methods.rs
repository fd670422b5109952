//! Handlers for the canonical RPC methods (spec.md §6), one function per
//! method, each parsing its own params and calling straight into
//! `FilesystemCore`/`Engine`/`Router`/`MetadataStore`. [`super::dispatcher::ApiDispatcher`]
//! owns the method-name-to-handler table.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::entities;
use crate::fs::{hierarchy, MkdirOptions};
use crate::model::{Entity, OperationContext, Subject, Tuple, TupleFilter};
use crate::rebac::TupleStore;

use super::auth;
use super::dispatcher::ApiDispatcher;
use super::error::{ApiError, ApiResult};
use super::rpc::{decode_bytes, encode_bytes};

fn parse_params<P: for<'de> Deserialize<'de>>(params: Value) -> ApiResult<P> {
	serde_json::from_value(params).map_err(ApiError::from)
}

fn require_admin(ctx: &OperationContext) -> ApiResult<()> {
	if ctx.subject.is_admin {
		Ok(())
	} else {
		Err(ApiError::Core(crate::error::NexusError::PermissionDenied {
			subject: ctx.subject.entity.to_string(),
			permission: "admin".to_string(),
			object: "tenant".to_string(),
		}))
	}
}

/// `write`'s `content` param accepts either a plain JSON string (taken as
/// UTF-8, the convenient path for text payloads) or a `{"__type__":"bytes",...}`
/// envelope for arbitrary binary data (spec.md §6 "Wire protocol").
fn decode_write_content(value: &Value) -> ApiResult<Vec<u8>> {
	if let Some(bytes) = decode_bytes(value) {
		return Ok(bytes);
	}
	if let Some(text) = value.as_str() {
		return Ok(text.as_bytes().to_vec());
	}
	Err(ApiError::InvalidParams("content must be a string or a bytes envelope".to_string()))
}

#[derive(Deserialize)]
struct PathParams {
	path: String,
}

#[derive(Deserialize)]
struct WriteParams {
	path: String,
	content: Value,
}

#[derive(Deserialize, Default)]
struct MkdirParams {
	path: String,
	#[serde(default)]
	exist_ok: bool,
}

#[derive(Deserialize)]
struct GlobParams {
	pattern: String,
}

#[derive(Deserialize)]
struct GrepParams {
	pattern: String,
	path_prefix: String,
}

pub async fn read<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: PathParams = parse_params(params)?;
	let (record, bytes) = d.fs.read(ctx, &p.path).await?;
	Ok(json!({ "record": record, "content": encode_bytes(&bytes) }))
}

pub async fn write<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: WriteParams = parse_params(params)?;
	let bytes = decode_write_content(&p.content)?;
	let record = d.fs.write(ctx, &p.path, &bytes).await?;
	Ok(serde_json::to_value(record)?)
}

pub async fn mkdir<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: MkdirParams = parse_params(params)?;
	let record = d.fs.mkdir(ctx, &p.path, MkdirOptions { exist_ok: p.exist_ok }).await?;
	Ok(serde_json::to_value(record)?)
}

pub async fn delete<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: PathParams = parse_params(params)?;
	d.fs.delete(ctx, &p.path).await?;
	Ok(Value::Null)
}

pub async fn list<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: PathParams = parse_params(params)?;
	let records = d.fs.list(ctx, &p.path).await?;
	Ok(serde_json::to_value(records)?)
}

pub async fn glob<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: GlobParams = parse_params(params)?;
	let records = d.fs.glob(ctx, &p.pattern).await?;
	Ok(serde_json::to_value(records)?)
}

pub async fn grep<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: GrepParams = parse_params(params)?;
	let matches = d.fs.grep(ctx, &p.pattern, &p.path_prefix).await?;
	Ok(serde_json::to_value(
		matches.into_iter().map(|m| json!({ "path": m.path, "line_number": m.line_number, "line": m.line })).collect::<Vec<_>>(),
	)?)
}

pub async fn file_info<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: PathParams = parse_params(params)?;
	let record = d.fs.file_info(ctx, &p.path).await?;
	Ok(serde_json::to_value(record)?)
}

#[derive(Deserialize)]
struct RebacCreateParams {
	subject: String,
	relation: String,
	object: String,
	#[serde(default)]
	expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn rebac_create<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	require_admin(ctx)?;
	let p: RebacCreateParams = parse_params(params)?;
	let subject: Subject = p.subject.parse().map_err(crate::error::NexusError::from)?;
	let object: Entity = p.object.parse().map_err(crate::error::NexusError::from)?;
	let mut tuple = Tuple::new(ctx.tenant_id(), subject, p.relation, object);
	if let Some(expires_at) = p.expires_at {
		tuple = tuple.with_expiry(expires_at);
	}
	let object_entity = tuple.object.clone();
	let audit_payload = json!({ "subject": tuple.subject.to_string(), "relation": tuple.relation.clone(), "object": object_entity.to_string() });
	d.engine.create_tuple(ctx, tuple).await?;
	d.store.record_audit(ctx.tenant_id(), &ctx.subject.entity, "rebac_create", Some(&object_entity), audit_payload).await?;
	Ok(Value::Null)
}

#[derive(Deserialize)]
struct RebacDeleteParams {
	subject: String,
	relation: String,
	object: String,
}

pub async fn rebac_delete<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	require_admin(ctx)?;
	let p: RebacDeleteParams = parse_params(params)?;
	let subject: Subject = p.subject.parse().map_err(crate::error::NexusError::from)?;
	let object: Entity = p.object.parse().map_err(crate::error::NexusError::from)?;
	let tuple = Tuple::new(ctx.tenant_id(), subject, p.relation, object);
	let object_entity = tuple.object.clone();
	let audit_payload = json!({ "subject": tuple.subject.to_string(), "relation": tuple.relation.clone(), "object": object_entity.to_string() });
	d.engine.delete_tuple(ctx, tuple).await?;
	d.store.record_audit(ctx.tenant_id(), &ctx.subject.entity, "rebac_delete", Some(&object_entity), audit_payload).await?;
	Ok(Value::Null)
}

#[derive(Deserialize)]
struct RebacCheckParams {
	subject: String,
	permission: String,
	object: String,
}

#[derive(Serialize)]
struct RebacCheckResult {
	allowed: bool,
}

pub async fn rebac_check<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: RebacCheckParams = parse_params(params)?;
	let subject: Entity = p.subject.parse().map_err(crate::error::NexusError::from)?;
	let object: Entity = p.object.parse().map_err(crate::error::NexusError::from)?;
	let allowed = d.engine.check(ctx, &subject, &p.permission, &object).await?;
	Ok(serde_json::to_value(RebacCheckResult { allowed })?)
}

#[derive(Deserialize, Default)]
struct RebacListTuplesParams {
	subject: Option<String>,
	relation: Option<String>,
	object: Option<String>,
	object_type: Option<String>,
}

pub async fn rebac_list_tuples<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: RebacListTuplesParams = parse_params(params)?;
	let subject = p.subject.map(|s| s.parse::<Subject>()).transpose().map_err(crate::error::NexusError::from)?;
	let object = p.object.map(|o| o.parse::<Entity>()).transpose().map_err(crate::error::NexusError::from)?;
	let filter = TupleFilter {
		tenant_id: Some(ctx.tenant_id().to_string()),
		subject,
		relation: p.relation,
		object,
		object_type: p.object_type,
	};
	let tuples = d.engine.list_tuples(&filter).await?;
	Ok(serde_json::to_value(tuples)?)
}

pub async fn rebac_explain<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	let p: RebacCheckParams = parse_params(params)?;
	let subject: Entity = p.subject.parse().map_err(crate::error::NexusError::from)?;
	let object: Entity = p.object.parse().map_err(crate::error::NexusError::from)?;
	let result = d.engine.explain(ctx, &subject, &p.permission, &object).await?;
	Ok(serde_json::to_value(result)?)
}

#[derive(Deserialize)]
struct AdminCreateKeyParams {
	subject_type: String,
	subject_id: String,
	#[serde(default)]
	scopes: Vec<String>,
}

#[derive(Serialize)]
struct AdminCreateKeyResult {
	api_key: String,
}

pub async fn admin_create_key<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	require_admin(ctx)?;
	let p: AdminCreateKeyParams = parse_params(params)?;
	let subject_entity = Entity::new(p.subject_type.clone(), p.subject_id.clone());
	let (raw_key, am) = auth::issue_api_key(d.jwt_secret.as_bytes(), ctx.tenant_id(), &p.subject_type, &p.subject_id, p.scopes);
	d.store.insert_api_key(am).await?;
	d.store
		.record_audit(ctx.tenant_id(), &ctx.subject.entity, "admin_create_key", Some(&subject_entity), json!({}))
		.await?;
	Ok(serde_json::to_value(AdminCreateKeyResult { api_key: raw_key })?)
}

#[derive(Deserialize)]
struct RegisterWorkspaceParams {
	prefix: String,
}

/// Bootstraps a brand-new workspace: a mount covering `prefix`, and the root
/// directory record for it. No permission check runs here — there are no
/// tuples yet to check against — which is why this method is admin-only;
/// the caller is expected to grant ownership with a follow-up `rebac_create`
/// (spec.md §8 scenario S1).
pub async fn register_workspace<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	require_admin(ctx)?;
	let p: RegisterWorkspaceParams = parse_params(params)?;
	d.router.add_mount(ctx.tenant_id(), &p.prefix, &d.default_backend_name).await?;
	let record = crate::model::Record::new_directory(&p.prefix, ctx.tenant_id(), ctx.subject.entity.clone());
	d.store.insert_record_with_parent_tuple(&record, None).await?;
	Ok(serde_json::to_value(record)?)
}

#[derive(Deserialize)]
struct AddMountParams {
	prefix: String,
	backend: String,
}

pub async fn add_mount<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	require_admin(ctx)?;
	let p: AddMountParams = parse_params(params)?;
	let mount = d.router.add_mount(ctx.tenant_id(), &p.prefix, &p.backend).await?;
	Ok(serde_json::to_value(mount)?)
}

/// Snapshot of this tenant's mounts, filtered to prefixes the caller may
/// `read` (spec.md §4.1 "listing is filtered by caller permissions").
pub async fn list_mounts<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, _params: Value) -> ApiResult<Value> {
	let mounts = d.router.list_mounts(ctx.tenant_id()).await;
	let subject = ctx.subject.entity.clone();
	let checks: Vec<(Entity, String, Entity)> = mounts
		.iter()
		.map(|m| (subject.clone(), "read".to_string(), Entity::file(m.virtual_prefix.clone())))
		.collect();
	let decisions = d.engine.check_bulk(ctx, &checks).await?;
	let visible: Vec<_> = mounts.into_iter().zip(decisions).filter_map(|(m, allowed)| allowed.then_some(m)).collect();
	Ok(serde_json::to_value(visible)?)
}

#[derive(Deserialize)]
struct SyncMountParams {
	prefix: String,
}

#[derive(Serialize)]
struct SyncMountResult {
	records_scanned: usize,
	directories_synced: u64,
}

/// Reconciles backend directory markers and hierarchy tuples against the
/// metadata store's records under `prefix` — the bulk-maintenance operation
/// `ensure_parent_tuples_batch` exists for (spec.md §4.4 "Hierarchy
/// maintenance"), useful after a bulk import wrote records directly.
pub async fn sync_mount<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	require_admin(ctx)?;
	let p: SyncMountParams = parse_params(params)?;
	let resolution = d.router.resolve(ctx.tenant_id(), &p.prefix).await?;
	let backend = d.backend_for(&resolution.mount.backend_name)?;
	let records = d.store.list_records_under(ctx.tenant_id(), &p.prefix).await?;

	let paths: Vec<String> = records.iter().map(|r| r.path.clone()).collect();
	d.engine.ensure_parent_tuples_batch(ctx, &hierarchy::parent_pairs(&paths)).await?;

	let mut directories_synced = 0u64;
	for record in &records {
		if record.is_directory() {
			backend.mkdir(&record.path).await?;
			directories_synced += 1;
		}
	}

	Ok(serde_json::to_value(SyncMountResult { records_scanned: records.len(), directories_synced })?)
}

#[derive(Deserialize)]
struct ProvisionUserParams {
	user_id: String,
	display_name: String,
	#[serde(default)]
	is_admin: bool,
}

pub async fn provision_user<T: TupleStore + 'static>(d: &ApiDispatcher<T>, ctx: &OperationContext, params: Value) -> ApiResult<Value> {
	require_admin(ctx)?;
	let p: ProvisionUserParams = parse_params(params)?;
	let user_entity = Entity::user(p.user_id.clone());
	let am = entities::user::ActiveModel {
		user_id: sea_orm::ActiveValue::Set(p.user_id),
		tenant_id: sea_orm::ActiveValue::Set(ctx.tenant_id().to_string()),
		display_name: sea_orm::ActiveValue::Set(p.display_name),
		is_admin: sea_orm::ActiveValue::Set(p.is_admin),
		created_at: sea_orm::ActiveValue::Set(chrono::Utc::now()),
	};
	d.store.insert_user(am).await?;
	d.store
		.record_audit(ctx.tenant_id(), &ctx.subject.entity, "provision_user", Some(&user_entity), json!({ "is_admin": p.is_admin }))
		.await?;
	Ok(Value::Null)
}
