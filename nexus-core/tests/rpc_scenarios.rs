//! End-to-end coverage over the real RPC pipeline: authenticated dispatch
//! through `ApiDispatcher<MetadataStore>`, a real sqlite-backed metadata
//! store, and a real `LocalBackend`. Unlike the in-crate module tests (which
//! mostly exercise one layer at a time against a `FakeTupleStore`), these
//! drive the whole stack the way a client actually would: RPC method names
//! and JSON params in, JSON results out.

use std::collections::HashMap;
use std::sync::Arc;

use nexus_core::api::{ApiDispatcher, RequestMetadata};
use nexus_core::backend::{Backend, LocalBackend};
use nexus_core::config::NexusConfig;
use nexus_core::db::{MetadataStore, StoreConfig};
use nexus_core::model::{hierarchical_namespace, Entity, IdentitySubject, OperationContext};
use nexus_core::rebac::{build_engine, DecisionCache};
use nexus_core::router::Router;
use serde_json::json;

async fn dispatcher(root: &std::path::Path) -> ApiDispatcher<MetadataStore> {
	let store = MetadataStore::connect(StoreConfig::sqlite(root.join("nexus.db"))).await.unwrap();
	store.migrate().await.unwrap();
	store
		.put_namespace_config("file", "*", serde_json::to_string(&hierarchical_namespace("file")).unwrap())
		.await
		.unwrap();
	let store = Arc::new(store);

	let router = Arc::new(Router::new());
	let mut backends: HashMap<String, Arc<dyn Backend>> = HashMap::new();
	backends.insert("local".to_string(), Arc::new(LocalBackend::new(root.join("blobs"))));

	let decisions = Arc::new(DecisionCache::new(1000, 1000, None));
	let engine = Arc::new(build_engine(store.clone(), decisions));

	let fs = Arc::new(nexus_core::fs::FilesystemCore::new(store.clone(), router.clone(), backends.clone(), engine.clone()));
	let config = NexusConfig::default();
	ApiDispatcher::new(fs, engine, router, store, backends, &config)
}

fn ctx(user: &str, admin: bool) -> OperationContext {
	let mut subject = IdentitySubject::new(Entity::user(user), "t1");
	if admin {
		subject = subject.admin();
	}
	RequestMetadata::in_process().into_context(subject, 30_000)
}

/// S1 — user workspace: a test must fail if any intermediate permission
/// check denies while `rebac_check(user:bob, write, file:/bob-ws)` is true.
#[tokio::test]
async fn s1_user_workspace_end_to_end() {
	let dir = tempfile::tempdir().unwrap();
	let d = dispatcher(dir.path()).await;
	let admin = ctx("root", true);
	let bob = ctx("bob", false);

	d.dispatch(&admin, "register_workspace", json!({ "prefix": "/bob-ws" })).await.unwrap();
	d.dispatch(&admin, "rebac_create", json!({ "subject": "user:bob", "relation": "direct_owner", "object": "file:/bob-ws" }))
		.await
		.unwrap();

	let check = d
		.dispatch(&bob, "rebac_check", json!({ "subject": "user:bob", "permission": "write", "object": "file:/bob-ws" }))
		.await
		.unwrap();
	assert_eq!(check["allowed"], true);

	d.dispatch(&bob, "write", json!({ "path": "/bob-ws/hello.txt", "content": "hi" })).await.unwrap();
	let read = d.dispatch(&bob, "read", json!({ "path": "/bob-ws/hello.txt" })).await.unwrap();
	let bytes = nexus_core::api::rpc::decode_bytes(&read["content"]).unwrap();
	assert_eq!(bytes, b"hi");
}

/// S2 — dedup: two paths writing identical content share one content row,
/// whose ref count tracks live references and whose blob disappears once
/// the last reference is deleted.
#[tokio::test]
async fn s2_dedup_tracks_ref_count_to_zero() {
	let dir = tempfile::tempdir().unwrap();
	let d = dispatcher(dir.path()).await;
	let admin = ctx("root", true);

	d.dispatch(&admin, "register_workspace", json!({ "prefix": "/ws" })).await.unwrap();
	d.dispatch(&admin, "rebac_create", json!({ "subject": "user:root", "relation": "direct_owner", "object": "file:/ws" }))
		.await
		.unwrap();

	d.dispatch(&admin, "write", json!({ "path": "/ws/a", "content": "same-bytes" })).await.unwrap();
	d.dispatch(&admin, "write", json!({ "path": "/ws/b", "content": "same-bytes" })).await.unwrap();

	let content_hash = nexus_core::backend::hash_content(b"same-bytes");
	let row = d.store.get_content(&content_hash).await.unwrap().unwrap();
	assert_eq!(row.ref_count, 2);

	d.dispatch(&admin, "delete", json!({ "path": "/ws/a" })).await.unwrap();
	let row = d.store.get_content(&content_hash).await.unwrap().unwrap();
	assert_eq!(row.ref_count, 1);

	d.dispatch(&admin, "delete", json!({ "path": "/ws/b" })).await.unwrap();
	assert!(d.store.get_content(&content_hash).await.unwrap().is_none());
}

/// S3 — namespace rewrite: owning a directory implies `write` on a child
/// path reachable only through a parent tuple, never granted directly.
#[tokio::test]
async fn s3_directory_ownership_propagates_to_children() {
	let dir = tempfile::tempdir().unwrap();
	let d = dispatcher(dir.path()).await;
	let admin = ctx("root", true);
	let alice = ctx("alice", false);

	d.dispatch(&admin, "register_workspace", json!({ "prefix": "/d" })).await.unwrap();
	d.dispatch(&admin, "rebac_create", json!({ "subject": "user:alice", "relation": "direct_owner", "object": "file:/d" }))
		.await
		.unwrap();

	d.dispatch(&alice, "write", json!({ "path": "/d/child.txt", "content": "nested" })).await.unwrap();

	let check = d
		.dispatch(&alice, "rebac_check", json!({ "subject": "user:alice", "permission": "write", "object": "file:/d/child.txt" }))
		.await
		.unwrap();
	assert_eq!(check["allowed"], true);
}

/// S5 — rollback on timeout: a backend that stalls past the caller's
/// deadline must fail the write with `Timeout`, leaving no record, no
/// tuple, and no ref-count change behind.
#[tokio::test]
async fn s5_timeout_leaves_no_partial_state() {
	struct StallingBackend(LocalBackend);

	#[async_trait::async_trait]
	impl Backend for StallingBackend {
		async fn write_content(&self, _content_hash: &str, _bytes: &[u8]) -> nexus_core::NexusResult<String> {
			tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
			unreachable!("deadline should have cut this off first")
		}
		async fn read_content(&self, locator: &str) -> nexus_core::NexusResult<Vec<u8>> {
			self.0.read_content(locator).await
		}
		async fn delete_content(&self, locator: &str) -> nexus_core::NexusResult<()> {
			self.0.delete_content(locator).await
		}
		async fn content_exists(&self, locator: &str) -> nexus_core::NexusResult<bool> {
			self.0.content_exists(locator).await
		}
		async fn get_content_size(&self, locator: &str) -> nexus_core::NexusResult<u64> {
			self.0.get_content_size(locator).await
		}
		async fn mkdir(&self, path: &str) -> nexus_core::NexusResult<()> {
			self.0.mkdir(path).await
		}
		async fn rmdir(&self, path: &str) -> nexus_core::NexusResult<()> {
			self.0.rmdir(path).await
		}
		async fn is_directory(&self, path: &str) -> nexus_core::NexusResult<bool> {
			self.0.is_directory(path).await
		}
		async fn list_dir(&self, path: &str) -> nexus_core::NexusResult<Vec<String>> {
			self.0.list_dir(path).await
		}
	}

	let dir = tempfile::tempdir().unwrap();
	let d = dispatcher(dir.path()).await;
	let admin = ctx("root", true);

	d.dispatch(&admin, "register_workspace", json!({ "prefix": "/slow" })).await.unwrap();
	d.dispatch(&admin, "rebac_create", json!({ "subject": "user:root", "relation": "direct_owner", "object": "file:/slow" }))
		.await
		.unwrap();

	let fast_ctx = admin.clone();
	let mut timed_out_ctx = fast_ctx.clone();
	timed_out_ctx.deadline = Some(chrono::Utc::now() + chrono::Duration::milliseconds(20));

	let mut backends: HashMap<String, Arc<dyn Backend>> = HashMap::new();
	backends.insert("local".to_string(), Arc::new(StallingBackend(LocalBackend::new(dir.path().join("blobs")))));
	let fs = nexus_core::fs::FilesystemCore::new(d.store.clone(), d.router.clone(), backends, d.engine.clone());

	let err = fs.write(&timed_out_ctx, "/slow/x", b"payload").await.unwrap_err();
	assert!(matches!(err, nexus_core::NexusError::Timeout));
	assert!(d.store.get_record("t1", "/slow/x").await.unwrap().is_none());
}

/// S6 — listing confidentiality: a caller without `read` on a path never
/// sees it in a listing, even though the metadata store holds it.
#[tokio::test]
async fn s6_listing_hides_unauthorized_paths() {
	let dir = tempfile::tempdir().unwrap();
	let d = dispatcher(dir.path()).await;
	let admin = ctx("root", true);
	let bob = ctx("bob", false);

	d.dispatch(&admin, "register_workspace", json!({ "prefix": "/bob-ws" })).await.unwrap();
	d.dispatch(&admin, "rebac_create", json!({ "subject": "user:bob", "relation": "direct_owner", "object": "file:/bob-ws" }))
		.await
		.unwrap();
	d.dispatch(&admin, "register_workspace", json!({ "prefix": "/other" })).await.unwrap();
	d.dispatch(&admin, "rebac_create", json!({ "subject": "user:root", "relation": "direct_owner", "object": "file:/other" }))
		.await
		.unwrap();

	let listing = d.dispatch(&bob, "list", json!({ "path": "/" })).await.unwrap();
	let paths: Vec<String> = listing.as_array().unwrap().iter().map(|r| r["path"].as_str().unwrap().to_string()).collect();
	assert!(paths.iter().any(|p| p.starts_with("/bob-ws")));
	assert!(!paths.iter().any(|p| p.starts_with("/other")));
}

/// Property 1 — enforcement parity: `rebac_check` and the filesystem's own
/// authorization decision for the same (subject, permission, object) never
/// disagree.
#[tokio::test]
async fn enforcement_parity_between_rebac_check_and_write() {
	let dir = tempfile::tempdir().unwrap();
	let d = dispatcher(dir.path()).await;
	let admin = ctx("root", true);
	let mallory = ctx("mallory", false);

	d.dispatch(&admin, "register_workspace", json!({ "prefix": "/locked" })).await.unwrap();
	d.dispatch(&admin, "rebac_create", json!({ "subject": "user:root", "relation": "direct_owner", "object": "file:/locked" }))
		.await
		.unwrap();

	let check = d
		.dispatch(&mallory, "rebac_check", json!({ "subject": "user:mallory", "permission": "write", "object": "file:/locked" }))
		.await
		.unwrap();
	assert_eq!(check["allowed"], false);

	let err = d.dispatch(&mallory, "write", json!({ "path": "/locked/x", "content": "nope" })).await.unwrap_err();
	assert!(matches!(err, nexus_core::api::ApiError::Core(nexus_core::NexusError::PermissionDenied { .. })));
}
