//! The path-addressed filesystem core (spec.md §4.5): read/write/mkdir/
//! delete/list/glob/grep/file_info over the router, the metadata store, and
//! the ReBAC engine, generalized from the teacher's `file/indexer` +
//! `domain/file.rs` + `file/cas` modules.
//!
//! Every operation authorizes through [`crate::rebac::Engine::check`] — the
//! same code path `rebac_check` diagnostics use — so enforcement and
//! diagnostics can never observe a different tuple snapshot (spec.md §4.4
//! "enforcement parity").

pub mod hierarchy;

use std::collections::HashMap;
use std::sync::Arc;

use globset::Glob;
use regex::Regex;
use serde_json::json;

use crate::backend::{hash_content, Backend};
use crate::db::MetadataStore;
use crate::error::{NexusError, NexusResult};
use crate::model::{Entity, OperationContext, Record, Tuple};
use crate::rebac::{Engine, TupleStore};
use crate::router::Router;

/// A single line matched by [`FilesystemCore::grep`].
#[derive(Debug, Clone)]
pub struct GrepMatch {
	pub path: String,
	pub line_number: usize,
	pub line: String,
}

/// Whether `mkdir` of an already-existing directory is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct MkdirOptions {
	pub exist_ok: bool,
}

/// Composes the router, metadata store, and ReBAC engine into the filesystem
/// API surface. Generic over the tuple store backing the engine so tests can
/// run against [`crate::rebac::tuple_store::fake::FakeTupleStore`] without a
/// database, mirroring the engine's own test setup.
pub struct FilesystemCore<T: TupleStore + 'static> {
	store: Arc<MetadataStore>,
	router: Arc<Router>,
	backends: HashMap<String, Arc<dyn Backend>>,
	engine: Arc<Engine<T>>,
}

impl<T: TupleStore + 'static> FilesystemCore<T> {
	pub fn new(
		store: Arc<MetadataStore>,
		router: Arc<Router>,
		backends: HashMap<String, Arc<dyn Backend>>,
		engine: Arc<Engine<T>>,
	) -> Self {
		Self {
			store,
			router,
			backends,
			engine,
		}
	}

	fn backend_for(&self, name: &str) -> NexusResult<&Arc<dyn Backend>> {
		self.backends
			.get(name)
			.ok_or_else(|| NexusError::internal(format!("no backend registered for mount: {name}")))
	}

	async fn backend_for_path(&self, tenant_id: &str, path: &str) -> NexusResult<Arc<dyn Backend>> {
		let resolution = self.router.resolve(tenant_id, path).await?;
		Ok(self.backend_for(&resolution.mount.backend_name)?.clone())
	}

	/// Runs the backend write bounded by the request's remaining deadline, so
	/// a stalling backend fails with `Timeout` before any metadata mutation
	/// (ref-count acquire, record insert) ever runs (spec.md §5 "rollback on
	/// timeout": no partial record, no partial tuple, no ref-count drift).
	async fn write_content_with_deadline(
		&self,
		ctx: &OperationContext,
		backend: &Arc<dyn Backend>,
		content_hash: &str,
		bytes: &[u8],
	) -> NexusResult<String> {
		match ctx.remaining() {
			Some(budget) => tokio::time::timeout(budget, backend.write_content(content_hash, bytes))
				.await
				.map_err(|_| NexusError::Timeout)?,
			None => backend.write_content(content_hash, bytes).await,
		}
	}

	async fn require(&self, ctx: &OperationContext, permission: &str, object: &Entity) -> NexusResult<()> {
		let subject = ctx.subject.entity.clone();
		if self.engine.check(ctx, &subject, permission, object).await? {
			Ok(())
		} else {
			Err(NexusError::PermissionDenied {
				subject: subject.to_string(),
				permission: permission.to_string(),
				object: object.to_string(),
			})
		}
	}

	/// Read a file's full contents. Authorizes `read` on `path` itself.
	pub async fn read(&self, ctx: &OperationContext, path: &str) -> NexusResult<(Record, Vec<u8>)> {
		self.require(ctx, "read", &Entity::file(path)).await?;
		let record = self
			.store
			.get_record(ctx.tenant_id(), path)
			.await?
			.ok_or_else(|| NexusError::NotFound(format!("no such path: {path}")))?;
		if record.is_directory() {
			return Err(NexusError::InvalidArgument(format!("{path} is a directory")));
		}
		let content_hash = record
			.content_hash
			.as_ref()
			.ok_or_else(|| NexusError::internal(format!("file record {path} has no content hash")))?;
		let content = self
			.store
			.get_content(content_hash)
			.await?
			.ok_or_else(|| NexusError::internal(format!("content row missing for hash {content_hash}")))?;
		let backend = self.backend_for_path(ctx.tenant_id(), path).await?;
		let bytes = backend.read_content(&content.backend_locator).await?;
		Ok((record, bytes))
	}

	/// Read just the record, without fetching content bytes.
	pub async fn file_info(&self, ctx: &OperationContext, path: &str) -> NexusResult<Record> {
		self.require(ctx, "read", &Entity::file(path)).await?;
		self.store
			.get_record(ctx.tenant_id(), path)
			.await?
			.ok_or_else(|| NexusError::NotFound(format!("no such path: {path}")))
	}

	/// Write `bytes` to `path`, creating it if absent. New files authorize
	/// `write` on the *parent* directory; overwrites authorize `write` on
	/// the existing file (spec.md §4.5 "Permission check for new files").
	pub async fn write(&self, ctx: &OperationContext, path: &str, bytes: &[u8]) -> NexusResult<Record> {
		let tenant_id = ctx.tenant_id().to_string();
		let existing = self.store.get_record(&tenant_id, path).await?;

		match &existing {
			Some(record) if record.is_directory() => {
				return Err(NexusError::InvalidArgument(format!("{path} is a directory")));
			}
			Some(_) => self.require(ctx, "write", &Entity::file(path)).await?,
			None => {
				let parent = hierarchy::parent_path(path)
					.ok_or_else(|| NexusError::InvalidArgument("cannot write to the root path".to_string()))?;
				self.require(ctx, "write", &Entity::file(parent)).await?;
			}
		}

		let content_hash = hash_content(bytes);
		let backend = self.backend_for_path(&tenant_id, path).await?;
		let unchanged = existing.as_ref().and_then(|r| r.content_hash.as_ref()) == Some(&content_hash);
		let locator = self.write_content_with_deadline(ctx, &backend, &content_hash, bytes).await?;
		if !unchanged {
			// Overwriting a path with the bytes it already held keeps the same
			// single reference; acquiring another would leak a ref-count that
			// the matching release below never runs to balance.
			self.store.acquire_content_ref(&content_hash, bytes.len() as u64, &locator).await?;
		}

		let updated = match existing {
			Some(record) => {
				let old_hash = record.content_hash.clone();
				let updated = self
					.store
					.update_record_content(&tenant_id, path, record.version, content_hash.clone(), bytes.len() as u64)
					.await?;
				if let Some(old_hash) = old_hash {
					if old_hash != content_hash {
						self.release_content(&old_hash, &backend).await?;
					}
				}
				updated
			}
			None => {
				let subject = ctx.subject.entity.clone();
				let record = Record::new_file(path, &tenant_id, content_hash, bytes.len() as u64, subject);
				let parent_tuple = record
					.parent_path
					.as_ref()
					.map(|parent| Tuple::parent_tuple(&tenant_id, Entity::file(path), Entity::file(parent)));
				self.store.insert_record_with_parent_tuple(&record, parent_tuple.as_ref()).await?;
				self.engine_invalidate(ctx);
				record
			}
		};

		self.store
			.record_audit(&tenant_id, &ctx.subject.entity, "write", Some(&Entity::file(path)), json!({ "size": bytes.len() }))
			.await?;
		Ok(updated)
	}

	/// Create a directory. Authorizes `write` on the parent.
	pub async fn mkdir(&self, ctx: &OperationContext, path: &str, opts: MkdirOptions) -> NexusResult<Record> {
		let tenant_id = ctx.tenant_id().to_string();
		if let Some(existing) = self.store.get_record(&tenant_id, path).await? {
			if opts.exist_ok && existing.is_directory() {
				return Ok(existing);
			}
			return Err(NexusError::AlreadyExists(format!("path already exists: {path}")));
		}

		let parent = hierarchy::parent_path(path)
			.ok_or_else(|| NexusError::InvalidArgument("cannot mkdir the root path".to_string()))?;
		self.require(ctx, "write", &Entity::file(parent.clone())).await?;

		let subject = ctx.subject.entity.clone();
		let record = Record::new_directory(path, &tenant_id, subject);
		let parent_tuple = Tuple::parent_tuple(&tenant_id, Entity::file(path), Entity::file(parent));
		self.store.insert_record_with_parent_tuple(&record, Some(&parent_tuple)).await?;

		let backend = self.backend_for_path(&tenant_id, path).await?;
		backend.mkdir(path).await?;
		self.engine_invalidate(ctx);

		self.store
			.record_audit(&tenant_id, &ctx.subject.entity, "mkdir", Some(&Entity::file(path)), json!({}))
			.await?;
		Ok(record)
	}

	/// Delete a file or empty directory. Authorizes `write` on `path` itself.
	pub async fn delete(&self, ctx: &OperationContext, path: &str) -> NexusResult<()> {
		self.require(ctx, "write", &Entity::file(path)).await?;
		let tenant_id = ctx.tenant_id().to_string();
		let record = self.store.delete_record(&tenant_id, path).await?;

		if record.is_directory() {
			let backend = self.backend_for_path(&tenant_id, path).await?;
			backend.rmdir(path).await?;
		} else if let Some(content_hash) = &record.content_hash {
			let backend = self.backend_for_path(&tenant_id, path).await?;
			self.release_content(content_hash, &backend).await?;
		}

		self.engine.delete_object_tuples(ctx, &Entity::file(path)).await?;

		self.store
			.record_audit(&tenant_id, &ctx.subject.entity, "delete", Some(&Entity::file(path)), json!({}))
			.await?;
		Ok(())
	}

	/// Immediate children of `dir`, filtered to entries the caller may
	/// `read` (spec.md §4.5 "filter-before-return" — a listing must never
	/// reveal entries the caller lacks permission on).
	pub async fn list(&self, ctx: &OperationContext, dir: &str) -> NexusResult<Vec<Record>> {
		let records = self.store.list_children(ctx.tenant_id(), dir).await?;
		self.filter_readable(ctx, records).await
	}

	/// Every record whose path matches a glob `pattern`, filtered the same
	/// way as [`Self::list`]. Scans recursively from the pattern's literal
	/// prefix rather than the whole tenant when the pattern has one (e.g.
	/// `/projects/*.rs` scans under `/projects`).
	pub async fn glob(&self, ctx: &OperationContext, pattern: &str) -> NexusResult<Vec<Record>> {
		let matcher = Glob::new(pattern)
			.map_err(|e| NexusError::invalid_argument(format!("invalid glob pattern: {e}")))?
			.compile_matcher();
		let scan_root = literal_prefix(pattern);
		let candidates = self.store.list_records_under(ctx.tenant_id(), &scan_root).await?;
		let matched: Vec<Record> = candidates.into_iter().filter(|r| matcher.is_match(&r.path)).collect();
		self.filter_readable(ctx, matched).await
	}

	/// Line matches of a regex `pattern` across every readable file under
	/// `path_prefix`.
	pub async fn grep(&self, ctx: &OperationContext, pattern: &str, path_prefix: &str) -> NexusResult<Vec<GrepMatch>> {
		let re = Regex::new(pattern).map_err(|e| NexusError::invalid_argument(format!("invalid regex: {e}")))?;
		let candidates = self.store.list_records_under(ctx.tenant_id(), path_prefix).await?;
		let files: Vec<Record> = candidates.into_iter().filter(|r| !r.is_directory()).collect();
		let readable = self.filter_readable(ctx, files).await?;

		let mut matches = Vec::new();
		for record in readable {
			let (_, bytes) = self.read(ctx, &record.path).await?;
			let Ok(text) = std::str::from_utf8(&bytes) else {
				continue;
			};
			for (idx, line) in text.lines().enumerate() {
				if re.is_match(line) {
					matches.push(GrepMatch {
						path: record.path.clone(),
						line_number: idx + 1,
						line: line.to_string(),
					});
				}
			}
		}
		Ok(matches)
	}

	/// Bulk-filters `records` down to those the caller has `read` on,
	/// evaluating every check through the same `check_bulk` entry point
	/// enforcement uses.
	async fn filter_readable(&self, ctx: &OperationContext, records: Vec<Record>) -> NexusResult<Vec<Record>> {
		let subject = ctx.subject.entity.clone();
		let checks: Vec<(Entity, String, Entity)> = records
			.iter()
			.map(|r| (subject.clone(), "read".to_string(), Entity::file(r.path.clone())))
			.collect();
		let decisions = self.engine.check_bulk(ctx, &checks).await?;
		Ok(records
			.into_iter()
			.zip(decisions)
			.filter_map(|(record, allowed)| allowed.then_some(record))
			.collect())
	}

	/// Release a content reference, deleting the backend blob once the ref
	/// count reaches zero (spec.md §4.5 "Deduplication").
	async fn release_content(&self, content_hash: &str, backend: &Arc<dyn Backend>) -> NexusResult<()> {
		if let Some(content) = self.store.get_content(content_hash).await? {
			if let Some(0) = self.store.release_content_ref(content_hash).await? {
				backend.delete_content(&content.backend_locator).await?;
			}
		}
		Ok(())
	}

	/// Bump the tenant's decision-cache generation after a hierarchy-tuple
	/// write issued directly against the store rather than through
	/// `Engine::create_tuple` (the transactional record+tuple insert can't
	/// route through the engine's own method without losing atomicity).
	fn engine_invalidate(&self, ctx: &OperationContext) {
		self.engine.bump_generation(ctx.tenant_id());
	}
}

/// The longest literal (non-glob-metacharacter) prefix of `pattern`, used to
/// scope the metadata-store scan instead of walking every record for the
/// tenant.
fn literal_prefix(pattern: &str) -> String {
	let end = pattern.find(['*', '?', '[', '{']).unwrap_or(pattern.len());
	let prefix = &pattern[..end];
	match prefix.rfind('/') {
		Some(0) => "/".to_string(),
		Some(idx) => prefix[..idx].to_string(),
		None => "/".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::LocalBackend;
	use crate::model::{hierarchical_namespace, IdentitySubject, Namespace, Subject};
	use crate::rebac::cache::DecisionCache;
	use crate::rebac::engine::NamespaceSource;
	use crate::rebac::tuple_store::fake::FakeTupleStore;
	use std::path::Path;

	struct FixedNamespaceSource(Namespace);

	#[async_trait::async_trait]
	impl NamespaceSource for FixedNamespaceSource {
		async fn namespace(&self, _tenant_id: &str, _object_type: &str) -> NexusResult<Arc<Namespace>> {
			Ok(Arc::new(self.0.clone()))
		}
	}

	async fn fixture(root: &Path) -> FilesystemCore<FakeTupleStore> {
		let store = MetadataStore::connect(crate::db::StoreConfig::sqlite(root.join("nexus.db")))
			.await
			.unwrap();
		store.migrate().await.unwrap();
		let store = Arc::new(store);

		let router = Arc::new(Router::new());
		router.add_mount("t1", "/", "local").await.unwrap();

		let mut backends: HashMap<String, Arc<dyn Backend>> = HashMap::new();
		backends.insert("local".to_string(), Arc::new(LocalBackend::new(root.join("blobs"))));

		let tuples = Arc::new(FakeTupleStore::new());
		let namespaces: Arc<dyn NamespaceSource> = Arc::new(FixedNamespaceSource(hierarchical_namespace("file")));
		let engine = Arc::new(Engine::new(tuples, namespaces, Arc::new(DecisionCache::new(1000, 0, None))));

		FilesystemCore::new(store, router, backends, engine)
	}

	fn ctx(user: &str) -> OperationContext {
		OperationContext::new(IdentitySubject::new(Entity::user(user), "t1"))
	}

	async fn grant_root_owner(fs: &FilesystemCore<FakeTupleStore>, user: &str) {
		fs.engine
			.create_tuple(
				&ctx(user),
				Tuple::new("t1", Subject::Entity(Entity::user(user)), "direct_owner", Entity::file("/")),
			)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn write_then_read_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let fs = fixture(dir.path()).await;
		grant_root_owner(&fs, "bob").await;

		let ctx = ctx("bob");
		fs.write(&ctx, "/a.txt", b"hello").await.unwrap();
		let (record, bytes) = fs.read(&ctx, "/a.txt").await.unwrap();
		assert_eq!(bytes, b"hello");
		assert_eq!(record.size, 5);
	}

	#[tokio::test]
	async fn write_without_parent_permission_is_denied() {
		let dir = tempfile::tempdir().unwrap();
		let fs = fixture(dir.path()).await;
		let ctx = ctx("eve");
		let err = fs.write(&ctx, "/a.txt", b"hello").await.unwrap_err();
		assert!(matches!(err, NexusError::PermissionDenied { .. }));
	}

	#[tokio::test]
	async fn overwrite_releases_old_content_ref() {
		let dir = tempfile::tempdir().unwrap();
		let fs = fixture(dir.path()).await;
		grant_root_owner(&fs, "bob").await;
		let ctx = ctx("bob");

		fs.write(&ctx, "/a.txt", b"one").await.unwrap();
		let first_hash = hash_content(b"one");
		fs.write(&ctx, "/a.txt", b"two").await.unwrap();

		assert!(fs.store.get_content(&first_hash).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn delete_removes_record_and_content() {
		let dir = tempfile::tempdir().unwrap();
		let fs = fixture(dir.path()).await;
		grant_root_owner(&fs, "bob").await;
		let ctx = ctx("bob");

		fs.write(&ctx, "/a.txt", b"hello").await.unwrap();
		let hash = hash_content(b"hello");
		fs.delete(&ctx, "/a.txt").await.unwrap();

		assert!(fs.store.get_record("t1", "/a.txt").await.unwrap().is_none());
		assert!(fs.store.get_content(&hash).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn list_filters_out_unreadable_entries() {
		let dir = tempfile::tempdir().unwrap();
		let fs = fixture(dir.path()).await;
		grant_root_owner(&fs, "bob").await;
		let bob_ctx = ctx("bob");

		fs.mkdir(&bob_ctx, "/proj", MkdirOptions::default()).await.unwrap();
		fs.write(&bob_ctx, "/proj/a.txt", b"one").await.unwrap();
		fs.write(&bob_ctx, "/proj/b.txt", b"two").await.unwrap();

		// eve can see /proj/a.txt only
		fs.engine
			.create_tuple(
				&bob_ctx,
				Tuple::new("t1", Subject::Entity(Entity::user("eve")), "direct_viewer", Entity::file("/proj/a.txt")),
			)
			.await
			.unwrap();

		let eve_ctx = ctx("eve");
		let entries = fs.list(&eve_ctx, "/proj").await.unwrap();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].path, "/proj/a.txt");
	}

	#[tokio::test]
	async fn glob_matches_and_filters_by_permission() {
		let dir = tempfile::tempdir().unwrap();
		let fs = fixture(dir.path()).await;
		grant_root_owner(&fs, "bob").await;
		let ctx = ctx("bob");

		fs.write(&ctx, "/a.rs", b"fn main() {}").await.unwrap();
		fs.write(&ctx, "/b.txt", b"not rust").await.unwrap();

		let matches = fs.glob(&ctx, "/*.rs").await.unwrap();
		assert_eq!(matches.len(), 1);
		assert_eq!(matches[0].path, "/a.rs");
	}

	#[tokio::test]
	async fn grep_finds_matching_lines_in_readable_files() {
		let dir = tempfile::tempdir().unwrap();
		let fs = fixture(dir.path()).await;
		grant_root_owner(&fs, "bob").await;
		let ctx = ctx("bob");

		fs.write(&ctx, "/a.txt", b"hello world\nsecond line\n").await.unwrap();
		let matches = fs.grep(&ctx, "world", "/").await.unwrap();
		assert_eq!(matches.len(), 1);
		assert_eq!(matches[0].path, "/a.txt");
		assert_eq!(matches[0].line_number, 1);
	}

	#[tokio::test]
	async fn mkdir_exist_ok_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let fs = fixture(dir.path()).await;
		grant_root_owner(&fs, "bob").await;
		let ctx = ctx("bob");

		fs.mkdir(&ctx, "/proj", MkdirOptions::default()).await.unwrap();
		let err = fs.mkdir(&ctx, "/proj", MkdirOptions::default()).await.unwrap_err();
		assert!(matches!(err, NexusError::AlreadyExists(_)));

		fs.mkdir(&ctx, "/proj", MkdirOptions { exist_ok: true }).await.unwrap();
	}
}
