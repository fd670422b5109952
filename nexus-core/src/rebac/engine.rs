//! The ReBAC decision engine: depth-capped, cycle-safe traversal of a
//! namespace's rewrite graph against stored tuples (spec.md §4.4).
//!
//! `check` is the single code path used both for enforcement (the
//! filesystem core calling in before it hands back data) and for the
//! diagnostic `rebac_check` RPC method, so the two can never diverge on the
//! same tuple state — the parity bug spec.md §9 documents against the
//! original implementation.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{NexusError, NexusResult};
use crate::model::{Entity, Namespace, OperationContext, Rewrite, Subject, Tuple, TupleFilter, MAX_REWRITE_DEPTH};

use super::cache::SharedDecisionCache;
use super::tuple_store::TupleStore;

/// Resolves a namespace config for an object type. Kept separate from
/// `TupleStore` so traversal tests can supply a fixed namespace without a
/// database, and production code can back it with [`super::namespace_cache::NamespaceCache`].
#[async_trait::async_trait]
pub trait NamespaceSource: Send + Sync {
	async fn namespace(&self, tenant_id: &str, object_type: &str) -> NexusResult<Arc<Namespace>>;
}

/// One step of an `explain` trace: which relation, on which object, matched
/// (or didn't) and why.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExplainStep {
	pub object: String,
	pub relation: String,
	pub matched: bool,
	pub via_tuple: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ExplainResult {
	pub allowed: bool,
	pub steps: Vec<ExplainStep>,
}

/// Above this many individual checks, `check_bulk` evaluates them
/// concurrently instead of sequentially (spec.md §4.4 "parallel bulk
/// evaluation").
const BULK_PARALLEL_THRESHOLD: usize = 8;

pub struct Engine<T: TupleStore> {
	tuples: Arc<T>,
	namespaces: Arc<dyn NamespaceSource>,
	decisions: SharedDecisionCache,
}

impl<T: TupleStore + 'static> Engine<T> {
	pub fn new(tuples: Arc<T>, namespaces: Arc<dyn NamespaceSource>, decisions: SharedDecisionCache) -> Self {
		Self {
			tuples,
			namespaces,
			decisions,
		}
	}

	pub async fn create_tuple(&self, ctx: &OperationContext, tuple: Tuple) -> NexusResult<()> {
		self.tuples.insert_tuple(&tuple).await?;
		self.decisions.bump_generation(ctx.tenant_id());
		Ok(())
	}

	pub async fn delete_tuple(&self, ctx: &OperationContext, tuple: Tuple) -> NexusResult<()> {
		self.tuples.delete_tuple(ctx.tenant_id(), &tuple).await?;
		self.decisions.bump_generation(ctx.tenant_id());
		Ok(())
	}

	pub async fn delete_object_tuples(&self, ctx: &OperationContext, object: &Entity) -> NexusResult<u64> {
		let n = self.tuples.delete_object_tuples(ctx.tenant_id(), object).await?;
		self.decisions.bump_generation(ctx.tenant_id());
		Ok(n)
	}

	pub async fn list_tuples(&self, filter: &TupleFilter) -> NexusResult<Vec<Tuple>> {
		self.tuples.list_tuples(filter).await
	}

	/// Invalidate every cached decision for a tenant. Needed when a caller
	/// writes a hierarchy tuple directly against the tuple store (e.g. inside
	/// [`crate::db::MetadataStore::insert_record_with_parent_tuple`]'s single
	/// transaction) instead of through [`Self::create_tuple`].
	pub fn bump_generation(&self, tenant_id: &str) {
		self.decisions.bump_generation(tenant_id);
	}

	/// Write a batch of hierarchy-parent tuples in one pass — used by bulk
	/// indexing/hierarchy-rebuild operations (spec.md §4.4 "Hierarchy
	/// maintenance").
	pub async fn ensure_parent_tuples_batch(&self, ctx: &OperationContext, pairs: &[(Entity, Entity)]) -> NexusResult<()> {
		for (child, parent) in pairs {
			let tuple = Tuple::parent_tuple(ctx.tenant_id(), child.clone(), parent.clone());
			match self.tuples.insert_tuple(&tuple).await {
				Ok(()) | Err(NexusError::AlreadyExists(_)) => {}
				Err(e) => return Err(e),
			}
		}
		self.decisions.bump_generation(ctx.tenant_id());
		Ok(())
	}

	/// Does `subject` have `permission` on `object`? The single entry point
	/// both enforcement and diagnostics call.
	pub async fn check(&self, ctx: &OperationContext, subject: &Entity, permission: &str, object: &Entity) -> NexusResult<bool> {
		if ctx.is_expired() {
			return Err(NexusError::Timeout);
		}
		let subject_key = subject.to_string();
		let object_key = object.to_string();
		if let Some(cached) = self.decisions.get(ctx.tenant_id(), &subject_key, permission, &object_key).await {
			return Ok(cached);
		}

		let namespace = self.namespaces.namespace(ctx.tenant_id(), &object.kind).await?;
		let relations = namespace.permission_relations(permission)?.to_vec();

		let mut allowed = false;
		for relation in relations {
			if self
				.check_relation(ctx, namespace.clone(), subject.clone(), relation, object.clone(), 0)
				.await?
			{
				allowed = true;
				break;
			}
		}

		self.decisions.put(ctx.tenant_id(), &subject_key, permission, &object_key, allowed).await;
		Ok(allowed)
	}

	/// Evaluate many `(subject, permission, object)` checks. Above
	/// [`BULK_PARALLEL_THRESHOLD`] checks, they run concurrently.
	pub async fn check_bulk(&self, ctx: &OperationContext, checks: &[(Entity, String, Entity)]) -> NexusResult<Vec<bool>> {
		if checks.len() <= BULK_PARALLEL_THRESHOLD {
			let mut out = Vec::with_capacity(checks.len());
			for (subject, permission, object) in checks {
				out.push(self.check(ctx, subject, permission, object).await?);
			}
			return Ok(out);
		}

		let futures = checks
			.iter()
			.map(|(subject, permission, object)| self.check(ctx, subject, permission, object));
		let results = join_all(futures).await;
		results.into_iter().collect()
	}

	/// All subjects that satisfy `permission` on `object` — a forward
	/// expansion of the rewrite graph, collecting leaves instead of
	/// checking one (spec.md §4.4 "expand_subjects").
	pub async fn expand_subjects(&self, ctx: &OperationContext, permission: &str, object: &Entity) -> NexusResult<Vec<Entity>> {
		let namespace = self.namespaces.namespace(ctx.tenant_id(), &object.kind).await?;
		let relations = namespace.permission_relations(permission)?.to_vec();
		let mut found = HashSet::new();
		for relation in relations {
			self.expand_relation(ctx, namespace.clone(), relation, object.clone(), 0, &mut found).await?;
		}
		Ok(found.into_iter().collect())
	}

	fn expand_relation<'a>(
		&'a self,
		ctx: &'a OperationContext,
		namespace: Arc<Namespace>,
		relation_name: String,
		object: Entity,
		depth: usize,
		found: &'a mut HashSet<Entity>,
	) -> BoxFuture<'a, NexusResult<()>> {
		async move {
			if depth > MAX_REWRITE_DEPTH {
				return Ok(());
			}
			let relation = namespace
				.relations
				.get(&relation_name)
				.ok_or_else(|| NexusError::internal(format!("relation '{relation_name}' vanished mid-traversal")))?
				.clone();

			match relation.rewrite {
				Rewrite::This => {
					let tuples = self
						.tuples
						.list_tuples(&TupleFilter {
							tenant_id: Some(ctx.tenant_id().to_string()),
							relation: Some(relation_name.clone()),
							object: Some(object.clone()),
							..Default::default()
						})
						.await?;
					for t in tuples {
						if t.is_expired(chrono::Utc::now()) {
							continue;
						}
						match t.subject {
							Subject::Entity(e) => {
								found.insert(e);
							}
							Subject::Userset { entity, relation: userset_relation } => {
								let group_ns = self.namespaces.namespace(ctx.tenant_id(), &entity.kind).await?;
								self.expand_relation(ctx, group_ns, userset_relation, entity, depth + 1, found).await?;
							}
						}
					}
				}
				Rewrite::Union(members) => {
					for member in members {
						self.expand_relation(ctx, namespace.clone(), member, object.clone(), depth + 1, found).await?;
					}
				}
				Rewrite::TupleToUserset { via, relation: target_relation } => {
					let tuples = self
						.tuples
						.list_tuples(&TupleFilter {
							tenant_id: Some(ctx.tenant_id().to_string()),
							relation: Some(via),
							object: Some(object.clone()),
							..Default::default()
						})
						.await?;
					for t in tuples {
						if t.is_expired(chrono::Utc::now()) {
							continue;
						}
						if let Subject::Entity(parent) = t.subject {
							let parent_ns = self.namespaces.namespace(ctx.tenant_id(), &parent.kind).await?;
							self.expand_relation(ctx, parent_ns, target_relation.clone(), parent, depth + 1, found).await?;
						}
					}
				}
			}
			Ok(())
		}
		.boxed()
	}

	/// Every object of `object_type` that `subject` has `permission` on.
	/// Builds a candidate set from tuples naming `subject` directly, then
	/// confirms each candidate with [`Self::check`] — a straightforward,
	/// correct-by-construction approach rather than a maintained reverse
	/// index, since the spec does not require sub-linear reverse lookups
	/// (spec.md §4.4 "list_objects_for_subject").
	pub async fn list_objects_for_subject(
		&self,
		ctx: &OperationContext,
		subject: &Entity,
		permission: &str,
		object_type: &str,
	) -> NexusResult<Vec<Entity>> {
		let mut candidates: HashSet<Entity> = HashSet::new();

		let direct = self
			.tuples
			.list_tuples(&TupleFilter {
				tenant_id: Some(ctx.tenant_id().to_string()),
				subject: Some(Subject::Entity(subject.clone())),
				object_type: Some(object_type.to_string()),
				..Default::default()
			})
			.await?;
		candidates.extend(direct.into_iter().map(|t| t.object));

		// One hop through group membership: tuples where `subject` is a
		// member of some group, and that group appears as a userset
		// subject on objects of `object_type`.
		let memberships = self
			.tuples
			.list_tuples(&TupleFilter {
				tenant_id: Some(ctx.tenant_id().to_string()),
				subject: Some(Subject::Entity(subject.clone())),
				..Default::default()
			})
			.await?;
		for membership in memberships {
			let group = membership.object;
			let via_group = self
				.tuples
				.list_tuples(&TupleFilter {
					tenant_id: Some(ctx.tenant_id().to_string()),
					subject: Some(Subject::Userset {
						entity: group,
						relation: membership.relation,
					}),
					object_type: Some(object_type.to_string()),
					..Default::default()
				})
				.await?;
			candidates.extend(via_group.into_iter().map(|t| t.object));
		}

		let mut allowed = Vec::new();
		for object in candidates {
			if self.check(ctx, subject, permission, &object).await? {
				allowed.push(object);
			}
		}
		Ok(allowed)
	}

	/// Like `check`, but records which relation/tuple allowed (or failed
	/// to allow) the decision at each step, for the diagnostic
	/// `rebac_explain` RPC method.
	pub async fn explain(&self, ctx: &OperationContext, subject: &Entity, permission: &str, object: &Entity) -> NexusResult<ExplainResult> {
		let namespace = self.namespaces.namespace(ctx.tenant_id(), &object.kind).await?;
		let relations = namespace.permission_relations(permission)?.to_vec();
		let mut steps = Vec::new();
		let mut allowed = false;
		for relation in relations {
			let matched = self
				.check_relation(ctx, namespace.clone(), subject.clone(), relation.clone(), object.clone(), 0)
				.await?;
			steps.push(ExplainStep {
				object: object.to_string(),
				relation,
				matched,
				via_tuple: None,
			});
			if matched {
				allowed = true;
			}
		}
		Ok(ExplainResult { allowed, steps })
	}

	fn check_relation<'a>(
		&'a self,
		ctx: &'a OperationContext,
		namespace: Arc<Namespace>,
		subject: Entity,
		relation_name: String,
		object: Entity,
		depth: usize,
	) -> BoxFuture<'a, NexusResult<bool>> {
		async move {
			if depth > MAX_REWRITE_DEPTH {
				return Ok(false);
			}
			let relation = namespace
				.relations
				.get(&relation_name)
				.ok_or_else(|| NexusError::internal(format!("relation '{relation_name}' vanished mid-traversal")))?
				.clone();

			match relation.rewrite {
				Rewrite::This => {
					let tuples = self
						.tuples
						.list_tuples(&TupleFilter {
							tenant_id: Some(ctx.tenant_id().to_string()),
							relation: Some(relation_name),
							object: Some(object.clone()),
							..Default::default()
						})
						.await?;
					for t in tuples {
						if t.is_expired(chrono::Utc::now()) {
							continue;
						}
						match t.subject {
							Subject::Entity(e) if e == subject => return Ok(true),
							Subject::Entity(_) => {}
							Subject::Userset { entity, relation: userset_relation } => {
								let group_ns = self.namespaces.namespace(ctx.tenant_id(), &entity.kind).await?;
								if self
									.check_relation(ctx, group_ns, subject.clone(), userset_relation, entity, depth + 1)
									.await?
								{
									return Ok(true);
								}
							}
						}
					}
					Ok(false)
				}
				Rewrite::Union(members) => {
					for member in members {
						if self
							.check_relation(ctx, namespace.clone(), subject.clone(), member, object.clone(), depth + 1)
							.await?
						{
							return Ok(true);
						}
					}
					Ok(false)
				}
				Rewrite::TupleToUserset { via, relation: target_relation } => {
					let tuples = self
						.tuples
						.list_tuples(&TupleFilter {
							tenant_id: Some(ctx.tenant_id().to_string()),
							relation: Some(via),
							object: Some(object.clone()),
							..Default::default()
						})
						.await?;
					for t in tuples {
						if t.is_expired(chrono::Utc::now()) {
							continue;
						}
						if let Subject::Entity(parent) = t.subject {
							let parent_ns = self.namespaces.namespace(ctx.tenant_id(), &parent.kind).await?;
							if self
								.check_relation(ctx, parent_ns, subject.clone(), target_relation.clone(), parent, depth + 1)
								.await?
							{
								return Ok(true);
							}
						}
					}
					Ok(false)
				}
			}
		}
		.boxed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::{hierarchical_namespace, IdentitySubject};
	use crate::rebac::tuple_store::fake::FakeTupleStore;

	struct FixedNamespaceSource(Namespace);

	#[async_trait::async_trait]
	impl NamespaceSource for FixedNamespaceSource {
		async fn namespace(&self, _tenant_id: &str, _object_type: &str) -> NexusResult<Arc<Namespace>> {
			Ok(Arc::new(self.0.clone()))
		}
	}

	fn ctx() -> OperationContext {
		OperationContext::new(IdentitySubject::new(Entity::user("bob"), "t1"))
	}

	fn engine_with(store: FakeTupleStore) -> Engine<FakeTupleStore> {
		Engine::new(
			Arc::new(store),
			Arc::new(FixedNamespaceSource(hierarchical_namespace("file"))),
			Arc::new(super::super::cache::DecisionCache::new(100, 100, None)),
		)
	}

	#[tokio::test]
	async fn direct_owner_tuple_grants_read_and_write() {
		let store = FakeTupleStore::new();
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "direct_owner", Entity::file("/a")));
		let engine = engine_with(store);
		let ctx = ctx();
		assert!(engine.check(&ctx, &Entity::user("bob"), "read", &Entity::file("/a")).await.unwrap());
		assert!(engine.check(&ctx, &Entity::user("bob"), "write", &Entity::file("/a")).await.unwrap());
	}

	#[tokio::test]
	async fn unrelated_subject_is_denied() {
		let store = FakeTupleStore::new();
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "direct_owner", Entity::file("/a")));
		let engine = engine_with(store);
		assert!(!engine.check(&ctx(), &Entity::user("eve"), "read", &Entity::file("/a")).await.unwrap());
	}

	#[tokio::test]
	async fn viewer_inherits_through_parent_directory() {
		let store = FakeTupleStore::new();
		store.seed(Tuple::parent_tuple("t1", Entity::file("/a/b.txt"), Entity::file("/a")));
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "direct_viewer", Entity::file("/a")));
		let engine = engine_with(store);
		assert!(engine
			.check(&ctx(), &Entity::user("bob"), "read", &Entity::file("/a/b.txt"))
			.await
			.unwrap());
	}

	#[tokio::test]
	async fn userset_group_membership_grants_permission() {
		let store = FakeTupleStore::new();
		store.seed(Tuple::new(
			"t1",
			Subject::Userset {
				entity: Entity::new("group", "eng"),
				relation: "member".to_string(),
			},
			"direct_viewer",
			Entity::file("/a"),
		));
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "member", Entity::new("group", "eng")));
		let engine = engine_with(store);
		assert!(engine.check(&ctx(), &Entity::user("bob"), "read", &Entity::file("/a")).await.unwrap());
	}

	#[tokio::test]
	async fn deep_parent_chain_stays_within_depth_cap() {
		let store = FakeTupleStore::new();
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "direct_owner", Entity::file("/root")));
		let mut parent = Entity::file("/root");
		for i in 0..10 {
			let child = Entity::file(format!("/root/{i}"));
			store.seed(Tuple::parent_tuple("t1", child.clone(), parent));
			parent = child;
		}
		let engine = engine_with(store);
		assert!(engine.check(&ctx(), &Entity::user("bob"), "write", &parent).await.unwrap());
	}

	#[tokio::test]
	async fn expand_subjects_collects_direct_and_group_members() {
		let store = FakeTupleStore::new();
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("alice")), "direct_owner", Entity::file("/a")));
		store.seed(Tuple::new(
			"t1",
			Subject::Userset {
				entity: Entity::new("group", "eng"),
				relation: "member".to_string(),
			},
			"direct_viewer",
			Entity::file("/a"),
		));
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "member", Entity::new("group", "eng")));
		let engine = engine_with(store);
		let mut subjects = engine.expand_subjects(&ctx(), "read", &Entity::file("/a")).await.unwrap();
		subjects.sort_by(|a, b| a.id.cmp(&b.id));
		assert_eq!(subjects, vec![Entity::user("alice"), Entity::user("bob")]);
	}

	#[tokio::test]
	async fn list_objects_for_subject_finds_direct_grants() {
		let store = FakeTupleStore::new();
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "direct_owner", Entity::file("/a")));
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "direct_viewer", Entity::file("/b")));
		let engine = engine_with(store);
		let mut objects = engine
			.list_objects_for_subject(&ctx(), &Entity::user("bob"), "read", "file")
			.await
			.unwrap();
		objects.sort_by(|a, b| a.id.cmp(&b.id));
		assert_eq!(objects, vec![Entity::file("/a"), Entity::file("/b")]);
	}

	#[tokio::test]
	async fn explain_reports_matched_relation() {
		let store = FakeTupleStore::new();
		store.seed(Tuple::new("t1", Subject::Entity(Entity::user("bob")), "direct_owner", Entity::file("/a")));
		let engine = engine_with(store);
		let result = engine.explain(&ctx(), &Entity::user("bob"), "write", &Entity::file("/a")).await.unwrap();
		assert!(result.allowed);
		assert!(result.steps.iter().any(|s| s.matched));
	}
}
