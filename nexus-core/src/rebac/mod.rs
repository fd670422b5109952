//! The Zanzibar-style ReBAC permission engine (spec.md §4.4): namespace
//! configs, relationship tuples, and a depth-capped, cache-backed decision
//! engine shared by enforcement and diagnostics.

pub mod cache;
pub mod engine;
pub mod namespace_cache;
pub mod tuple_store;

use std::sync::Arc;

use crate::db::MetadataStore;
use crate::error::NexusResult;
use crate::model::Namespace;

pub use cache::{DecisionCache, SharedDecisionCache};
pub use engine::{Engine, ExplainResult, ExplainStep, NamespaceSource};
pub use namespace_cache::NamespaceCache;
pub use tuple_store::TupleStore;

/// Production [`NamespaceSource`]: cache in front of the metadata store.
pub struct StoreNamespaceSource {
	store: Arc<MetadataStore>,
	cache: NamespaceCache,
}

impl StoreNamespaceSource {
	pub fn new(store: Arc<MetadataStore>) -> Self {
		Self {
			store,
			cache: NamespaceCache::new(),
		}
	}

	pub async fn invalidate(&self, tenant_id: &str, object_type: &str) {
		self.cache.invalidate(tenant_id, object_type).await;
	}
}

#[async_trait::async_trait]
impl NamespaceSource for StoreNamespaceSource {
	async fn namespace(&self, tenant_id: &str, object_type: &str) -> NexusResult<Arc<Namespace>> {
		self.cache.get_or_load(&self.store, tenant_id, object_type).await
	}
}

/// Wires a production [`Engine`] over a real [`MetadataStore`].
pub fn build_engine(store: Arc<MetadataStore>, decisions: SharedDecisionCache) -> Engine<MetadataStore> {
	let namespaces: Arc<dyn NamespaceSource> = Arc::new(StoreNamespaceSource::new(store.clone()));
	Engine::new(store, namespaces, decisions)
}
