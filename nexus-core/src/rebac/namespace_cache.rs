//! Namespace-config cache: avoids a metadata-store round trip on every
//! permission check for a config that changes rarely (spec.md §4.4,
//! "namespace-config caching").

use moka::future::Cache;
use std::sync::Arc;

use crate::db::MetadataStore;
use crate::error::{NexusError, NexusResult};
use crate::model::Namespace;

pub struct NamespaceCache {
	cache: Cache<(String, String), Arc<Namespace>>,
}

impl Default for NamespaceCache {
	fn default() -> Self {
		Self::new()
	}
}

impl NamespaceCache {
	pub fn new() -> Self {
		Self {
			cache: Cache::builder().max_capacity(1024).build(),
		}
	}

	pub async fn get_or_load(
		&self,
		store: &MetadataStore,
		tenant_id: &str,
		object_type: &str,
	) -> NexusResult<Arc<Namespace>> {
		let key = (tenant_id.to_string(), object_type.to_string());
		if let Some(ns) = self.cache.get(&key).await {
			return Ok(ns);
		}
		let config_json = store
			.get_namespace_config(object_type, tenant_id)
			.await?
			.ok_or_else(|| NexusError::NotFound(format!("no namespace config for object type '{object_type}'")))?;
		let namespace: Namespace =
			serde_json::from_str(&config_json).map_err(|e| NexusError::internal(format!("corrupt namespace config: {e}")))?;
		namespace
			.validate()
			.map_err(|e| NexusError::internal(format!("invalid namespace config: {e}")))?;
		let namespace = Arc::new(namespace);
		self.cache.insert(key, namespace.clone()).await;
		Ok(namespace)
	}

	/// Drop any cached entry for `object_type` under `tenant_id` — called
	/// after a namespace config write so the next check re-reads it.
	pub async fn invalidate(&self, tenant_id: &str, object_type: &str) {
		self.cache.invalidate(&(tenant_id.to_string(), object_type.to_string())).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db::{MetadataStore, StoreConfig, WriterRole};
	use crate::model::hierarchical_namespace;

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
	async fn loads_and_caches_namespace_config() {
		let store = test_store().await;
		let ns = hierarchical_namespace("file");
		store
			.put_namespace_config("file", "*", serde_json::to_string(&ns).unwrap())
			.await
			.unwrap();

		let cache = NamespaceCache::new();
		let loaded = cache.get_or_load(&store, "t1", "file").await.unwrap();
		assert_eq!(loaded.object_type, "file");

		// Second load should be served from cache even if the row disappears.
		let loaded_again = cache.get_or_load(&store, "t1", "file").await.unwrap();
		assert_eq!(loaded_again.object_type, "file");
	}

	#[tokio::test]
	async fn missing_config_is_not_found() {
		let store = test_store().await;
		let cache = NamespaceCache::new();
		let err = cache.get_or_load(&store, "t1", "ghost").await.unwrap_err();
		assert!(matches!(err, NexusError::NotFound(_)));
	}
}
