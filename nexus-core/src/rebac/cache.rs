//! Permission-decision cache: a per-process L1 plus an optional shared,
//! TTL-bounded L2 (spec.md §4.4, §5). Invalidation is generation-based
//! rather than per-key: every tuple mutation for a tenant bumps that
//! tenant's generation counter, and cache keys embed the generation they
//! were computed under, so a bump makes every prior entry unreachable
//! without having to enumerate or scan them.

use moka::future::Cache;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
	tenant_id: String,
	generation: u64,
	subject: String,
	permission: String,
	object: String,
}

pub struct DecisionCache {
	generations: RwLock<HashMap<String, u64>>,
	l1: Cache<CacheKey, bool>,
	l2: Option<Cache<CacheKey, bool>>,
}

impl DecisionCache {
	/// `l2_ttl` of `None` disables the shared L2 tier entirely — useful for
	/// a single-process deployment where an L2 only adds overhead.
	pub fn new(l1_capacity: u64, l2_capacity: u64, l2_ttl: Option<Duration>) -> Self {
		let l2 = l2_ttl.map(|ttl| Cache::builder().max_capacity(l2_capacity).time_to_live(ttl).build());
		Self {
			generations: RwLock::new(HashMap::new()),
			l1: Cache::builder().max_capacity(l1_capacity).build(),
			l2,
		}
	}

	fn current_generation(&self, tenant_id: &str) -> u64 {
		*self.generations.read().get(tenant_id).unwrap_or(&0)
	}

	/// Invalidate every cached decision for `tenant_id` — called whenever a
	/// tuple is created or deleted for that tenant.
	pub fn bump_generation(&self, tenant_id: &str) {
		*self.generations.write().entry(tenant_id.to_string()).or_insert(0) += 1;
	}

	fn key(&self, tenant_id: &str, subject: &str, permission: &str, object: &str) -> CacheKey {
		CacheKey {
			tenant_id: tenant_id.to_string(),
			generation: self.current_generation(tenant_id),
			subject: subject.to_string(),
			permission: permission.to_string(),
			object: object.to_string(),
		}
	}

	pub async fn get(&self, tenant_id: &str, subject: &str, permission: &str, object: &str) -> Option<bool> {
		let key = self.key(tenant_id, subject, permission, object);
		if let Some(v) = self.l1.get(&key).await {
			return Some(v);
		}
		if let Some(l2) = &self.l2 {
			if let Some(v) = l2.get(&key).await {
				self.l1.insert(key, v).await;
				return Some(v);
			}
		}
		None
	}

	pub async fn put(&self, tenant_id: &str, subject: &str, permission: &str, object: &str, value: bool) {
		let key = self.key(tenant_id, subject, permission, object);
		self.l1.insert(key.clone(), value).await;
		if let Some(l2) = &self.l2 {
			l2.insert(key, value).await;
		}
	}
}

pub type SharedDecisionCache = Arc<DecisionCache>;

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn cached_decision_round_trips() {
		let cache = DecisionCache::new(100, 100, Some(Duration::from_secs(60)));
		assert!(cache.get("t1", "user:bob", "read", "file:/a").await.is_none());
		cache.put("t1", "user:bob", "read", "file:/a", true).await;
		assert_eq!(cache.get("t1", "user:bob", "read", "file:/a").await, Some(true));
	}

	#[tokio::test]
	async fn generation_bump_invalidates_tenant_wide() {
		let cache = DecisionCache::new(100, 100, Some(Duration::from_secs(60)));
		cache.put("t1", "user:bob", "read", "file:/a", true).await;
		cache.bump_generation("t1");
		assert!(cache.get("t1", "user:bob", "read", "file:/a").await.is_none());
	}

	#[tokio::test]
	async fn generations_are_independent_per_tenant() {
		let cache = DecisionCache::new(100, 100, Some(Duration::from_secs(60)));
		cache.put("t1", "user:bob", "read", "file:/a", true).await;
		cache.put("t2", "user:bob", "read", "file:/a", true).await;
		cache.bump_generation("t1");
		assert!(cache.get("t1", "user:bob", "read", "file:/a").await.is_none());
		assert_eq!(cache.get("t2", "user:bob", "read", "file:/a").await, Some(true));
	}
}
