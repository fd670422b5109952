//! Narrow trait the engine depends on instead of `MetadataStore` directly,
//! so traversal logic can be exercised against an in-memory fake without a
//! database (mirrors how `CoreContext` hands managers around as `Arc<dyn
//! Trait>`-shaped handles rather than concrete stores).

use async_trait::async_trait;

use crate::db::MetadataStore;
use crate::error::NexusResult;
use crate::model::{Entity, Tuple, TupleFilter};

#[async_trait]
pub trait TupleStore: Send + Sync {
	async fn insert_tuple(&self, tuple: &Tuple) -> NexusResult<()>;
	async fn delete_tuple(&self, tenant_id: &str, tuple: &Tuple) -> NexusResult<()>;
	async fn delete_object_tuples(&self, tenant_id: &str, object: &Entity) -> NexusResult<u64>;
	async fn list_tuples(&self, filter: &TupleFilter) -> NexusResult<Vec<Tuple>>;
}

#[async_trait]
impl TupleStore for MetadataStore {
	async fn insert_tuple(&self, tuple: &Tuple) -> NexusResult<()> {
		MetadataStore::insert_tuple(self, tuple).await
	}

	async fn delete_tuple(&self, tenant_id: &str, tuple: &Tuple) -> NexusResult<()> {
		MetadataStore::delete_tuple(self, tenant_id, tuple).await
	}

	async fn delete_object_tuples(&self, tenant_id: &str, object: &Entity) -> NexusResult<u64> {
		MetadataStore::delete_object_tuples(self, tenant_id, object).await
	}

	async fn list_tuples(&self, filter: &TupleFilter) -> NexusResult<Vec<Tuple>> {
		MetadataStore::list_tuples(self, filter).await
	}
}

#[cfg(test)]
pub(crate) mod fake {
	use super::*;
	use parking_lot::Mutex;

	/// An in-memory `TupleStore` for engine unit tests that don't need a
	/// real database.
	#[derive(Default)]
	pub struct FakeTupleStore {
		tuples: Mutex<Vec<Tuple>>,
	}

	impl FakeTupleStore {
		pub fn new() -> Self {
			Self::default()
		}

		pub fn seed(&self, tuple: Tuple) {
			self.tuples.lock().push(tuple);
		}
	}

	#[async_trait]
	impl TupleStore for FakeTupleStore {
		async fn insert_tuple(&self, tuple: &Tuple) -> NexusResult<()> {
			self.tuples.lock().push(tuple.clone());
			Ok(())
		}

		async fn delete_tuple(&self, tenant_id: &str, tuple: &Tuple) -> NexusResult<()> {
			let mut tuples = self.tuples.lock();
			let before = tuples.len();
			tuples.retain(|t| {
				!(t.tenant_id == tenant_id
					&& t.subject == tuple.subject
					&& t.relation == tuple.relation
					&& t.object == tuple.object)
			});
			if tuples.len() == before {
				return Err(crate::error::NexusError::NotFound("no such tuple".to_string()));
			}
			Ok(())
		}

		async fn delete_object_tuples(&self, tenant_id: &str, object: &Entity) -> NexusResult<u64> {
			let mut tuples = self.tuples.lock();
			let before = tuples.len();
			tuples.retain(|t| !(t.tenant_id == tenant_id && &t.object == object));
			Ok((before - tuples.len()) as u64)
		}

		async fn list_tuples(&self, filter: &TupleFilter) -> NexusResult<Vec<Tuple>> {
			let tuples = self.tuples.lock();
			Ok(tuples
				.iter()
				.filter(|t| filter.tenant_id.as_deref().map_or(true, |v| v == t.tenant_id))
				.filter(|t| filter.object.as_ref().map_or(true, |v| v == &t.object))
				.filter(|t| filter.object.is_some() || filter.object_type.as_deref().map_or(true, |v| v == t.object.kind))
				.filter(|t| filter.relation.as_deref().map_or(true, |v| v == t.relation))
				.filter(|t| filter.subject.as_ref().map_or(true, |v| v == &t.subject))
				.cloned()
				.collect())
		}
	}
}
