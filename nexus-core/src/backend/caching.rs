//! An in-memory LRU cache in front of any [`Backend`], modeled on the
//! `Arc<RwLock<Option<..>>>` cached-secret pattern in `crypto/key_manager.rs`
//! but backed by a bounded `moka` cache so hot content doesn't round-trip
//! through the underlying store on every read (spec.md §4.2, §5).

use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::Backend;
use crate::error::{NexusError, NexusResult};

/// Whether a write also populates the cache (`WriteThrough`) or only reads
/// do (`WriteAround`, the default — avoids caching large blobs that may
/// never be read again right after being written).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
	WriteAround,
	WriteThrough,
}

pub struct CachingBackendWrapper<B: Backend> {
	inner: B,
	cache: Cache<String, Arc<Vec<u8>>>,
	mode: CacheMode,
}

impl<B: Backend> CachingBackendWrapper<B> {
	pub fn new(inner: B, max_capacity: u64, ttl: Duration, mode: CacheMode) -> Self {
		let cache = Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build();
		Self { inner, cache, mode }
	}
}

#[async_trait]
impl<B: Backend> Backend for CachingBackendWrapper<B> {
	async fn write_content(&self, content_hash: &str, bytes: &[u8]) -> NexusResult<String> {
		let locator = self.inner.write_content(content_hash, bytes).await?;
		if self.mode == CacheMode::WriteThrough {
			self.cache.insert(locator.clone(), Arc::new(bytes.to_vec())).await;
		}
		Ok(locator)
	}

	async fn read_content(&self, locator: &str) -> NexusResult<Vec<u8>> {
		if let Some(hit) = self.cache.get(locator).await {
			return Ok((*hit).clone());
		}
		// Cache fault: fall through to the backing store and populate the
		// cache so the next read is served locally.
		let bytes = self.inner.read_content(locator).await?;
		self.cache.insert(locator.to_string(), Arc::new(bytes.clone())).await;
		Ok(bytes)
	}

	async fn delete_content(&self, locator: &str) -> NexusResult<()> {
		self.cache.invalidate(locator).await;
		self.inner.delete_content(locator).await
	}

	async fn content_exists(&self, locator: &str) -> NexusResult<bool> {
		if self.cache.contains_key(locator) {
			return Ok(true);
		}
		self.inner.content_exists(locator).await
	}

	async fn get_content_size(&self, locator: &str) -> NexusResult<u64> {
		self.inner.get_content_size(locator).await
	}

	async fn batch_read_content(&self, locators: &[String]) -> NexusResult<Vec<Option<Vec<u8>>>> {
		let mut out = Vec::with_capacity(locators.len());
		for locator in locators {
			match self.read_content(locator).await {
				Ok(bytes) => out.push(Some(bytes)),
				Err(NexusError::NotFound(_)) => out.push(None),
				Err(err) => return Err(err),
			}
		}
		Ok(out)
	}

	async fn mkdir(&self, path: &str) -> NexusResult<()> {
		self.inner.mkdir(path).await
	}

	async fn rmdir(&self, path: &str) -> NexusResult<()> {
		self.inner.rmdir(path).await
	}

	async fn is_directory(&self, path: &str) -> NexusResult<bool> {
		self.inner.is_directory(path).await
	}

	async fn list_dir(&self, path: &str) -> NexusResult<Vec<String>> {
		self.inner.list_dir(path).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::{hash_content, LocalBackend};

	fn wrapper(mode: CacheMode) -> (CachingBackendWrapper<LocalBackend>, tempfile::TempDir) {
		let dir = tempfile::tempdir().unwrap();
		let backend = CachingBackendWrapper::new(LocalBackend::new(dir.path()), 100, Duration::from_secs(60), mode);
		(backend, dir)
	}

	#[tokio::test]
	async fn write_around_does_not_populate_cache_on_write() {
		let (backend, _dir) = wrapper(CacheMode::WriteAround);
		let hash = hash_content(b"abc");
		let locator = backend.write_content(&hash, b"abc").await.unwrap();
		assert!(!backend.cache.contains_key(&locator));
	}

	#[tokio::test]
	async fn write_through_populates_cache_on_write() {
		let (backend, _dir) = wrapper(CacheMode::WriteThrough);
		let hash = hash_content(b"abc");
		let locator = backend.write_content(&hash, b"abc").await.unwrap();
		assert!(backend.cache.contains_key(&locator));
	}

	#[tokio::test]
	async fn read_after_write_around_populates_cache() {
		let (backend, _dir) = wrapper(CacheMode::WriteAround);
		let hash = hash_content(b"abc");
		let locator = backend.write_content(&hash, b"abc").await.unwrap();
		let bytes = backend.read_content(&locator).await.unwrap();
		assert_eq!(bytes, b"abc");
		assert!(backend.cache.contains_key(&locator));
	}
}
