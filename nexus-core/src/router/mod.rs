//! Virtual-path routing: longest-prefix resolution of a path to the mount
//! (and therefore backend) that owns it (spec.md §4.1 "Router").
//!
//! Mount membership changes are rare compared to reads, so the mount table
//! is held behind a single `RwLock` the way `CoreContext` guards its
//! lazily-initialized singletons (`core/src/context.rs`) rather than behind
//! a lock-free structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{NexusError, NexusResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
	pub mount_id: Uuid,
	pub tenant_id: String,
	/// Virtual path prefix this mount owns, always starting with `/` and
	/// never ending with one (except the root mount, `"/"`).
	pub virtual_prefix: String,
	pub backend_name: String,
	pub created_at: DateTime<Utc>,
}

/// The result of resolving a virtual path: which mount owns it, and the
/// path remainder relative to that mount's prefix.
#[derive(Debug, Clone)]
pub struct Resolution {
	pub mount: Mount,
	pub relative_path: String,
}

pub struct Router {
	mounts: Arc<RwLock<Vec<Mount>>>,
}

impl Default for Router {
	fn default() -> Self {
		Self::new()
	}
}

impl Router {
	pub fn new() -> Self {
		Self {
			mounts: Arc::new(RwLock::new(Vec::new())),
		}
	}

	/// Resolve `virtual_path` to the mount with the longest matching prefix
	/// among this tenant's mounts. Ties (identical prefix length) break on
	/// prefix string ordering so resolution is deterministic regardless of
	/// insertion order.
	pub async fn resolve(&self, tenant_id: &str, virtual_path: &str) -> NexusResult<Resolution> {
		let mounts = self.mounts.read().await;
		let best = mounts
			.iter()
			.filter(|m| m.tenant_id == tenant_id)
			.filter(|m| path_is_under(virtual_path, &m.virtual_prefix))
			.max_by(|a, b| {
				a.virtual_prefix
					.len()
					.cmp(&b.virtual_prefix.len())
					.then_with(|| a.virtual_prefix.cmp(&b.virtual_prefix))
			})
			.cloned()
			.ok_or_else(|| NexusError::NotFound(format!("no mount covers path: {virtual_path}")))?;

		let relative_path = if best.virtual_prefix == "/" {
			virtual_path.to_string()
		} else {
			virtual_path
				.strip_prefix(&best.virtual_prefix)
				.unwrap_or(virtual_path)
				.to_string()
		};
		let relative_path = if relative_path.is_empty() { "/".to_string() } else { relative_path };

		Ok(Resolution { mount: best, relative_path })
	}

	pub async fn add_mount(&self, tenant_id: &str, virtual_prefix: &str, backend_name: &str) -> NexusResult<Mount> {
		let normalized = normalize_prefix(virtual_prefix);
		let mut mounts = self.mounts.write().await;
		if mounts.iter().any(|m| m.tenant_id == tenant_id && m.virtual_prefix == normalized) {
			return Err(NexusError::AlreadyExists(format!(
				"mount already exists at {normalized} for tenant {tenant_id}"
			)));
		}
		let mount = Mount {
			mount_id: Uuid::new_v4(),
			tenant_id: tenant_id.to_string(),
			virtual_prefix: normalized,
			backend_name: backend_name.to_string(),
			created_at: Utc::now(),
		};
		mounts.push(mount.clone());
		Ok(mount)
	}

	pub async fn remove_mount(&self, tenant_id: &str, mount_id: Uuid) -> NexusResult<()> {
		let mut mounts = self.mounts.write().await;
		let before = mounts.len();
		mounts.retain(|m| !(m.tenant_id == tenant_id && m.mount_id == mount_id));
		if mounts.len() == before {
			return Err(NexusError::NotFound(format!("no such mount: {mount_id}")));
		}
		Ok(())
	}

	pub async fn list_mounts(&self, tenant_id: &str) -> Vec<Mount> {
		self.mounts
			.read()
			.await
			.iter()
			.filter(|m| m.tenant_id == tenant_id)
			.cloned()
			.collect()
	}
}

fn normalize_prefix(prefix: &str) -> String {
	if prefix == "/" {
		return "/".to_string();
	}
	let trimmed = prefix.trim_end_matches('/');
	if trimmed.starts_with('/') {
		trimmed.to_string()
	} else {
		format!("/{trimmed}")
	}
}

fn path_is_under(path: &str, prefix: &str) -> bool {
	if prefix == "/" {
		return true;
	}
	path == prefix || path.starts_with(&format!("{prefix}/"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn resolves_to_longest_matching_prefix() {
		let router = Router::new();
		router.add_mount("t1", "/", "local-default").await.unwrap();
		router.add_mount("t1", "/projects", "local-projects").await.unwrap();
		router.add_mount("t1", "/projects/big", "s3-big").await.unwrap();

		let r = router.resolve("t1", "/projects/big/file.bin").await.unwrap();
		assert_eq!(r.mount.backend_name, "s3-big");
		assert_eq!(r.relative_path, "/file.bin");

		let r = router.resolve("t1", "/projects/small.txt").await.unwrap();
		assert_eq!(r.mount.backend_name, "local-projects");

		let r = router.resolve("t1", "/other.txt").await.unwrap();
		assert_eq!(r.mount.backend_name, "local-default");
	}

	#[tokio::test]
	async fn resolution_is_tenant_scoped() {
		let router = Router::new();
		router.add_mount("t1", "/", "t1-default").await.unwrap();
		let err = router.resolve("t2", "/anything").await.unwrap_err();
		assert!(matches!(err, NexusError::NotFound(_)));
	}

	#[tokio::test]
	async fn duplicate_mount_prefix_is_rejected() {
		let router = Router::new();
		router.add_mount("t1", "/a", "b1").await.unwrap();
		let err = router.add_mount("t1", "/a", "b2").await.unwrap_err();
		assert!(matches!(err, NexusError::AlreadyExists(_)));
	}

	#[tokio::test]
	async fn remove_mount_then_resolve_fails() {
		let router = Router::new();
		let mount = router.add_mount("t1", "/a", "b1").await.unwrap();
		router.remove_mount("t1", mount.mount_id).await.unwrap();
		assert!(router.resolve("t1", "/a/x").await.is_err());
	}
}
