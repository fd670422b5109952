//! File/directory records and the content rows they dedup against
//! (spec.md §3, supplemented with timestamps and an optimistic-concurrency
//! version counter per SPEC_FULL.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single content-addressed blob, deduplicated by hash. `ref_count` tracks
/// how many file records point at it; the backend only deletes bytes once
/// this reaches zero (spec.md §4.2 "Backend").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRow {
	pub content_hash: String,
	pub size: u64,
	pub ref_count: i64,
	pub backend_locator: String,
}

impl ContentRow {
	pub fn new(content_hash: impl Into<String>, size: u64, backend_locator: impl Into<String>) -> Self {
		Self {
			content_hash: content_hash.into(),
			size,
			ref_count: 0,
			backend_locator: backend_locator.into(),
		}
	}

	pub fn increment_ref(&mut self) {
		self.ref_count += 1;
	}

	/// Returns the new ref count. Callers delete the underlying content once
	/// this reaches zero.
	pub fn decrement_ref(&mut self) -> i64 {
		self.ref_count = (self.ref_count - 1).max(0);
		self.ref_count
	}
}

/// A file or directory entry in the virtual namespace. Directories carry no
/// content hash; files always reference a [`ContentRow`] with `ref_count >=
/// 1` while the record exists (spec.md §3 invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
	pub path: String,
	pub parent_path: Option<String>,
	pub tenant_id: String,
	pub kind: RecordKind,
	pub content_hash: Option<String>,
	pub size: u64,
	pub etag: String,
	pub owner: super::entity::Entity,
	pub metadata: HashMap<String, Value>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	/// Monotonic counter bumped on every mutation; used for optimistic
	/// concurrency (a write targeting a stale version fails with `Conflict`).
	pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
	File,
	Directory,
}

impl Record {
	pub fn new_file(
		path: impl Into<String>,
		tenant_id: impl Into<String>,
		content_hash: impl Into<String>,
		size: u64,
		owner: super::entity::Entity,
	) -> Self {
		let path = path.into();
		let now = Utc::now();
		let content_hash = content_hash.into();
		Self {
			parent_path: parent_of(&path),
			etag: content_hash.clone(),
			path,
			tenant_id: tenant_id.into(),
			kind: RecordKind::File,
			content_hash: Some(content_hash),
			size,
			owner,
			metadata: HashMap::new(),
			created_at: now,
			updated_at: now,
			version: 1,
		}
	}

	pub fn new_directory(path: impl Into<String>, tenant_id: impl Into<String>, owner: super::entity::Entity) -> Self {
		let path = path.into();
		let now = Utc::now();
		Self {
			parent_path: parent_of(&path),
			etag: format!("dir:{path}:{now}"),
			path,
			tenant_id: tenant_id.into(),
			kind: RecordKind::Directory,
			content_hash: None,
			size: 0,
			owner,
			metadata: HashMap::new(),
			created_at: now,
			updated_at: now,
			version: 1,
		}
	}

	pub fn is_directory(&self) -> bool {
		self.kind == RecordKind::Directory
	}

	/// Replace this record's content in place, as a `write` to an existing
	/// path does. Bumps `version` and `updated_at`, and refreshes `etag` to
	/// the new hash so clients can detect the change cheaply.
	pub fn replace_content(&mut self, content_hash: impl Into<String>, size: u64) {
		let content_hash = content_hash.into();
		self.etag = content_hash.clone();
		self.content_hash = Some(content_hash);
		self.size = size;
		self.updated_at = Utc::now();
		self.version += 1;
	}
}

fn parent_of(path: &str) -> Option<String> {
	let trimmed = path.trim_end_matches('/');
	if trimmed.is_empty() || trimmed == "/" {
		return None;
	}
	match trimmed.rfind('/') {
		Some(0) => Some("/".to_string()),
		Some(idx) => Some(trimmed[..idx].to_string()),
		None => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::entity::Entity;

	#[test]
	fn file_record_starts_at_version_one() {
		let r = Record::new_file("/a/b.txt", "t1", "hash1", 10, Entity::user("bob"));
		assert_eq!(r.version, 1);
		assert_eq!(r.parent_path.as_deref(), Some("/a"));
		assert!(!r.is_directory());
	}

	#[test]
	fn replace_content_bumps_version_and_etag() {
		let mut r = Record::new_file("/a/b.txt", "t1", "hash1", 10, Entity::user("bob"));
		let before = r.updated_at;
		r.replace_content("hash2", 20);
		assert_eq!(r.version, 2);
		assert_eq!(r.etag, "hash2");
		assert_eq!(r.size, 20);
		assert!(r.updated_at >= before);
	}

	#[test]
	fn root_path_has_no_parent() {
		let r = Record::new_directory("/", "t1", Entity::user("bob"));
		assert_eq!(r.parent_path, None);
	}

	#[test]
	fn content_row_ref_counting_floors_at_zero() {
		let mut c = ContentRow::new("hash1", 10, "aa/bb/hash1");
		c.increment_ref();
		assert_eq!(c.decrement_ref(), 0);
		assert_eq!(c.decrement_ref(), 0);
	}
}
