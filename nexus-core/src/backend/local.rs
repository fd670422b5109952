//! Local filesystem backend: content under `<root>/content/<shard>`,
//! directories as real directories under `<root>/dirs/<path>`.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use super::{shard_locator, Backend};
use crate::error::{NexusError, NexusResult};

pub struct LocalBackend {
	root: PathBuf,
}

impl LocalBackend {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	fn content_path(&self, locator: &str) -> PathBuf {
		self.root.join("content").join(locator)
	}

	fn dir_path(&self, path: &str) -> PathBuf {
		self.root.join("dirs").join(path.trim_start_matches('/'))
	}
}

#[async_trait]
impl Backend for LocalBackend {
	async fn write_content(&self, content_hash: &str, bytes: &[u8]) -> NexusResult<String> {
		let locator = shard_locator(content_hash);
		let path = self.content_path(&locator);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).await?;
		}
		if fs::try_exists(&path).await.unwrap_or(false) {
			return Ok(locator);
		}
		fs::write(&path, bytes).await?;
		Ok(locator)
	}

	async fn read_content(&self, locator: &str) -> NexusResult<Vec<u8>> {
		let path = self.content_path(locator);
		fs::read(&path).await.map_err(|e| match e.kind() {
			std::io::ErrorKind::NotFound => NexusError::NotFound(format!("content not found: {locator}")),
			_ => NexusError::from(e),
		})
	}

	async fn delete_content(&self, locator: &str) -> NexusResult<()> {
		let path = self.content_path(locator);
		match fs::remove_file(&path).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(NexusError::from(e)),
		}
	}

	async fn content_exists(&self, locator: &str) -> NexusResult<bool> {
		Ok(fs::try_exists(self.content_path(locator)).await.unwrap_or(false))
	}

	async fn get_content_size(&self, locator: &str) -> NexusResult<u64> {
		let meta = fs::metadata(self.content_path(locator)).await.map_err(|e| match e.kind() {
			std::io::ErrorKind::NotFound => NexusError::NotFound(format!("content not found: {locator}")),
			_ => NexusError::from(e),
		})?;
		Ok(meta.len())
	}

	async fn mkdir(&self, path: &str) -> NexusResult<()> {
		fs::create_dir_all(self.dir_path(path)).await?;
		Ok(())
	}

	async fn rmdir(&self, path: &str) -> NexusResult<()> {
		match fs::remove_dir(self.dir_path(path)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(NexusError::from(e)),
		}
	}

	async fn is_directory(&self, path: &str) -> NexusResult<bool> {
		Ok(fs::metadata(self.dir_path(path)).await.map(|m| m.is_dir()).unwrap_or(false))
	}

	async fn list_dir(&self, path: &str) -> NexusResult<Vec<String>> {
		let dir = self.dir_path(path);
		let mut entries = match fs::read_dir(&dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(NexusError::from(e)),
		};
		let mut names = Vec::new();
		while let Some(entry) = entries.next_entry().await? {
			if let Some(name) = entry.file_name().to_str() {
				names.push(name.to_string());
			}
		}
		names.sort();
		Ok(names)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn write_read_round_trips() {
		let dir = tempfile::tempdir().unwrap();
		let backend = LocalBackend::new(dir.path());
		let hash = super::super::hash_content(b"hello world");
		let locator = backend.write_content(&hash, b"hello world").await.unwrap();
		let bytes = backend.read_content(&locator).await.unwrap();
		assert_eq!(bytes, b"hello world");
	}

	#[tokio::test]
	async fn read_missing_content_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let backend = LocalBackend::new(dir.path());
		let err = backend.read_content("aa/bb/ghost").await.unwrap_err();
		assert!(matches!(err, NexusError::NotFound(_)));
	}

	#[tokio::test]
	async fn mkdir_then_list_dir_reflects_children() {
		let dir = tempfile::tempdir().unwrap();
		let backend = LocalBackend::new(dir.path());
		backend.mkdir("/a").await.unwrap();
		backend.mkdir("/a/b").await.unwrap();
		let names = backend.list_dir("/a").await.unwrap();
		assert_eq!(names, vec!["b".to_string()]);
		assert!(backend.is_directory("/a/b").await.unwrap());
	}
}
