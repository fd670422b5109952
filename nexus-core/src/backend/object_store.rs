//! Object-store backend over `opendal`, used for production deployments
//! where content lives in S3 (or any opendal-supported service) rather than
//! on local disk (spec.md §4.2).

use async_trait::async_trait;
use opendal::Operator;

use super::{shard_locator, Backend};
use crate::error::{NexusError, NexusResult};

pub struct ObjectStoreBackend {
	op: Operator,
	content_prefix: String,
	dir_prefix: String,
}

impl ObjectStoreBackend {
	pub fn new(op: Operator) -> Self {
		Self {
			op,
			content_prefix: "content/".to_string(),
			dir_prefix: "dirs/".to_string(),
		}
	}

	fn content_key(&self, locator: &str) -> String {
		format!("{}{}", self.content_prefix, locator)
	}

	fn dir_key(&self, path: &str) -> String {
		format!("{}{}/", self.dir_prefix, path.trim_matches('/'))
	}
}

fn map_opendal_err(err: opendal::Error) -> NexusError {
	match err.kind() {
		opendal::ErrorKind::NotFound => NexusError::NotFound(err.to_string()),
		opendal::ErrorKind::AlreadyExists => NexusError::AlreadyExists(err.to_string()),
		_ => NexusError::Unavailable(err.to_string()),
	}
}

#[async_trait]
impl Backend for ObjectStoreBackend {
	async fn write_content(&self, content_hash: &str, bytes: &[u8]) -> NexusResult<String> {
		let locator = shard_locator(content_hash);
		let key = self.content_key(&locator);
		if self.op.exists(&key).await.map_err(map_opendal_err)? {
			return Ok(locator);
		}
		self.op.write(&key, bytes.to_vec()).await.map_err(map_opendal_err)?;
		Ok(locator)
	}

	async fn read_content(&self, locator: &str) -> NexusResult<Vec<u8>> {
		let bytes = self
			.op
			.read(&self.content_key(locator))
			.await
			.map_err(map_opendal_err)?;
		Ok(bytes.to_vec())
	}

	async fn delete_content(&self, locator: &str) -> NexusResult<()> {
		self.op.delete(&self.content_key(locator)).await.map_err(map_opendal_err)
	}

	async fn content_exists(&self, locator: &str) -> NexusResult<bool> {
		self.op.exists(&self.content_key(locator)).await.map_err(map_opendal_err)
	}

	async fn get_content_size(&self, locator: &str) -> NexusResult<u64> {
		let meta = self.op.stat(&self.content_key(locator)).await.map_err(map_opendal_err)?;
		Ok(meta.content_length())
	}

	async fn mkdir(&self, path: &str) -> NexusResult<()> {
		self.op.create_dir(&self.dir_key(path)).await.map_err(map_opendal_err)
	}

	async fn rmdir(&self, path: &str) -> NexusResult<()> {
		match self.op.delete(&self.dir_key(path)).await {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(map_opendal_err(e)),
		}
	}

	async fn is_directory(&self, path: &str) -> NexusResult<bool> {
		Ok(self.op.exists(&self.dir_key(path)).await.unwrap_or(false))
	}

	async fn list_dir(&self, path: &str) -> NexusResult<Vec<String>> {
		let lister = match self.op.lister(&self.dir_key(path)).await {
			Ok(lister) => lister,
			Err(e) if e.kind() == opendal::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(map_opendal_err(e)),
		};
		use futures::TryStreamExt;
		let mut names = Vec::new();
		let mut lister = Box::pin(lister);
		while let Some(entry) = lister.try_next().await.map_err(map_opendal_err)? {
			let name = entry.name().trim_end_matches('/').to_string();
			if !name.is_empty() {
				names.push(name);
			}
		}
		names.sort();
		Ok(names)
	}
}
