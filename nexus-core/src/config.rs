//! Process configuration (spec.md §6 "Configuration"), loaded from a TOML
//! file with environment-variable overrides, mirroring the teacher's
//! `AppConfig::load_from`/`default_with_dir` load-or-create pattern
//! (`core-new/src/config/app_config.rs`) adapted from its JSON-on-disk
//! format to TOML since nothing here is user-edited through a GUI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::db::WriterRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
	/// Which [`crate::backend::Backend`] implementation new mounts default
	/// to: `"local"` or `"object_store"`.
	pub backend: String,
	/// Root directory for the local backend.
	pub local_root: PathBuf,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: "local".to_string(),
			local_root: PathBuf::from("./data/blobs"),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
	/// A `sqlite://` or `postgres://` DSN.
	pub url: String,
	/// Whether this process is the sole writer. Refused against `sqlite://`
	/// URLs at connect time (spec.md §4.3, §9 "single-writer cache corruption").
	pub multi_writer: bool,
	pub max_connections: u32,
}

impl MetadataConfig {
	pub fn writer_role(&self) -> WriterRole {
		if self.multi_writer {
			WriterRole::Multi
		} else {
			WriterRole::Single
		}
	}
}

impl Default for MetadataConfig {
	fn default() -> Self {
		Self {
			url: "sqlite://./data/nexus.db?mode=rwc".to_string(),
			multi_writer: false,
			max_connections: 5,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
	/// Gate permission checks entirely. Disabling this is a development-only
	/// escape hatch, never a production default.
	pub enforce: bool,
	/// Let subjects with `IdentitySubject::is_admin` skip `Engine::check`.
	pub admin_bypass: bool,
}

impl Default for PermissionsConfig {
	fn default() -> Self {
		Self {
			enforce: true,
			admin_bypass: false,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
	pub l1_size_mb: u64,
	pub content_size_mb: u64,
	/// `0` disables the L2 decision-cache tier.
	pub l2_ttl_secs: u64,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			l1_size_mb: 64,
			content_size_mb: 256,
			l2_ttl_secs: 0,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
	pub host: String,
	pub port: u16,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			host: "127.0.0.1".to_string(),
			port: 7878,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
	/// HS256 signing secret. Never logged; left out of `Debug` would require
	/// a manual impl, so callers must take care not to print this struct
	/// wholesale in production logs.
	pub secret: String,
}

impl Default for JwtConfig {
	fn default() -> Self {
		Self {
			secret: "dev-only-insecure-secret-change-me".to_string(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NexusConfig {
	pub data_dir: PathBuf,
	pub storage: StorageConfig,
	pub metadata: MetadataConfig,
	pub permissions: PermissionsConfig,
	pub cache: CacheConfig,
	pub server: ServerConfig,
	pub jwt: JwtConfig,
	pub default_deadline_ms: u64,
}

impl Default for NexusConfig {
	fn default() -> Self {
		Self {
			data_dir: PathBuf::from("."),
			storage: StorageConfig::default(),
			metadata: MetadataConfig::default(),
			permissions: PermissionsConfig::default(),
			cache: CacheConfig::default(),
			server: ServerConfig::default(),
			jwt: JwtConfig::default(),
			default_deadline_ms: 30_000,
		}
	}
}

impl NexusConfig {
	fn config_path(data_dir: &Path) -> PathBuf {
		data_dir.join("nexus.toml")
	}

	/// Load `<data_dir>/nexus.toml`, writing a fresh default file if absent —
	/// the load-or-create shape `AppConfig::load_from` uses.
	pub fn load_or_create(data_dir: impl Into<PathBuf>) -> Result<Self> {
		let data_dir = data_dir.into();
		let path = Self::config_path(&data_dir);
		let mut config = if path.exists() {
			let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
			toml::from_str::<Self>(&raw).with_context(|| format!("parsing {}", path.display()))?
		} else {
			let mut config = Self::default();
			config.data_dir = data_dir.clone();
			config.save()?;
			config
		};
		config.data_dir = data_dir;
		config.apply_env_overrides();
		Ok(config)
	}

	pub fn save(&self) -> Result<()> {
		std::fs::create_dir_all(&self.data_dir)?;
		let raw = toml::to_string_pretty(self)?;
		std::fs::write(Self::config_path(&self.data_dir), raw)?;
		Ok(())
	}

	/// A handful of operationally hot keys are overridable without editing
	/// the file on disk, for container deployments that inject env vars
	/// rather than mounting config (`NEXUS_SERVER_PORT`, `NEXUS_SERVER_HOST`,
	/// `NEXUS_METADATA_URL`, `NEXUS_JWT_SECRET`).
	fn apply_env_overrides(&mut self) {
		if let Ok(port) = std::env::var("NEXUS_SERVER_PORT") {
			if let Ok(port) = port.parse() {
				self.server.port = port;
			}
		}
		if let Ok(host) = std::env::var("NEXUS_SERVER_HOST") {
			self.server.host = host;
		}
		if let Ok(url) = std::env::var("NEXUS_METADATA_URL") {
			self.metadata.url = url;
		}
		if let Ok(secret) = std::env::var("NEXUS_JWT_SECRET") {
			self.jwt.secret = secret;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn load_or_create_writes_default_then_reloads() {
		let dir = tempfile::tempdir().unwrap();
		let first = NexusConfig::load_or_create(dir.path()).unwrap();
		assert_eq!(first.server.port, 7878);

		let second = NexusConfig::load_or_create(dir.path()).unwrap();
		assert_eq!(second.server.port, first.server.port);
	}

	#[test]
	fn env_override_wins_over_file() {
		let dir = tempfile::tempdir().unwrap();
		std::env::set_var("NEXUS_SERVER_PORT", "9999");
		let config = NexusConfig::load_or_create(dir.path()).unwrap();
		std::env::remove_var("NEXUS_SERVER_PORT");
		assert_eq!(config.server.port, 9999);
	}
}
