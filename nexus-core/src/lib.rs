//! Nexus core: the ReBAC permission engine, content-addressed storage,
//! metadata store, and filesystem API that the RPC surface (`nexus-server`)
//! dispatches into.

pub mod api;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod fs;
pub mod model;
pub mod rebac;
pub mod router;

pub use error::{NexusError, NexusResult};
