//! The JSON-RPC request surface (spec.md §4.6 "RPC Surface"): authentication
//! → dispatch → error shaping, mirroring the teacher's
//! `infra/api/mod.rs` layering (`Applications → ApiDispatcher →
//! PermissionLayer → Operations`) with the permission layer folded into
//! `FilesystemCore`/`Engine` themselves rather than a separate stage.

pub mod auth;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod methods;
pub mod rpc;

pub use context::{RequestMetadata, RequestSource};
pub use dispatcher::ApiDispatcher;
pub use error::{ApiError, ApiResult};
pub use rpc::{RpcError, RpcRequest, RpcResponse};
