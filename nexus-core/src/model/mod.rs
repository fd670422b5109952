//! Core data model shared by the ReBAC engine, metadata store, and
//! filesystem core: entities/usersets, tuples, namespaces, file/content
//! records, and per-request identity.

pub mod entity;
pub mod identity;
pub mod namespace;
pub mod record;
pub mod tuple;

pub use entity::{Entity, Subject};
pub use identity::{IdentitySubject, OperationContext};
pub use namespace::{hierarchical_namespace, Namespace, PermissionDef, RelationDef, Rewrite, MAX_REWRITE_DEPTH};
pub use record::{ContentRow, Record, RecordKind};
pub use tuple::{Tuple, TupleFilter};
