//! Parent-chain helpers shared by `FilesystemCore` (spec.md §4.4 "Hierarchy
//! maintenance", §4.5 "Permission check for new files").

use crate::model::Entity;

/// All ancestor paths of `path`, nearest first, stopping before the root.
/// `/a/b/c` yields `["/a/b", "/a"]`.
pub fn ancestor_paths(path: &str) -> Vec<String> {
	let mut out = Vec::new();
	let mut current = path.trim_end_matches('/');
	loop {
		let parent = match current.rfind('/') {
			Some(0) => "/",
			Some(idx) => &current[..idx],
			None => break,
		};
		out.push(parent.to_string());
		if parent == "/" {
			break;
		}
		current = parent;
	}
	out
}

/// The immediate parent of `path`, or `None` if `path` is the root.
pub fn parent_path(path: &str) -> Option<String> {
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

/// `(child, parent)` entity pairs for every path in `paths`, suitable for
/// [`crate::rebac::Engine::ensure_parent_tuples_batch`]. Paths whose parent
/// is already implied by another entry in the batch are still included —
/// the batch primitive dedupes at the tuple-store layer.
pub fn parent_pairs(paths: &[String]) -> Vec<(Entity, Entity)> {
	paths
		.iter()
		.filter_map(|p| parent_path(p).map(|parent| (Entity::file(p.clone()), Entity::file(parent))))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ancestor_paths_walks_to_root() {
		assert_eq!(ancestor_paths("/a/b/c"), vec!["/a/b".to_string(), "/a".to_string(), "/".to_string()]);
	}

	#[test]
	fn root_has_no_ancestors() {
		assert!(ancestor_paths("/").is_empty());
	}

	#[test]
	fn parent_pairs_skips_root_entries() {
		let paths = vec!["/".to_string(), "/a".to_string(), "/a/b".to_string()];
		let pairs = parent_pairs(&paths);
		assert_eq!(pairs.len(), 2);
		assert_eq!(pairs[0].0, Entity::file("/a"));
		assert_eq!(pairs[0].1, Entity::file("/"));
	}
}
