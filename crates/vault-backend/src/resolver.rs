//! Absolute-path to tree-node resolution.
//!
//! The archive has no path-lookup endpoint; paths resolve by walking the
//! fixed ORGANIZATION → COLLECTION → FOLDER → FILE hierarchy one segment at
//! a time. Resolved nodes are value snapshots; no reference graph is kept.

use tracing::debug;

use vault_api::{NodeType, TreeNode, VaultApi};

use crate::error::BackendError;

/// Splits an absolute slash path into its non-empty segments.
pub(crate) fn path_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Joins a backend root and a remote path into an absolute path.
pub(crate) fn join_abs(root: &str, remote: &str) -> String {
    let joined = format!("{}/{}", root.trim_end_matches('/'), remote);
    let segments = path_segments(&joined);
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Returns the basename of an absolute path.
pub(crate) fn base_name(path: &str) -> &str {
    path_segments(path).last().copied().unwrap_or("")
}

/// Returns the parent path of an absolute path ("/" at the top).
pub(crate) fn parent_path(path: &str) -> String {
    let mut segments = path_segments(path);
    segments.pop();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Resolves `abs_path` to its tree node, or [`BackendError::ObjectNotFound`].
///
/// "/" resolves to the organization node.
pub async fn resolve_path(api: &VaultApi, abs_path: &str) -> Result<TreeNode, BackendError> {
    let mut node = api.root_node().await.map_err(BackendError::from_lookup)?;
    for segment in path_segments(abs_path) {
        let matches = api
            .find_tree_nodes(&[("parent", node.id.to_string()), ("name", segment.into())])
            .await?;
        node = matches
            .into_iter()
            .next()
            .ok_or(BackendError::ObjectNotFound)?;
    }
    Ok(node)
}

/// Creates the directory at `abs_path`, including missing parents.
///
/// A missing segment directly under the organization becomes a COLLECTION;
/// deeper segments become FOLDERs. Existing directories are accepted
/// silently; a pre-existing FILE anywhere on the path is an error.
pub async fn mkdir(api: &VaultApi, abs_path: &str) -> Result<(), BackendError> {
    debug!(path = abs_path, "mkdir");
    let segments = path_segments(abs_path);
    if segments.is_empty() {
        return Err(BackendError::CannotCreateAtRoot);
    }

    match resolve_path(api, abs_path).await {
        Ok(node) => {
            return match node.node_type {
                NodeType::Folder | NodeType::Collection => Ok(()),
                _ => Err(BackendError::PathAlreadyExists(format!(
                    "{abs_path} [{}]",
                    node.node_type
                ))),
            };
        }
        Err(BackendError::ObjectNotFound) => {}
        Err(other) => return Err(other),
    }

    let mut parent = api.root_node().await.map_err(BackendError::from_lookup)?;
    for segment in segments {
        let existing = api
            .find_tree_nodes(&[("parent", parent.id.to_string()), ("name", segment.into())])
            .await?
            .into_iter()
            .next();
        match existing {
            Some(node) if node.node_type == NodeType::File => {
                return Err(BackendError::PathAlreadyExists(format!(
                    "{segment} [FILE]"
                )));
            }
            Some(node) => {
                parent = node;
                continue;
            }
            None => {}
        }
        match parent.node_type {
            NodeType::Organization => api.create_collection(segment).await?,
            _ => api.create_folder(&parent, segment).await?,
        }
        parent = api
            .find_tree_nodes(&[("parent", parent.id.to_string()), ("name", segment.into())])
            .await?
            .into_iter()
            .next()
            .ok_or(BackendError::ObjectNotFound)?;
    }
    Ok(())
}
