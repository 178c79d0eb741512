//! The filesystem façade.
//!
//! Implements the host tool's backend contract on top of the resolver, the
//! deposit uploader and the typed API client. One [`VaultFs`] exists per
//! configured remote; it owns the REST session, the deposit identifier and
//! the abnormal-exit hook.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use tokio::io::AsyncRead;
use tracing::debug;

use vault_api::{DepositStatus, NodeType, TreeNode, VaultApi};

use crate::config::VaultConfig;
use crate::error::BackendError;
use crate::pathutil::is_valid_path;
use crate::resolver::{self, base_name, join_abs, parent_path, resolve_path};
use crate::uploader::{DepositUploader, TerminationWatch, UploadedObject};

/// Metadata of an object about to be uploaded, supplied by the host tool.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Path relative to the backend root.
    pub remote: String,
    /// Size in bytes; `None` when the source backend cannot tell.
    pub size: Option<i64>,
    /// Source modification time.
    pub mod_time: DateTime<Utc>,
}

/// Quota usage as reported by `about`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub total: i64,
    pub used: i64,
    pub free: i64,
    pub objects: i64,
}

/// A file in the archive.
#[derive(Debug, Clone)]
pub struct VaultObject {
    remote: String,
    node: TreeNode,
}

impl VaultObject {
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn size(&self) -> i64 {
        self.node.object_size()
    }

    /// Tree-node path; unique for any object in the archive.
    pub fn id(&self) -> &str {
        &self.node.path
    }

    pub fn mime_type(&self) -> &str {
        self.node.mime_type()
    }

    pub fn md5(&self) -> Option<&str> {
        self.node.md5_sum.as_deref()
    }

    pub fn sha1(&self) -> Option<&str> {
        self.node.sha1_sum.as_deref()
    }

    pub fn sha256(&self) -> Option<&str> {
        self.node.sha256_sum.as_deref()
    }

    pub fn content_url(&self) -> Option<&str> {
        self.node.content_url.as_deref()
    }

    /// Server modification time; the epoch when missing or unparsable.
    pub fn mod_time(&self) -> DateTime<Utc> {
        self.node
            .modified_at_parsed()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// A collection or folder, something that can contain other entries.
#[derive(Debug, Clone)]
pub struct Directory {
    remote: String,
    node: TreeNode,
}

impl Directory {
    pub fn remote(&self) -> &str {
        &self.remote
    }

    pub fn id(&self) -> &str {
        &self.node.path
    }

    pub fn mod_time(&self) -> DateTime<Utc> {
        self.node
            .modified_at_parsed()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

/// A directory listing entry: either a directory or an object.
#[derive(Debug, Clone)]
pub enum DirEntry {
    Directory(Directory),
    Object(VaultObject),
}

impl DirEntry {
    pub fn remote(&self) -> &str {
        match self {
            DirEntry::Directory(dir) => dir.remote(),
            DirEntry::Object(obj) => obj.remote(),
        }
    }
}

/// The Vault remote filesystem.
#[derive(Debug)]
pub struct VaultFs {
    name: String,
    root: String,
    api: Arc<VaultApi>,
    uploader: Arc<DepositUploader>,
    watch: TerminationWatch,
}

impl VaultFs {
    /// Connects a new remote: logs in, gates on the API version and arms
    /// the abnormal-exit hook.
    pub async fn new(name: &str, root: &str, config: VaultConfig) -> Result<Self, BackendError> {
        let api = Arc::new(VaultApi::new(
            &config.endpoint_normalized(),
            &config.username,
            &config.password,
        )?);
        api.login().await?;
        api.check_version().await?;

        let root = join_abs("/", root);
        let uploader = Arc::new(DepositUploader::new(Arc::clone(&api), &root, &config));
        let watch = TerminationWatch::spawn(Arc::clone(&uploader));
        debug!(name, root = %root, "vault remote ready");
        Ok(Self {
            name: name.to_string(),
            root,
            api,
            uploader,
            watch,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    fn abs_path(&self, remote: &str) -> String {
        join_abs(&self.root, remote)
    }

    /// Lists the entries of `dir` (relative to the root; "" for the root).
    pub async fn list(&self, dir: &str) -> Result<Vec<DirEntry>, BackendError> {
        let abs = self.abs_path(dir);
        let node = match resolve_path(&self.api, &abs).await {
            Ok(node) => node,
            Err(BackendError::ObjectNotFound) => return Err(BackendError::DirNotFound),
            Err(other) => return Err(other),
        };
        match node.node_type {
            NodeType::File if dir.is_empty() => {
                let remote = node.name.clone();
                Ok(vec![DirEntry::Object(VaultObject { remote, node })])
            }
            NodeType::Organization | NodeType::Collection | NodeType::Folder => {
                let children = self.api.list_children(&node).await?;
                let mut entries = Vec::with_capacity(children.len());
                for child in children {
                    let remote = join_remote(dir, &child.name);
                    match child.node_type {
                        NodeType::Collection | NodeType::Folder => {
                            entries.push(DirEntry::Directory(Directory {
                                remote,
                                node: child,
                            }));
                        }
                        NodeType::File => {
                            entries.push(DirEntry::Object(VaultObject {
                                remote,
                                node: child,
                            }));
                        }
                        NodeType::Organization => {
                            // Exactly one organization exists and it is the
                            // root; a nested one would be a server bug.
                            debug!(id = child.id, "skipping nested organization node");
                        }
                    }
                }
                Ok(entries)
            }
            _ => Err(BackendError::DirNotFound),
        }
    }

    /// Finds the object at `remote`; a directory yields [`BackendError::IsDir`].
    pub async fn new_object(&self, remote: &str) -> Result<VaultObject, BackendError> {
        let abs = self.abs_path(remote);
        debug!(remote, abs = %abs, "new object");
        let node = resolve_path(&self.api, &abs).await?;
        match node.node_type {
            NodeType::File => Ok(VaultObject {
                remote: remote.to_string(),
                node,
            }),
            _ => Err(BackendError::IsDir),
        }
    }

    /// Uploads a new object. The first put of the process registers the
    /// deposit; all uploads append to it until shutdown.
    pub async fn put<R>(&self, reader: R, src: &SourceInfo) -> Result<VaultObject, BackendError>
    where
        R: AsyncRead + Unpin + Send,
    {
        // Validate before normalization so malformed input ("a//b", dot
        // segments) is rejected rather than silently cleaned up.
        let raw = format!("{}/{}", self.root.trim_end_matches('/'), src.remote);
        if !is_valid_path(&raw) {
            return Err(BackendError::InvalidPath(raw));
        }
        let abs = self.abs_path(&src.remote);
        debug!(remote = %src.remote, size = ?src.size, "put");
        let uploaded = self.uploader.upload(src, reader).await?;
        Ok(object_snapshot(&abs, uploaded))
    }

    /// Uploads from a stream of unknown length. The uploader spools to a
    /// temporary file to learn the size, so streaming costs nothing extra.
    pub async fn put_stream<R>(
        &self,
        reader: R,
        src: &SourceInfo,
    ) -> Result<VaultObject, BackendError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.put(reader, src).await
    }

    /// Opens an object's content for reading.
    pub async fn open(
        &self,
        remote: &str,
    ) -> Result<impl AsyncRead + Unpin + Send, BackendError> {
        let object = self.new_object(remote).await?;
        let url = object
            .content_url()
            .ok_or(BackendError::ObjectNotFound)?
            .to_string();
        let resp = self.api.download(&url).await?;
        let stream = Box::pin(
            resp.bytes_stream()
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err)),
        );
        Ok(tokio_util::io::StreamReader::new(stream))
    }

    /// Creates a directory (and missing parents). A no-op when it exists.
    pub async fn mkdir(&self, dir: &str) -> Result<(), BackendError> {
        resolver::mkdir(&self.api, &self.abs_path(dir)).await
    }

    /// Removes a FOLDER or COLLECTION.
    pub async fn rmdir(&self, dir: &str) -> Result<(), BackendError> {
        let abs = self.abs_path(dir);
        debug!(dir = %abs, "rmdir");
        let node = match resolve_path(&self.api, &abs).await {
            Ok(node) => node,
            Err(BackendError::ObjectNotFound) => return Err(BackendError::DirNotFound),
            Err(other) => return Err(other),
        };
        match node.node_type {
            NodeType::Folder | NodeType::Collection => Ok(self.api.delete_node(&node).await?),
            _ => Err(BackendError::DirNotFound),
        }
    }

    /// Removes an object.
    pub async fn remove(&self, object: &VaultObject) -> Result<(), BackendError> {
        debug!(id = object.node.id, "removing object");
        Ok(self.api.delete_node(&object.node).await?)
    }

    /// Server-side rename/move.
    ///
    /// Within one parent this is a rename; across parents the node moves,
    /// with the destination parent created when missing, followed by a
    /// rename when the basename changes.
    pub async fn move_to(&self, src_remote: &str, dst_remote: &str) -> Result<(), BackendError> {
        let src_abs = self.abs_path(src_remote);
        let dst_abs = self.abs_path(dst_remote);
        debug!(src = %src_abs, dst = %dst_abs, "move");
        let node = resolve_path(&self.api, &src_abs).await?;

        if parent_path(&src_abs) == parent_path(&dst_abs) {
            if base_name(&src_abs) != base_name(&dst_abs) {
                self.api.rename_node(&node, base_name(&dst_abs)).await?;
            }
            return Ok(());
        }

        let dst_parent = parent_path(&dst_abs);
        let dst_parent_node = match resolve_path(&self.api, &dst_parent).await {
            Ok(parent) => parent,
            Err(BackendError::ObjectNotFound) => {
                resolver::mkdir(&self.api, &dst_parent).await?;
                resolve_path(&self.api, &dst_parent).await?
            }
            Err(other) => return Err(other),
        };
        self.api.move_node(&node, &dst_parent_node).await?;
        if base_name(&src_abs) != base_name(&dst_abs) {
            self.api.rename_node(&node, base_name(&dst_abs)).await?;
        }
        Ok(())
    }

    /// Deletes a folder and its contents. Collections are kept; the
    /// archive treats them as administrative containers.
    pub async fn purge(&self, dir: &str) -> Result<(), BackendError> {
        let abs = self.abs_path(dir);
        let node = resolve_path(&self.api, &abs).await?;
        match node.node_type {
            NodeType::Folder => Ok(self.api.delete_node(&node).await?),
            _ => Err(BackendError::DirNotFound),
        }
    }

    /// Quota and usage: the organization's quota minus the bytes stored
    /// across its collections.
    pub async fn about(&self) -> Result<Usage, BackendError> {
        let organization = self.api.organization().await?;
        let stats = self.api.collection_stats().await?;
        let used = stats.total_size();
        Ok(Usage {
            total: organization.quota_bytes,
            used,
            free: organization.quota_bytes - used,
            objects: stats.num_files(),
        })
    }

    /// Account metadata composed from user, organization and plan.
    pub async fn user_info(&self) -> Result<BTreeMap<String, String>, BackendError> {
        let user = self.api.user().await?;
        let organization = self.api.organization().await?;
        let plan = self.api.plan().await?;
        let mut info = BTreeMap::new();
        info.insert("Username".into(), user.username);
        info.insert("FirstName".into(), user.first_name);
        info.insert("LastName".into(), user.last_name);
        info.insert("Organization".into(), organization.name);
        info.insert("Plan".into(), plan.name);
        info.insert(
            "DefaultFixityFrequency".into(),
            plan.default_fixity_frequency.unwrap_or_default(),
        );
        info.insert("QuotaBytes".into(), organization.quota_bytes.to_string());
        info.insert("LastLogin".into(), user.last_login.unwrap_or_default());
        Ok(info)
    }

    /// The download link for an object, if the server exposes one.
    pub async fn public_link(&self, remote: &str) -> Result<Option<String>, BackendError> {
        let node = resolve_path(&self.api, &self.abs_path(remote)).await?;
        Ok(node.content_url)
    }

    /// Ingested objects are immutable; the server keeps its own timestamp.
    pub async fn set_mod_time(&self, remote: &str, _mod_time: DateTime<Utc>) {
        debug!(remote, "not changing immutable treenode modification time");
    }

    /// Server-side counters for a deposit (the `deposit-status` command).
    pub async fn deposit_status(&self, deposit_id: i64) -> Result<DepositStatus, BackendError> {
        Ok(self.api.deposit_status(deposit_id).await?)
    }

    /// Current inflight deposit identifier, 0 when none.
    pub async fn inflight_deposit_id(&self) -> i64 {
        self.uploader.deposit_id().await
    }

    /// Recent upload throughput in bytes/second, for progress reporting.
    /// Always 0.0 when `suppress_progress_bar` is set.
    pub fn transfer_rate(&self) -> f64 {
        self.uploader.speed().bytes_per_second()
    }

    /// Finalizes the inflight deposit and releases the exit hook.
    ///
    /// Idempotent: after the first success there is nothing left to
    /// finalize and no further network call is made. Must not run
    /// concurrently with `put`; that ordering is the host tool's contract.
    pub async fn shutdown(&self) -> Result<(), BackendError> {
        self.uploader.finalize().await?;
        self.watch.release();
        Ok(())
    }

    /// Logs out and drops the session cookies.
    pub fn disconnect(&self) -> Result<(), BackendError> {
        debug!("disconnect");
        Ok(self.api.logout()?)
    }
}

impl std::fmt::Display for VaultFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

/// Builds the object snapshot returned by a successful put: the archive
/// serves authoritative metadata only after assembly, so the snapshot
/// carries the size and digests computed during upload.
fn object_snapshot(abs: &str, uploaded: UploadedObject) -> VaultObject {
    let node = TreeNode {
        id: 0,
        node_type: NodeType::File,
        name: base_name(abs).to_string(),
        parent: None,
        path: abs.to_string(),
        url: String::new(),
        content_url: None,
        size: Some(uploaded.size),
        file_type: None,
        md5_sum: Some(uploaded.digests.md5),
        sha1_sum: Some(uploaded.digests.sha1),
        sha256_sum: Some(uploaded.digests.sha256),
        modified_at: None,
        pre_deposit_modified_at: None,
        uploaded_at: None,
        uploaded_by: None,
        comment: None,
    };
    VaultObject {
        remote: uploaded.remote,
        node,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_remote_handles_root_listing() {
        assert_eq!(join_remote("", "photos"), "photos");
        assert_eq!(join_remote("photos", "2023"), "photos/2023");
    }

    #[test]
    fn object_snapshot_carries_digests() {
        let uploaded = UploadedObject {
            remote: "a/b.bin".into(),
            size: 5,
            digests: vault_transfer::Digests {
                md5: "m".into(),
                sha1: "s1".into(),
                sha256: "s2".into(),
            },
        };
        let object = object_snapshot("/photos/a/b.bin", uploaded);
        assert_eq!(object.remote(), "a/b.bin");
        assert_eq!(object.size(), 5);
        assert_eq!(object.md5(), Some("m"));
        assert_eq!(object.id(), "/photos/a/b.bin");
    }
}
