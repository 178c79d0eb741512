//! Wire types for the Vault REST API.
//!
//! Many scalar fields are nullable server-side; every one of them is an
//! explicit `Option` here. Resource references (`parent`, `organization`,
//! `plan`, `tree_node`) travel as hyperlinked URLs whose trailing segment is
//! the numeric identifier.

use serde::{Deserialize, Serialize};

/// The archive's node kinds. A closed set; behavior dispatches on this in a
/// single match wherever it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    Organization,
    Collection,
    Folder,
    File,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeType::Organization => "ORGANIZATION",
            NodeType::Collection => "COLLECTION",
            NodeType::Folder => "FOLDER",
            NodeType::File => "FILE",
        };
        f.write_str(name)
    }
}

/// The archive's universal hierarchical node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: i64,
    pub node_type: NodeType,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub md5_sum: Option<String>,
    #[serde(default)]
    pub sha1_sum: Option<String>,
    #[serde(default)]
    pub sha256_sum: Option<String>,
    #[serde(default)]
    pub modified_at: Option<String>,
    #[serde(default)]
    pub pre_deposit_modified_at: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<i64>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl TreeNode {
    /// Object size in bytes; directories report zero.
    pub fn object_size(&self) -> i64 {
        self.size.unwrap_or(0)
    }

    /// Server-reported content MIME, or the generic fallback.
    pub fn mime_type(&self) -> &str {
        self.file_type.as_deref().unwrap_or("application/octet-stream")
    }

    /// Parses the modification timestamp, if present and well-formed.
    pub fn modified_at_parsed(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let raw = self.modified_at.as_deref()?;
        chrono::DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc))
    }
}

/// A top-level named container beneath the organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub fixity_frequency: Option<String>,
    #[serde(default)]
    pub target_replication: Option<i64>,
    #[serde(default)]
    pub target_geolocations: Vec<Geolocation>,
    #[serde(default)]
    pub tree_node: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Collection {
    /// Numeric identifier parsed from the resource URL.
    pub fn identifier(&self) -> Option<i64> {
        trailing_id(self.url.as_deref()?)
    }

    /// Numeric identifier of the bound tree node.
    pub fn tree_node_identifier(&self) -> Option<i64> {
        trailing_id(self.tree_node.as_deref()?)
    }
}

/// A replication target location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Geolocation {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Account organization metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub name: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub quota_bytes: i64,
    #[serde(default)]
    pub tree_node: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Organization {
    pub fn plan_identifier(&self) -> Option<i64> {
        trailing_id(self.plan.as_deref()?)
    }

    pub fn tree_node_identifier(&self) -> Option<i64> {
        trailing_id(self.tree_node.as_deref()?)
    }
}

/// The authenticated archive user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub date_joined: Option<String>,
    #[serde(default)]
    pub last_login: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub url: Option<String>,
}

impl User {
    pub fn organization_identifier(&self) -> Option<i64> {
        trailing_id(self.organization.as_deref()?)
    }
}

/// Subscription plan of an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    #[serde(default)]
    pub default_fixity_frequency: Option<String>,
    #[serde(default)]
    pub default_geolocations: Vec<Geolocation>,
    #[serde(default)]
    pub default_replication: Option<i64>,
    #[serde(default)]
    pub price_per_terabyte: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Counters describing the server-side progress of a deposit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepositStatus {
    #[serde(default)]
    pub assembled_files: i64,
    #[serde(default)]
    pub errored_files: i64,
    #[serde(default)]
    pub file_queue: i64,
    #[serde(default)]
    pub in_storage_files: i64,
    #[serde(default)]
    pub total_files: i64,
    #[serde(default)]
    pub uploaded_files: i64,
}

/// Per-collection usage as served by the stats endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    #[serde(default)]
    pub collections: Vec<CollectionUsage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionUsage {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub file_count: i64,
    #[serde(default)]
    pub total_size: i64,
    #[serde(default)]
    pub time: Option<String>,
}

impl CollectionStats {
    /// Total bytes stored across all collections.
    pub fn total_size(&self) -> i64 {
        self.collections.iter().map(|c| c.total_size).sum()
    }

    /// Total file count across all collections.
    pub fn num_files(&self) -> i64 {
        self.collections.iter().map(|c| c.file_count).sum()
    }
}

/// Body of a register-deposit call.
///
/// Exactly one of `collection_id` / `parent_node_id` must be set. The
/// legacy v1 protocol preregisters the full file list; the v2 protocol
/// declares files implicitly through their chunks, so `files` stays `None`
/// there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDepositRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_node_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<DepositFile>>,
}

/// One prospective file in a v1 register-deposit request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositFile {
    pub name: String,
    pub flow_identifier: String,
    pub relative_path: String,
    pub size: i64,
    pub pre_deposit_modified_at: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
}

/// Paginated list envelope used by all list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Register-deposit response.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterDepositResponse {
    #[serde(alias = "depositId", default)]
    pub deposit_id: i64,
}

pub(crate) fn trailing_id(url: &str) -> Option<i64> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()?
        .parse::<i64>()
        .ok()
}
