//! Typed operations over the session transport.
//!
//! Each method either returns a decoded payload or an [`ApiError`] carrying
//! the HTTP status and the server's message. List queries are bounded and
//! only the documented filter keys are accepted; anything else is a
//! programming error surfaced before any I/O happens.

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use tracing::debug;

use crate::cache::Cache;
use crate::error::ApiError;
use crate::session::{expect_json, expect_ok, Session, UPLOAD_CHUNK_TIMEOUT};
use crate::types::{
    Collection, CollectionStats, DepositStatus, ListResponse, NodeType, Organization, Plan,
    RegisterDepositRequest, RegisterDepositResponse, TreeNode, User,
};

/// Upper bound for all list queries.
const LIST_LIMIT: i64 = 5000;

/// Metadata accompanying one chunk POST. All fields are required by the
/// server and travel stringly-typed in the multipart body.
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub deposit_id: i64,
    /// 1-based chunk index.
    pub chunk_number: i64,
    /// Configured nominal chunk size in bytes.
    pub chunk_size: i64,
    /// Actual bytes in this chunk.
    pub current_chunk_size: i64,
    /// Base name of the source file.
    pub filename: String,
    pub flow_identifier: String,
    /// Source's remote path.
    pub relative_path: String,
    pub total_chunks: i64,
    pub total_size: i64,
    /// Detected MIME of the first chunk, or `application/octet-stream`.
    pub mimetype: String,
    /// Source modification time, RFC-3339.
    pub user_mtime: String,
}

/// Typed client for the archive's REST API.
#[derive(Debug)]
pub struct VaultApi {
    session: Session,
    username: String,
    user_cache: Cache<User>,
    org_cache: Cache<Organization>,
    plan_cache: Cache<Plan>,
}

impl VaultApi {
    pub fn new(endpoint: &str, username: &str, password: &str) -> Result<Self, ApiError> {
        Ok(Self {
            session: Session::new(endpoint, username, password)?,
            username: username.to_string(),
            user_cache: Cache::new(),
            org_cache: Cache::new(),
            plan_cache: Cache::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn login(&self) -> Result<(), ApiError> {
        self.session.login().await
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.user_cache.reset();
        self.org_cache.reset();
        self.plan_cache.reset();
        self.session.logout()
    }

    pub async fn check_version(&self) -> Result<(), ApiError> {
        self.session.check_version().await
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.session.endpoint(), suffix)
    }

    // Tree nodes
    // ----------

    /// Queries tree nodes. Documented filter keys: `parent`, `name`.
    pub async fn find_tree_nodes(
        &self,
        filters: &[(&str, String)],
    ) -> Result<Vec<TreeNode>, ApiError> {
        let mut query: Vec<(&str, String)> = vec![("limit", LIST_LIMIT.to_string())];
        for (key, value) in filters {
            match *key {
                "parent" | "name" => query.push((key, value.clone())),
                other => return Err(ApiError::UnsupportedFilter(other.to_string())),
            }
        }
        let resp = self
            .session
            .request(Method::GET, &self.url("/treenodes/"))
            .query(&query)
            .send()
            .await?;
        let list: ListResponse<TreeNode> = expect_json(resp).await?;
        Ok(list.results)
    }

    /// Retrieves a single tree node by identifier.
    pub async fn get_tree_node(&self, id: i64) -> Result<TreeNode, ApiError> {
        let resp = self
            .session
            .request(Method::GET, &self.url(&format!("/treenodes/{id}/")))
            .send()
            .await?;
        expect_json(resp).await
    }

    /// Lists the children of a node.
    pub async fn list_children(&self, node: &TreeNode) -> Result<Vec<TreeNode>, ApiError> {
        self.find_tree_nodes(&[("parent", node.id.to_string())])
            .await
    }

    /// Creates a top-level collection. Idempotent by name within the
    /// organization.
    pub async fn create_collection(&self, name: &str) -> Result<(), ApiError> {
        debug!(name, "create collection");
        let resp = self
            .session
            .mutating_request(Method::POST, &self.url("/collections/"))
            .await?
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        expect_ok(resp).await
    }

    /// Creates a folder under `parent` (a COLLECTION or FOLDER node).
    pub async fn create_folder(&self, parent: &TreeNode, name: &str) -> Result<(), ApiError> {
        debug!(name, parent = parent.id, "create folder");
        let resp = self
            .session
            .mutating_request(Method::POST, &self.url("/treenodes/"))
            .await?
            .json(&serde_json::json!({
                "name": name,
                "node_type": NodeType::Folder,
                "parent": parent.url,
            }))
            .send()
            .await?;
        expect_ok(resp).await
    }

    /// Renames a node. Sends only the `name` field: the server rejects any
    /// update that mentions an immutable column, even with a null value.
    pub async fn rename_node(&self, node: &TreeNode, name: &str) -> Result<(), ApiError> {
        debug!(id = node.id, name, "rename node");
        let resp = self
            .session
            .mutating_request(Method::PATCH, &self.url(&format!("/treenodes/{}/", node.id)))
            .await?
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        expect_ok(resp).await
    }

    /// Moves a node under a new parent. Same minimal-payload rule as
    /// [`rename_node`](Self::rename_node).
    pub async fn move_node(&self, node: &TreeNode, new_parent: &TreeNode) -> Result<(), ApiError> {
        debug!(id = node.id, parent = new_parent.id, "move node");
        let resp = self
            .session
            .mutating_request(Method::PATCH, &self.url(&format!("/treenodes/{}/", node.id)))
            .await?
            .json(&serde_json::json!({ "parent": new_parent.url }))
            .send()
            .await?;
        expect_ok(resp).await
    }

    /// Deletes a node.
    pub async fn delete_node(&self, node: &TreeNode) -> Result<(), ApiError> {
        debug!(id = node.id, "delete node");
        let resp = self
            .session
            .mutating_request(
                Method::DELETE,
                &self.url(&format!("/treenodes/{}/", node.id)),
            )
            .await?
            .send()
            .await?;
        expect_ok(resp).await
    }

    // Collections
    // -----------

    /// Queries collections. Documented filter keys: `tree_node`, `name`.
    pub async fn find_collections(
        &self,
        filters: &[(&str, String)],
    ) -> Result<Vec<Collection>, ApiError> {
        let mut query: Vec<(&str, String)> = vec![("limit", LIST_LIMIT.to_string())];
        for (key, value) in filters {
            match *key {
                "tree_node" | "name" => query.push((key, value.clone())),
                other => return Err(ApiError::UnsupportedFilter(other.to_string())),
            }
        }
        let resp = self
            .session
            .request(Method::GET, &self.url("/collections/"))
            .query(&query)
            .send()
            .await?;
        let list: ListResponse<Collection> = expect_json(resp).await?;
        Ok(list.results)
    }

    /// Resolves the collection bound to a COLLECTION tree node.
    pub async fn tree_node_to_collection(
        &self,
        node: &TreeNode,
    ) -> Result<Option<Collection>, ApiError> {
        let mut found = self
            .find_collections(&[("tree_node", node.id.to_string())])
            .await?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(Some(found.remove(0))),
            n => Err(ApiError::AmbiguousQuery(n)),
        }
    }

    /// Per-collection usage counters.
    pub async fn collection_stats(&self) -> Result<CollectionStats, ApiError> {
        let resp = self
            .session
            .request(Method::GET, &self.url("/collections_stats"))
            .send()
            .await?;
        expect_json(resp).await
    }

    // Account
    // -------

    /// The authenticated user. Cached for the process lifetime.
    pub async fn user(&self) -> Result<User, ApiError> {
        if let Some(user) = self.user_cache.get(&self.username) {
            return Ok(user);
        }
        let resp = self
            .session
            .request(Method::GET, &self.url("/users/"))
            .query(&[("username", self.username.as_str()), ("limit", "1")])
            .send()
            .await?;
        let list: ListResponse<User> = expect_json(resp).await?;
        match list.count {
            0 => Err(ApiError::UserNotFound(self.username.clone())),
            1 => {
                let user = list.results.into_iter().next().ok_or_else(|| {
                    ApiError::UserNotFound(self.username.clone())
                })?;
                self.user_cache.set(&self.username, user.clone());
                Ok(user)
            }
            n => Err(ApiError::AmbiguousQuery(n as usize)),
        }
    }

    /// The user's organization. Cached.
    pub async fn organization(&self) -> Result<Organization, ApiError> {
        if let Some(org) = self.org_cache.get("organization") {
            return Ok(org);
        }
        let user = self.user().await?;
        let id = user.organization_identifier().ok_or(ApiError::Api {
            status: 200,
            body: "user record carries no organization link".into(),
        })?;
        let resp = self
            .session
            .request(Method::GET, &self.url(&format!("/organizations/{id}/")))
            .send()
            .await?;
        let org: Organization = expect_json(resp).await?;
        self.org_cache.set("organization", org.clone());
        Ok(org)
    }

    /// The organization's plan. Cached.
    pub async fn plan(&self) -> Result<Plan, ApiError> {
        if let Some(plan) = self.plan_cache.get("plan") {
            return Ok(plan);
        }
        let org = self.organization().await?;
        let id = org.plan_identifier().ok_or(ApiError::Api {
            status: 200,
            body: "organization record carries no plan link".into(),
        })?;
        let resp = self
            .session
            .request(Method::GET, &self.url(&format!("/plans/{id}/")))
            .send()
            .await?;
        let plan: Plan = expect_json(resp).await?;
        self.plan_cache.set("plan", plan.clone());
        Ok(plan)
    }

    /// The organization's tree node, i.e. the root of the hierarchy.
    pub async fn root_node(&self) -> Result<TreeNode, ApiError> {
        let org = self.organization().await?;
        let id = org.tree_node_identifier().ok_or(ApiError::Api {
            status: 200,
            body: "organization record carries no tree node link".into(),
        })?;
        self.get_tree_node(id).await
    }

    /// Streams the content behind a node's content URL.
    pub async fn download(&self, url: &str) -> Result<reqwest::Response, ApiError> {
        let resp = self.session.request(Method::GET, url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    // Deposits
    // --------

    /// Registers a deposit and returns its identifier (> 0).
    pub async fn register_deposit(
        &self,
        request: &RegisterDepositRequest,
    ) -> Result<i64, ApiError> {
        let resp = self
            .session
            .mutating_request(Method::POST, &self.url("/deposits/v2/register_deposit"))
            .await?
            .json(request)
            .send()
            .await?;
        let decoded: RegisterDepositResponse = expect_json(resp).await?;
        Ok(decoded.deposit_id)
    }

    /// Sends one chunk of one file. The part name is derived from the flow
    /// identifier so the server can reorder and dedupe chunks.
    pub async fn send_chunk(&self, meta: &ChunkMeta, data: Vec<u8>) -> Result<(), ApiError> {
        let part = Part::bytes(data)
            .file_name(format!("{}-{:016}", meta.flow_identifier, meta.chunk_number));
        let form = Form::new()
            .text("depositId", meta.deposit_id.to_string())
            .text("flowChunkNumber", meta.chunk_number.to_string())
            .text("flowChunkSize", meta.chunk_size.to_string())
            .text("flowCurrentChunkSize", meta.current_chunk_size.to_string())
            .text("flowFilename", meta.filename.clone())
            .text("flowIdentifier", meta.flow_identifier.clone())
            .text("flowRelativePath", meta.relative_path.clone())
            .text("flowTotalChunks", meta.total_chunks.to_string())
            .text("flowTotalSize", meta.total_size.to_string())
            .text("flowMimetype", meta.mimetype.clone())
            .text("flowUserMtime", meta.user_mtime.clone())
            .part("file", part);
        let resp = self
            .session
            .mutating_request(Method::POST, &self.url("/deposits/v2/send_chunk"))
            .await?
            .timeout(UPLOAD_CHUNK_TIMEOUT)
            .multipart(form)
            .send()
            .await?;
        expect_ok(resp).await
    }

    /// Transitions the deposit to COMPLETED. Must be called exactly once.
    pub async fn finalize_deposit(&self, deposit_id: i64) -> Result<(), ApiError> {
        debug!(deposit_id, "finalize deposit");
        let resp = self
            .session
            .mutating_request(Method::POST, &self.url("/deposits/v2/finalize_deposit"))
            .await?
            .json(&serde_json::json!({ "depositId": deposit_id }))
            .send()
            .await?;
        expect_ok(resp).await
    }

    /// Cancels an in-flight deposit.
    pub async fn terminate_deposit(&self, deposit_id: i64) -> Result<(), ApiError> {
        debug!(deposit_id, "terminate deposit");
        let resp = self
            .session
            .mutating_request(Method::POST, &self.url("/deposits/v2/terminate_deposit"))
            .await?
            .json(&serde_json::json!({ "depositId": deposit_id }))
            .send()
            .await?;
        expect_ok(resp).await
    }

    /// Server-side counters for a deposit.
    pub async fn deposit_status(&self, deposit_id: i64) -> Result<DepositStatus, ApiError> {
        let resp = self
            .session
            .request(Method::GET, &self.url("/deposit_status"))
            .query(&[("deposit_id", deposit_id.to_string())])
            .send()
            .await?;
        expect_json(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> VaultApi {
        VaultApi::new(&format!("{}/api", server.uri()), "admin", "hunter2").unwrap()
    }

    /// Every mutating call scrapes a token from the API root first.
    async fn mount_csrf(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"csrfToken: "tok-1""#),
            )
            .mount(server)
            .await;
    }

    fn node(id: i64, node_type: NodeType, name: &str, url: &str) -> TreeNode {
        TreeNode {
            id,
            node_type,
            name: name.into(),
            parent: None,
            path: format!("/{name}"),
            url: url.into(),
            content_url: None,
            size: None,
            file_type: None,
            md5_sum: None,
            sha1_sum: None,
            sha256_sum: None,
            modified_at: None,
            pre_deposit_modified_at: None,
            uploaded_at: None,
            uploaded_by: None,
            comment: None,
        }
    }

    #[tokio::test]
    async fn find_tree_nodes_rejects_unknown_filter() {
        let server = MockServer::start().await;
        let api = api_for(&server);
        let err = api
            .find_tree_nodes(&[("owner", "1".into())])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedFilter(k) if k == "owner"));
        // No request reached the server.
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_collections_rejects_unknown_filter() {
        let server = MockServer::start().await;
        let api = api_for(&server);
        let err = api
            .find_collections(&[("parent", "1".into())])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedFilter(_)));
    }

    #[tokio::test]
    async fn find_tree_nodes_bounds_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/treenodes/"))
            .and(query_param("limit", "5000"))
            .and(query_param("parent", "3"))
            .and(query_param("name", "docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 1,
                "results": [{"id": 9, "node_type": "FOLDER", "name": "docs"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let nodes = api
            .find_tree_nodes(&[("parent", "3".into()), ("name", "docs".into())])
            .await
            .unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, 9);
        assert_eq!(nodes[0].node_type, NodeType::Folder);
    }

    #[tokio::test]
    async fn create_collection_posts_with_token() {
        let server = MockServer::start().await;
        mount_csrf(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/collections/"))
            .and(wiremock::matchers::header("X-CSRFTOKEN", "tok-1"))
            .and(body_string_contains("annual-reports"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        api.create_collection("annual-reports").await.unwrap();
    }

    #[tokio::test]
    async fn create_folder_references_parent_url() {
        let server = MockServer::start().await;
        mount_csrf(&server).await;
        let parent_url = format!("{}/api/treenodes/4/", server.uri());
        Mock::given(method("POST"))
            .and(path("/api/treenodes/"))
            .and(body_string_contains("FOLDER"))
            .and(body_string_contains(&parent_url))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let parent = node(4, NodeType::Collection, "photos", &parent_url);
        api.create_folder(&parent, "2023").await.unwrap();
    }

    #[tokio::test]
    async fn rename_sends_only_name() {
        let server = MockServer::start().await;
        mount_csrf(&server).await;
        Mock::given(method("PATCH"))
            .and(path("/api/treenodes/7/"))
            .and(wiremock::matchers::body_json(
                serde_json::json!({"name": "renamed"}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let target = node(7, NodeType::Folder, "old", "");
        api.rename_node(&target, "renamed").await.unwrap();
    }

    #[tokio::test]
    async fn move_sends_only_parent() {
        let server = MockServer::start().await;
        mount_csrf(&server).await;
        let parent_url = format!("{}/api/treenodes/2/", server.uri());
        Mock::given(method("PATCH"))
            .and(path("/api/treenodes/7/"))
            .and(wiremock::matchers::body_json(
                serde_json::json!({"parent": parent_url}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let target = node(7, NodeType::File, "f", "");
        let new_parent = node(2, NodeType::Folder, "p", &parent_url);
        api.move_node(&target, &new_parent).await.unwrap();
    }

    #[tokio::test]
    async fn delete_node_issues_delete() {
        let server = MockServer::start().await;
        mount_csrf(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/api/treenodes/5/"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        api.delete_node(&node(5, NodeType::Folder, "d", ""))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn user_lookup_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/"))
            .and(query_param("username", "admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 1,
                "results": [{"username": "admin", "first_name": "Ada"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let first = api.user().await.unwrap();
        let second = api.user().await.unwrap();
        assert_eq!(first.first_name, "Ada");
        assert_eq!(second.username, "admin");
    }

    #[tokio::test]
    async fn unknown_user_maps_to_user_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 0,
                "results": []
            })))
            .mount(&server)
            .await;

        let api = api_for(&server);
        assert!(matches!(
            api.user().await,
            Err(ApiError::UserNotFound(u)) if u == "admin"
        ));
    }

    #[tokio::test]
    async fn register_deposit_returns_identifier() {
        let server = MockServer::start().await;
        mount_csrf(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/deposits/v2/register_deposit"))
            .and(wiremock::matchers::body_json(
                serde_json::json!({"collectionId": 12}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"deposit_id": 77})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let id = api
            .register_deposit(&RegisterDepositRequest {
                collection_id: Some(12),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(id, 77);
    }

    #[tokio::test]
    async fn send_chunk_carries_all_flow_fields() {
        let server = MockServer::start().await;
        mount_csrf(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/deposits/v2/send_chunk"))
            .and(body_string_contains("depositId"))
            .and(body_string_contains("flowChunkNumber"))
            .and(body_string_contains("flowChunkSize"))
            .and(body_string_contains("flowCurrentChunkSize"))
            .and(body_string_contains("flowFilename"))
            .and(body_string_contains("flowIdentifier"))
            .and(body_string_contains("flowRelativePath"))
            .and(body_string_contains("flowTotalChunks"))
            .and(body_string_contains("flowTotalSize"))
            .and(body_string_contains("flowMimetype"))
            .and(body_string_contains("flowUserMtime"))
            .and(body_string_contains(
                "rclone-vault-flow-00000000000000000000000000000000-0000000000000001",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let meta = ChunkMeta {
            deposit_id: 77,
            chunk_number: 1,
            chunk_size: 1 << 20,
            current_chunk_size: 5,
            filename: "a.bin".into(),
            flow_identifier: "rclone-vault-flow-00000000000000000000000000000000".into(),
            relative_path: "dir/a.bin".into(),
            total_chunks: 1,
            total_size: 5,
            mimetype: "application/octet-stream".into(),
            user_mtime: "2023-05-02T10:30:00+00:00".into(),
        };
        api.send_chunk(&meta, b"hello".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn finalize_and_terminate_post_deposit_id() {
        let server = MockServer::start().await;
        mount_csrf(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/deposits/v2/finalize_deposit"))
            .and(wiremock::matchers::body_json(
                serde_json::json!({"depositId": 9}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/deposits/v2/terminate_deposit"))
            .and(wiremock::matchers::body_json(
                serde_json::json!({"depositId": 9}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        api.finalize_deposit(9).await.unwrap();
        api.terminate_deposit(9).await.unwrap();
    }

    #[tokio::test]
    async fn deposit_status_decodes_counters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/deposit_status"))
            .and(query_param("deposit_id", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "assembled_files": 2,
                "errored_files": 0,
                "file_queue": 1,
                "in_storage_files": 2,
                "total_files": 5,
                "uploaded_files": 4
            })))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let status = api.deposit_status(4).await.unwrap();
        assert_eq!(status.total_files, 5);
        assert_eq!(status.uploaded_files, 4);
        assert_eq!(status.file_queue, 1);
    }

    #[tokio::test]
    async fn api_errors_carry_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/treenodes/1/"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"detail": "Not Found"}"#))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let err = api.get_tree_node(1).await.unwrap_err();
        match err {
            ApiError::Api { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("Not Found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
