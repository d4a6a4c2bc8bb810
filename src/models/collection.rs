//! Collection tree data models.
//!
//! A collection is a named, ordered tree of folders and stored requests.
//! The tree is represented as eagerly-loaded plain values: flat folder and
//! request lists linked by parent/owner ids, so traversal and auth
//! inheritance are explicit algorithms over data rather than navigation of
//! a persistence layer.

use crate::auth::AuthConfig;
use crate::models::request::{HeaderEntry, HttpMethod, RequestBody};
use serde::{Deserialize, Serialize};

/// A stored request definition inside a collection.
///
/// This is the persisted shape of a request; the orchestrator turns it into
/// an executable [`crate::models::ProxyRequest`] at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDefinition {
    /// Unique identifier within the collection.
    pub id: String,

    /// Display name, also recorded on run iterations.
    pub name: String,

    /// Position among siblings. Lower sorts first.
    pub sort_order: i32,

    /// Id of the owning folder, or `None` for requests directly under the
    /// collection root.
    pub folder_id: Option<String>,

    /// HTTP method.
    pub method: HttpMethod,

    /// Target URL, possibly templated.
    pub url: String,

    /// Header rows in declaration order.
    pub headers: Vec<HeaderEntry>,

    /// Optional body.
    pub body: Option<RequestBody>,

    /// Per-request auth override. `None` or `Inherit` defers to the folder
    /// chain and finally the collection.
    pub auth: Option<AuthConfig>,

    /// User-authored script run before the HTTP call.
    pub pre_request_script: Option<String>,

    /// User-authored script run after the HTTP call.
    pub post_response_script: Option<String>,

    /// Whether redirects are followed for this request.
    pub follow_redirects: bool,
}

impl RequestDefinition {
    /// Creates a minimal request definition at the collection root.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        method: HttpMethod,
        url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sort_order: 0,
            folder_id: None,
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            auth: None,
            pre_request_script: None,
            post_response_script: None,
            follow_redirects: true,
        }
    }
}

/// A folder grouping sibling requests and subfolders.
///
/// Folders are themselves an auth and script scope: requests inside a folder
/// inherit its auth configuration (nearest ancestor wins) and run its
/// pre/post scripts around their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier within the collection.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Position among sibling folders. Lower sorts first.
    pub sort_order: i32,

    /// Id of the parent folder, or `None` for root folders.
    pub parent_id: Option<String>,

    /// Folder-level auth, inherited by contained requests without their own.
    pub auth: Option<AuthConfig>,

    /// Script run before each contained request's own pre-request script.
    pub pre_request_script: Option<String>,

    /// Script run after each contained request's own post-response script.
    pub post_response_script: Option<String>,
}

impl Folder {
    /// Creates a root folder with the given id, name, and sort order.
    pub fn new(id: impl Into<String>, name: impl Into<String>, sort_order: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sort_order,
            parent_id: None,
            auth: None,
            pre_request_script: None,
            post_response_script: None,
        }
    }
}

/// A named, ordered tree of folders and requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    /// Unique identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Collection-level auth, the last stop of the inheritance chain.
    pub auth: Option<AuthConfig>,

    /// Script run before every request in the collection.
    pub pre_request_script: Option<String>,

    /// Script run after every request in the collection.
    pub post_response_script: Option<String>,

    /// All folders of the tree, root and nested, linked by `parent_id`.
    pub folders: Vec<Folder>,

    /// All stored requests, linked to folders by `folder_id`.
    pub requests: Vec<RequestDefinition>,
}

impl Collection {
    /// Creates an empty collection.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            auth: None,
            pre_request_script: None,
            post_response_script: None,
            folders: Vec::new(),
            requests: Vec::new(),
        }
    }

    /// Looks up a folder by id.
    pub fn folder(&self, id: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    /// Looks up a stored request by id.
    pub fn request(&self, id: &str) -> Option<&RequestDefinition> {
        self.requests.iter().find(|r| r.id == id)
    }

    /// Returns the folders directly under the given parent (or the root when
    /// `parent_id` is `None`), sorted by their explicit sort order.
    pub fn child_folders(&self, parent_id: Option<&str>) -> Vec<&Folder> {
        let mut children: Vec<&Folder> = self
            .folders
            .iter()
            .filter(|f| f.parent_id.as_deref() == parent_id)
            .collect();
        children.sort_by_key(|f| f.sort_order);
        children
    }

    /// Returns the requests directly under the given folder (or the root when
    /// `folder_id` is `None`), sorted by their explicit sort order.
    pub fn folder_requests(&self, folder_id: Option<&str>) -> Vec<&RequestDefinition> {
        let mut requests: Vec<&RequestDefinition> = self
            .requests
            .iter()
            .filter(|r| r.folder_id.as_deref() == folder_id)
            .collect();
        requests.sort_by_key(|r| r.sort_order);
        requests
    }
}
