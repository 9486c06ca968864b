//! crates/lorelog_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The authenticated caller, as supplied by the identity collaborator.
///
/// Only `user_id` is required. Email and name are carried along so the file
/// store can keep its denormalized owner columns up to date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Principal {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            email: None,
            name: None,
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Stored lowercased; uniqueness is case-insensitive.
    pub email: Option<String>,
    pub name: Option<String>,
    pub invite_accepted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Id of a user known only by email, as created by the file-store
    /// import. Stable per lowercased email, so a store can recognise such a
    /// user and hand its articles over to the authenticated identity that
    /// later presents the same email.
    pub fn imported_id(email: &str) -> Uuid {
        let email = email.trim().to_lowercase();
        Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("lorelog/user/{}", email).as_bytes())
    }
}

/// A saved URL belonging to exactly one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    /// Character count of the extracted page body.
    pub body_length: Option<u32>,
    /// JSON-encoded numeric array, see [`crate::similarity::parse_embedding`].
    pub embedding: Option<String>,
    /// Flattened names of the attached tags, in attach order.
    pub tags: Vec<String>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// A canonical label shared across all users.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// Fields accepted by `ArticleStore::create_article`. The store assigns the
/// id and, unless overridden, both timestamps.
#[derive(Debug, Clone, Default)]
pub struct NewArticle {
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    pub body_length: Option<u32>,
    pub embedding: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
    /// Only set by the import path, which preserves the original save time.
    pub created_at: Option<DateTime<Utc>>,
    pub owner_email: Option<String>,
    pub owner_name: Option<String>,
}

/// A partial update. `None` leaves the stored value untouched, so a patch can
/// never null out a field that already holds data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub body_length: Option<u32>,
    pub embedding: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which backend is serving the `ArticleStore` contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Database,
    File,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Database => "db",
            StorageKind::File => "fallback",
        }
    }
}

/// Page metadata returned by the fetch collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub body_length: u32,
}

/// Result of attaching a set of tag names to an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagMergeOutcome {
    pub added: usize,
    pub total: usize,
}
