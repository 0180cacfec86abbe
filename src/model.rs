//! Entity model for the two synchronized collections.
//!
//! Records are never hard-deleted by ordinary sync: deletion sets the
//! `deleted` tombstone and bumps `updated_at` so the deletion propagates to
//! other devices instead of resurrecting as a "zombie" record.

use serde::{Deserialize, Serialize};

/// Current wall clock as epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The two synchronized entity collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Tags,
    Pages,
}

impl EntityKind {
    /// Remote table / local collection name.
    #[must_use]
    pub fn table(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Pages => "pages",
        }
    }

    pub const ALL: [EntityKind; 2] = [Self::Tags, Self::Pages];
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table())
    }
}

/// Uniform view of a synchronized record.
///
/// Both entity types expose the fields the merge and push logic needs:
/// stable id, logical timestamps, and the tombstone flag.
pub trait Record: Clone + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn updated_at(&self) -> i64;
    fn created_at(&self) -> i64;
    fn is_deleted(&self) -> bool;

    /// Mark deleted and bump `updated_at` so the tombstone wins downstream.
    fn tombstone(&mut self);

    /// Bump `updated_at`, keeping `updated_at >= created_at`.
    fn touch(&mut self);
}

/// A user-defined label.
///
/// `bindings` holds ids of associated tags. Bidirectionality (A binds B iff
/// B binds A) is maintained transactionally by [`crate::service::TagService`],
/// not by this type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub bindings: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub deleted: bool,
}

impl Tag {
    /// Create a new tag with a fresh v4 id and matching timestamps.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            color: None,
            description: None,
            bindings: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }

    /// Whether this tag binds `other`.
    #[must_use]
    pub fn binds(&self, other: &str) -> bool {
        self.bindings.iter().any(|b| b == other)
    }
}

impl Record for Tag {
    const KIND: EntityKind = EntityKind::Tags;

    fn id(&self) -> &str {
        &self.id
    }
    fn updated_at(&self) -> i64 {
        self.updated_at
    }
    fn created_at(&self) -> i64 {
        self.created_at
    }
    fn is_deleted(&self) -> bool {
        self.deleted
    }
    fn tombstone(&mut self) {
        self.deleted = true;
        self.touch();
    }
    fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at + 1).max(self.created_at);
    }
}

/// A labeled web resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaggedPage {
    pub id: String,
    pub url: String,
    pub title: String,
    pub domain: String,
    /// Ordered tag ids; duplicates are not meaningful.
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub deleted: bool,
    /// Once true, automated title refresh must never overwrite `title`.
    #[serde(default)]
    pub title_manually_edited: bool,
}

impl TaggedPage {
    /// Create a new page with a fresh v4 id; `domain` is derived from the URL.
    #[must_use]
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        let url = url.into();
        let domain = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let now = now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url,
            title: title.into(),
            domain,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted: false,
            title_manually_edited: false,
        }
    }
}

impl Record for TaggedPage {
    const KIND: EntityKind = EntityKind::Pages;

    fn id(&self) -> &str {
        &self.id
    }
    fn updated_at(&self) -> i64 {
        self.updated_at
    }
    fn created_at(&self) -> i64 {
        self.created_at
    }
    fn is_deleted(&self) -> bool {
        self.deleted
    }
    fn tombstone(&mut self) {
        self.deleted = true;
        self.touch();
    }
    fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at + 1).max(self.created_at);
    }
}
