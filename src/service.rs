// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Mutating services over the repositories.
//!
//! Bidirectional tag bindings are not a data-model invariant; they are kept
//! consistent here by an explicit two-step update that rolls the first side
//! back when the second fails.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::model::{Record, Tag, TaggedPage};
use crate::repo::Repository;
use crate::store::StoreError;
use crate::url_norm::same_resource;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Unknown tag '{0}'")]
    UnknownTag(String),
    #[error("Unknown page '{0}'")]
    UnknownPage(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct TagService {
    tags: Arc<Repository<Tag>>,
}

impl TagService {
    #[must_use]
    pub fn new(tags: Arc<Repository<Tag>>) -> Self {
        Self { tags }
    }

    /// Create and persist a new tag.
    pub async fn create(&self, name: impl Into<String>) -> Result<Tag, ServiceError> {
        let tag = Tag::new(name);
        self.tags.upsert(tag.clone()).await?;
        Ok(tag)
    }

    async fn load_live(&self, id: &str) -> Result<Tag, ServiceError> {
        match self.tags.get(id).await {
            Some(tag) if !tag.deleted => Ok(tag),
            _ => Err(ServiceError::UnknownTag(id.to_string())),
        }
    }

    /// Bind two tags to each other.
    ///
    /// Both sides are written; if the second write fails the first is
    /// restored from its pre-write snapshot so the binding never ends up
    /// one-sided. Binding a tag to itself or repeating an existing binding
    /// is a no-op.
    pub async fn bind(&self, a_id: &str, b_id: &str) -> Result<(), ServiceError> {
        if a_id == b_id {
            return Ok(());
        }
        let mut a = self.load_live(a_id).await?;
        let mut b = self.load_live(b_id).await?;
        if a.binds(b_id) && b.binds(a_id) {
            return Ok(());
        }

        let a_snapshot = a.clone();
        if !a.binds(b_id) {
            a.bindings.push(b_id.to_string());
        }
        a.touch();
        if !b.binds(a_id) {
            b.bindings.push(a_id.to_string());
        }
        b.touch();

        self.tags.upsert(a).await?;
        if let Err(e) = self.tags.upsert(b).await {
            warn!(a = a_id, b = b_id, error = %e, "Second binding write failed, rolling back");
            self.tags.upsert(a_snapshot).await?;
            return Err(e.into());
        }
        info!(a = a_id, b = b_id, "Tags bound");
        Ok(())
    }

    /// Remove the binding between two tags, both sides, with the same
    /// rollback rule as [`bind`](Self::bind).
    pub async fn unbind(&self, a_id: &str, b_id: &str) -> Result<(), ServiceError> {
        let mut a = self.load_live(a_id).await?;
        let mut b = self.load_live(b_id).await?;
        if !a.binds(b_id) && !b.binds(a_id) {
            return Ok(());
        }

        let a_snapshot = a.clone();
        a.bindings.retain(|id| id != b_id);
        a.touch();
        b.bindings.retain(|id| id != a_id);
        b.touch();

        self.tags.upsert(a).await?;
        if let Err(e) = self.tags.upsert(b).await {
            warn!(a = a_id, b = b_id, error = %e, "Second unbind write failed, rolling back");
            self.tags.upsert(a_snapshot).await?;
            return Err(e.into());
        }
        Ok(())
    }

    /// Tombstone a tag, unbinding it from every peer first so no live tag
    /// keeps pointing at a deleted one.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let tag = self.load_live(id).await?;
        for peer in &tag.bindings {
            if let Err(e) = self.unbind(id, peer).await {
                // A peer may itself be tombstoned already; deletion proceeds.
                warn!(tag = id, peer = %peer, error = %e, "Unbind during delete skipped");
            }
        }
        self.tags.remove(id).await?;
        info!(tag = id, "Tag tombstoned");
        Ok(())
    }
}

pub struct PageService {
    pages: Arc<Repository<TaggedPage>>,
}

impl PageService {
    #[must_use]
    pub fn new(pages: Arc<Repository<TaggedPage>>) -> Self {
        Self { pages }
    }

    /// Save a page, folding it into an existing record when one already
    /// covers the same canonical URL (identity is the canonical key, not the
    /// entity id).
    pub async fn save(&self, page: TaggedPage) -> Result<TaggedPage, ServiceError> {
        if let Some(existing) = self.find_by_url(&page.url).await {
            let mut merged = existing;
            merged.title = page.title;
            merged.tags = page.tags;
            merged.touch();
            self.pages.upsert(merged.clone()).await?;
            return Ok(merged);
        }
        self.pages.upsert(page.clone()).await?;
        Ok(page)
    }

    /// Find the live page matching a URL by canonical key.
    pub async fn find_by_url(&self, url: &str) -> Option<TaggedPage> {
        self.pages
            .active()
            .await
            .into_iter()
            .find(|p| same_resource(&p.url, url))
    }

    /// Apply an automated title refresh. A manually edited title is frozen
    /// and never overwritten here.
    pub async fn refresh_title(
        &self,
        id: &str,
        fetched_title: &str,
    ) -> Result<(), ServiceError> {
        let mut page = self
            .pages
            .get(id)
            .await
            .filter(|p| !p.deleted)
            .ok_or_else(|| ServiceError::UnknownPage(id.to_string()))?;
        if page.title_manually_edited {
            return Ok(());
        }
        if page.title == fetched_title {
            return Ok(());
        }
        page.title = fetched_title.to_string();
        page.touch();
        self.pages.upsert(page).await?;
        Ok(())
    }

    /// Set the title by user action and freeze it against automated refresh.
    pub async fn edit_title(&self, id: &str, title: &str) -> Result<(), ServiceError> {
        let mut page = self
            .pages
            .get(id)
            .await
            .filter(|p| !p.deleted)
            .ok_or_else(|| ServiceError::UnknownPage(id.to_string()))?;
        page.title = title.to_string();
        page.title_manually_edited = true;
        page.touch();
        self.pages.upsert(page).await?;
        Ok(())
    }

    /// Add a tag to a page's ordered tag set (duplicates ignored).
    pub async fn tag_page(&self, page_id: &str, tag_id: &str) -> Result<(), ServiceError> {
        let mut page = self
            .pages
            .get(page_id)
            .await
            .filter(|p| !p.deleted)
            .ok_or_else(|| ServiceError::UnknownPage(page_id.to_string()))?;
        if page.tags.iter().any(|t| t == tag_id) {
            return Ok(());
        }
        page.tags.push(tag_id.to_string());
        page.touch();
        self.pages.upsert(page).await?;
        Ok(())
    }

    /// Remove a tag from a page's tag set.
    pub async fn untag_page(&self, page_id: &str, tag_id: &str) -> Result<(), ServiceError> {
        let mut page = self
            .pages
            .get(page_id)
            .await
            .filter(|p| !p.deleted)
            .ok_or_else(|| ServiceError::UnknownPage(page_id.to_string()))?;
        let before = page.tags.len();
        page.tags.retain(|t| t != tag_id);
        if page.tags.len() == before {
            return Ok(());
        }
        page.touch();
        self.pages.upsert(page).await?;
        Ok(())
    }

    /// Tombstone a page.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.pages.remove(id).await?;
        Ok(())
    }
}
