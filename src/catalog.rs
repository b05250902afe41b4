//! Table-of-contents arena and breadcrumb resolution.
//!
//! The remote catalog is a flat list whose entries point at their parent by
//! uuid. [`Catalog`] keeps the entries in order and indexes them by uuid so a
//! document's ancestors can be collected by walking parent links.

use std::collections::HashMap;

use tracing::debug;

use crate::model::{Breadcrumb, CatalogEntry};

/// Upper bound on parent hops regardless of what the entry claims.
const MAX_WALK_STEPS: usize = 64;

/// Which catalog fields a client relies on to locate and walk an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreadcrumbMode {
    /// API v2 toc: match on `slug` (falling back to `url`), walk `depth - 1` hops.
    Depth,
    /// Web page state: match on `url`, walk `level` hops.
    Level,
}

/// Ordered catalog entries with a uuid lookup.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    by_uuid: HashMap<String, usize>,
}

impl Catalog {
    /// Builds the arena from the remote list, preserving order.
    #[must_use]
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let by_uuid = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.uuid.is_empty())
            .map(|(idx, entry)| (entry.uuid.clone(), idx))
            .collect();
        Self { entries, by_uuid }
    }

    /// Returns the entries in remote order.
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry by uuid.
    #[must_use]
    pub fn get(&self, uuid: &str) -> Option<&CatalogEntry> {
        self.by_uuid.get(uuid).map(|idx| &self.entries[*idx])
    }

    /// Finds the entry describing the document `slug`.
    #[must_use]
    pub fn find_doc(&self, slug: &str, mode: BreadcrumbMode) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| match mode {
            BreadcrumbMode::Depth => entry
                .slug
                .as_deref()
                .or(entry.url.as_deref())
                .is_some_and(|value| value == slug),
            BreadcrumbMode::Level => entry.url.as_deref() == Some(slug),
        })
    }

    /// Resolves the ancestor titles of `slug`, root first.
    ///
    /// Returns an empty path when the document is not in the catalog. The walk
    /// stops early at a dangling parent reference and never exceeds
    /// the catalog size.
    #[must_use]
    pub fn breadcrumb(&self, slug: &str, mode: BreadcrumbMode) -> Vec<Breadcrumb> {
        let Some(entry) = self.find_doc(slug, mode) else {
            debug!(slug, "document not present in catalog");
            return Vec::new();
        };

        let steps = match mode {
            BreadcrumbMode::Depth => entry.depth.saturating_sub(1) as usize,
            BreadcrumbMode::Level => entry.level as usize,
        };
        let cap = steps.min(self.entries.len()).min(MAX_WALK_STEPS);

        let mut path = Vec::with_capacity(cap);
        let mut parent = entry.parent_uuid.clone();
        for _ in 0..cap {
            let Some(current) = parent.as_deref().and_then(|uuid| self.get(uuid)) else {
                debug!(slug, ?parent, "breadcrumb walk hit a missing parent");
                break;
            };
            path.push(Breadcrumb {
                title: current.title.clone(),
                doc_id: slug.to_string(),
            });
            parent.clone_from(&current.parent_uuid);
        }
        path.reverse();
        path
    }
}
