//! In-process document store with a change-data-capture feed.
//!
//! Each collection is a sharded map of documents plus a broadcast feed of
//! change events. Updates run as read-clone-mutate-commit under the
//! document's entry lock, so a mutation is per-document atomic, never
//! partially applied, and immediately visible to the caller's next read.
//! Publications subscribe to the feed and re-evaluate their predicates per
//! event, which is what keeps live result sets monotonically consistent.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::{AppError, AppResult};
use crate::models::{Chat, ErrorReport, Place, Ride, SCHEMA_STABLE_IDS};

/// Feed capacity before slow subscribers start lagging. A lagged publication
/// resynchronizes from a fresh snapshot instead of dropping deltas.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// A record stored in a [`Collection`].
pub trait Document: Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> &str;

    /// Schema version tag; identity fields hold stable ids from
    /// [`SCHEMA_STABLE_IDS`] onward.
    fn schema_version(&self) -> u32;
}

/// Change event emitted by a collection for every committed write.
#[derive(Debug, Clone)]
pub enum ChangeEvent<T> {
    Added(T),
    Updated(T),
    Removed(String),
}

struct CollectionInner<T: Document> {
    docs: DashMap<String, T>,
    feed: broadcast::Sender<ChangeEvent<T>>,
}

/// A named set of documents keyed by record id.
pub struct Collection<T: Document> {
    inner: Arc<CollectionInner<T>>,
}

impl<T: Document> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Document> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Document> Collection<T> {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            inner: Arc::new(CollectionInner {
                docs: DashMap::new(),
                feed,
            }),
        }
    }

    /// Insert a new document. Writes through this path must already carry the
    /// stable-id schema; legacy rows only enter via [`Collection::insert_legacy`].
    pub fn insert(&self, doc: T) -> AppResult<()> {
        if doc.schema_version() < SCHEMA_STABLE_IDS {
            return Err(AppError::BadRequest(format!(
                "{}: writes below schema version {} are rejected",
                T::COLLECTION,
                SCHEMA_STABLE_IDS
            )));
        }
        self.insert_legacy(doc)
    }

    /// Insert bypassing the schema-version gate. Used to seed historical
    /// records for the identity backfill and its tests.
    pub fn insert_legacy(&self, doc: T) -> AppResult<()> {
        use dashmap::mapref::entry::Entry;

        let id = doc.id().to_string();
        match self.inner.docs.entry(id.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "{}: duplicate id {}",
                T::COLLECTION,
                id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(doc.clone());
                self.emit(ChangeEvent::Added(doc));
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.docs.get(id).map(|entry| entry.clone())
    }

    /// Atomically mutate one document. The closure runs against a clone under
    /// the entry lock; if it errors, nothing is committed or emitted.
    pub fn update<F>(&self, id: &str, f: F) -> AppResult<T>
    where
        F: FnOnce(&mut T) -> AppResult<()>,
    {
        let mut entry = self
            .inner
            .docs
            .get_mut(id)
            .ok_or(AppError::NotFound(T::COLLECTION))?;

        let mut draft = entry.clone();
        f(&mut draft)?;
        *entry = draft.clone();
        drop(entry);

        self.emit(ChangeEvent::Updated(draft.clone()));
        Ok(draft)
    }

    /// Like [`Collection::update`] but the closure reports whether it changed
    /// anything; a no-op commits nothing and emits no event. Used by the
    /// identity backfill for conditional rewrites.
    pub fn update_if<F>(&self, id: &str, f: F) -> AppResult<Option<T>>
    where
        F: FnOnce(&mut T) -> AppResult<bool>,
    {
        let mut entry = self
            .inner
            .docs
            .get_mut(id)
            .ok_or(AppError::NotFound(T::COLLECTION))?;

        let mut draft = entry.clone();
        if !f(&mut draft)? {
            return Ok(None);
        }
        *entry = draft.clone();
        drop(entry);

        self.emit(ChangeEvent::Updated(draft.clone()));
        Ok(Some(draft))
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        let removed = self.inner.docs.remove(id).map(|(_, doc)| doc);
        if removed.is_some() {
            self.emit(ChangeEvent::Removed(id.to_string()));
        }
        removed
    }

    /// Record ids in lexicographic order; the deterministic scan order that
    /// makes backfill batches resumable.
    pub fn ids_sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.docs.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn snapshot_filtered<P>(&self, pred: P) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        self.inner
            .docs
            .iter()
            .filter(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent<T>> {
        self.inner.feed.subscribe()
    }

    pub fn len(&self) -> usize {
        self.inner.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.docs.is_empty()
    }

    fn emit(&self, event: ChangeEvent<T>) {
        // No subscribers is fine; the feed only matters to live publications.
        let _ = self.inner.feed.send(event);
    }
}

/// All reactive collections of the service.
#[derive(Clone, Default)]
pub struct Store {
    pub rides: Collection<Ride>,
    pub chats: Collection<Chat>,
    pub places: Collection<Place>,
    pub reports: Collection<ErrorReport>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}
