//! Per-category tracking of pending resource requests.
//!
//! Every resource category (meshes, materials, textures, ...) owns one
//! [`RequestQueue`]. A queue remembers which identifiers are still pending,
//! which of those belong to the initial view, and every identifier it has
//! ever seen. Pushes are idempotent by id: a resource is pending in at most
//! one entry, and an id that has already been fulfilled is not re-requested.
//!
//! Scene completion is defined over the whole set: the scene is complete
//! exactly when no category is waiting.

use std::collections::{HashMap, HashSet};

/// Resource categories tracked during a scene load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum RequestCategory {
    Meshes,
    Materials,
    Textures,
    Geometries,
    GeomMeshes,
    Parametric,
    Annotations,
    Views,
    Sequences,
    Tracks,
    Highlights,
    Thumbnails,
}

impl RequestCategory {
    /// Every category, in declaration order.
    pub const ALL: [RequestCategory; 12] = [
        RequestCategory::Meshes,
        RequestCategory::Materials,
        RequestCategory::Textures,
        RequestCategory::Geometries,
        RequestCategory::GeomMeshes,
        RequestCategory::Parametric,
        RequestCategory::Annotations,
        RequestCategory::Views,
        RequestCategory::Sequences,
        RequestCategory::Tracks,
        RequestCategory::Highlights,
        RequestCategory::Thumbnails,
    ];
}

/// Metadata attached to a pending request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Whether the resource belongs to the initial view's subset.
    pub initial_view: bool,
}

impl RequestMeta {
    /// Metadata for an initial-view resource.
    pub fn initial() -> Self {
        Self { initial_view: true }
    }
}

/// Pending-id tracker for one resource category.
#[derive(Debug, Default)]
pub struct RequestQueue {
    pending: HashMap<String, RequestMeta>,
    initial_pending: HashSet<String>,
    seen: HashSet<String>,
}

impl RequestQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `id` unless it was ever enqueued before.
    ///
    /// Returns `true` if the id became pending. Re-pushing a pending or
    /// already-fulfilled id is a no-op.
    pub fn push(&mut self, id: impl Into<String>, meta: RequestMeta) -> bool {
        let id = id.into();
        if self.seen.contains(&id) {
            return false;
        }
        self.seen.insert(id.clone());
        if meta.initial_view {
            self.initial_pending.insert(id.clone());
        }
        self.pending.insert(id, meta);
        true
    }

    /// Removes `id` from the pending set, returning its metadata.
    ///
    /// Popping an absent id is a no-op and returns `None`.
    pub fn pop(&mut self, id: &str) -> Option<RequestMeta> {
        self.initial_pending.remove(id);
        self.pending.remove(id)
    }

    /// Whether `id` is currently pending.
    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Whether anything is still pending.
    pub fn is_waiting(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether every initial-view resource of this category has arrived.
    ///
    /// Trivially true for categories that never carried initial-view ids.
    pub fn is_initial_view_completed(&self) -> bool {
        self.initial_pending.is_empty()
    }

    /// Number of ids ever requested, fulfilled or not. Used as the
    /// denominator for progress weighting.
    pub fn global_len(&self) -> usize {
        self.seen.len()
    }

    /// Number of currently pending ids.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Releases everything, including the seen set.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.initial_pending.clear();
        self.seen.clear();
    }
}

/// One [`RequestQueue`] per [`RequestCategory`].
#[derive(Debug, Default)]
pub struct RequestQueues {
    queues: [RequestQueue; 12],
}

impl RequestQueues {
    /// Creates the full set of empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// The queue for `category`.
    pub fn get(&self, category: RequestCategory) -> &RequestQueue {
        &self.queues[category as usize]
    }

    /// Mutable access to the queue for `category`.
    pub fn get_mut(&mut self, category: RequestCategory) -> &mut RequestQueue {
        &mut self.queues[category as usize]
    }

    /// True iff no category is waiting on anything.
    pub fn is_scene_completed(&self) -> bool {
        self.queues.iter().all(|q| !q.is_waiting())
    }

    /// Releases every queue.
    pub fn clear(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
    }
}
