//! Authoritative object store shared by the engine and the network layer

use std::collections::{btree_map, BTreeMap};

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::object::{Bounds, GameObject, Guid, ObjectKind, RenderItem};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("GUID space exhausted")]
    GuidsExhausted,
}

/// All objects of one world, keyed by GUID.
///
/// Iteration is in GUID order, which keeps snapshots and scoreboard text
/// deterministic.
#[derive(Debug, Clone)]
pub struct WorldState {
    objects: BTreeMap<Guid, GameObject>,
    next_guid: Guid,
    window_size: i32,
}

impl WorldState {
    pub fn new(window_size: i32) -> Self {
        Self {
            objects: BTreeMap::new(),
            next_guid: 1,
            window_size,
        }
    }

    pub fn window_size(&self) -> i32 {
        self.window_size
    }

    /// Stores `object` under a freshly assigned GUID and returns the stored copy.
    pub fn add(&mut self, mut object: GameObject) -> Result<GameObject, WorldError> {
        let guid = self.next_guid;
        self.next_guid = guid.checked_add(1).ok_or(WorldError::GuidsExhausted)?;

        object.guid = guid;
        object.normalize(self.window_size);
        self.objects.insert(guid, object.clone());
        Ok(object)
    }

    /// Inserts or overwrites an object under the GUID it already carries.
    /// Returns true when the GUID was not known before.
    pub fn upsert(&mut self, mut object: GameObject) -> bool {
        object.normalize(self.window_size);
        let guid = object.guid;
        self.next_guid = self.next_guid.max(guid.saturating_add(1));
        self.objects.insert(guid, object).is_none()
    }

    pub fn get(&self, guid: Guid) -> Option<&GameObject> {
        self.objects.get(&guid)
    }

    pub fn contains(&self, guid: Guid) -> bool {
        self.objects.contains_key(&guid)
    }

    /// Overwrites the stored object for `guid`.
    ///
    /// Does nothing and returns false when the GUID is unknown or the stored
    /// object has already been marked removed.
    pub fn replace(&mut self, guid: Guid, mut object: GameObject) -> bool {
        match self.objects.get_mut(&guid) {
            Some(slot) if !slot.is_removed() => {
                object.guid = guid;
                object.normalize(self.window_size);
                *slot = object;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, guid: Guid) -> Option<GameObject> {
        self.objects.remove(&guid)
    }

    /// Sets the removal flag and returns the resulting tombstone.
    ///
    /// Only the first call for a live object succeeds; later calls return None.
    pub fn mark_removed(&mut self, guid: Guid) -> Option<GameObject> {
        match self.objects.get_mut(&guid) {
            Some(object) if !object.is_removed() => {
                object.mark_removed();
                Some(object.clone())
            }
            _ => None,
        }
    }

    pub fn filter_by_kind(&self, kind: ObjectKind) -> KindFilter<'_> {
        KindFilter {
            objects: self.objects.values(),
            kind,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameObject> + '_ {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Live collidable objects overlapping `bounds`, skipping `ignore`
    pub fn overlapping<'a>(
        &'a self,
        bounds: Bounds,
        ignore: &'a [Guid],
    ) -> impl Iterator<Item = &'a GameObject> + 'a {
        self.objects.values().filter(move |object| {
            !object.is_removed()
                && object.kind.is_collidable()
                && !ignore.contains(&object.guid)
                && object.bounds().overlaps(&bounds)
        })
    }

    pub fn is_space_occupied(&self, bounds: Bounds, ignore: &[Guid]) -> bool {
        self.overlapping(bounds, ignore).next().is_some()
    }

    /// Every live object except `exclude`, in GUID order
    pub fn snapshot_except(&self, exclude: Guid) -> Vec<GameObject> {
        self.objects
            .values()
            .filter(|object| object.guid != exclude && !object.is_removed())
            .cloned()
            .collect()
    }

    pub fn scoreboard_label(&self) -> String {
        self.filter_by_kind(ObjectKind::Character)
            .filter_map(|object| object.character.as_ref())
            .map(|state| format!("P{}: {}", state.player_id, state.score))
            .collect::<Vec<_>>()
            .join("  ")
    }

    pub fn render_snapshot(&self) -> Vec<RenderItem> {
        let label = self.scoreboard_label();
        self.objects
            .values()
            .filter(|object| object.kind.is_renderable() && !object.is_removed())
            .map(|object| RenderItem {
                guid: object.guid,
                kind: object.kind,
                bounds: object.bounds(),
                radius: object.radius(),
                color: object.color,
                label: (object.kind == ObjectKind::Scoreboard).then(|| label.clone()),
            })
            .collect()
    }
}

/// Lazy view over the live objects of one kind. Clone it to iterate again.
#[derive(Clone)]
pub struct KindFilter<'a> {
    objects: btree_map::Values<'a, Guid, GameObject>,
    kind: ObjectKind,
}

impl<'a> Iterator for KindFilter<'a> {
    type Item = &'a GameObject;

    fn next(&mut self) -> Option<Self::Item> {
        let kind = self.kind;
        self.objects
            .find(|object| object.kind == kind && !object.is_removed())
    }
}

/// Thread-safe handle around a [`WorldState`].
///
/// One lock covers the whole store. Multi-step operations such as a physics
/// step or a departure hold the guard for their full duration.
#[derive(Debug)]
pub struct World {
    state: Mutex<WorldState>,
}

impl World {
    pub fn new(state: WorldState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().await
    }

    pub async fn add(&self, object: GameObject) -> Result<GameObject, WorldError> {
        self.state.lock().await.add(object)
    }

    pub async fn get(&self, guid: Guid) -> Option<GameObject> {
        self.state.lock().await.get(guid).cloned()
    }

    pub async fn replace(&self, guid: Guid, object: GameObject) -> bool {
        self.state.lock().await.replace(guid, object)
    }

    pub async fn remove(&self, guid: Guid) -> Option<GameObject> {
        self.state.lock().await.remove(guid)
    }

    pub async fn filter_by_kind(&self, kind: ObjectKind) -> Vec<GameObject> {
        self.state
            .lock()
            .await
            .filter_by_kind(kind)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }
}
