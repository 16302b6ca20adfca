use crate::{ArtifactId, Error, Result, SizeClass};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

/// Concurrent bookkeeping of admitted artifacts, keyed by size class.
///
/// The set of recognized classes is fixed at construction. Each class owns an
/// independent [`Mutex`], so operations on one class never wait on another,
/// and there is no lock over the whole map. Every operation is atomic with
/// respect to its class's lock.
///
/// Admission state lives only here: a file on disk is merely a candidate
/// until something calls [`PoolStore::admit`] for it.
///
/// ## Invariants
///
/// - A class never holds the same [`ArtifactId`] twice.
/// - [`PoolStore::evict`] of an absent id is a no-op, so duplicate or
///   out-of-order delete notifications are harmless.
/// - Serving an artifact never removes it; artifacts are reusable.
///
/// # Example
///
/// ```
/// use dhpool::{ArtifactId, PoolStore, SizeClass};
///
/// let class = SizeClass::new(2048);
/// let store = PoolStore::new([class, SizeClass::new(4096)]);
///
/// assert!(store.admit(ArtifactId::new("2048_aaaaaaaa.key"), class));
/// assert!(!store.admit(ArtifactId::new("2048_aaaaaaaa.key"), class));
/// assert_eq!(store.count(class), 1);
///
/// let picked = store.sample_random(class).unwrap();
/// assert_eq!(picked.as_str(), "2048_aaaaaaaa.key");
/// ```
#[derive(Debug)]
pub struct PoolStore {
    buckets: BTreeMap<SizeClass, Mutex<Bucket>>,
}

/// Dense id list plus a reverse index, giving O(1) insert, remove and uniform
/// sampling.
#[derive(Debug, Default)]
struct Bucket {
    ids: Vec<ArtifactId>,
    index: HashMap<ArtifactId, usize>,
}

impl Bucket {
    fn insert(&mut self, id: ArtifactId) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.ids.len());
        self.ids.push(id);
        true
    }

    fn remove(&mut self, id: &ArtifactId) -> bool {
        let Some(pos) = self.index.remove(id) else {
            return false;
        };
        self.ids.swap_remove(pos);
        // The former last element now sits at `pos`.
        if let Some(moved) = self.ids.get(pos) {
            self.index.insert(moved.clone(), pos);
        }
        true
    }
}

impl PoolStore {
    /// Creates an empty store that recognizes exactly `classes`.
    ///
    /// Duplicate classes collapse into one.
    pub fn new(classes: impl IntoIterator<Item = SizeClass>) -> Self {
        Self {
            buckets: classes
                .into_iter()
                .map(|class| (class, Mutex::new(Bucket::default())))
                .collect(),
        }
    }

    /// Recognized size classes in ascending order.
    pub fn classes(&self) -> impl Iterator<Item = SizeClass> + '_ {
        self.buckets.keys().copied()
    }

    pub fn recognizes(&self, class: SizeClass) -> bool {
        self.buckets.contains_key(&class)
    }

    /// Adds `id` to `class`.
    ///
    /// Returns `true` if the id was newly admitted. Unrecognized classes and
    /// ids already present are no-ops.
    pub fn admit(&self, id: ArtifactId, class: SizeClass) -> bool {
        self.buckets
            .get(&class)
            .is_some_and(|bucket| bucket.lock().insert(id))
    }

    /// Removes `id` from `class`.
    ///
    /// Returns `true` if the id was present. Absent ids and unrecognized
    /// classes are no-ops, never errors.
    pub fn evict(&self, id: &ArtifactId, class: SizeClass) -> bool {
        self.buckets
            .get(&class)
            .is_some_and(|bucket| bucket.lock().remove(id))
    }

    /// Number of admitted ids in `class`; `0` for unrecognized classes.
    pub fn count(&self, class: SizeClass) -> usize {
        self.buckets
            .get(&class)
            .map_or(0, |bucket| bucket.lock().ids.len())
    }

    /// Picks one admitted id uniformly at random. The pool is not modified.
    ///
    /// # Errors
    ///
    /// - [`Error::UnrecognizedClass`] if `class` is not served.
    /// - [`Error::PoolEmpty`] if nothing is admitted for `class`.
    pub fn sample_random(&self, class: SizeClass) -> Result<ArtifactId> {
        let bucket = self
            .buckets
            .get(&class)
            .ok_or_else(|| Error::UnrecognizedClass {
                class: class.to_string(),
            })?
            .lock();
        if bucket.ids.is_empty() {
            return Err(Error::PoolEmpty { class });
        }
        let pos = rand::rng().random_range(0..bucket.ids.len());
        Ok(bucket.ids[pos].clone())
    }

    /// Copy of the ids currently admitted in `class`, in no particular order.
    pub fn snapshot(&self, class: SizeClass) -> Vec<ArtifactId> {
        self.buckets
            .get(&class)
            .map(|bucket| bucket.lock().ids.clone())
            .unwrap_or_default()
    }
}
