//! Result caches with per-key single-flight computation.
//!
//! The map lock is only held to find, create or drop a key's cell. The
//! computation runs under the cell's gate, so concurrent first requests for
//! one key wait for a single computation while other keys proceed. Readers
//! look at the cell's value directly and never wait on a computation.

use std::collections::HashMap;
use std::sync::Arc;

use lutcraft_core::{PixelBuffer, SharedPixelBuffer};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

/// One key's slot: the stored value, plus the gate its computation holds.
struct Cell<V> {
    value: RwLock<Option<Arc<V>>>,
    gate: Mutex<()>,
}

impl<V> Default for Cell<V> {
    fn default() -> Self {
        Self {
            value: RwLock::new(None),
            gate: Mutex::new(()),
        }
    }
}

impl<V> Cell<V> {
    fn value(&self) -> Option<Arc<V>> {
        self.value.read().clone()
    }
}

/// Concurrent `key → value` map that computes each value at most once.
///
/// A failed computation stores nothing; the next request tries again.
pub struct SingleFlight<V> {
    cells: Mutex<HashMap<String, Arc<Cell<V>>>>,
}

impl<V> Default for SingleFlight<V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> SingleFlight<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: &str) -> Arc<Cell<V>> {
        let mut cells = self.cells.lock();
        match cells.get(key) {
            Some(cell) => Arc::clone(cell),
            None => {
                let cell = Arc::new(Cell::default());
                cells.insert(key.to_string(), Arc::clone(&cell));
                cell
            }
        }
    }

    /// Return the cached value, or compute, store and return it.
    pub fn get_or_try_insert_with<E, F>(&self, key: &str, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let cell = self.cell(key);
        if let Some(value) = cell.value() {
            return Ok(value);
        }
        let _gate = cell.gate.lock();
        if let Some(value) = cell.value() {
            return Ok(value);
        }
        match compute() {
            Ok(value) => {
                let value = Arc::new(value);
                *cell.value.write() = Some(Arc::clone(&value));
                Ok(value)
            }
            Err(e) => {
                self.forget_if_unused(key, &cell);
                Err(e)
            }
        }
    }

    /// Drop `cell` from the map when it is empty and nobody else holds it.
    fn forget_if_unused(&self, key: &str, cell: &Arc<Cell<V>>) {
        let mut cells = self.cells.lock();
        let unused = cells.get(key).is_some_and(|current| {
            // The map's handle plus ours; waiters hold a third.
            Arc::ptr_eq(current, cell) && Arc::strong_count(cell) == 2
        });
        if unused && cell.value.read().is_none() {
            cells.remove(key);
        }
    }

    /// The cached value, if present. Never waits on a running computation.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let cell = self.cells.lock().get(key).cloned()?;
        cell.value()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Store a value computed elsewhere, replacing any previous one.
    pub fn insert(&self, key: &str, value: Arc<V>) {
        *self.cell(key).value.write() = Some(value);
    }

    /// Number of stored values. Keys still being computed are not counted.
    pub fn len(&self) -> usize {
        let cells: Vec<Arc<Cell<V>>> = self.cells.lock().values().cloned().collect();
        cells.iter().filter(|cell| cell.value.read().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a cell, stored or in flight.
    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.cells.lock().len()
    }

    /// Drop every entry. Computations already running finish into detached cells.
    pub fn clear(&self) {
        self.cells.lock().clear();
    }
}

/// Identity of one source image set on the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(Uuid);

impl SourceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thumbnails for one source image.
#[derive(Clone)]
pub struct SourceGeneration {
    pub id: SourceId,
    pub source: SharedPixelBuffer,
    pub thumbnails: Arc<SingleFlight<PixelBuffer>>,
}

/// `asset id → filtered thumbnail`, valid for the current source only.
///
/// Changing the source swaps in a fresh map. Work started for the old source
/// keeps a handle to the old map, so its results are never visible under the
/// new source.
#[derive(Default)]
pub struct ThumbnailCache {
    current: RwLock<Option<SourceGeneration>>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation for `source`, discarding all thumbnails.
    pub fn set_source(&self, source: SharedPixelBuffer) -> SourceId {
        let generation = SourceGeneration {
            id: SourceId::new(),
            source,
            thumbnails: Arc::new(SingleFlight::new()),
        };
        let id = generation.id;
        *self.current.write() = Some(generation);
        id
    }

    /// Forget the source and its thumbnails.
    pub fn clear_source(&self) {
        *self.current.write() = None;
    }

    /// Snapshot of the current generation.
    pub fn generation(&self) -> Option<SourceGeneration> {
        self.current.read().clone()
    }

    pub fn source_id(&self) -> Option<SourceId> {
        self.current.read().as_ref().map(|g| g.id)
    }

    /// Whether `id` is still the current source.
    pub fn is_current(&self, id: SourceId) -> bool {
        self.source_id() == Some(id)
    }

    pub fn get(&self, asset_id: &str) -> Option<Arc<PixelBuffer>> {
        self.current.read().as_ref()?.thumbnails.get(asset_id)
    }

    pub fn len(&self) -> usize {
        self.current
            .read()
            .as_ref()
            .map_or(0, |g| g.thumbnails.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
