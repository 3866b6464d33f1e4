//! Copy-on-write name → cell registry and the per-thread slot holding it.

use super::Cell;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

thread_local! {
    static CURRENT: RefCell<Registry> = RefCell::new(Registry::empty());
}

/// An immutable mapping from name to [`Cell`].
///
/// A published map is never modified. Every write produces a new map (the
/// old entries plus the change) and the owning thread swaps its reference,
/// so any reader holding a `Registry` sees one complete, consistent map and
/// no lock is needed.
///
/// Cloning is a structural copy: both clones share cells by reference, and a
/// later write on either side builds a fresh container for that side only.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    cells: Arc<HashMap<String, Arc<Cell>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the calling thread's registry.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Returns an independent structural copy of this registry.
    ///
    /// This is the operation performed at every spawn point: the fork shares
    /// the existing cells, but writes made through either side after the fork
    /// are invisible to the other.
    #[must_use]
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Makes this registry the calling thread's registry and returns the one
    /// it replaces.
    pub fn install(self) -> Self {
        CURRENT.with(|current| current.replace(self))
    }

    /// Like [`install`](Self::install), but tolerates being called while the
    /// thread's locals are being torn down. Returns `None` in that case.
    pub(crate) fn try_install(self) -> Option<Self> {
        CURRENT.try_with(|current| current.replace(self)).ok()
    }

    /// Looks up the cell bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Cell>> {
        self.cells.get(name)
    }

    /// Returns true if `name` is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.cells.contains_key(name)
    }

    /// Returns the number of bound names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if no name is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns all bound names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.cells.keys().cloned().collect()
    }

    /// Iterates over the bound cells.
    pub fn cells(&self) -> impl Iterator<Item = &Arc<Cell>> {
        self.cells.values()
    }

    /// Returns true if both registries are the same published map.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }

    /// Returns a new registry with `cell` bound to its name.
    #[must_use]
    pub fn with_cell(&self, cell: Cell) -> Self {
        let mut cells = HashMap::clone(&self.cells);
        cells.insert(cell.name().to_string(), Arc::new(cell));
        Self {
            cells: Arc::new(cells),
        }
    }

    /// Returns a new registry with every `(name, value)` pair bound.
    #[must_use]
    pub fn with_values<'a, I>(&self, values: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut cells = HashMap::clone(&self.cells);
        for (name, value) in values {
            cells.insert(name.clone(), Arc::new(Cell::new(name.clone(), value.clone())));
        }
        Self {
            cells: Arc::new(cells),
        }
    }

    /// Returns a new registry without `name`. Returns a plain copy when the
    /// name is not bound.
    #[must_use]
    pub fn without(&self, name: &str) -> Self {
        if !self.contains(name) {
            return self.clone();
        }
        let mut cells = HashMap::clone(&self.cells);
        cells.remove(name);
        Self {
            cells: Arc::new(cells),
        }
    }

    /// Reads every cell's value into a plain map.
    #[must_use]
    pub fn to_values(&self) -> HashMap<String, Value> {
        self.cells
            .iter()
            .map(|(name, cell)| (name.clone(), cell.value().clone()))
            .collect()
    }
}

/// Swaps the calling thread's registry for `update(current)`.
///
/// This is the only write path for the thread-local slot. The closure runs
/// with no borrow held, so it may freely read other globals.
pub(crate) fn publish<F>(update: F)
where
    F: FnOnce(&Registry) -> Registry,
{
    let next = update(&Registry::current());
    trace!(entries = next.len(), "Publishing registry");
    CURRENT.with(|current| *current.borrow_mut() = next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_registry() {
        let registry = Registry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(!registry.contains("anything"));
    }

    #[test]
    fn test_with_cell_leaves_original_untouched() {
        let original = Registry::empty().with_cell(Cell::new("a", json!(1)));
        let updated = original.with_cell(Cell::new("b", json!(2)));

        assert_eq!(original.len(), 1);
        assert!(!original.contains("b"));
        assert_eq!(updated.len(), 2);
        assert!(!original.ptr_eq(&updated));
    }

    #[test]
    fn test_with_cell_replaces_same_name() {
        let registry = Registry::empty()
            .with_cell(Cell::new("a", json!(1)))
            .with_cell(Cell::new("a", json!(2)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("a").map(|c| c.value().clone()), Some(json!(2)));
    }

    #[test]
    fn test_fork_shares_cells_not_future_writes() {
        let parent = Registry::empty().with_cell(Cell::new("a", json!("x")));
        let child = parent.fork();

        let parent_after = parent.with_cell(Cell::new("b", json!("y")));
        let child_after = child.with_cell(Cell::new("c", json!("z")));

        assert!(Arc::ptr_eq(
            parent.get("a").unwrap(),
            child.get("a").unwrap()
        ));
        assert!(!child_after.contains("b"));
        assert!(!parent_after.contains("c"));
    }

    #[test]
    fn test_without() {
        let registry = Registry::empty()
            .with_cell(Cell::new("a", json!(1)))
            .with_cell(Cell::new("b", json!(2)));

        let removed = registry.without("a");
        assert_eq!(removed.len(), 1);
        assert!(registry.contains("a"));

        let unchanged = registry.without("missing");
        assert!(unchanged.ptr_eq(&registry));
    }

    #[test]
    fn test_install_returns_previous() {
        let previous = Registry::empty().install();
        let seeded = Registry::empty().with_cell(Cell::new("k", json!(true)));

        let replaced = seeded.clone().install();
        assert!(replaced.is_empty());
        assert!(Registry::current().ptr_eq(&seeded));

        previous.install();
    }

    #[test]
    fn test_publish_swaps_reference() {
        Registry::empty().install();
        let before = Registry::current();

        publish(|current| current.with_cell(Cell::new("k", json!(1))));

        let after = Registry::current();
        assert!(before.is_empty());
        assert!(!before.ptr_eq(&after));
        assert!(after.contains("k"));
    }

    #[test]
    fn test_to_values() {
        let registry = Registry::empty()
            .with_values([(&"a".to_string(), &json!(1)), (&"b".to_string(), &Value::Null)]);
        let values = registry.to_values();

        assert_eq!(values.len(), 2);
        assert_eq!(values.get("b"), Some(&Value::Null));
    }
}
