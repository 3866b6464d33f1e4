//! Immutable exports of a thread's globals.

use super::registry::{publish, Registry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Captures the calling thread's globals.
///
/// The registry reference is read once, so the result is a consistent view
/// of a single published map.
#[must_use]
pub fn dump_values() -> Snapshot {
    Snapshot::capture(&Registry::current())
}

#[derive(Debug)]
struct SnapshotInner {
    id: Uuid,
    captured_at: DateTime<Utc>,
    values: HashMap<String, Value>,
}

/// An immutable point-in-time copy of a registry's values.
///
/// Snapshots carry values across a thread boundary: they are captured on one
/// thread and replayed on another. Cloning shares the underlying map.
///
/// Serializes as a plain JSON object of its values. The id and capture time
/// are diagnostic only and are not part of equality or the serialized form.
#[derive(Debug, Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

impl Snapshot {
    /// Creates a snapshot with no values.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_values(HashMap::new())
    }

    /// Creates a snapshot from an explicit map.
    #[must_use]
    pub fn from_values(values: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                id: Uuid::new_v4(),
                captured_at: Utc::now(),
                values,
            }),
        }
    }

    /// Reads every value bound in `registry`.
    #[must_use]
    pub fn capture(registry: &Registry) -> Self {
        let snapshot = Self::from_values(registry.to_values());
        debug!(
            snapshot_id = %snapshot.id(),
            entries = snapshot.len(),
            "Captured snapshot"
        );
        snapshot
    }

    /// Binds every value of this snapshot on the calling thread.
    ///
    /// Names not in the snapshot keep their current bindings. All entries are
    /// published in a single registry swap.
    pub fn replay(&self) {
        if self.is_empty() {
            return;
        }
        publish(|current| current.with_values(&self.inner.values));
        debug!(
            snapshot_id = %self.id(),
            entries = self.len(),
            "Replayed snapshot"
        );
    }

    /// Returns the snapshot id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Returns when the snapshot was taken.
    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.inner.captured_at
    }

    /// Gets a captured value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.values.get(name)
    }

    /// Checks if a name was captured.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.values.contains_key(name)
    }

    /// Returns the number of captured values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty()
    }

    /// Returns the captured names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.inner.values.keys().cloned().collect()
    }

    /// Iterates over captured `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.values.iter()
    }

    /// Returns the values as a borrowed map.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, Value> {
        &self.inner.values
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.inner
                .values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.inner.values == other.inner.values
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.values.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        HashMap::<String, Value>::deserialize(deserializer).map(Self::from_values)
    }
}
