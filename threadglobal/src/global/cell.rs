//! The single named storage slot.

use serde_json::Value;

/// A named value published in a thread's [`Registry`](super::Registry).
///
/// Cells are immutable once published. Updating a name builds a new cell and
/// a new registry map; threads that still hold the previous map keep seeing
/// the previous cell. `Value::Null` is a real value, distinct from a name
/// that has no cell at all.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    name: String,
    value: Value,
}

impl Cell {
    /// Creates a new cell.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Returns the cell's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the stored value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns true if the stored value is an explicit null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_accessors() {
        let cell = Cell::new("trace_id", json!("abc"));
        assert_eq!(cell.name(), "trace_id");
        assert_eq!(cell.value(), &json!("abc"));
        assert!(!cell.is_null());
    }

    #[test]
    fn test_null_cell() {
        let cell = Cell::new("flag", Value::Null);
        assert!(cell.is_null());
    }
}
