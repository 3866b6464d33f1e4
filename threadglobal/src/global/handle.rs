//! Typed handle over a named global.

use super::registry::{publish, Registry};
use super::Cell;
use crate::errors::ThreadGlobalError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use tracing::warn;

/// A typed view of one named global on the calling thread.
///
/// The type parameter is a call-site convenience only. Values are stored as
/// JSON and storage never checks that a name is always used with the same
/// type. Reading a name through a handle of a different type than the one it
/// was written with is a caller error: [`try_get`](Self::try_get) reports it
/// and [`get`](Self::get) logs it and returns `None`.
///
/// Values must be representable as JSON. [`set`](Self::set) refuses a value
/// that would not read back as the same `T`, such as a non-finite float
/// (JSON has no encoding for it) or an integer outside the `i64`/`u64`
/// range, and leaves the registry unchanged.
///
/// Handles are cheap and hold no value themselves, so the same handle can be
/// used from any thread; each thread sees its own binding.
///
/// ```rust
/// use threadglobal::ThreadGlobal;
///
/// let greeting = ThreadGlobal::<String>::value("greeting");
/// greeting.set("howdy".to_string()).unwrap();
///
/// assert_eq!(greeting.get().as_deref(), Some("howdy"));
/// assert_eq!(ThreadGlobal::<String>::value("greeting"), greeting);
/// ```
pub struct ThreadGlobal<T> {
    name: String,
    _type: PhantomData<fn() -> T>,
}

impl<T> ThreadGlobal<T> {
    /// Returns a handle for `name`.
    ///
    /// This never touches the registry: a name only becomes bound when a
    /// value is set.
    #[must_use]
    pub fn value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            _type: PhantomData,
        }
    }

    /// Returns the global's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if the name is bound on the calling thread.
    #[must_use]
    pub fn is_set(&self) -> bool {
        Registry::current().contains(&self.name)
    }

    /// Unbinds the name on the calling thread. Returns true if it was bound.
    pub fn remove(&self) -> bool {
        super::remove(&self.name)
    }
}

impl<T: Serialize + DeserializeOwned> ThreadGlobal<T> {
    /// Binds `value` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the value cannot be represented as JSON
    /// (for example a map with non-string keys) or would not decode back as
    /// `T` (for example `f64::INFINITY`, which JSON stores as `null`). The
    /// registry is unchanged.
    pub fn set(&self, value: T) -> Result<(), ThreadGlobalError> {
        let value = serde_json::to_value(value)?;
        T::deserialize(&value)?;
        publish(|current| current.with_cell(Cell::new(self.name.clone(), value)));
        Ok(())
    }
}

impl<T: DeserializeOwned> ThreadGlobal<T> {
    /// Returns the value bound on the calling thread, or `None` if unset.
    ///
    /// A value that cannot be decoded as `T` is logged and reported as
    /// `None`.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        match self.try_get() {
            Ok(value) => value,
            Err(e) => {
                warn!(name = %self.name, error = %e, "Global read with mismatched type");
                None
            }
        }
    }

    /// Returns the value bound on the calling thread, or `None` if unset.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the stored value cannot be decoded as `T`.
    pub fn try_get(&self) -> Result<Option<T>, ThreadGlobalError> {
        let registry = Registry::current();
        let Some(cell) = registry.get(&self.name) else {
            return Ok(None);
        };
        T::deserialize(cell.value())
            .map(Some)
            .map_err(|e| ThreadGlobalError::type_mismatch(&self.name, std::any::type_name::<T>(), e))
    }
}

impl<T> Clone for ThreadGlobal<T> {
    fn clone(&self) -> Self {
        Self::value(self.name.clone())
    }
}

impl<T> PartialEq for ThreadGlobal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for ThreadGlobal<T> {}

impl<T> fmt::Debug for ThreadGlobal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadGlobal")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global::{clear, contains, size};

    #[test]
    fn test_supports_multiple_types() {
        clear();
        let foo = ThreadGlobal::<String>::value("foo");
        foo.set("howdy".to_string()).unwrap();

        let bar = ThreadGlobal::<i32>::value("bar");
        bar.set(1).unwrap();

        assert_eq!(foo.get(), Some("howdy".to_string()));
        assert_eq!(bar.get(), Some(1));
    }

    #[test]
    fn test_supports_null_values() {
        clear();
        let foo = ThreadGlobal::<Option<String>>::value("foo");
        foo.set(None).unwrap();

        assert_eq!(foo.get(), Some(None));
        assert!(contains("foo"));
    }

    #[test]
    fn test_value_does_not_create_when_reading() {
        clear();
        assert_eq!(ThreadGlobal::<String>::value("foo").get(), None);
        assert_eq!(ThreadGlobal::<String>::value("foo").get(), None);
        assert!(!contains("foo"));
        assert_eq!(size(), 0);
    }

    #[test]
    fn test_values_can_be_updated() {
        clear();
        let global = ThreadGlobal::<String>::value("bar");
        global.set("hi".to_string()).unwrap();
        assert_eq!(global.get().as_deref(), Some("hi"));

        global.set("bye".to_string()).unwrap();
        assert_eq!(global.get().as_deref(), Some("bye"));
        assert_eq!(ThreadGlobal::<String>::value("bar").get().as_deref(), Some("bye"));
    }

    #[test]
    fn test_handles_for_same_name_are_equal() {
        let a = ThreadGlobal::<u8>::value("same");
        let b = ThreadGlobal::<u8>::value("same");
        let c = ThreadGlobal::<u8>::value("other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_type_mismatch() {
        clear();
        ThreadGlobal::<String>::value("count").set("many".to_string()).unwrap();

        let as_number = ThreadGlobal::<u32>::value("count");
        assert!(matches!(
            as_number.try_get(),
            Err(ThreadGlobalError::TypeMismatch { .. })
        ));
        assert_eq!(as_number.get(), None);
        // Storage is left as written.
        assert_eq!(
            ThreadGlobal::<String>::value("count").get().as_deref(),
            Some("many")
        );
    }

    #[test]
    fn test_unserializable_value_is_rejected() {
        clear();
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], 1);
        let global = ThreadGlobal::<std::collections::HashMap<Vec<u8>, i32>>::value("bad");

        assert!(matches!(
            global.set(map),
            Err(ThreadGlobalError::Serialization(_))
        ));
        assert!(!global.is_set());
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        clear();
        let ratio = ThreadGlobal::<f64>::value("ratio");

        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                ratio.set(value),
                Err(ThreadGlobalError::Serialization(_))
            ));
        }
        assert!(!ratio.is_set());

        ratio.set(0.25).unwrap();
        assert_eq!(ratio.try_get().unwrap(), Some(0.25));
    }

    #[test]
    fn test_nested_non_finite_float_is_rejected() {
        clear();
        let samples = ThreadGlobal::<Vec<f64>>::value("samples");
        samples.set(vec![1.0, 2.0]).unwrap();

        assert!(samples.set(vec![1.0, f64::INFINITY]).is_err());
        assert_eq!(samples.get(), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn test_out_of_range_integer_is_rejected() {
        clear();
        let big = ThreadGlobal::<u128>::value("big");

        assert!(matches!(
            big.set(u128::MAX),
            Err(ThreadGlobalError::Serialization(_))
        ));
        assert!(!big.is_set());
        assert_eq!(size(), 0);

        big.set(u128::from(u64::MAX)).unwrap();
        assert_eq!(big.get(), Some(u128::from(u64::MAX)));
    }

    #[test]
    fn test_remove() {
        clear();
        let global = ThreadGlobal::<i32>::value("gone");
        assert!(!global.remove());

        global.set(5).unwrap();
        assert!(global.remove());
        assert!(!global.is_set());
        assert_eq!(size(), 0);
    }
}
