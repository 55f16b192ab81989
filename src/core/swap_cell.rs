use std::sync::Arc;

use arc_swap::ArcSwap;

/// An atomically replaceable value.
///
/// Readers get a cheap `Arc` snapshot with [`SwapCell::load`]; writers replace the
/// whole value with [`SwapCell::swap`], which hands back the value that was
/// displaced. The cell never drops a displaced value on its own, so whoever swaps
/// owns the previous value and is responsible for disposing of it exactly once.
pub struct SwapCell<T> {
    inner: ArcSwap<T>,
}

impl<T> SwapCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Returns the current value.
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Installs `value` and returns the value it replaced.
    #[must_use = "the displaced value must be disposed by the caller"]
    pub fn swap(&self, value: T) -> Arc<T> {
        self.inner.swap(Arc::new(value))
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SwapCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SwapCell").field(&self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_returns_previous_value() {
        let cell = SwapCell::new(1);

        let previous = cell.swap(2);
        assert_eq!(*previous, 1);
        assert_eq!(*cell.load(), 2);

        let previous = cell.swap(3);
        assert_eq!(*previous, 2);
    }

    #[test]
    fn loaded_snapshot_outlives_swap() {
        let cell = SwapCell::new(String::from("first"));
        let snapshot = cell.load();

        let _ = cell.swap(String::from("second"));

        assert_eq!(snapshot.as_str(), "first");
        assert_eq!(cell.load().as_str(), "second");
    }
}
