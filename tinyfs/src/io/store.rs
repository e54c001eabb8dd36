use std::io;

/// The flat backing store a filesystem snapshot lives in. A snapshot is always
/// read and written whole.
pub trait SnapshotStore {
    /// Reads the current snapshot, or `None` if the store has never been
    /// written.
    ///
    /// # Errors
    ///
    /// Any failure other than the snapshot being absent.
    fn load_snapshot(&mut self) -> io::Result<Option<String>>;
    /// Replaces the stored snapshot with `snapshot`.
    fn store_snapshot(&mut self, snapshot: &str) -> io::Result<()>;
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for &mut S {
    fn load_snapshot(&mut self) -> io::Result<Option<String>> {
        (**self).load_snapshot()
    }

    fn store_snapshot(&mut self, snapshot: &str) -> io::Result<()> {
        (**self).store_snapshot(snapshot)
    }
}
