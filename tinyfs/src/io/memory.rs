use crate::io::SnapshotStore;
use std::cell::RefCell;
use std::rc::Rc;

/// Keeps the snapshot in memory. Clones share the same snapshot, so a test can
/// hand one clone to a filesystem and inspect or reopen it through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshot: Rc<RefCell<Option<String>>>,
    writes: Rc<RefCell<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `snapshot`.
    pub fn with_snapshot(snapshot: &str) -> Self {
        let store = Self::new();
        *store.snapshot.borrow_mut() = Some(snapshot.to_string());
        store
    }

    pub fn snapshot(&self) -> Option<String> {
        self.snapshot.borrow().clone()
    }

    /// Number of snapshots written so far.
    pub fn writes(&self) -> usize {
        *self.writes.borrow()
    }
}

impl SnapshotStore for MemoryStore {
    fn load_snapshot(&mut self) -> std::io::Result<Option<String>> {
        Ok(self.snapshot())
    }

    fn store_snapshot(&mut self, snapshot: &str) -> std::io::Result<()> {
        *self.snapshot.borrow_mut() = Some(snapshot.to_string());
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}
