use crate::alloc::BlockIndex;
use crate::config::{BLOCK_POINTERS, INODE_COUNT, ROOT_INODE, ROOT_NAME};
use crate::fs::{FsError, Resource};

use log::debug;

/// Slot number of an inode in the table, ranging from 0 to `INODE_COUNT - 1`.
pub type InodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
  /// True if the inode describes a directory.
  pub dir: bool,
  pub name: String,
  /// Number of blocks held by a file. Always 1 for a directory.
  pub size: usize,
  /// Direct pointers to the blocks holding the file's content. Only the first
  /// `size` entries are meaningful; the rest may be stale.
  pub blocks: [BlockIndex; BLOCK_POINTERS],
  pub used: bool,
}

impl Inode {
  fn root() -> Self {
    Self {
      dir: true,
      name: ROOT_NAME.to_string(),
      size: 1,
      blocks: [0; BLOCK_POINTERS],
      used: true,
    }
  }

  fn unused() -> Self {
    Self {
      dir: false,
      name: String::new(),
      size: 0,
      blocks: [0; BLOCK_POINTERS],
      used: false,
    }
  }

  /// The blocks this inode currently owns.
  pub fn owned_blocks(&self) -> &[BlockIndex] {
    &self.blocks[..self.size.min(BLOCK_POINTERS)]
  }

  /// The block holding a directory's entry list.
  pub fn dir_block(&self) -> BlockIndex {
    self.blocks[0]
  }
}

/// Result of looking up the final component of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeStatus {
  /// The entity requested exists.
  Found { parent: InodeId, inode: InodeId },
  /// The parent handle if traversal finds parent directory but not terminal entity.
  NotFound { parent: InodeId },
}

/// The fixed table of inodes. Slot 0 is the root directory and is never
/// handed out or released.
#[derive(Debug, Clone)]
pub struct InodeTable {
  nodes: Vec<Inode>,
}

impl InodeTable {
  /// A table holding only the root directory. The caller is responsible for
  /// giving the root a directory block.
  pub fn new() -> Self {
    let mut nodes = vec![Inode::unused(); INODE_COUNT];
    nodes[ROOT_INODE] = Inode::root();
    Self { nodes }
  }

  /// A table with every slot free, for rebuilding from a snapshot.
  pub(crate) fn empty() -> Self {
    Self {
      nodes: vec![Inode::unused(); INODE_COUNT],
    }
  }

  /// Claims the lowest free slot. The returned inode is marked used with an
  /// empty name and zero size.
  pub fn allocate(&mut self) -> Result<InodeId, FsError> {
    let inum = self
      .nodes
      .iter()
      .position(|node| !node.used)
      .ok_or(FsError::ResourceExhausted(Resource::Inode))?;
    debug_assert_ne!(inum, ROOT_INODE);

    let node = &mut self.nodes[inum];
    node.used = true;
    node.size = 0;
    node.name.clear();
    debug!("allocated inode {}", inum);
    Ok(inum)
  }

  /// Releases a slot. Block pointers are left as they were, so the caller
  /// must release the blocks first.
  pub fn free(&mut self, inum: InodeId) {
    assert_ne!(inum, ROOT_INODE, "the root inode cannot be freed");
    let node = &mut self.nodes[inum];
    node.used = false;
    node.size = 0;
    node.name.clear();
    debug!("freed inode {}", inum);
  }

  /// Overwrites a slot wholesale, for rebuilding from a snapshot.
  pub(crate) fn insert(&mut self, inum: InodeId, node: Inode) {
    self.nodes[inum] = node;
  }

  pub fn get(&self, inum: InodeId) -> Option<&Inode> {
    self.nodes.get(inum).filter(|node| node.used)
  }

  pub(crate) fn get_mut(&mut self, inum: InodeId) -> Option<&mut Inode> {
    self.nodes.get_mut(inum).filter(|node| node.used)
  }

  /// In-use inodes in ascending id order.
  pub fn iter(&self) -> impl Iterator<Item = (InodeId, &Inode)> {
    self.nodes.iter().enumerate().filter(|(_, node)| node.used)
  }

  pub fn free_count(&self) -> usize {
    self.nodes.iter().filter(|node| !node.used).count()
  }
}

impl Default for InodeTable {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_table_holds_only_root() {
    let table = InodeTable::new();
    let root = table.get(ROOT_INODE).unwrap();

    assert!(root.dir);
    assert_eq!(root.name, "root");
    assert_eq!(root.size, 1);
    assert_eq!(table.free_count(), INODE_COUNT - 1);
    assert_eq!(table.iter().count(), 1);
  }

  #[test]
  fn allocation_never_returns_root_and_picks_lowest_slot() {
    let mut table = InodeTable::new();
    assert_eq!(table.allocate().unwrap(), 1);
    assert_eq!(table.allocate().unwrap(), 2);
    assert_eq!(table.allocate().unwrap(), 3);

    table.free(2);
    assert!(table.get(2).is_none());
    assert_eq!(table.allocate().unwrap(), 2);
  }

  #[test]
  fn seventeenth_inode_is_refused() {
    let mut table = InodeTable::new();
    for _ in 1..INODE_COUNT {
      table.allocate().unwrap();
    }

    match table.allocate() {
      Err(FsError::ResourceExhausted(Resource::Inode)) => (),
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[test]
  fn free_keeps_stale_block_pointers() {
    let mut table = InodeTable::new();
    let inum = table.allocate().unwrap();
    {
      let node = table.get_mut(inum).unwrap();
      node.name.push_str("a");
      node.size = 2;
      node.blocks[0] = 4;
      node.blocks[1] = 9;
    }

    table.free(inum);

    let slot = &table.nodes[inum];
    assert!(!slot.used);
    assert_eq!(slot.size, 0);
    assert_eq!(slot.name, "");
    assert_eq!(&slot.blocks[..2], &[4, 9]);
  }

  #[test]
  #[should_panic(expected = "the root inode cannot be freed")]
  fn freeing_root_panics() {
    InodeTable::new().free(ROOT_INODE);
  }
}
