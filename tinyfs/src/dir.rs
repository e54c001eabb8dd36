use std::fmt;

use crate::config::{DOT, DOTDOT};
use crate::fs::FsError;
use crate::node::InodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub inode: InodeId,
}

impl DirEntry {
    /// True for the `.` and `..` links every directory carries.
    pub fn is_link(&self) -> bool {
        self.name == DOT || self.name == DOTDOT
    }
}

/// The ordered (name, inode) bindings of one directory. Entries keep insertion
/// order and names are unique within a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirEntryList {
    entries: Vec<DirEntry>,
}

impl DirEntryList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A fresh directory list holding `.` and, for anything but the root, `..`.
    pub fn seeded(this: InodeId, parent: Option<InodeId>) -> Self {
        let mut list = Self::new();
        list.entries.push(DirEntry {
            name: DOT.to_string(),
            inode: this,
        });
        if let Some(parent) = parent {
            list.entries.push(DirEntry {
                name: DOTDOT.to_string(),
                inode: parent,
            });
        }
        list
    }

    /// Adds a binding at the end of the list.
    pub fn append(&mut self, name: &str, inode: InodeId) -> Result<(), FsError> {
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }
        self.entries.push(DirEntry {
            name: name.to_string(),
            inode,
        });
        Ok(())
    }

    /// Removes the first entry bound to `inode`, returning it.
    pub fn remove(&mut self, inode: InodeId) -> Option<DirEntry> {
        let pos = self.entries.iter().position(|e| e.inode == inode)?;
        Some(self.entries.remove(pos))
    }

    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn at(&self, index: usize) -> Option<&DirEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DirEntry> {
        self.entries.iter()
    }

    /// Entries other than `.` and `..`.
    pub fn children(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| !e.is_link())
    }
}

impl<'a> IntoIterator for &'a DirEntryList {
    type Item = &'a DirEntry;
    type IntoIter = std::slice::Iter<'a, DirEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for DirEntryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ ")?;
        for entry in &self.entries {
            write!(f, "{}({}) ", entry.inode, entry.name)?;
        }
        write!(f, "]")
    }
}
