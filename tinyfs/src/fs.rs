use std::fmt;
use std::io::Write;

use crate::alloc::{BlockIndex, BlockStore};
use crate::config::{Config, MoveCheck, BLOCK_COUNT, BLOCK_POINTERS, DOT, DOTDOT, ROOT_INODE};
use crate::dir::DirEntryList;
use crate::io::SnapshotStore;
use crate::node::{Inode, InodeId, InodeStatus, InodeTable};
use crate::path;
use crate::snapshot;

use log::{debug, info, warn};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    File,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Inode,
    Block,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Inode => write!(f, "All inodes in use!"),
            Resource::Block => write!(f, "Not enough space left!"),
        }
    }
}

/// Failures of a single operation. Display text is what a script run prints
/// after `error: `.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Size exceeds the limit {max}")]
    SizeExceeded { size: usize, max: usize },
    /// An intermediate path component is missing or is not a directory.
    #[error("The directory {0} in the given path does not exist!")]
    MissingDirectory(String),
    /// The file a path names does not exist.
    #[error("File {0} does not exist!")]
    PathNotFound(String),
    /// The directory a path names does not exist.
    #[error("The directory does not exist!")]
    DirectoryNotFound(String),
    #[error("The file already exists!")]
    AlreadyExists(String),
    #[error("Directory already exists!")]
    DirectoryExists(String),
    #[error("Cannot handle {}!", unhandled(.expected))]
    TypeMismatch { path: String, expected: Kind },
    #[error("{0}")]
    ResourceExhausted(Resource),
    #[error("Cannot delete root directory!")]
    CannotDeleteRoot,
    #[error("directory tree is nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("corrupt snapshot at line {line}: {reason}")]
    CorruptSnapshot { line: usize, reason: String },
    #[error("i/o error")]
    Io(#[from] std::io::Error),
}

/// What a type mismatch ran into: the opposite of what was expected.
fn unhandled(expected: &Kind) -> &'static str {
    match expected {
        Kind::File => "directories",
        Kind::Directory => "files",
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

/// Outcome of removing a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirRemoval {
    /// The tree is gone; counts cover the directory itself and every descendant.
    Removed { inodes: usize, blocks: usize },
    /// The path named a file. Nothing was changed.
    NotADirectory,
}

/// A single volume: the inode table, the block pool with its directory lists,
/// and the store every mutation is written through to.
///
/// # Layout
/// ===========================================================
/// | inode 0 (root) | inode 1 | ... | inode 15 |
/// | block 0 (root entries) | block 1 | ... | block 126 |
/// ===========================================================
pub struct FileSystem<S: SnapshotStore> {
    store: S,
    config: Config,
    inodes: InodeTable,
    blocks: BlockStore,
}

impl<S: SnapshotStore> FileSystem<S> {
    /// Opens the filesystem kept in `store` with the default configuration.
    pub fn open(store: S) -> Result<Self> {
        Self::open_with(store, Config::default())
    }

    /// Rebuilds state from the store's snapshot. An absent or blank snapshot
    /// is bootstrapped with a root directory holding only `.` in block 0, and
    /// that state is written back immediately.
    pub fn open_with(mut store: S, config: Config) -> Result<Self> {
        match store.load_snapshot()? {
            Some(text) if !text.trim().is_empty() => {
                let (inodes, blocks) = snapshot::parse(&text)?;
                info!(
                    "loaded snapshot: {} inodes, {} blocks in use",
                    inodes.iter().count(),
                    BLOCK_COUNT - blocks.free_count()
                );
                Ok(FileSystem {
                    store,
                    config,
                    inodes,
                    blocks,
                })
            }
            _ => {
                let inodes = InodeTable::new();
                let mut blocks = BlockStore::new();
                let root_block = blocks.allocate()?;
                debug_assert_eq!(root_block, 0);
                *blocks.dir_mut(root_block) = DirEntryList::seeded(ROOT_INODE, None);

                let mut fs = FileSystem {
                    store,
                    config,
                    inodes,
                    blocks,
                };
                info!("no snapshot found, initialized empty filesystem");
                fs.sync()?;
                Ok(fs)
            }
        }
    }

    /// Rewrites the whole snapshot.
    fn sync(&mut self) -> Result<()> {
        let text = snapshot::serialize(&self.inodes, &self.blocks);
        self.store.store_snapshot(&text)?;
        debug!("snapshot written ({} bytes)", text.len());
        Ok(())
    }

    fn dir_block(&self, dir: InodeId) -> Result<BlockIndex> {
        match self.inodes.get(dir) {
            Some(node) if node.dir => Ok(node.dir_block()),
            _ => Err(FsError::DirectoryNotFound(format!("inode {}", dir))),
        }
    }

    /// Resolves a path that must name an existing file, returning its parent
    /// directory and inode.
    fn existing_file(&self, path: &str) -> Result<(InodeId, InodeId)> {
        let components = path::split(path)?;
        match path::resolve(&self.inodes, &self.blocks, &components)? {
            InodeStatus::Found { parent, inode } => match self.inodes.get(inode) {
                Some(node) if node.dir => Err(FsError::TypeMismatch {
                    path: path.to_string(),
                    expected: Kind::File,
                }),
                Some(_) => Ok((parent, inode)),
                None => Err(FsError::PathNotFound(path.to_string())),
            },
            InodeStatus::NotFound { .. } => Err(FsError::PathNotFound(path.to_string())),
        }
    }

    /// Resolves a path whose final component must not exist yet, returning the
    /// directory that will hold a new `kind` entry and its name.
    fn vacant_slot(&self, path: &str, kind: Kind) -> Result<(InodeId, String)> {
        let components = path::split(path)?;
        let name = new_name(path, &components)?;
        match path::resolve(&self.inodes, &self.blocks, &components)? {
            InodeStatus::Found { .. } => match kind {
                Kind::File => Err(FsError::AlreadyExists(path.to_string())),
                Kind::Directory => Err(FsError::DirectoryExists(path.to_string())),
            },
            InodeStatus::NotFound { parent } => Ok((parent, name)),
        }
    }

    /// Allocates an inode and `size` blocks for a new file and binds it into
    /// `parent`. Capacity is checked before anything is claimed.
    fn new_file(&mut self, parent: InodeId, name: &str, size: usize) -> Result<InodeId> {
        if self.inodes.free_count() == 0 {
            return Err(FsError::ResourceExhausted(Resource::Inode));
        }
        let parent_block = self.dir_block(parent)?;
        let claimed = self.blocks.allocate_many(size)?;
        let inum = self.inodes.allocate()?;

        if let Some(node) = self.inodes.get_mut(inum) {
            node.dir = false;
            node.name = name.to_string();
            node.size = size;
            node.blocks[..size].copy_from_slice(&claimed);
        }
        self.blocks.dir_mut(parent_block).append(name, inum)?;
        debug!("inode {} holds blocks {:?}", inum, claimed);
        Ok(inum)
    }

    /// Releases a file's blocks and inode. The caller unbinds it from its parent.
    fn release_file(&mut self, inum: InodeId) -> usize {
        let owned: Vec<BlockIndex> = match self.inodes.get(inum) {
            Some(node) => node.owned_blocks().to_vec(),
            None => return 0,
        };
        for &block in owned.iter() {
            self.blocks.free(block);
        }
        self.inodes.free(inum);
        owned.len()
    }

    /// `CR`: creates a file of `size` blocks.
    pub fn create_file(&mut self, path: &str, size: usize) -> Result<InodeId> {
        if size > BLOCK_POINTERS {
            return Err(FsError::SizeExceeded {
                size,
                max: BLOCK_POINTERS,
            });
        }
        let (parent, name) = self.vacant_slot(path, Kind::File)?;
        let inum = self.new_file(parent, &name, size)?;
        self.sync()?;
        info!("created file {} (inode {}, {} blocks)", path, inum, size);
        Ok(inum)
    }

    /// `DL`: deletes a file.
    pub fn delete_file(&mut self, path: &str) -> Result<()> {
        let (parent, inum) = self.existing_file(path)?;
        let freed = self.release_file(inum);
        let parent_block = self.dir_block(parent)?;
        self.blocks.dir_mut(parent_block).remove(inum);
        self.sync()?;
        info!("deleted file {} (inode {}, {} blocks)", path, inum, freed);
        Ok(())
    }

    /// `CP`: creates `dst` with as many fresh blocks as `src` holds. Block
    /// content is not modelled, so only the size carries over.
    pub fn copy_file(&mut self, src: &str, dst: &str) -> Result<InodeId> {
        let (_, src_inum) = self.existing_file(src)?;
        let size = self.inodes.get(src_inum).map_or(0, |node| node.size);
        let (parent, name) = self.vacant_slot(dst, Kind::File)?;
        let inum = self.new_file(parent, &name, size)?;
        self.sync()?;
        info!("copied {} to {} (inode {})", src, dst, inum);
        Ok(inum)
    }

    /// `MV`: rebinds a file under a new name and directory. The inode and its
    /// blocks are unchanged.
    ///
    /// With `MoveCheck::SourceName` the destination directory is first searched
    /// for the file's current name, so moving `/a` to `/d/b` fails when `/d/a`
    /// exists. The requested name must be free in either mode.
    pub fn move_file(&mut self, src: &str, dst: &str) -> Result<()> {
        let (src_parent, inum) = self.existing_file(src)?;
        let mut components = path::split(dst)?;
        let new_name = new_name(dst, &components)?;
        let dst_parent = match path::resolve(&self.inodes, &self.blocks, &components)? {
            InodeStatus::Found { parent, .. } | InodeStatus::NotFound { parent } => parent,
        };
        components.pop();
        let old_name = self
            .inodes
            .get(inum)
            .map(|node| node.name.clone())
            .unwrap_or_default();

        let dst_block = self.dir_block(dst_parent)?;
        let checked = match self.config.move_check {
            MoveCheck::SourceName => vec![&old_name, &new_name],
            MoveCheck::DestinationName => vec![&new_name],
        };
        for name in checked {
            if let Some(entry) = self.blocks.dir(dst_block).find(name) {
                if entry.inode != inum {
                    return Err(FsError::AlreadyExists(path::join(
                        &display_path(&components),
                        name,
                    )));
                }
            }
        }

        let src_block = self.dir_block(src_parent)?;
        self.blocks.dir_mut(src_block).remove(inum);
        self.blocks.dir_mut(dst_block).append(&new_name, inum)?;
        if let Some(node) = self.inodes.get_mut(inum) {
            node.name = new_name;
        }
        self.sync()?;
        info!("moved {} to {} (inode {})", src, dst, inum);
        Ok(())
    }

    /// `CD`: creates a directory seeded with `.` and `..`.
    pub fn create_dir(&mut self, path: &str) -> Result<InodeId> {
        let (parent, name) = self.vacant_slot(path, Kind::Directory)?;
        if self.inodes.free_count() == 0 {
            return Err(FsError::ResourceExhausted(Resource::Inode));
        }
        let block = self.blocks.allocate()?;
        let inum = self.inodes.allocate()?;

        if let Some(node) = self.inodes.get_mut(inum) {
            node.dir = true;
            node.name = name.clone();
            node.size = 1;
            node.blocks[0] = block;
        }
        *self.blocks.dir_mut(block) = DirEntryList::seeded(inum, Some(parent));
        let parent_block = self.dir_block(parent)?;
        self.blocks.dir_mut(parent_block).append(&name, inum)?;
        self.sync()?;
        info!("created directory {} (inode {}, block {})", path, inum, block);
        Ok(inum)
    }

    /// `DD`: removes a directory and everything below it, deepest first.
    ///
    /// The whole tree is walked before anything is freed, so a tree nested
    /// deeper than the configured limit is refused untouched. The parent is
    /// taken from the directory's own `..` entry, which keeps paths ending in
    /// `.` or `..` pointed at the right list.
    pub fn remove_dir(&mut self, path: &str) -> Result<DirRemoval> {
        let components = path::split(path)?;
        if components.is_empty() {
            return Err(FsError::CannotDeleteRoot);
        }
        let target = match path::resolve(&self.inodes, &self.blocks, &components)? {
            InodeStatus::Found { inode, .. } => inode,
            InodeStatus::NotFound { .. } => {
                return Err(FsError::DirectoryNotFound(path.to_string()))
            }
        };
        if target == ROOT_INODE {
            return Err(FsError::CannotDeleteRoot);
        }
        match self.inodes.get(target) {
            Some(node) if node.dir => (),
            Some(_) => {
                warn!("{} is a file, not removing it", path);
                return Ok(DirRemoval::NotADirectory);
            }
            None => return Err(FsError::DirectoryNotFound(path.to_string())),
        }
        let parent = self
            .blocks
            .dir(self.dir_block(target)?)
            .find(DOTDOT)
            .map(|entry| entry.inode)
            .ok_or_else(|| FsError::DirectoryNotFound(path.to_string()))?;

        // Pre-order walk: every directory lands after its parent. Blocks are
        // looked up here so the removal below cannot fail halfway.
        let mut order: Vec<(InodeId, BlockIndex, BlockIndex)> = Vec::new();
        let mut stack = vec![(target, self.dir_block(parent)?, 0usize)];
        while let Some((dir, parent_block, depth)) = stack.pop() {
            if depth > self.config.max_depth {
                return Err(FsError::TooDeep(self.config.max_depth));
            }
            let block = self.dir_block(dir)?;
            order.push((dir, block, parent_block));
            for entry in self.blocks.dir(block).children() {
                if self.inodes.get(entry.inode).map_or(false, |n| n.dir) {
                    stack.push((entry.inode, block, depth + 1));
                }
            }
        }

        let (mut inodes_freed, mut blocks_freed) = (0, 0);
        for &(dir, block, parent_block) in order.iter().rev() {
            let files: Vec<InodeId> = self
                .blocks
                .dir(block)
                .children()
                .map(|entry| entry.inode)
                .collect();
            for inum in files {
                if self.inodes.get(inum).is_some() {
                    blocks_freed += self.release_file(inum);
                    inodes_freed += 1;
                }
            }
            self.blocks.dir_mut(block).clear();
            self.blocks.free(block);
            self.inodes.free(dir);
            self.blocks.dir_mut(parent_block).remove(dir);
            inodes_freed += 1;
            blocks_freed += 1;
            debug!("removed directory inode {} (block {})", dir, block);
        }

        self.sync()?;
        info!(
            "removed directory {} ({} inodes, {} blocks)",
            path, inodes_freed, blocks_freed
        );
        Ok(DirRemoval::Removed {
            inodes: inodes_freed,
            blocks: blocks_freed,
        })
    }

    /// `LL`: writes one record per file and directory below `path` to `out`,
    /// children before the directory holding them, and returns the reported
    /// size of `path`.
    ///
    /// A file reports its block count. A directory reports 1 for itself plus
    /// 1 per file and the reported size of each subdirectory, i.e. the number
    /// of entries in its subtree.
    pub fn list<W: Write>(&self, path: &str, out: &mut W) -> Result<usize> {
        struct Frame {
            dir: InodeId,
            path: String,
            next: usize,
            total: usize,
        }

        let components = path::split(path)?;
        let target = match path::resolve(&self.inodes, &self.blocks, &components)? {
            InodeStatus::Found { inode, .. } => inode,
            InodeStatus::NotFound { .. } => {
                return Err(FsError::DirectoryNotFound(path.to_string()))
            }
        };
        if !self.inodes.get(target).map_or(false, |node| node.dir) {
            return Err(FsError::TypeMismatch {
                path: path.to_string(),
                expected: Kind::Directory,
            });
        }

        let mut stack = vec![Frame {
            dir: target,
            path: display_path(&components),
            next: 0,
            total: 0,
        }];
        let mut total = 0;
        while let Some(frame) = stack.last_mut() {
            let entry = self.blocks.dir(self.dir_block(frame.dir)?).at(frame.next).cloned();
            let entry = match entry {
                Some(entry) => entry,
                None => {
                    let size = frame.total + 1;
                    write!(out, "type: directory\npath: {}\nsize: {}\n\n", frame.path, size)?;
                    stack.pop();
                    match stack.last_mut() {
                        Some(parent) => parent.total += size,
                        None => total = size,
                    }
                    continue;
                }
            };

            frame.next += 1;
            if entry.is_link() {
                continue;
            }
            let node = match self.inodes.get(entry.inode) {
                Some(node) => node,
                None => {
                    warn!("entry {} points at free inode {}", entry.name, entry.inode);
                    continue;
                }
            };
            let child_path = path::join(&frame.path, &entry.name);
            if node.dir {
                if stack.len() > self.config.max_depth {
                    return Err(FsError::TooDeep(self.config.max_depth));
                }
                stack.push(Frame {
                    dir: entry.inode,
                    path: child_path,
                    next: 0,
                    total: 0,
                });
            } else {
                write!(out, "type: file\npath: {}\nsize: {}\n\n", child_path, node.size)?;
                frame.total += 1;
            }
        }
        Ok(total)
    }

    /// Resolves `path` to an inode, or `None` if the final component is absent.
    pub fn lookup(&self, path: &str) -> Result<Option<InodeId>> {
        let components = path::split(path)?;
        Ok(match path::resolve(&self.inodes, &self.blocks, &components)? {
            InodeStatus::Found { inode, .. } => Some(inode),
            InodeStatus::NotFound { .. } => None,
        })
    }

    pub fn inode(&self, inum: InodeId) -> Option<&Inode> {
        self.inodes.get(inum)
    }

    pub fn inodes(&self) -> &InodeTable {
        &self.inodes
    }

    /// The entry list of a directory inode.
    pub fn entries(&self, dir: InodeId) -> Option<&DirEntryList> {
        self.dir_block(dir).ok().map(|block| self.blocks.dir(block))
    }

    pub fn free_inodes(&self) -> usize {
        self.inodes.free_count()
    }

    pub fn free_blocks(&self) -> usize {
        self.blocks.free_count()
    }

    pub fn is_block_used(&self, block: BlockIndex) -> bool {
        self.blocks.is_used(block)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// The name a path would bind. `.` and `..` are never bound by hand, even in
/// the root where `..` is absent.
fn new_name(path: &str, components: &[String]) -> Result<String> {
    match components.last() {
        Some(name) if name == DOT || name == DOTDOT => Err(FsError::InvalidArgument(format!(
            "{} is a reserved name",
            name
        ))),
        Some(name) => Ok(name.clone()),
        None => Err(FsError::InvalidArgument(format!(
            "{:?} does not name an entry",
            path
        ))),
    }
}

/// Absolute display path for a list of components, `/` for none.
fn display_path(components: &[String]) -> String {
    format!("/{}", components.join("/"))
}
