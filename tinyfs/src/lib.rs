//! A simulated single volume filesystem: 16 inodes and 127 blocks, with the
//! whole state written to a flat text snapshot after every change.
//!
//! Directories hold an ordered list of (name, inode) entries in their single
//! block. Files own up to eight blocks whose content is not modelled.
//!
//! ```no_run
//! use tinyfs::{FileSystem, io::FileStoreBuilder};
//!
//! let store = FileStoreBuilder::new("myfs.txt").build();
//! let mut fs = FileSystem::open(store)?;
//! fs.create_dir("/docs")?;
//! fs.create_file("/docs/a.txt", 2)?;
//! fs.list("/", &mut std::io::stdout())?;
//! # Ok::<(), tinyfs::FsError>(())
//! ```

mod alloc;
pub mod config;
mod dir;
mod fs;
pub mod io;
mod node;
pub mod path;
pub mod script;
pub mod snapshot;

pub use crate::alloc::{BlockIndex, BlockStore};
pub use crate::config::{Config, MoveCheck};
pub use crate::dir::{DirEntry, DirEntryList};
pub use crate::fs::{DirRemoval, FileSystem, FsError, Kind, Resource, Result};
pub use crate::node::{Inode, InodeId, InodeStatus, InodeTable};
pub use crate::script::{Command, ScriptReport};
