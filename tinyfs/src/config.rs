/// Number of inode slots, including the root.
pub const INODE_COUNT: usize = 16;
/// Number of blocks in the pool.
pub const BLOCK_COUNT: usize = 127;
/// Direct block pointers per inode, which also caps a file's size in blocks.
pub const BLOCK_POINTERS: usize = 8;
/// Longest name an inode or directory entry may carry.
pub const NAME_MAX: usize = 7;
pub const ROOT_INODE: usize = 0;
pub const ROOT_NAME: &str = "root";
pub const DOT: &str = ".";
pub const DOTDOT: &str = "..";
/// Snapshot file used when the caller doesn't name one.
pub const DEFAULT_STORE: &str = "myfs.txt";

/// Which name `MV` checks for a collision in the destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveCheck {
    /// Looks up the source file's current name.
    /// A move into a directory that already holds a file with the source's
    /// name fails even when the requested name is free.
    SourceName,
    /// Looks up the requested destination name.
    DestinationName,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub move_check: MoveCheck,
    /// Deepest directory nesting that `DD` and `LL` will walk.
    pub max_depth: usize,
}

impl Config {
    pub fn new() -> Self {
        Self {
            move_check: MoveCheck::SourceName,
            max_depth: INODE_COUNT,
        }
    }

    pub fn with_move_check(mut self, check: MoveCheck) -> Self {
        self.move_check = check;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
