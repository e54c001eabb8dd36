use crate::config::BLOCK_COUNT;
use crate::dir::DirEntryList;
use crate::fs::{FsError, Resource};

use log::debug;

/// Index of a block in the pool, ranging from 0 to `BLOCK_COUNT - 1`.
pub type BlockIndex = usize;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum State {
    Free,
    Used,
}

const WORDS: usize = (BLOCK_COUNT + 63) / 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bitmap {
    /// One bit per block, least significant bit of the first word is block 0.
    bitmap: [u64; WORDS],
}

impl Bitmap {
    pub fn new() -> Self {
        Self { bitmap: [0; WORDS] }
    }

    pub fn get(&self, blocknr: BlockIndex) -> State {
        assert!(blocknr < BLOCK_COUNT, "block {} out of range", blocknr);
        let word = self.bitmap[blocknr / 64];

        let inner_offset = blocknr % 64;
        let mask = 0b01_u64 << inner_offset;
        match (word & mask) >> inner_offset {
            0 => State::Free,
            1 => State::Used,
            _ => unreachable!("block state is neither 0 nor 1"),
        }
    }

    pub fn set_reserved(&mut self, blocknr: BlockIndex) {
        assert!(blocknr < BLOCK_COUNT, "block {} out of range", blocknr);
        self.bitmap[blocknr / 64] |= 0b01_u64 << (blocknr % 64);
    }

    pub fn set_free(&mut self, blocknr: BlockIndex) {
        assert!(blocknr < BLOCK_COUNT, "block {} out of range", blocknr);
        self.bitmap[blocknr / 64] &= !(0b01_u64 << (blocknr % 64));
    }

    pub fn count_free(&self) -> usize {
        (0..BLOCK_COUNT)
            .filter(|&i| self.get(i) == State::Free)
            .count()
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowest-first allocation over a bitmap. Each call to the iterator yields the
/// next free block at or after the previous one without reserving it, so a
/// caller can check that enough blocks exist before claiming any.
pub struct NextAvailableAllocation<'a> {
    /// Keeps track of the next starting place for looking for available blocks.
    marker: usize,
    bitmap: &'a Bitmap,
}

impl<'a> NextAvailableAllocation<'a> {
    pub fn new(bitmap: &'a Bitmap) -> Self {
        Self { marker: 0, bitmap }
    }
}

impl<'a> Iterator for NextAvailableAllocation<'a> {
    type Item = BlockIndex;

    fn next(&mut self) -> Option<Self::Item> {
        for i in self.marker..BLOCK_COUNT {
            if let State::Free = self.bitmap.get(i) {
                self.marker = i + 1;
                return Some(i);
            }
        }
        self.marker = BLOCK_COUNT;
        None
    }
}

/// The fixed pool of blocks. File blocks carry no content in this model; a
/// directory block carries the entry list of the directory that owns it.
#[derive(Debug, Clone)]
pub struct BlockStore {
    data_map: Bitmap,
    dirs: Vec<DirEntryList>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self {
            data_map: Bitmap::new(),
            dirs: vec![DirEntryList::new(); BLOCK_COUNT],
        }
    }

    /// Claims the lowest free block.
    pub fn allocate(&mut self) -> Result<BlockIndex, FsError> {
        let blocknr = NextAvailableAllocation::new(&self.data_map)
            .next()
            .ok_or(FsError::ResourceExhausted(Resource::Block))?;
        self.data_map.set_reserved(blocknr);
        debug!("allocated block {}", blocknr);
        Ok(blocknr)
    }

    /// Claims the `count` lowest free blocks in ascending order, or nothing at
    /// all if fewer than `count` are free.
    pub fn allocate_many(&mut self, count: usize) -> Result<Vec<BlockIndex>, FsError> {
        let found: Vec<BlockIndex> = NextAvailableAllocation::new(&self.data_map)
            .take(count)
            .collect();
        if found.len() < count {
            return Err(FsError::ResourceExhausted(Resource::Block));
        }
        for &blocknr in found.iter() {
            self.data_map.set_reserved(blocknr);
        }
        debug!("allocated blocks {:?}", found);
        Ok(found)
    }

    /// Releases a block. Freeing a block that is not in use is a bookkeeping
    /// bug in the caller and panics.
    pub fn free(&mut self, blocknr: BlockIndex) {
        assert!(
            self.data_map.get(blocknr) == State::Used,
            "double free of block {}",
            blocknr
        );
        self.data_map.set_free(blocknr);
        debug!("freed block {}", blocknr);
    }

    /// Marks a block used without scanning, for rebuilding state from a snapshot.
    pub(crate) fn mark_used(&mut self, blocknr: BlockIndex) {
        self.data_map.set_reserved(blocknr);
    }

    pub fn is_used(&self, blocknr: BlockIndex) -> bool {
        self.data_map.get(blocknr) == State::Used
    }

    pub fn free_count(&self) -> usize {
        self.data_map.count_free()
    }

    pub fn dir(&self, blocknr: BlockIndex) -> &DirEntryList {
        &self.dirs[blocknr]
    }

    pub fn dir_mut(&mut self, blocknr: BlockIndex) -> &mut DirEntryList {
        &mut self.dirs[blocknr]
    }
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}
