//! Line oriented text encoding of the whole filesystem state.
//!
//! ```text
//! <inode> <dir:0|1> <name> <size> <ptr0> ... <ptr7>    one line per in-use inode
//! -1 0 data 0 0 0 0 0 0 0 0 0                          end of the inode section
//! <block> <entry name> <entry inode>                   one line per directory entry
//! ```

use std::fmt::Write;
use std::str::FromStr;

use crate::alloc::BlockStore;
use crate::config::{BLOCK_COUNT, BLOCK_POINTERS, INODE_COUNT, NAME_MAX, ROOT_INODE};
use crate::fs::FsError;
use crate::node::{Inode, InodeTable};

/// Terminates the inode section.
pub const SENTINEL: &str = "-1 0 data 0 0 0 0 0 0 0 0 0";

/// Encodes every in-use inode followed by the entries of every in-use
/// directory, both in ascending inode order.
pub fn serialize(inodes: &InodeTable, blocks: &BlockStore) -> String {
    let mut out = String::new();
    for (inum, node) in inodes.iter() {
        // Writing into a String can't fail.
        let _ = write!(out, "{} {} {} {}", inum, node.dir as u8, node.name, node.size);
        for ptr in node.blocks.iter() {
            let _ = write!(out, " {}", ptr);
        }
        out.push('\n');
    }

    out.push_str(SENTINEL);
    out.push('\n');

    for (_, node) in inodes.iter().filter(|(_, node)| node.dir) {
        let block = node.dir_block();
        for entry in blocks.dir(block) {
            let _ = writeln!(out, "{} {} {}", block, entry.name, entry.inode);
        }
    }
    out
}

fn corrupt(line: usize, reason: impl Into<String>) -> FsError {
    FsError::CorruptSnapshot {
        line,
        reason: reason.into(),
    }
}

fn field<T: FromStr>(token: Option<&str>, what: &str, line: usize) -> Result<T, FsError> {
    let token = token.ok_or_else(|| corrupt(line, format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| corrupt(line, format!("invalid {} {:?}", what, token)))
}

fn parse_inode(text: &str, line: usize) -> Result<(usize, Inode), FsError> {
    let mut tokens = text.split_whitespace();
    let inum: usize = field(tokens.next(), "inode number", line)?;
    if inum >= INODE_COUNT {
        return Err(corrupt(line, format!("inode {} out of range", inum)));
    }
    let dir = match tokens.next() {
        Some("0") => false,
        Some("1") => true,
        other => return Err(corrupt(line, format!("invalid directory flag {:?}", other))),
    };
    let name = tokens
        .next()
        .filter(|name| name.chars().count() <= NAME_MAX)
        .ok_or_else(|| corrupt(line, "missing or oversized name"))?
        .to_string();
    let size: usize = field(tokens.next(), "size", line)?;
    if size > BLOCK_POINTERS || (dir && size != 1) {
        return Err(corrupt(line, format!("invalid size {}", size)));
    }

    let mut blocks = [0; BLOCK_POINTERS];
    for ptr in blocks.iter_mut() {
        *ptr = field(tokens.next(), "block pointer", line)?;
        if *ptr >= BLOCK_COUNT {
            return Err(corrupt(line, format!("block {} out of range", ptr)));
        }
    }
    if tokens.next().is_some() {
        return Err(corrupt(line, "trailing fields"));
    }

    Ok((
        inum,
        Inode {
            dir,
            name,
            size,
            blocks,
            used: true,
        },
    ))
}

/// Rebuilds the inode table, block bitmap and directory lists from `text`.
///
/// # Errors
///
/// Any malformed line, a missing sentinel, a block claimed by two inodes or a
/// snapshot without a root directory is reported as a corrupt snapshot.
pub fn parse(text: &str) -> Result<(InodeTable, BlockStore), FsError> {
    let mut inodes = InodeTable::empty();
    let mut blocks = BlockStore::new();
    let mut in_entries = false;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        if !in_entries {
            if raw.split_whitespace().next() == Some("-1") {
                in_entries = true;
                continue;
            }
            let (inum, node) = parse_inode(raw, line)?;
            if inodes.get(inum).is_some() {
                return Err(corrupt(line, format!("inode {} listed twice", inum)));
            }
            for &block in node.owned_blocks() {
                if blocks.is_used(block) {
                    return Err(corrupt(line, format!("block {} claimed twice", block)));
                }
                blocks.mark_used(block);
            }
            inodes.insert(inum, node);
        } else {
            let mut tokens = raw.split_whitespace();
            let block: usize = field(tokens.next(), "block number", line)?;
            if block >= BLOCK_COUNT {
                return Err(corrupt(line, format!("block {} out of range", block)));
            }
            let name = tokens
                .next()
                .ok_or_else(|| corrupt(line, "missing entry name"))?;
            let inum: usize = field(tokens.next(), "entry inode", line)?;
            if inum >= INODE_COUNT {
                return Err(corrupt(line, format!("inode {} out of range", inum)));
            }
            blocks
                .dir_mut(block)
                .append(name, inum)
                .map_err(|_| corrupt(line, format!("duplicate entry {}", name)))?;
        }
    }

    if !in_entries {
        return Err(corrupt(text.lines().count(), "missing inode section terminator"));
    }
    match inodes.get(ROOT_INODE) {
        Some(root) if root.dir => (),
        _ => return Err(corrupt(1, "no root directory")),
    }
    Ok((inodes, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::DirEntryList;

    fn root_only() -> (InodeTable, BlockStore) {
        let inodes = InodeTable::new();
        let mut blocks = BlockStore::new();
        blocks.mark_used(0);
        *blocks.dir_mut(0) = DirEntryList::seeded(ROOT_INODE, None);
        (inodes, blocks)
    }

    #[test]
    fn serializes_root_only_filesystem() {
        let (inodes, blocks) = root_only();
        assert_eq!(
            serialize(&inodes, &blocks),
            "0 1 root 1 0 0 0 0 0 0 0 0\n-1 0 data 0 0 0 0 0 0 0 0 0\n0 . 0\n"
        );
    }

    #[test]
    fn parses_inodes_and_entries() {
        let text = "0 1 root 1 0 0 0 0 0 0 0 0\n\
                    1 1 docs 1 1 0 0 0 0 0 0 0\n\
                    2 0 a.txt 2 2 3 0 0 0 0 0 0\n\
                    -1 0 data 0 0 0 0 0 0 0 0 0\n\
                    0 . 0\n\
                    0 docs 1\n\
                    1 . 1\n\
                    1 .. 0\n\
                    1 a.txt 2\n";
        let (inodes, blocks) = parse(text).unwrap();

        let file = inodes.get(2).unwrap();
        assert_eq!(file.name, "a.txt");
        assert_eq!(file.owned_blocks(), &[2, 3]);
        for used in 0..4 {
            assert!(blocks.is_used(used));
        }
        assert!(!blocks.is_used(4));
        assert_eq!(blocks.dir(1).to_string(), "[ 1(.) 0(..) 2(a.txt) ]");
        assert_eq!(serialize(&inodes, &blocks), text);
    }

    #[test]
    fn marks_pointed_blocks_not_leading_indices() {
        let text = "0 1 root 1 0 0 0 0 0 0 0 0\n\
                    3 0 f 2 40 41 0 0 0 0 0 0\n\
                    -1 0 data 0 0 0 0 0 0 0 0 0\n\
                    0 . 0\n\
                    0 f 3\n";
        let (_, blocks) = parse(text).unwrap();

        assert!(blocks.is_used(40));
        assert!(blocks.is_used(41));
        assert!(!blocks.is_used(1));
        assert_eq!(blocks.free_count(), BLOCK_COUNT - 3);
    }

    #[test]
    fn rejects_missing_sentinel() {
        match parse("0 1 root 1 0 0 0 0 0 0 0 0\n") {
            Err(FsError::CorruptSnapshot { .. }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn rejects_short_inode_line() {
        match parse("0 1 root 1 0 0\n-1 0 data 0 0 0 0 0 0 0 0 0\n") {
            Err(FsError::CorruptSnapshot { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn rejects_block_claimed_twice() {
        let text = "0 1 root 1 0 0 0 0 0 0 0 0\n\
                    1 0 f 1 0 0 0 0 0 0 0 0\n\
                    -1 0 data 0 0 0 0 0 0 0 0 0\n";
        match parse(text) {
            Err(FsError::CorruptSnapshot { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn rejects_snapshot_without_root() {
        let text = "1 1 docs 1 1 0 0 0 0 0 0 0\n-1 0 data 0 0 0 0 0 0 0 0 0\n";
        match parse(text) {
            Err(FsError::CorruptSnapshot { .. }) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
