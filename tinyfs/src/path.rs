//! Path splitting and resolution against the directory tree.

use crate::alloc::BlockStore;
use crate::config::{NAME_MAX, ROOT_INODE};
use crate::fs::FsError;
use crate::node::{InodeStatus, InodeTable};

/// Splits a slash separated path into its non-empty components. Leading,
/// trailing and repeated slashes are ignored, so `/a//b/` yields `a` and `b`.
///
/// # Errors
///
/// A component longer than `NAME_MAX` characters, or holding characters that
/// can't survive a snapshot line, is an invalid argument.
pub fn split(path: &str) -> Result<Vec<String>, FsError> {
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| {
            if part.chars().count() > NAME_MAX {
                return Err(FsError::InvalidArgument(format!(
                    "name {} is longer than {} characters",
                    part, NAME_MAX
                )));
            }
            if part.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(FsError::InvalidArgument(format!(
                    "name {:?} contains whitespace or control characters",
                    part
                )));
            }
            Ok(part.to_string())
        })
        .collect()
}

/// Joins a directory path and a child name for display, keeping the root as `/`.
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" || dir.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

/// Walks `components` from the root. Every component but the last must name an
/// existing directory; the last one is reported as found or not found along
/// with the directory that would hold it. An empty component list resolves to
/// the root itself.
pub fn resolve(
    inodes: &InodeTable,
    blocks: &BlockStore,
    components: &[String],
) -> Result<InodeStatus, FsError> {
    let (last, parents) = match components.split_last() {
        Some(split) => split,
        None => {
            return Ok(InodeStatus::Found {
                parent: ROOT_INODE,
                inode: ROOT_INODE,
            })
        }
    };

    let mut current = ROOT_INODE;
    for part in parents {
        let entry = inodes
            .get(current)
            .filter(|node| node.dir)
            .and_then(|node| blocks.dir(node.dir_block()).find(part))
            .ok_or_else(|| FsError::MissingDirectory(part.clone()))?;
        match inodes.get(entry.inode) {
            Some(node) if node.dir => current = entry.inode,
            _ => return Err(FsError::MissingDirectory(part.clone())),
        }
    }

    let parent = inodes
        .get(current)
        .ok_or_else(|| FsError::MissingDirectory(last.clone()))?;
    Ok(match blocks.dir(parent.dir_block()).find(last) {
        Some(entry) => InodeStatus::Found {
            parent: current,
            inode: entry.inode,
        },
        None => InodeStatus::NotFound { parent: current },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::DirEntryList;

    fn components(path: &str) -> Vec<String> {
        split(path).unwrap()
    }

    #[test]
    fn split_ignores_empty_components() {
        assert_eq!(components("/a//b/"), vec!["a", "b"]);
        assert_eq!(components("a/b"), vec!["a", "b"]);
        assert!(components("/").is_empty());
        assert!(components("").is_empty());
    }

    #[test]
    fn split_rejects_long_names() {
        assert!(split("/abcdefg").is_ok());
        match split("/docs/abcdefgh") {
            Err(FsError::InvalidArgument(_)) => (),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn join_keeps_single_root_slash() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }

    /// root(0) -> docs(1) -> a(2), with docs in block 1.
    fn tree() -> (InodeTable, BlockStore) {
        let mut inodes = InodeTable::new();
        let mut blocks = BlockStore::new();
        blocks.mark_used(0);
        *blocks.dir_mut(0) = DirEntryList::seeded(0, None);

        let docs = inodes.allocate().unwrap();
        let block = blocks.allocate().unwrap();
        {
            let node = inodes.get_mut(docs).unwrap();
            node.dir = true;
            node.name = "docs".to_string();
            node.size = 1;
            node.blocks[0] = block;
        }
        *blocks.dir_mut(block) = DirEntryList::seeded(docs, Some(0));
        blocks.dir_mut(0).append("docs", docs).unwrap();

        let file = inodes.allocate().unwrap();
        inodes.get_mut(file).unwrap().name = "a".to_string();
        blocks.dir_mut(block).append("a", file).unwrap();
        (inodes, blocks)
    }

    #[test]
    fn empty_path_resolves_to_root() {
        let (inodes, blocks) = tree();
        assert_eq!(
            resolve(&inodes, &blocks, &[]).unwrap(),
            InodeStatus::Found {
                parent: ROOT_INODE,
                inode: ROOT_INODE
            }
        );
    }

    #[test]
    fn resolves_nested_entries() {
        let (inodes, blocks) = tree();
        assert_eq!(
            resolve(&inodes, &blocks, &components("/docs/a")).unwrap(),
            InodeStatus::Found { parent: 1, inode: 2 }
        );
        assert_eq!(
            resolve(&inodes, &blocks, &components("/docs/b")).unwrap(),
            InodeStatus::NotFound { parent: 1 }
        );
    }

    #[test]
    fn missing_intermediate_directory_fails() {
        let (inodes, blocks) = tree();
        match resolve(&inodes, &blocks, &components("/nope/a")) {
            Err(FsError::MissingDirectory(part)) => assert_eq!(part, "nope"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn file_as_intermediate_component_fails() {
        let (inodes, blocks) = tree();
        match resolve(&inodes, &blocks, &components("/docs/a/b")) {
            Err(FsError::MissingDirectory(part)) => assert_eq!(part, "a"),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
