//! Command scripts: one command per line, tokens separated by spaces.
//!
//! ```text
//! CR <path> <size>   create a file of <size> blocks
//! DL <path>          delete a file
//! CP <src> <dst>     copy a file
//! MV <src> <dst>     move or rename a file
//! CD <path>          create a directory
//! DD <path>          delete a directory tree
//! LL                 list the whole tree
//! ```

use std::io::{BufRead, Write};

use crate::fs::{DirRemoval, FileSystem, FsError, Kind, Result};
use crate::io::SnapshotStore;

use log::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CreateFile { path: String, size: usize },
    DeleteFile { path: String },
    Copy { src: String, dst: String },
    Move { src: String, dst: String },
    CreateDir { path: String },
    DeleteDir { path: String },
    List,
}

impl Command {
    /// Parses one script line. Blank lines yield `None`. Tokens past the ones a
    /// command takes are ignored.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let mut tokens = line.split_whitespace();
        let op = match tokens.next() {
            Some(op) => op,
            None => return Ok(None),
        };
        let mut arg = |what: &str| {
            tokens
                .next()
                .map(str::to_string)
                .ok_or_else(|| FsError::InvalidArgument(format!("{} is missing {}", op, what)))
        };

        let command = match op {
            "CR" => {
                let path = arg("a path")?;
                let size = arg("a size")?;
                let size = size.parse().map_err(|_| {
                    FsError::InvalidArgument(format!("size {:?} is not a block count", size))
                })?;
                Command::CreateFile { path, size }
            }
            "DL" => Command::DeleteFile { path: arg("a path")? },
            "CP" => Command::Copy {
                src: arg("a source")?,
                dst: arg("a destination")?,
            },
            "MV" => Command::Move {
                src: arg("a source")?,
                dst: arg("a destination")?,
            },
            "CD" => Command::CreateDir { path: arg("a path")? },
            "DD" => Command::DeleteDir { path: arg("a path")? },
            "LL" => Command::List,
            other => {
                return Err(FsError::InvalidArgument(format!(
                    "unknown command {:?}",
                    other
                )))
            }
        };
        Ok(Some(command))
    }
}

/// Tally of a script run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// Commands that were parsed and run, successfully or not.
    pub executed: usize,
    /// Lines that failed to parse or whose command failed.
    pub failed: usize,
}

impl<S: SnapshotStore> FileSystem<S> {
    /// Runs a single command, writing listings and the non-fatal `DD` notice to
    /// `out`.
    pub fn execute<W: Write>(&mut self, command: &Command, out: &mut W) -> Result<()> {
        match command {
            Command::CreateFile { path, size } => self.create_file(path, *size).map(drop),
            Command::DeleteFile { path } => self.delete_file(path),
            Command::Copy { src, dst } => self.copy_file(src, dst).map(drop),
            Command::Move { src, dst } => self.move_file(src, dst),
            Command::CreateDir { path } => self.create_dir(path).map(drop),
            Command::DeleteDir { path } => match self.remove_dir(path)? {
                DirRemoval::Removed { .. } => Ok(()),
                DirRemoval::NotADirectory => {
                    let notice = FsError::TypeMismatch {
                        path: path.clone(),
                        expected: Kind::Directory,
                    };
                    writeln!(out, "error: {}", notice)?;
                    Ok(())
                }
            },
            Command::List => self.list("/", out).map(drop),
        }
    }

    /// Runs every line of `script` in order. A failing line is reported to
    /// `out` as `error: <message>` and the script carries on; only a failure
    /// to read the script or write to `out` stops it.
    pub fn run_script<R: BufRead, W: Write>(
        &mut self,
        script: R,
        out: &mut W,
    ) -> Result<ScriptReport> {
        let mut report = ScriptReport::default();
        for (idx, line) in script.lines().enumerate() {
            let line = line?;
            let outcome = match Command::parse(&line) {
                Ok(None) => continue,
                Ok(Some(command)) => {
                    debug!("line {}: {:?}", idx + 1, command);
                    report.executed += 1;
                    self.execute(&command, out)
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => (),
                Err(FsError::Io(e)) => return Err(FsError::Io(e)),
                Err(e) => {
                    warn!("line {}: {}", idx + 1, e);
                    writeln!(out, "error: {}", e)?;
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStore;

    #[test]
    fn parses_every_command() {
        assert_eq!(
            Command::parse("CR /a 3").unwrap(),
            Some(Command::CreateFile {
                path: "/a".to_string(),
                size: 3
            })
        );
        assert_eq!(
            Command::parse("MV /a /b").unwrap(),
            Some(Command::Move {
                src: "/a".to_string(),
                dst: "/b".to_string()
            })
        );
        assert_eq!(
            Command::parse("DD /x").unwrap(),
            Some(Command::DeleteDir {
                path: "/x".to_string()
            })
        );
        assert_eq!(Command::parse("LL /ignored").unwrap(), Some(Command::List));
        assert_eq!(Command::parse("   ").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in &["CR /a", "CR /a big", "CP /a", "XX /a", "DL"] {
            match Command::parse(line) {
                Err(FsError::InvalidArgument(_)) => (),
                other => panic!("{:?} parsed as {:?}", line, other),
            }
        }
    }

    #[test]
    fn failures_are_reported_and_script_continues() {
        let mut fs = FileSystem::open(MemoryStore::new()).unwrap();
        let script = "CR /a 1\nDL /a\nDL /a\nCR /b 9\nBOGUS\nCD /d\nDD /a\nDD /d\n";
        let mut out = Vec::new();

        let report = fs.run_script(script.as_bytes(), &mut out).unwrap();

        assert_eq!(report.executed, 7);
        assert_eq!(report.failed, 4);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "error: File /a does not exist!\n\
             error: Size exceeds the limit 8\n\
             error: invalid argument: unknown command \"BOGUS\"\n\
             error: The directory does not exist!\n"
        );
    }

    #[test]
    fn dd_on_a_file_is_reported_but_not_a_failure() {
        let mut fs = FileSystem::open(MemoryStore::new()).unwrap();
        let mut out = Vec::new();

        let report = fs.run_script("CR /f 1\nDD /f\n".as_bytes(), &mut out).unwrap();

        assert_eq!(report.failed, 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "error: Cannot handle files!\n"
        );
        assert!(fs.lookup("/f").unwrap().is_some());
    }

    #[test]
    fn deleting_root_through_links_is_reported_and_script_continues() {
        let mut fs = FileSystem::open(MemoryStore::new()).unwrap();
        let mut out = Vec::new();
        let script = "CD /d\nDD /.\nDD /d/..\nDD /d/.\nCR /x 1\nLL\n";

        let report = fs.run_script(script.as_bytes(), &mut out).unwrap();

        assert_eq!(report.executed, 6);
        assert_eq!(report.failed, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "error: Cannot delete root directory!\n\
             error: Cannot delete root directory!\n\
             type: file\npath: /x\nsize: 1\n\n\
             type: directory\npath: /\nsize: 2\n\n"
        );
        assert_eq!(fs.lookup("/x").unwrap(), Some(1));
        assert_eq!(fs.lookup("/d").unwrap(), None);
    }

    #[test]
    fn failure_messages_use_fixed_wording() {
        let mut fs = FileSystem::open(MemoryStore::new()).unwrap();
        let mut out = Vec::new();
        let script = "CR /a 9\nCR /a 1\nCR /a 1\nCD /a\nDL /zz\nCP /zz /b\nCD /a/b/c\n\
                      DL /\nCP /a /\nDL /.\nLL\n";

        fs.run_script(script.as_bytes(), &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        let errors: Vec<&str> = out.lines().filter(|l| l.starts_with("error")).collect();
        assert_eq!(
            errors,
            vec![
                "error: Size exceeds the limit 8",
                "error: The file already exists!",
                "error: Directory already exists!",
                "error: File /zz does not exist!",
                "error: File /zz does not exist!",
                "error: The directory a in the given path does not exist!",
                "error: Cannot handle directories!",
                "error: invalid argument: \"/\" does not name an entry",
                "error: Cannot handle directories!",
            ]
        );
    }

    #[test]
    fn ll_lists_from_root() {
        let mut fs = FileSystem::open(MemoryStore::new()).unwrap();
        let mut out = Vec::new();

        fs.run_script("CD /docs\nCR /docs/a.txt 2\nLL\n".as_bytes(), &mut out)
            .unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.ends_with("type: directory\npath: /\nsize: 3\n\n"));
    }
}
