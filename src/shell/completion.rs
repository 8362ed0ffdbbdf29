use log::debug;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirEntryExt;
use std::path::PathBuf;

/// One directory entry as the completer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirItem {
    pub name: Vec<u8>,
    pub inode: u64,
    pub is_file: bool,
}

pub trait DirSource {
    fn entries(&self) -> io::Result<Vec<DirItem>>;
}

/// A real directory on disk, by default the working directory.
#[derive(Debug, Clone)]
pub struct DirListing {
    path: PathBuf,
}

impl DirListing {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn current() -> Self {
        Self::new(".")
    }
}

impl DirSource for DirListing {
    fn entries(&self) -> io::Result<Vec<DirItem>> {
        let mut items = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            // 跟随符号链接，和打开文件再 stat 的结果一致
            let is_file = fs::metadata(entry.path())
                .map(|m| m.is_file())
                .unwrap_or(false);
            items.push(DirItem {
                name: entry.file_name().as_bytes().to_vec(),
                inode: entry.ino(),
                is_file,
            });
        }
        Ok(items)
    }
}

/// Finds the bytes to append to `prefix`: the rest of the first plain file
/// that starts with it, or a single space when the prefix already is a full
/// file name. Candidates needing more than `remaining` bytes are skipped.
pub fn complete<D: DirSource>(dir: &D, prefix: &[u8], remaining: usize) -> Option<Vec<u8>> {
    let entries = match dir.entries() {
        Ok(entries) => entries,
        Err(e) => {
            debug!("补全时读取目录失败: {}", e);
            return None;
        }
    };

    for item in entries {
        if item.inode == 0 || !item.is_file {
            continue;
        }
        let Some(rest) = item.name.strip_prefix(prefix) else {
            continue;
        };
        let appended = if rest.is_empty() {
            b" ".to_vec()
        } else {
            rest.to_vec()
        };
        if appended.len() > remaining {
            debug!(
                "候选 {} 放不下 ({} > {})",
                String::from_utf8_lossy(&item.name),
                appended.len(),
                remaining
            );
            continue;
        }
        return Some(appended);
    }
    None
}
