use jwalk::WalkDir;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::cmp::Ordering as CmpOrdering;
use std::fs::FileType;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::error::ScanError;
use crate::tree::{FileTree, NodeKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub total_files: u64,
    pub total_dirs: u64,
    pub total_size: u64,
    /// Entries that could not be read and were left out
    pub skipped: u64,
    pub duration_ms: u128,
}

#[derive(Debug, Clone)]
struct ScannedEntry {
    path: PathBuf,
    kind: NodeKind,
    size: u64,
}

/// Parallel filesystem scanner producing a finalized `FileTree`.
///
/// Siblings come out directories first, then by name.
pub struct Scanner {
    file_count: AtomicU64,
    dir_count: AtomicU64,
    total_size: AtomicU64,
    skipped: AtomicU64,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            file_count: AtomicU64::new(0),
            dir_count: AtomicU64::new(0),
            total_size: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    fn processing_parallelism() -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        (cores * 2).clamp(4, 64)
    }

    pub fn kind_of(file_type: FileType) -> NodeKind {
        if file_type.is_dir() {
            return NodeKind::Directory;
        }
        if file_type.is_symlink() {
            return NodeKind::Symlink;
        }
        if file_type.is_file() {
            return NodeKind::RegularFile;
        }
        Self::special_kind(file_type)
    }

    #[cfg(unix)]
    fn special_kind(file_type: FileType) -> NodeKind {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() {
            NodeKind::Fifo
        } else if file_type.is_socket() {
            NodeKind::Socket
        } else if file_type.is_char_device() {
            NodeKind::CharDevice
        } else if file_type.is_block_device() {
            NodeKind::BlockDevice
        } else {
            NodeKind::Unknown
        }
    }

    #[cfg(not(unix))]
    fn special_kind(_file_type: FileType) -> NodeKind {
        NodeKind::Unknown
    }

    /// Directories first, then by name
    fn sibling_order(a: &jwalk::DirEntry<((), ())>, b: &jwalk::DirEntry<((), ())>) -> CmpOrdering {
        b.file_type()
            .is_dir()
            .cmp(&a.file_type().is_dir())
            .then_with(|| a.file_name().cmp(b.file_name()))
    }

    /// Scan `root` and build its tree. Symbolic links are recorded, never followed.
    pub fn scan<P: AsRef<Path>>(&mut self, root: P) -> Result<(FileTree, ScanStats), ScanError> {
        let root_path = root.as_ref().to_path_buf();
        let start = Instant::now();

        let metadata = std::fs::metadata(&root_path).map_err(|source| ScanError::Root {
            path: root_path.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root_path));
        }

        // Reset counters
        self.file_count.store(0, Ordering::Relaxed);
        self.dir_count.store(0, Ordering::Relaxed);
        self.total_size.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);

        let scan_threads = Self::processing_parallelism();
        let walker = WalkDir::new(&root_path)
            .skip_hidden(false)
            .follow_links(false)
            .parallelism(jwalk::Parallelism::RayonNewPool(scan_threads))
            .process_read_dir(|_, _, _, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => Self::sibling_order(a, b),
                    (Ok(_), Err(_)) => CmpOrdering::Less,
                    (Err(_), Ok(_)) => CmpOrdering::Greater,
                    (Err(_), Err(_)) => CmpOrdering::Equal,
                });
            })
            .into_iter();

        // Discovery runs in walk order, parents before their children
        let mut entries = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) if entry.depth == 0 => {}
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    log::warn!("skipping unreadable entry: {e}");
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        log::debug!("discovered {} entries under {}", entries.len(), root_path.display());

        let process_entries = || {
            entries
                .par_iter()
                .filter_map(|entry| {
                    let path = entry.path();
                    let metadata = match entry.metadata() {
                        Ok(metadata) => metadata,
                        Err(e) => {
                            log::warn!("no metadata for {}: {e}", path.display());
                            self.skipped.fetch_add(1, Ordering::Relaxed);
                            return None;
                        }
                    };

                    let size = metadata.len();
                    let kind = Self::kind_of(entry.file_type());
                    if kind == NodeKind::Directory {
                        self.dir_count.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.file_count.fetch_add(1, Ordering::Relaxed);
                        self.total_size.fetch_add(size, Ordering::Relaxed);
                    }

                    Some(ScannedEntry { path, kind, size })
                })
                .collect::<Vec<_>>()
        };

        let scanned = ThreadPoolBuilder::new()
            .num_threads(scan_threads)
            .build()
            .map(|pool| pool.install(process_entries))
            .unwrap_or_else(|_| process_entries());

        let mut tree = FileTree::new(&root_path);
        for entry in scanned {
            let display = entry.path.display().to_string();
            if tree.add_node(entry.path, entry.kind, entry.size).is_none() {
                // Its parent was skipped
                log::warn!("dropping orphaned entry {display}");
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
        }
        tree.finalize();

        let stats = ScanStats {
            total_files: self.file_count.load(Ordering::Relaxed),
            total_dirs: self.dir_count.load(Ordering::Relaxed),
            total_size: self.total_size.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            duration_ms: start.elapsed().as_millis(),
        };
        log::info!(
            "scanned {}: {} files, {} dirs, {} bytes in {}ms",
            root_path.display(),
            stats.total_files,
            stats.total_dirs,
            stats.total_size,
            stats.duration_ms
        );

        Ok((tree, stats))
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}
