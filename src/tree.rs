use indextree::{Arena, NodeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Filesystem entry kind. `Root` is the synthetic wrapper above the scanned
/// directory; it never appears anywhere else in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Directory,
    RegularFile,
    Symlink,
    Fifo,
    Socket,
    CharDevice,
    BlockDevice,
    Unknown,
}

impl NodeKind {
    pub const COUNT: usize = 9;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_dir(self) -> bool {
        self == NodeKind::Directory
    }

    /// Directories and the root wrapper can hold children.
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Directory)
    }
}

/// Aggregated totals of everything below a directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtreeStats {
    /// Sum of the sizes of all descendants (not including the directory itself)
    pub size: u64,
    /// Number of descendants of each kind, indexed by `NodeKind::index`
    pub counts: [u64; NodeKind::COUNT],
}

impl SubtreeStats {
    pub fn count(&self, kind: NodeKind) -> u64 {
        self.counts[kind.index()]
    }
}

/// Represents a node in the directory tree
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub path: PathBuf,
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    /// Only meaningful for directories and the root wrapper
    pub subtree: SubtreeStats,
}

/// High-performance hierarchical tree structure using an arena allocator.
///
/// The tree is built once by the scanner, then `finalize` aggregates subtree
/// sizes. Layout code treats it as read-only.
pub struct FileTree {
    arena: Arena<TreeNode>,
    root: NodeId,
    root_dir: NodeId,
    path_to_node: HashMap<PathBuf, NodeId>,
}

impl FileTree {
    /// Create a new tree holding the root wrapper and the scanned directory
    pub fn new<P: AsRef<Path>>(root_path: P) -> Self {
        let mut arena = Arena::new();
        let root_path_buf = root_path.as_ref().to_path_buf();
        let root_name = root_path_buf
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("/")
            .to_string();

        let root = arena.new_node(TreeNode {
            path: PathBuf::new(),
            name: String::new(),
            kind: NodeKind::Root,
            size: 0,
            subtree: SubtreeStats::default(),
        });
        let root_dir = arena.new_node(TreeNode {
            path: root_path_buf.clone(),
            name: root_name,
            kind: NodeKind::Directory,
            size: 0,
            subtree: SubtreeStats::default(),
        });
        root.append(root_dir, &mut arena);

        let mut path_to_node = HashMap::new();
        path_to_node.insert(root_path_buf, root_dir);

        Self {
            arena,
            root,
            root_dir,
            path_to_node,
        }
    }

    /// Add a node under the node registered for its parent path.
    /// Returns `None` when the parent has not been added yet.
    pub fn add_node(&mut self, path: PathBuf, kind: NodeKind, size: u64) -> Option<NodeId> {
        let parent_id = path
            .parent()
            .and_then(|parent_path| self.path_to_node.get(parent_path).copied());
        let Some(parent_id) = parent_id else {
            log::debug!("no parent registered for {}", path.display());
            return None;
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(self.attach(parent_id, path, name, kind, size))
    }

    /// Add a node below `parent` by name
    pub fn add_child(&mut self, parent: NodeId, name: &str, kind: NodeKind, size: u64) -> NodeId {
        let path = self.node(parent).path.join(name);
        self.attach(parent, path, name.to_string(), kind, size)
    }

    fn attach(&mut self, parent: NodeId, path: PathBuf, name: String, kind: NodeKind, size: u64) -> NodeId {
        assert!(
            self.node(parent).kind.is_container(),
            "cannot add children to a {:?} node",
            self.node(parent).kind
        );
        assert!(kind != NodeKind::Root, "only one root wrapper per tree");

        let node_id = self.arena.new_node(TreeNode {
            path: path.clone(),
            name,
            kind,
            size,
            subtree: SubtreeStats::default(),
        });
        parent.append(node_id, &mut self.arena);
        self.path_to_node.insert(path, node_id);
        node_id
    }

    /// Aggregate subtree sizes and per-kind counts for all directories (bottom-up)
    pub fn finalize(&mut self) {
        self.finalize_recursive(self.root);
    }

    fn finalize_recursive(&mut self, node_id: NodeId) -> SubtreeStats {
        // Collect children first (to avoid borrow issues)
        let children: Vec<NodeId> = node_id.children(&self.arena).collect();

        let mut stats = SubtreeStats::default();
        for child in children {
            let child_stats = self.finalize_recursive(child);
            let child_node = self.node(child);
            stats.size += child_node.size + child_stats.size;
            stats.counts[child_node.kind.index()] += 1;
            for (total, count) in stats.counts.iter_mut().zip(child_stats.counts.iter()) {
                *total += count;
            }
        }

        if let Some(node) = self.arena.get_mut(node_id) {
            node.get_mut().subtree = stats.clone();
        }
        stats
    }

    /// The synthetic root wrapper
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The scanned top-level directory
    pub fn root_dir(&self) -> NodeId {
        self.root_dir
    }

    pub fn get_node(&self, path: &Path) -> Option<NodeId> {
        self.path_to_node.get(path).copied()
    }

    /// Panics on an id from another tree
    pub fn node(&self, id: NodeId) -> &TreeNode {
        self.arena
            .get(id)
            .unwrap_or_else(|| panic!("node {id:?} does not belong to this tree"))
            .get()
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn is_dir(&self, id: NodeId) -> bool {
        self.kind(id).is_dir()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.parent())
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.children(id).next().is_some()
    }

    /// Ancestors of `id`, nearest first, not including `id` itself
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.ancestors(&self.arena).skip(1)
    }

    /// Every directory in the subtree rooted at `id` (including `id`), depth first
    pub fn directories(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena).filter(move |&n| self.is_dir(n))
    }

    /// Size used by the packing formulas: own size floored to `floor`, plus
    /// the whole subtree for directories.
    pub fn effective_size(&self, id: NodeId, floor: u64) -> u64 {
        let node = self.node(id);
        let own = node.size.max(floor);
        if node.kind.is_dir() {
            own + node.subtree.size
        } else {
            own
        }
    }

    pub fn node_count(&self) -> usize {
        self.arena.count()
    }

    /// Get total size of the tree
    pub fn total_size(&self) -> u64 {
        let root = self.node(self.root_dir);
        root.size + root.subtree.size
    }
}
