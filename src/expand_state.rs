use std::collections::{HashMap, HashSet};

use indextree::NodeId;

use crate::animation::Animatable;
use crate::tree::{FileTree, NodeKind};

/// Deployment below this counts as collapsed, above `1 - EPSILON` as expanded.
pub const EPSILON: f64 = 1.0e-6;

/// Where a directory is in its collapse/expand cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColExpPhase {
    Collapsed,
    Expanding,
    Expanded,
    Collapsing,
}

impl ColExpPhase {
    /// Whether the user currently wants the directory open
    pub fn wants_expanded(self) -> bool {
        matches!(self, ColExpPhase::Expanding | ColExpPhase::Expanded)
    }
}

/// Answers "is this directory open?" for the directory-tree widget that
/// seeds the initial state.
pub trait DirectoryVisibility {
    fn is_expanded(&self, dir: NodeId) -> bool;
}

/// Every directory starts collapsed
#[derive(Debug, Clone, Copy, Default)]
pub struct AllCollapsed;

impl DirectoryVisibility for AllCollapsed {
    fn is_expanded(&self, _dir: NodeId) -> bool {
        false
    }
}

/// Every directory starts expanded
#[derive(Debug, Clone, Copy, Default)]
pub struct AllExpanded;

impl DirectoryVisibility for AllExpanded {
    fn is_expanded(&self, _dir: NodeId) -> bool {
        true
    }
}

impl DirectoryVisibility for HashSet<NodeId> {
    fn is_expanded(&self, dir: NodeId) -> bool {
        self.contains(&dir)
    }
}

/// Per-directory deployment record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirDeployment {
    /// 0 = collapsed, 1 = expanded
    pub deployment: f64,
    pub phase: ColExpPhase,
    /// Whether geometry was last built in expanded form
    pub geom_expanded: bool,
}

impl DirDeployment {
    fn settled(expanded: bool) -> Self {
        let (deployment, phase) = if expanded {
            (1.0, ColExpPhase::Expanded)
        } else {
            (0.0, ColExpPhase::Collapsed)
        };
        Self {
            deployment,
            phase,
            geom_expanded: expanded,
        }
    }
}

/// Tracks how far every directory is deployed and which way it is heading.
/// The root wrapper is always fully deployed.
#[derive(Debug, Clone, Default)]
pub struct ExpansionState {
    dirs: HashMap<NodeId, DirDeployment>,
}

impl ExpansionState {
    /// Settled state for every directory of `tree`, open where `visibility` says so
    pub fn seed<V: DirectoryVisibility + ?Sized>(tree: &FileTree, visibility: &V) -> Self {
        let mut dirs = HashMap::new();
        dirs.insert(tree.root(), DirDeployment::settled(true));
        for dir in tree.directories(tree.root()) {
            dirs.insert(dir, DirDeployment::settled(visibility.is_expanded(dir)));
        }
        Self { dirs }
    }

    fn entry(&self, dir: NodeId) -> &DirDeployment {
        self.dirs.get(&dir).unwrap_or_else(|| panic!("{dir:?} is not a directory"))
    }

    fn entry_mut(&mut self, dir: NodeId) -> &mut DirDeployment {
        self.dirs.get_mut(&dir).unwrap_or_else(|| panic!("{dir:?} is not a directory"))
    }

    pub fn contains(&self, dir: NodeId) -> bool {
        self.dirs.contains_key(&dir)
    }

    pub fn get(&self, dir: NodeId) -> DirDeployment {
        *self.entry(dir)
    }

    pub fn deployment(&self, dir: NodeId) -> f64 {
        self.entry(dir).deployment
    }

    pub fn phase(&self, dir: NodeId) -> ColExpPhase {
        self.entry(dir).phase
    }

    pub fn set_phase(&mut self, dir: NodeId, phase: ColExpPhase) {
        self.entry_mut(dir).phase = phase;
    }

    pub fn set_geom_expanded(&mut self, dir: NodeId, expanded: bool) {
        self.entry_mut(dir).geom_expanded = expanded;
    }

    /// Intent: open or opening
    pub fn is_expanded(&self, dir: NodeId) -> bool {
        self.entry(dir).phase.wants_expanded()
    }

    /// Deployment has reached (or never left) zero
    pub fn is_collapsed(&self, dir: NodeId) -> bool {
        self.entry(dir).deployment < EPSILON
    }

    /// Deployment has reached one
    pub fn is_fully_expanded(&self, dir: NodeId) -> bool {
        self.entry(dir).deployment > 1.0 - EPSILON
    }

    /// True when `node` is a directory that is neither collapsed nor expanded
    pub fn is_partial(&self, dir: NodeId) -> bool {
        !self.is_collapsed(dir) && !self.is_fully_expanded(dir)
    }

    /// Drop any in-between state: every directory jumps to where it was heading.
    pub fn snap_to_intent(&mut self) {
        for entry in self.dirs.values_mut() {
            *entry = DirDeployment::settled(entry.phase.wants_expanded());
        }
    }

    /// Directories whose intent is open
    pub fn expanded_dirs(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dirs
            .iter()
            .filter(|(_, entry)| entry.phase.wants_expanded())
            .map(|(id, _)| *id)
    }

    /// Consistency check against the tree: exactly its directories (plus the root wrapper)
    pub fn covers(&self, tree: &FileTree) -> bool {
        tree.directories(tree.root()).all(|dir| self.contains(dir))
            && self
                .dirs
                .keys()
                .all(|&id| matches!(tree.kind(id), NodeKind::Directory | NodeKind::Root))
    }
}

impl DirectoryVisibility for ExpansionState {
    fn is_expanded(&self, dir: NodeId) -> bool {
        self.dirs
            .get(&dir)
            .map(|entry| entry.phase.wants_expanded())
            .unwrap_or(false)
    }
}

impl Animatable<NodeId> for ExpansionState {
    fn value(&self, key: &NodeId) -> f64 {
        self.deployment(*key)
    }

    fn set_value(&mut self, key: &NodeId, value: f64) {
        debug_assert!(
            (0.0..=1.0).contains(&value),
            "deployment {value} out of range for {key:?}"
        );
        self.entry_mut(*key).deployment = value;
    }
}
