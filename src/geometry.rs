use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use glam::DVec2;
use indextree::NodeId;
use serde::Deserialize;

use crate::tree::NodeKind;

/// Which of the three landscapes is being built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    Disc,
    Map,
    #[default]
    Tree,
}

impl LayoutMode {
    pub const ALL: [LayoutMode; 3] = [LayoutMode::Disc, LayoutMode::Map, LayoutMode::Tree];
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayoutMode::Disc => "disc",
            LayoutMode::Map => "map",
            LayoutMode::Tree => "tree",
        };
        f.write_str(name)
    }
}

impl FromStr for LayoutMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disc" | "discv" => Ok(LayoutMode::Disc),
            "map" | "mapv" => Ok(LayoutMode::Map),
            "tree" | "treev" => Ok(LayoutMode::Tree),
            other => Err(format!("unknown layout mode '{other}' (expected disc, map or tree)")),
        }
    }
}

bitflags! {
    /// Per-node invalidation state
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// Geometry must be rebuilt before the next frame is drawn
        const NEEDS_REBUILD = 0b01;
        /// Tree mode: angular positions below this node are stale
        const NEEDS_REARRANGE = 0b10;
    }
}

/// Invalidation flags plus the order in which directories asked for a rebuild.
#[derive(Debug, Clone, Default)]
pub struct Invalidation {
    flags: HashMap<NodeId, NodeFlags>,
    rebuild_queue: Vec<NodeId>,
}

impl Invalidation {
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.flags.get(&id).copied().unwrap_or(NodeFlags::empty())
    }

    pub fn contains(&self, id: NodeId, flag: NodeFlags) -> bool {
        self.flags(id).contains(flag)
    }

    pub fn queue_rebuild(&mut self, id: NodeId) {
        let flags = self.flags.entry(id).or_insert(NodeFlags::empty());
        if !flags.contains(NodeFlags::NEEDS_REBUILD) {
            flags.insert(NodeFlags::NEEDS_REBUILD);
            self.rebuild_queue.push(id);
        }
    }

    pub fn mark_rearrange(&mut self, id: NodeId) {
        self.flags
            .entry(id)
            .or_insert(NodeFlags::empty())
            .insert(NodeFlags::NEEDS_REARRANGE);
    }

    pub fn clear(&mut self, id: NodeId, flag: NodeFlags) {
        if let Some(flags) = self.flags.get_mut(&id) {
            flags.remove(flag);
            if flags.is_empty() {
                self.flags.remove(&id);
            }
        }
    }

    /// Hand over every queued rebuild, oldest first, clearing the flags
    pub fn take_rebuilds(&mut self) -> Vec<NodeId> {
        let queue = std::mem::take(&mut self.rebuild_queue);
        for &id in &queue {
            self.clear(id, NodeFlags::NEEDS_REBUILD);
        }
        queue
    }

    pub fn has_pending_rebuilds(&self) -> bool {
        !self.rebuild_queue.is_empty()
    }

    pub fn reset(&mut self) {
        self.flags.clear();
        self.rebuild_queue.clear();
    }
}

/// Disc mode: a disc placed relative to its parent's center
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiscGeom {
    /// Offset of this disc's center from the parent's center
    pub offset: DVec2,
    pub radius: f64,
    /// Angular position around the parent, degrees
    pub theta: f64,
}

/// Map mode: a box whose footprint is `c0..c1` and whose top sits `height` above its base
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapGeom {
    pub c0: DVec2,
    pub c1: DVec2,
    pub height: f64,
}

/// Per-kind obliqueness of map side faces
pub fn map_slant_ratio(kind: NodeKind) -> f64 {
    match kind {
        NodeKind::Root => 0.0,
        NodeKind::Directory => 0.032,
        NodeKind::RegularFile => 0.064,
        NodeKind::Symlink => 0.333,
        NodeKind::Fifo | NodeKind::Socket | NodeKind::Unknown => 0.0,
        NodeKind::CharDevice | NodeKind::BlockDevice => 0.25,
    }
}

impl MapGeom {
    pub fn width(&self) -> f64 {
        self.c1.x - self.c0.x
    }

    pub fn depth(&self) -> f64 {
        self.c1.y - self.c0.y
    }

    pub fn dims(&self) -> DVec2 {
        self.c1 - self.c0
    }

    pub fn center(&self) -> DVec2 {
        0.5 * (self.c0 + self.c1)
    }

    /// How far the top face is pulled in from the footprint on each side.
    /// Never more than the extrusion height.
    pub fn slant_offset(&self, kind: NodeKind) -> DVec2 {
        let k = map_slant_ratio(kind);
        let dims = self.dims();
        DVec2::new(self.height.min(k * dims.x), self.height.min(k * dims.y))
    }

    /// Corners of the top face
    pub fn top_face(&self, kind: NodeKind) -> (DVec2, DVec2) {
        let offset = self.slant_offset(kind);
        (self.c0 + offset, self.c1 - offset)
    }
}

/// Tree mode: a directory drawn as a ring segment
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlatformGeom {
    /// Angle relative to the parent platform, degrees
    pub theta: f64,
    pub depth: f64,
    pub arc_width: f64,
    pub height: f64,
    /// Total slot width claimed by the expanded subdirectories
    pub subtree_arc_width: f64,
}

/// Tree mode: a node drawn as a block standing on its parent's platform
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LeafGeom {
    /// Distance from the parent platform's inner edge
    pub distance: f64,
    /// Angle relative to the parent platform's centerline, degrees
    pub theta: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TreeGeom {
    /// Only meaningful for directories and the root wrapper
    pub platform: PlatformGeom,
    pub leaf: LeafGeom,
}

/// Geometry records of one mode, keyed by node
#[derive(Debug, Clone, PartialEq)]
pub struct GeomTable<G> {
    records: HashMap<NodeId, G>,
}

impl<G> Default for GeomTable<G> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<G: Copy + Default> GeomTable<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Panics when the node was never laid out in this mode
    pub fn get(&self, id: NodeId) -> G {
        *self.records.get(&id).unwrap_or_else(|| panic!("no geometry recorded for {id:?}"))
    }

    pub fn try_get(&self, id: NodeId) -> Option<G> {
        self.records.get(&id).copied()
    }

    /// Record for `id`, created zeroed on first use
    pub fn entry(&mut self, id: NodeId) -> &mut G {
        self.records.entry(id).or_default()
    }

    pub fn insert(&mut self, id: NodeId, record: G) {
        self.records.insert(id, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
