use std::f64::consts::PI;

use glam::DVec2;
use indextree::NodeId;

use crate::expand_state::ExpansionState;
use crate::geometry::{GeomTable, Invalidation, NodeFlags, PlatformGeom, TreeGeom};
use crate::platform::{self, LEAF_NODE_EDGE, PLATFORM_SPACING_WIDTH};
use crate::tree::{FileTree, NodeKind};

/// Allowed range of the whole tree's arc width, degrees
pub const MIN_ARC_WIDTH: f64 = 90.0;
pub const MAX_ARC_WIDTH: f64 = 225.0;
pub const MIN_CORE_RADIUS: f64 = 8192.0;
pub const CORE_GROW_FACTOR: f64 = 1.25;
pub const PLATFORM_HEIGHT: f64 = 158.2;
/// Radial gap between a platform and its subdirectories' platforms
pub const PLATFORM_SPACING_DEPTH: f64 = 2048.0;
pub const LEAF_HEIGHT_MULTIPLIER: f64 = 1.0;
/// Smallest size used for leaf heights
pub const MIN_NODE_SIZE: u64 = 64;

const LEAF_PADDING: f64 = 0.125 * LEAF_NODE_EDGE;
const PLATFORM_PADDING: f64 = 0.5 * PLATFORM_SPACING_WIDTH;
const EDGE05: f64 = 0.5 * LEAF_NODE_EDGE;
const EDGE15: f64 = 1.5 * LEAF_NODE_EDGE;
/// Core-radius regulation gives up after this many resizes
const MAX_REGULATION_STEPS: usize = 64;

/// Absolute polar position in the ground plane (theta in degrees)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rt {
    pub r: f64,
    pub theta: f64,
}

/// Absolute polar position with height
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rtz {
    pub r: f64,
    pub theta: f64,
    pub z: f64,
}

/// How a node is drawn this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TreeForm {
    /// A block standing on the parent platform (bottom center)
    Leaf { pos: Rtz },
    /// A fully deployed platform
    Platform { r0: f64, theta: f64 },
    /// A partly deployed directory: its leaf plus its platform scaled by
    /// `scale` about the leaf position
    Morphing { leaf: Rtz, r0: f64, theta: f64, scale: f64 },
}

impl TreeForm {
    /// Where a point of the full-size platform ends up when drawn
    pub fn place(&self, point: Rt) -> Rt {
        let TreeForm::Morphing { leaf, scale, .. } = *self else {
            return point;
        };
        // Work in a frame rotated so the pivot lies on the x axis
        let rel = (point.theta - leaf.theta).to_radians();
        let p = point.r * DVec2::new(rel.cos(), rel.sin());
        let pivot = DVec2::new(leaf.r, 0.0);
        let q = pivot + scale * (p - pivot);
        Rt {
            r: q.length(),
            theta: leaf.theta + q.y.atan2(q.x).to_degrees(),
        }
    }
}

/// Polar platform layout: expanded directories are ring segments at
/// growing radius, everything else stands on them as blocks.
#[derive(Debug, Clone)]
pub struct TreeLayout {
    geom: GeomTable<TreeGeom>,
    core_radius: f64,
}

impl TreeLayout {
    /// Build from scratch at the minimum core radius, queueing every directory for a rebuild.
    pub fn init(tree: &FileTree, expansion: &ExpansionState, inval: &mut Invalidation) -> Self {
        let mut layout = Self {
            geom: GeomTable::new(),
            core_radius: MIN_CORE_RADIUS,
        };

        layout.geom.entry(tree.root()).platform = PlatformGeom {
            theta: 90.0,
            depth: 0.0,
            arc_width: MAX_ARC_WIDTH,
            height: 0.0,
            subtree_arc_width: 0.0,
        };
        let root_dir = layout.geom.entry(tree.root_dir());
        root_dir.leaf.theta = 0.0;
        root_dir.leaf.distance = 0.5 * PLATFORM_SPACING_DEPTH;
        root_dir.platform.theta = 0.0;

        layout.init_recursive(tree, inval, tree.root());
        layout.arrange(tree, expansion, inval, true);

        log::debug!(
            "tree layout: {} nodes, core radius {:.0}",
            layout.geom.len(),
            layout.core_radius
        );
        layout
    }

    fn init_recursive(&mut self, tree: &FileTree, inval: &mut Invalidation, dnode: NodeId) {
        if tree.is_dir(dnode) {
            inval.queue_rebuild(dnode);
        }

        for node in tree.children(dnode) {
            if tree.is_dir(node) {
                let platform = &mut self.geom.entry(node).platform;
                platform.height = PLATFORM_HEIGHT;
                platform.arc_width = MIN_ARC_WIDTH;
                platform.subtree_arc_width = MIN_ARC_WIDTH;
                self.init_recursive(tree, inval, node);
            }
            let size = tree.effective_size(node, MIN_NODE_SIZE) as f64;
            self.geom.entry(node).leaf.height = size.sqrt() * LEAF_HEIGHT_MULTIPLIER;
        }
    }

    pub fn core_radius(&self) -> f64 {
        self.core_radius
    }

    pub fn geom(&self) -> &GeomTable<TreeGeom> {
        &self.geom
    }

    pub fn get(&self, node: NodeId) -> TreeGeom {
        self.geom.get(node)
    }

    /// A collapsed (by intent) directory or any non-directory
    pub fn is_leaf(tree: &FileTree, expansion: &ExpansionState, node: NodeId) -> bool {
        match tree.kind(node) {
            NodeKind::Root => false,
            NodeKind::Directory => !expansion.is_expanded(node),
            _ => true,
        }
    }

    /// Inner radius of a directory's platform
    pub fn platform_r0(&self, tree: &FileTree, dnode: NodeId) -> f64 {
        assert!(
            tree.kind(dnode).is_container(),
            "platform radius of a {:?}",
            tree.kind(dnode)
        );
        if dnode == tree.root() {
            return self.core_radius;
        }
        let below: f64 = tree
            .ancestors(dnode)
            .map(|up| PLATFORM_SPACING_DEPTH + self.geom.get(up).platform.depth)
            .sum();
        self.core_radius + below
    }

    /// Absolute angle of a platform's radial centerline
    pub fn platform_theta(&self, tree: &FileTree, dnode: NodeId) -> f64 {
        assert!(
            tree.kind(dnode).is_container(),
            "platform angle of a {:?}",
            tree.kind(dnode)
        );
        std::iter::once(dnode)
            .chain(tree.ancestors(dnode))
            .map(|id| self.geom.get(id).platform.theta)
            .sum()
    }

    /// Height of the tallest leaf standing on an expanded directory
    pub fn max_leaf_height(&self, tree: &FileTree, expansion: &ExpansionState, dnode: NodeId) -> f64 {
        assert!(!Self::is_leaf(tree, expansion, dnode), "leaf height of a collapsed node");
        tree.children(dnode)
            .filter(|&node| Self::is_leaf(tree, expansion, node))
            .map(|node| self.geom.get(node).leaf.height)
            .fold(0.0, f64::max)
    }

    /// Give a directory its estimated depth and arc width for inner radius `r0`
    pub fn reshape_platform(&mut self, tree: &FileTree, inval: &mut Invalidation, dnode: NodeId, r0: f64) {
        assert!(tree.is_dir(dnode), "reshape of a {:?}", tree.kind(dnode));
        let shape = platform::reshape(tree.children(dnode).count(), r0);
        let platform = &mut self.geom.entry(dnode).platform;
        platform.arc_width = shape.arc_width;
        platform.depth = shape.depth;
        inval.queue_rebuild(dnode);
    }

    /// Called as a directory starts opening or closing. A directory that
    /// is still fully collapsed gets shaped for its current radius first.
    pub fn colexp_initiated(
        &mut self,
        tree: &FileTree,
        expansion: &ExpansionState,
        inval: &mut Invalidation,
        dnode: NodeId,
    ) {
        if expansion.is_collapsed(dnode) {
            let r0 = self.platform_r0(tree, dnode);
            self.reshape_platform(tree, inval, dnode, r0);
        }
    }

    /// Flag a directory and every ancestor for rearrangement
    pub fn queue_rearrange(tree: &FileTree, inval: &mut Invalidation, dnode: NodeId) {
        for id in std::iter::once(dnode).chain(tree.ancestors(dnode)) {
            inval.mark_rearrange(id);
        }
    }

    fn arrange_recursive(
        &mut self,
        tree: &FileTree,
        expansion: &ExpansionState,
        inval: &mut Invalidation,
        dnode: NodeId,
        r0: f64,
        reshape: bool,
    ) {
        if !reshape && !inval.contains(dnode, NodeFlags::NEEDS_REARRANGE) {
            return;
        }

        if reshape && tree.is_dir(dnode) {
            if Self::is_leaf(tree, expansion, dnode) {
                // Its leaf block may have moved
                inval.queue_rebuild(dnode);
                return;
            }
            self.reshape_platform(tree, inval, dnode, r0);
        }

        let subtree_r0 = r0 + self.geom.get(dnode).platform.depth + PLATFORM_SPACING_DEPTH;
        let subdirs: Vec<NodeId> = tree.children(dnode).filter(|&n| tree.is_dir(n)).collect();

        let mut slots = Vec::with_capacity(subdirs.len());
        let mut subtree_arc_width = 0.0;
        for &node in &subdirs {
            self.arrange_recursive(tree, expansion, inval, node, subtree_r0, reshape);
            let platform = self.geom.get(node).platform;
            let slot = expansion.deployment(node) * platform.arc_width.max(platform.subtree_arc_width);
            slots.push(slot);
            subtree_arc_width += slot;
        }
        self.geom.entry(dnode).platform.subtree_arc_width = subtree_arc_width;

        // Spread the subdirectories, sweeping counterclockwise
        let mut theta = -0.5 * subtree_arc_width;
        for (&node, slot) in subdirs.iter().zip(slots) {
            self.geom.entry(node).platform.theta = theta + 0.5 * slot;
            theta += slot;
        }

        inval.clear(dnode, NodeFlags::NEEDS_REARRANGE);
    }

    /// Reposition flagged platforms (or every platform, with `reshape`),
    /// then grow or shrink the core until the whole tree spans between
    /// 90 and 225 degrees. Returns true when the core radius changed.
    pub fn arrange(
        &mut self,
        tree: &FileTree,
        expansion: &ExpansionState,
        inval: &mut Invalidation,
        reshape: bool,
    ) -> bool {
        let root = tree.root();
        let core = self.core_radius;
        self.arrange_recursive(tree, expansion, inval, root, core, reshape);

        let mut steps = 0;
        loop {
            let width = self.geom.get(root).platform.subtree_arc_width;
            let next = if width > MAX_ARC_WIDTH {
                self.core_radius * CORE_GROW_FACTOR
            } else if width < MIN_ARC_WIDTH && self.core_radius > MIN_CORE_RADIUS {
                MIN_CORE_RADIUS.max(self.core_radius / CORE_GROW_FACTOR)
            } else {
                break;
            };

            if steps == MAX_REGULATION_STEPS {
                log::warn!(
                    "core radius regulation stopped after {steps} steps (arc width {width:.1}, radius {:.0})",
                    self.core_radius
                );
                break;
            }
            steps += 1;

            log::debug!(
                "tree arc width {width:.1}: core radius {:.0} -> {next:.0}",
                self.core_radius
            );
            self.core_radius = next;
            self.arrange_recursive(tree, expansion, inval, root, next, true);
        }
        steps > 0
    }

    /// Lay the children of a directory out in rows on its platform,
    /// innermost row first, and fix the platform's depth to the rows used.
    pub fn build_dir(&mut self, tree: &FileTree, dnode: NodeId, r0: f64) {
        assert!(tree.is_dir(dnode), "leaf packing of a {:?}", tree.kind(dnode));
        let arc_width = self.geom.get(dnode).platform.arc_width;
        let children: Vec<NodeId> = tree.children(dnode).collect();

        // Rows are filled from the last child backwards
        let mut remaining = children.len();
        let mut r = r0 + LEAF_NODE_EDGE;
        while remaining > 0 {
            let arc_len = (PI / 180.0) * r * arc_width - PLATFORM_SPACING_WIDTH;
            let row_count = (((arc_len - EDGE05) / EDGE15).floor() as usize).max(1);
            let inter_arc_width = (180.0 * EDGE15 / PI) / r;

            let in_row = row_count.min(remaining);
            let mut theta = 0.5 * inter_arc_width * (in_row as f64 - 1.0);
            for _ in 0..in_row {
                remaining -= 1;
                let leaf = &mut self.geom.entry(children[remaining]).leaf;
                leaf.theta = theta;
                leaf.distance = r - r0;
                theta -= inter_arc_width;
            }
            r += EDGE15;
        }

        self.geom.entry(dnode).platform.depth = r - EDGE05 - r0;
    }

    /// Repack a directory that is at least partly deployed. Returns false
    /// when there was nothing to build.
    pub fn rebuild(&mut self, tree: &FileTree, expansion: &ExpansionState, dnode: NodeId) -> bool {
        if !tree.is_dir(dnode) || expansion.is_collapsed(dnode) {
            return false;
        }
        let r0 = self.platform_r0(tree, dnode);
        self.build_dir(tree, dnode, r0);
        true
    }

    /// Bottom center of a node drawn as a leaf on its parent's platform
    pub fn leaf_position(&self, tree: &FileTree, node: NodeId) -> Rtz {
        let Some(parent) = tree.parent(node) else {
            panic!("the root wrapper has no leaf form");
        };
        Rtz {
            r: self.platform_r0(tree, parent) + self.geom.get(node).leaf.distance,
            theta: self.platform_theta(tree, parent) + self.geom.get(node).leaf.theta,
            z: self.geom.get(parent).platform.height,
        }
    }

    /// Padded bounding box of a leaf block or a platform, in absolute polar coordinates
    pub fn corners(&self, tree: &FileTree, expansion: &ExpansionState, node: NodeId) -> (Rtz, Rtz) {
        if Self::is_leaf(tree, expansion, node) {
            let pos = self.leaf_position(tree, node);
            let leaf_arc_width = (180.0 * LEAF_NODE_EDGE / PI) / pos.r;
            let padding_arc_width = (180.0 * LEAF_PADDING / PI) / pos.r;
            let height = self.geom.get(node).leaf.height;

            let c0 = Rtz {
                r: pos.r - EDGE05 - LEAF_PADDING,
                theta: pos.theta - 0.5 * leaf_arc_width - padding_arc_width,
                z: pos.z - 0.5 * LEAF_PADDING,
            };
            let c1 = Rtz {
                r: pos.r + EDGE05 + LEAF_PADDING,
                theta: pos.theta + 0.5 * leaf_arc_width + padding_arc_width,
                z: pos.z + height + 0.5 * LEAF_PADDING,
            };
            (c0, c1)
        } else {
            let r0 = self.platform_r0(tree, node);
            let theta = self.platform_theta(tree, node);
            let platform = self.geom.get(node).platform;

            // The sides already take in the spacing between platforms
            let c0 = Rtz {
                r: r0 - PLATFORM_PADDING,
                theta: theta - 0.5 * platform.arc_width,
                z: 0.0,
            };
            let c1 = Rtz {
                r: r0 + platform.depth + PLATFORM_PADDING,
                theta: theta + 0.5 * platform.arc_width,
                z: platform.height,
            };
            (c0, c1)
        }
    }

    /// Ground-plane extents of an expanded directory and all of its expanded descendants
    pub fn extents(&self, tree: &FileTree, expansion: &ExpansionState, dnode: NodeId) -> (Rt, Rt) {
        assert!(!Self::is_leaf(tree, expansion, dnode), "extents of a collapsed node");
        let mut c0 = Rt {
            r: f64::MAX,
            theta: f64::MAX,
        };
        let mut c1 = Rt {
            r: f64::MIN,
            theta: f64::MIN,
        };
        let r0 = self.platform_r0(tree, dnode);
        let theta = self.platform_theta(tree, dnode);
        self.extents_recursive(tree, expansion, dnode, r0, theta, &mut c0, &mut c1);
        (c0, c1)
    }

    #[allow(clippy::too_many_arguments)]
    fn extents_recursive(
        &self,
        tree: &FileTree,
        expansion: &ExpansionState,
        dnode: NodeId,
        r0: f64,
        theta: f64,
        c0: &mut Rt,
        c1: &mut Rt,
    ) {
        let platform = self.geom.get(dnode).platform;
        let subtree_r0 = r0 + platform.depth + PLATFORM_SPACING_DEPTH;
        for node in tree.children(dnode) {
            if !Self::is_leaf(tree, expansion, node) {
                let node_theta = theta + self.geom.get(node).platform.theta;
                self.extents_recursive(tree, expansion, node, subtree_r0, node_theta, c0, c1);
            }
        }

        // A whole arc width either side leaves a margin around the platform
        c0.r = c0.r.min(r0);
        c0.theta = c0.theta.min(theta - platform.arc_width);
        c1.r = c1.r.max(r0 + platform.depth);
        c1.theta = c1.theta.max(theta + platform.arc_width);
    }

    /// Leaf, platform, or the blend of the two while deploying
    pub fn form(&self, tree: &FileTree, expansion: &ExpansionState, node: NodeId) -> TreeForm {
        match tree.kind(node) {
            NodeKind::Root => TreeForm::Platform {
                r0: self.core_radius,
                theta: self.platform_theta(tree, node),
            },
            NodeKind::Directory if !expansion.is_collapsed(node) => {
                let r0 = self.platform_r0(tree, node);
                let theta = self.platform_theta(tree, node);
                if expansion.is_fully_expanded(node) {
                    TreeForm::Platform { r0, theta }
                } else {
                    TreeForm::Morphing {
                        leaf: self.leaf_position(tree, node),
                        r0,
                        theta,
                        scale: expansion.deployment(node),
                    }
                }
            }
            _ => TreeForm::Leaf {
                pos: self.leaf_position(tree, node),
            },
        }
    }
}
