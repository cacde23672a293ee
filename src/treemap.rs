use glam::DVec2;
use indextree::NodeId;

use crate::expand_state::DirectoryVisibility;
use crate::geometry::{GeomTable, MapGeom};
use crate::tree::{FileTree, NodeKind};

/// Nominal border width as a fraction of the side of a square with the directory's area
pub const BORDER_PROPORTION: f64 = 0.01;
/// Width over depth of the root directory's footprint
pub const ROOT_ASPECT_RATIO: f64 = 1.2;
pub const DIR_HEIGHT: f64 = 384.0;
pub const LEAF_HEIGHT: f64 = 128.0;
/// Smallest size fed into the block-area formula
pub const MIN_NODE_SIZE: u64 = 256;

/// Item to be laid out in the treemap
#[derive(Debug, Clone, Copy)]
pub struct TreemapItem {
    pub node: NodeId,
    /// Effective size, already floored
    pub size: f64,
}

/// One laid-out block: the node's footprint plus the border around it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedBlock {
    pub node: NodeId,
    pub c0: DVec2,
    pub c1: DVec2,
    pub border: f64,
}

impl PackedBlock {
    pub fn area(&self) -> f64 {
        let dims = self.c1 - self.c0;
        dims.x * dims.y
    }

    /// Footprint of the node itself
    pub fn node_corners(&self) -> (DVec2, DVec2) {
        (self.c0 + DVec2::splat(self.border), self.c1 - DVec2::splat(self.border))
    }
}

#[derive(Debug, Clone, Copy)]
struct Row {
    first: usize,
    count: usize,
    area: f64,
}

/// Squarified treemap in rows: each directory's top face is cut into rows
/// of blocks running from the rear right corner, every block's area
/// proportional to its node's size plus a border.
pub struct SquarifiedTreemap;

impl SquarifiedTreemap {
    /// Pack `items` (largest first) into the face `top_c0..top_c1`.
    ///
    /// The blocks tile the face minus a half-border margin exactly; each
    /// block's border is solved so the node inside keeps an area
    /// proportional to its size.
    pub fn pack(items: &[TreemapItem], top_c0: DVec2, top_c1: DVec2) -> Vec<PackedBlock> {
        if items.is_empty() {
            return vec![];
        }

        let mut dims = top_c1 - top_c0;
        let nominal_border = (BORDER_PROPORTION * (dims.x * dims.y).sqrt()).min(dims.min_element() / 3.0);
        // Keep blocks half a border away from the edges
        dims -= DVec2::splat(nominal_border);
        let dir_area = dims.x * dims.y;

        let mut block_areas: Vec<f64> = items
            .iter()
            .map(|item| {
                let k = item.size.sqrt() + nominal_border;
                k * k
            })
            .collect();
        let total_block_area: f64 = block_areas.iter().sum();
        let scale = dir_area / total_block_area;

        // A row takes blocks until one of them comes out deeper than wide
        let mut rows: Vec<Row> = Vec::new();
        let mut current: Option<Row> = None;
        for (i, area) in block_areas.iter_mut().enumerate() {
            *area *= scale;
            let row = current.get_or_insert(Row {
                first: i,
                count: 0,
                area: 0.0,
            });
            row.count += 1;
            row.area += *area;

            let depth = row.area / dims.x;
            let width = *area / depth;
            if width / depth < 1.0 {
                rows.extend(current.take());
            }
        }
        rows.extend(current);

        let start = 0.5 * (top_c0 + top_c1) + 0.5 * dims;
        let mut packed = Vec::with_capacity(items.len());
        let mut pos_y = start.y;
        for row in rows {
            let depth = row.area / dims.x;
            let mut pos_x = start.x;
            for i in row.first..row.first + row.count {
                let block_area = block_areas[i];
                let width = block_area / depth;
                let node_area = scale * items[i].size;

                // Border b with (width - 2b)(depth - 2b) = node_area
                let k = width + depth;
                let border = 0.25 * (k - (k * k - 4.0 * (block_area - node_area)).max(0.0).sqrt());

                packed.push(PackedBlock {
                    node: items[i].node,
                    c0: DVec2::new(pos_x - width, pos_y - depth),
                    c1: DVec2::new(pos_x, pos_y),
                    border,
                });
                pos_x -= width;
            }
            pos_y -= depth;
        }
        packed
    }

    /// Lay out the whole tree from scratch
    pub fn init(tree: &FileTree) -> GeomTable<MapGeom> {
        let mut geom = GeomTable::new();

        let root_size = tree.effective_size(tree.root_dir(), MIN_NODE_SIZE) as f64;
        let depth = (root_size / ROOT_ASPECT_RATIO).sqrt();
        let half = 0.5 * DVec2::new(ROOT_ASPECT_RATIO * depth, depth);

        geom.insert(
            tree.root(),
            MapGeom {
                c0: -half,
                c1: half,
                height: 0.0,
            },
        );
        geom.insert(
            tree.root_dir(),
            MapGeom {
                c0: -half,
                c1: half,
                height: DIR_HEIGHT,
            },
        );
        Self::layout_children(tree, &mut geom, tree.root_dir());

        log::debug!("map layout: {} nodes placed", geom.len());
        geom
    }

    /// Lay the children of `dnode` out again. The root wrapper stands for the root directory.
    pub fn relayout(tree: &FileTree, geom: &mut GeomTable<MapGeom>, dnode: NodeId) {
        let dnode = if dnode == tree.root() { tree.root_dir() } else { dnode };
        Self::layout_children(tree, geom, dnode);
    }

    fn layout_children(tree: &FileTree, geom: &mut GeomTable<MapGeom>, dnode: NodeId) {
        assert!(tree.is_dir(dnode), "map layout of a non-directory {:?}", tree.kind(dnode));

        let mut items: Vec<TreemapItem> = tree
            .children(dnode)
            .map(|node| TreemapItem {
                node,
                size: tree.effective_size(node, MIN_NODE_SIZE) as f64,
            })
            .collect();
        if items.is_empty() {
            return;
        }

        // Sort by size descending for better aspect ratios
        items.sort_by(|a, b| {
            b.size
                .total_cmp(&a.size)
                .then_with(|| tree.node(a.node).name.cmp(&tree.node(b.node).name))
        });

        let (top_c0, top_c1) = geom.get(dnode).top_face(NodeKind::Directory);
        for block in Self::pack(&items, top_c0, top_c1) {
            let (c0, c1) = block.node_corners();
            let is_dir = tree.is_dir(block.node);
            let height = if is_dir { DIR_HEIGHT } else { LEAF_HEIGHT };
            geom.insert(block.node, MapGeom { c0, c1, height });
            if is_dir {
                Self::layout_children(tree, geom, block.node);
            }
        }
    }

    /// Height of the bottom of a node: the stacked heights of its ancestors
    pub fn node_z0(tree: &FileTree, geom: &GeomTable<MapGeom>, node: NodeId) -> f64 {
        tree.ancestors(node).map(|id| geom.get(id).height).sum()
    }

    /// Tallest stack of nodes standing on `dnode`'s top face, given which
    /// directories are open.
    pub fn max_expanded_height<V: DirectoryVisibility + ?Sized>(
        tree: &FileTree,
        geom: &GeomTable<MapGeom>,
        visibility: &V,
        dnode: NodeId,
    ) -> f64 {
        assert!(tree.is_dir(dnode), "expanded height of a non-directory");
        if !visibility.is_expanded(dnode) {
            return 0.0;
        }

        tree.children(dnode)
            .map(|node| {
                let height = geom.get(node).height;
                if tree.is_dir(node) {
                    height + Self::max_expanded_height(tree, geom, visibility, node)
                } else {
                    height
                }
            })
            .fold(0.0, f64::max)
    }
}
