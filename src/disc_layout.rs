use glam::DVec2;
use indextree::NodeId;

use crate::geometry::{DiscGeom, GeomTable};
use crate::tree::FileTree;

/// Angular range (degrees) the children of a directory may spread over
pub const LEAF_RANGE_ARC_WIDTH: f64 = 315.0;
/// Gap between a parent's rim and a child's rim, as a fraction of the child's radius
pub const LEAF_STEM_PROPORTION: f64 = 0.5;
/// Smallest size fed into the disc-area formula
pub const MIN_NODE_SIZE: u64 = 64;
/// Direction the root directory hangs from the root wrapper
const ROOT_STEM_THETA: f64 = 270.0;

/// A child waiting to be placed around its parent
#[derive(Debug, Clone, Copy)]
struct Satellite {
    node: NodeId,
    radius: f64,
    /// Center-to-center distance from the parent
    distance: f64,
    /// Unscaled angular footprint, degrees
    arc_width: f64,
    sort_size: u64,
}

/// Radial disc packing: every directory is a disc, its children orbit it
/// and alternate left and right of the stem that connects it to its parent.
pub struct DiscLayout;

impl DiscLayout {
    /// Lay out the whole tree from scratch
    pub fn init(tree: &FileTree) -> GeomTable<DiscGeom> {
        let mut geom = GeomTable::new();
        geom.insert(tree.root(), DiscGeom::default());
        Self::layout_children(tree, &mut geom, tree.root(), ROOT_STEM_THETA);

        // Pull the root wrapper down so the root directory's disc touches the origin
        let root_radius = geom.get(tree.root_dir()).radius;
        geom.entry(tree.root()).offset = DVec2::new(0.0, -root_radius);

        log::debug!("disc layout: {} nodes placed", geom.len());
        geom
    }

    /// Place the children of a directory that already has a record, then
    /// recurse. Running it again on unchanged input gives the same result.
    pub fn relayout(tree: &FileTree, geom: &mut GeomTable<DiscGeom>, dnode: NodeId) {
        let stem_theta = if dnode == tree.root() {
            ROOT_STEM_THETA
        } else {
            geom.get(dnode).theta + 180.0
        };
        Self::layout_children(tree, geom, dnode, stem_theta);
    }

    fn layout_children(tree: &FileTree, geom: &mut GeomTable<DiscGeom>, dnode: NodeId, stem_theta: f64) {
        assert!(
            tree.kind(dnode).is_container(),
            "disc layout of a non-directory {:?}",
            tree.kind(dnode)
        );

        let dir_radius = geom.get(dnode).radius;
        let mut satellites: Vec<Satellite> = tree
            .children(dnode)
            .map(|node| {
                let size = tree.effective_size(node, MIN_NODE_SIZE) as f64;
                // Disc area equals the node's size
                let radius = (size / std::f64::consts::PI).sqrt();
                let distance = dir_radius + radius * (1.0 + LEAF_STEM_PROPORTION);
                let arc_width = 2.0 * (radius / distance).asin().to_degrees();
                Satellite {
                    node,
                    radius,
                    distance,
                    arc_width,
                    sort_size: tree.effective_size(node, 0),
                }
            })
            .collect();

        if satellites.is_empty() {
            return;
        }

        // Largest first, then by name
        satellites.sort_by(|a, b| {
            b.sort_size
                .cmp(&a.sort_size)
                .then_with(|| tree.node(a.node).name.cmp(&tree.node(b.node).name))
        });

        let total_arc_width: f64 = satellites.iter().map(|s| s.arc_width).sum();
        let k = LEAF_RANGE_ARC_WIDTH / total_arc_width;
        // Tight fit: push every other pair of discs outward
        let stagger = k <= 1.0;

        let mut theta0 = stem_theta - 180.0;
        let mut theta1 = stem_theta + 180.0;
        let mut even = true;
        let mut out = true;

        for (i, sat) in satellites.iter().enumerate() {
            let arc_width = k * sat.arc_width;
            let mut distance = sat.distance;
            if stagger && out {
                distance += 2.0 * sat.radius;
            }

            let theta = if i == 0 {
                let theta = theta0;
                theta0 += 0.5 * arc_width;
                theta1 -= 0.5 * arc_width;
                out = !out;
                theta
            } else if even {
                let theta = theta0 + 0.5 * arc_width;
                theta0 += arc_width;
                out = !out;
                theta
            } else {
                let theta = theta1 - 0.5 * arc_width;
                theta1 -= arc_width;
                theta
            };

            let rad = theta.to_radians();
            geom.insert(
                sat.node,
                DiscGeom {
                    offset: distance * DVec2::new(rad.cos(), rad.sin()),
                    radius: sat.radius,
                    theta,
                },
            );

            if tree.is_dir(sat.node) {
                Self::layout_children(tree, geom, sat.node, theta + 180.0);
            }
            even = !even;
        }
    }

    /// Absolute center of a node: the sum of offsets up to the root wrapper
    pub fn node_pos(tree: &FileTree, geom: &GeomTable<DiscGeom>, node: NodeId) -> DVec2 {
        std::iter::once(node)
            .chain(tree.ancestors(node))
            .map(|id| geom.get(id).offset)
            .sum()
    }
}
