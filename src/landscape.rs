use glam::DVec2;
use indextree::NodeId;

use crate::animation::{MorphCurve, MorphEvent, MorphRequest, MorphScheduler};
use crate::config::{AnimationConfig, Config};
use crate::disc_layout::DiscLayout;
use crate::expand_state::{ColExpPhase, DirDeployment, DirectoryVisibility, ExpansionState, EPSILON};
use crate::geometry::{DiscGeom, GeomTable, Invalidation, LayoutMode, MapGeom, NodeFlags};
use crate::tree::{FileTree, NodeKind};
use crate::tree_layout::{Rt, Rtz, TreeForm, TreeLayout};
use crate::treemap::SquarifiedTreemap;

/// Collapse/expand requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColExpMessage {
    Collapse,
    Expand,
    /// Collapse a directory and everything open below it, deepest first
    CollapseRecursive,
    /// Expand a directory and then, level by level, everything below it
    ExpandRecursive,
    /// Expand a directory together with any collapsed ancestors
    ExpandAny,
}

/// Tag carried on deployment morph events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    /// Waiting for other directories before starting to move
    Hold,
    Deploy,
}

#[derive(Debug, Clone)]
enum ModeLayout {
    Disc(GeomTable<DiscGeom>),
    Map(GeomTable<MapGeom>),
    Tree(TreeLayout),
}

/// Where a node is, in the terms of the active mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeLocation {
    /// Absolute center of the node's disc
    Disc { pos: DVec2 },
    /// Footprint corners and the height of its base
    Map { c0: DVec2, c1: DVec2, z0: f64 },
    /// Platform inner edge (directories) or leaf base (everything else)
    Tree { r: f64, theta: f64, z: f64 },
}

/// What one `update` call did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Directories whose geometry was rebuilt
    pub rebuilt: usize,
    /// Tree mode: angular positions were recomputed
    pub rearranged: bool,
    /// Tree mode: the core radius changed
    pub core_resized: bool,
    /// Morphs are still running
    pub animating: bool,
}

/// The layout context: active mode, its geometry, the per-directory
/// deployment table and the morphs driving it.
///
/// Runs on the caller's frame loop. `colexp` starts transitions and `update`
/// advances them and brings geometry up to date. Queries are only
/// meaningful between two `update` calls.
#[derive(Debug)]
pub struct Landscape {
    mode: LayoutMode,
    layout: ModeLayout,
    expansion: ExpansionState,
    inval: Invalidation,
    scheduler: MorphScheduler<NodeId, Stage>,
    timing: AnimationConfig,
}

impl Landscape {
    /// Seed deployments from `visibility` and lay the tree out in `mode`
    pub fn new<V: DirectoryVisibility + ?Sized>(
        tree: &FileTree,
        mode: LayoutMode,
        config: &Config,
        visibility: &V,
    ) -> Self {
        let mut landscape = Self {
            mode,
            layout: ModeLayout::Disc(GeomTable::new()),
            expansion: ExpansionState::seed(tree, visibility),
            inval: Invalidation::default(),
            scheduler: MorphScheduler::new(),
            timing: config.animation.clone(),
        };
        landscape.init_layout(tree);
        landscape
    }

    fn init_layout(&mut self, tree: &FileTree) {
        self.inval.reset();
        self.expansion.snap_to_intent();
        self.layout = match self.mode {
            LayoutMode::Disc => ModeLayout::Disc(DiscLayout::init(tree)),
            LayoutMode::Map => ModeLayout::Map(SquarifiedTreemap::init(tree)),
            LayoutMode::Tree => ModeLayout::Tree(TreeLayout::init(tree, &self.expansion, &mut self.inval)),
        };
        let rebuilt = self.rebuild_pass(tree);
        log::info!(
            "{} landscape ready: {} nodes, {} directories built",
            self.mode,
            tree.node_count(),
            rebuilt
        );
    }

    /// Switch modes. Running transitions jump to where they were heading and
    /// the new mode is laid out from scratch.
    pub fn set_mode(&mut self, tree: &FileTree, mode: LayoutMode) {
        let now = self.scheduler.now();
        self.scheduler = MorphScheduler::new();
        self.scheduler.set_clock(now);
        self.mode = mode;
        self.init_layout(tree);
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    pub fn deployment(&self, dnode: NodeId) -> f64 {
        self.expansion.deployment(dnode)
    }

    pub fn phase(&self, dnode: NodeId) -> ColExpPhase {
        self.expansion.phase(dnode)
    }

    pub fn dir_state(&self, dnode: NodeId) -> DirDeployment {
        self.expansion.get(dnode)
    }

    pub fn is_animating(&self) -> bool {
        self.scheduler.is_active()
    }

    /// Start collapsing or expanding `dnode`. A request for a directory that
    /// is already moving replaces the running transition from its current
    /// deployment.
    pub fn colexp(&mut self, tree: &FileTree, dnode: NodeId, message: ColExpMessage) {
        assert!(tree.is_dir(dnode), "collapse/expand of a {:?}", tree.kind(dnode));
        log::debug!("{message:?} {}", tree.node(dnode).path.display());

        match message {
            ColExpMessage::Collapse => {
                self.begin(tree, dnode, 0.0, 0.0);
            }
            ColExpMessage::Expand => {
                self.begin(tree, dnode, 1.0, 0.0);
            }
            ColExpMessage::CollapseRecursive => {
                self.collapse_recursive(tree, dnode);
            }
            ColExpMessage::ExpandRecursive => self.expand_recursive(tree, dnode, 0.0),
            ColExpMessage::ExpandAny => {
                let mut chain: Vec<NodeId> = tree.ancestors(dnode).filter(|&id| tree.is_dir(id)).collect();
                chain.reverse();
                chain.push(dnode);
                for id in chain {
                    if !self.expansion.is_expanded(id) {
                        self.begin(tree, id, 1.0, 0.0);
                    }
                }
            }
        }
    }

    /// Returns the number of seconds until `dnode` has finished collapsing.
    fn collapse_recursive(&mut self, tree: &FileTree, dnode: NodeId) -> f64 {
        let subdirs: Vec<NodeId> = tree.children(dnode).filter(|&n| tree.is_dir(n)).collect();
        let mut wait = 0.0_f64;
        for node in subdirs {
            if self.expansion.is_expanded(node) || !self.expansion.is_collapsed(node) {
                wait = wait.max(self.collapse_recursive(tree, node));
            }
        }
        self.begin(tree, dnode, 0.0, wait)
    }

    fn expand_recursive(&mut self, tree: &FileTree, dnode: NodeId, delay: f64) {
        let done = self.begin(tree, dnode, 1.0, delay);
        let subdirs: Vec<NodeId> = tree.children(dnode).filter(|&n| tree.is_dir(n)).collect();
        for node in subdirs {
            self.expand_recursive(tree, node, done);
        }
    }

    /// Move `dnode` toward `target` after waiting `delay` seconds. Returns
    /// the time from now until it gets there.
    fn begin(&mut self, tree: &FileTree, dnode: NodeId, target: f64, delay: f64) -> f64 {
        let expanding = target > 0.5;
        let deployment = self.expansion.deployment(dnode);
        // Constant speed: a half-finished transition reverses in half the time
        let duration = self.timing.colexp_duration(self.mode) * (target - deployment).abs();

        self.scheduler.cancel(&dnode);
        if duration <= 0.0 {
            let settled = if expanding {
                ColExpPhase::Expanded
            } else {
                ColExpPhase::Collapsed
            };
            self.expansion.set_phase(dnode, settled);
            return delay;
        }

        let moving = if expanding {
            ColExpPhase::Expanding
        } else {
            ColExpPhase::Collapsing
        };
        self.expansion.set_phase(dnode, moving);

        let curve = match self.mode {
            LayoutMode::Tree => MorphCurve::SigmoidAccel,
            LayoutMode::Disc | LayoutMode::Map => MorphCurve::Sigmoid,
        };
        let deploy = MorphRequest::new(curve, target, duration)
            .on_step()
            .on_end()
            .with_data(Stage::Deploy);

        if delay > 0.0 {
            let hold = MorphRequest::hold(delay).on_end().with_data(Stage::Hold);
            self.scheduler.start(&self.expansion, dnode, hold);
            self.scheduler.chain(&self.expansion, dnode, deploy);
        } else {
            self.initiated(tree, dnode);
            self.scheduler.start(&self.expansion, dnode, deploy);
        }

        self.inval.queue_rebuild(dnode);
        if self.mode == LayoutMode::Tree {
            TreeLayout::queue_rearrange(tree, &mut self.inval, dnode);
        }
        delay + duration
    }

    /// A directory's deployment is about to start changing
    fn initiated(&mut self, tree: &FileTree, dnode: NodeId) {
        if let ModeLayout::Tree(layout) = &mut self.layout {
            layout.colexp_initiated(tree, &self.expansion, &mut self.inval, dnode);
        }
    }

    /// A directory's deployment changed this frame
    fn in_progress(&mut self, tree: &FileTree, dnode: NodeId) {
        let state = self.expansion.get(dnode);
        if state.geom_expanded != (state.deployment > EPSILON) {
            self.inval.queue_rebuild(dnode);
        }
        if self.mode == LayoutMode::Tree {
            TreeLayout::queue_rearrange(tree, &mut self.inval, dnode);
        }
    }

    fn dispatch(&mut self, tree: &FileTree, events: Vec<MorphEvent<NodeId, Stage>>) {
        for event in events {
            match event {
                MorphEvent::Step {
                    key,
                    data: Stage::Deploy,
                    ..
                } => self.in_progress(tree, key),
                MorphEvent::Finished {
                    key,
                    value,
                    data: Stage::Deploy,
                } => {
                    let phase = if value > 0.5 {
                        ColExpPhase::Expanded
                    } else {
                        ColExpPhase::Collapsed
                    };
                    self.expansion.set_phase(key, phase);
                    self.in_progress(tree, key);
                }
                MorphEvent::Finished {
                    key,
                    data: Stage::Hold,
                    ..
                } => self.initiated(tree, key),
                MorphEvent::Step { data: Stage::Hold, .. } | MorphEvent::Scheduled { .. } => {}
            }
        }
    }

    /// Jump a directory's running transition to its end. Geometry catches
    /// up on the next `update`.
    pub fn force_complete(&mut self, tree: &FileTree, dnode: NodeId) {
        // A held expand has not been initiated yet and the jump leaves it
        // looking already open
        if self.expansion.is_expanded(dnode) && self.expansion.is_collapsed(dnode) {
            self.initiated(tree, dnode);
        }
        let events = self.scheduler.force_complete(&mut self.expansion, &dnode);
        self.dispatch(tree, events);
    }

    /// Advance animations to `now` (seconds) and bring geometry up to date.
    pub fn update(&mut self, tree: &FileTree, now: f64) -> FrameReport {
        let events = self.scheduler.tick(&mut self.expansion, now);
        self.dispatch(tree, events);

        let mut report = FrameReport::default();
        if let ModeLayout::Tree(layout) = &mut self.layout {
            report.rearranged = self.inval.contains(tree.root(), NodeFlags::NEEDS_REARRANGE);
            report.core_resized = layout.arrange(tree, &self.expansion, &mut self.inval, false);
        }
        report.rebuilt = self.rebuild_pass(tree);
        report.animating = self.scheduler.is_active();
        report
    }

    fn rebuild_pass(&mut self, tree: &FileTree) -> usize {
        let mut queue = self.inval.take_rebuilds();
        // Parents first: a platform's depth moves everything above it
        queue.sort_by_key(|&id| tree.ancestors(id).count());

        let mut rebuilt = 0;
        for dnode in queue {
            let built = match &mut self.layout {
                ModeLayout::Disc(geom) => {
                    DiscLayout::relayout(tree, geom, dnode);
                    true
                }
                ModeLayout::Map(geom) => {
                    SquarifiedTreemap::relayout(tree, geom, dnode);
                    true
                }
                ModeLayout::Tree(layout) => layout.rebuild(tree, &self.expansion, dnode),
            };
            if tree.is_dir(dnode) {
                let expanded = !self.expansion.is_collapsed(dnode);
                self.expansion.set_geom_expanded(dnode, expanded);
            }
            if built {
                rebuilt += 1;
            }
        }
        if rebuilt > 0 {
            log::debug!("{} mode: rebuilt {rebuilt} directories", self.mode);
        }
        rebuilt
    }

    pub fn needs_rebuild(&self, node: NodeId) -> bool {
        self.inval.contains(node, NodeFlags::NEEDS_REBUILD)
    }

    pub fn needs_rearrange(&self, node: NodeId) -> bool {
        self.inval.contains(node, NodeFlags::NEEDS_REARRANGE)
    }

    /// Whether the cursor may rest on `node` in the active mode
    pub fn should_highlight(&self, tree: &FileTree, node: NodeId) -> bool {
        match tree.kind(node) {
            NodeKind::Root => false,
            NodeKind::Directory => match self.mode {
                LayoutMode::Disc => true,
                LayoutMode::Map => self.expansion.is_collapsed(node),
                LayoutMode::Tree => TreeLayout::is_leaf(tree, &self.expansion, node),
            },
            _ => true,
        }
    }

    /// Position of `node` for camera targeting
    pub fn locate(&self, tree: &FileTree, node: NodeId) -> NodeLocation {
        match &self.layout {
            ModeLayout::Disc(geom) => NodeLocation::Disc {
                pos: DiscLayout::node_pos(tree, geom, node),
            },
            ModeLayout::Map(geom) => {
                let record = geom.get(node);
                NodeLocation::Map {
                    c0: record.c0,
                    c1: record.c1,
                    z0: SquarifiedTreemap::node_z0(tree, geom, node),
                }
            }
            ModeLayout::Tree(layout) => {
                if TreeLayout::is_leaf(tree, &self.expansion, node) {
                    let pos = layout.leaf_position(tree, node);
                    NodeLocation::Tree {
                        r: pos.r,
                        theta: pos.theta,
                        z: pos.z,
                    }
                } else {
                    NodeLocation::Tree {
                        r: layout.platform_r0(tree, node),
                        theta: layout.platform_theta(tree, node),
                        z: 0.0,
                    }
                }
            }
        }
    }

    pub fn disc(&self) -> Option<&GeomTable<DiscGeom>> {
        match &self.layout {
            ModeLayout::Disc(geom) => Some(geom),
            _ => None,
        }
    }

    pub fn map(&self) -> Option<&GeomTable<MapGeom>> {
        match &self.layout {
            ModeLayout::Map(geom) => Some(geom),
            _ => None,
        }
    }

    pub fn tree(&self) -> Option<&TreeLayout> {
        match &self.layout {
            ModeLayout::Tree(layout) => Some(layout),
            _ => None,
        }
    }

    fn disc_table(&self) -> &GeomTable<DiscGeom> {
        self.disc().unwrap_or_else(|| panic!("disc geometry requested in {} mode", self.mode))
    }

    fn map_table(&self) -> &GeomTable<MapGeom> {
        self.map().unwrap_or_else(|| panic!("map geometry requested in {} mode", self.mode))
    }

    fn tree_layout(&self) -> &TreeLayout {
        self.tree().unwrap_or_else(|| panic!("tree geometry requested in {} mode", self.mode))
    }

    pub fn disc_position(&self, tree: &FileTree, node: NodeId) -> DVec2 {
        DiscLayout::node_pos(tree, self.disc_table(), node)
    }

    pub fn map_node_z0(&self, tree: &FileTree, node: NodeId) -> f64 {
        SquarifiedTreemap::node_z0(tree, self.map_table(), node)
    }

    pub fn map_max_expanded_height(&self, tree: &FileTree, dnode: NodeId) -> f64 {
        SquarifiedTreemap::max_expanded_height(tree, self.map_table(), &self.expansion, dnode)
    }

    pub fn map_top_face(&self, tree: &FileTree, node: NodeId) -> (DVec2, DVec2) {
        self.map_table().get(node).top_face(tree.kind(node))
    }

    /// Tree mode core radius, `None` in the other modes
    pub fn core_radius(&self) -> Option<f64> {
        self.tree().map(TreeLayout::core_radius)
    }

    pub fn platform_r0(&self, tree: &FileTree, dnode: NodeId) -> f64 {
        self.tree_layout().platform_r0(tree, dnode)
    }

    pub fn platform_theta(&self, tree: &FileTree, dnode: NodeId) -> f64 {
        self.tree_layout().platform_theta(tree, dnode)
    }

    pub fn max_leaf_height(&self, tree: &FileTree, dnode: NodeId) -> f64 {
        self.tree_layout().max_leaf_height(tree, &self.expansion, dnode)
    }

    pub fn tree_extents(&self, tree: &FileTree, dnode: NodeId) -> (Rt, Rt) {
        self.tree_layout().extents(tree, &self.expansion, dnode)
    }

    pub fn tree_corners(&self, tree: &FileTree, node: NodeId) -> (Rtz, Rtz) {
        self.tree_layout().corners(tree, &self.expansion, node)
    }

    pub fn tree_form(&self, tree: &FileTree, node: NodeId) -> TreeForm {
        self.tree_layout().form(tree, &self.expansion, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expand_state::{AllCollapsed, AllExpanded};
    use crate::platform;
    use std::collections::HashSet;

    const MB: u64 = 1_000_000;
    const FRAME: f64 = 1.0 / 60.0;

    struct Scenario {
        tree: FileTree,
        big: NodeId,
        mid: NodeId,
        small: NodeId,
    }

    /// 10 MB, 1 MB and 100 KB directories, holding 10, 4 and 1 files
    fn scenario() -> Scenario {
        let mut tree = FileTree::new("/land");
        let root = tree.root_dir();
        let dir = |tree: &mut FileTree, name: &str, files: u64, total: u64| {
            let dir = tree.add_child(root, name, NodeKind::Directory, 0);
            for i in 0..files {
                tree.add_child(dir, &format!("{name}-{i}"), NodeKind::RegularFile, total / files);
            }
            dir
        };
        let big = dir(&mut tree, "big", 10, 10 * MB);
        let mid = dir(&mut tree, "mid", 4, MB);
        let small = dir(&mut tree, "small", 1, MB / 10);
        tree.finalize();
        Scenario { tree, big, mid, small }
    }

    /// root/a/b/file
    fn chain_tree() -> (FileTree, NodeId, NodeId) {
        let mut tree = FileTree::new("/chain");
        let a = tree.add_child(tree.root_dir(), "a", NodeKind::Directory, 0);
        let b = tree.add_child(a, "b", NodeKind::Directory, 0);
        tree.add_child(b, "file", NodeKind::RegularFile, 4096);
        tree.finalize();
        (tree, a, b)
    }

    fn run_until_idle(landscape: &mut Landscape, tree: &FileTree, mut now: f64) -> (f64, bool) {
        let mut rearranged = false;
        for _ in 0..600 {
            now += FRAME;
            let report = landscape.update(tree, now);
            rearranged |= report.rearranged;
            if !report.animating {
                break;
            }
        }
        (now, rearranged)
    }

    fn slot(landscape: &Landscape, dnode: NodeId) -> f64 {
        let platform = landscape.tree().unwrap().get(dnode).platform;
        landscape.deployment(dnode) * platform.arc_width.max(platform.subtree_arc_width)
    }

    #[test]
    fn test_end_to_end_tree_expand() {
        let s = scenario();
        let tree = &s.tree;
        let open: HashSet<NodeId> = [tree.root_dir(), s.big, s.small].into_iter().collect();
        let mut landscape = Landscape::new(tree, LayoutMode::Tree, &Config::default(), &open);

        assert!(slot(&landscape, s.big) > slot(&landscape, s.small));
        assert_eq!(slot(&landscape, s.mid), 0.0);
        assert!(!landscape.needs_rearrange(tree.root_dir()));

        landscape.colexp(tree, s.mid, ColExpMessage::Expand);
        assert_eq!(landscape.phase(s.mid), ColExpPhase::Expanding);
        assert!(landscape.needs_rearrange(tree.root_dir()));

        let (_, rearranged) = run_until_idle(&mut landscape, tree, 0.0);
        assert!(rearranged);
        assert_eq!(landscape.deployment(s.mid), 1.0);
        assert_eq!(landscape.phase(s.mid), ColExpPhase::Expanded);
        assert!(!landscape.needs_rearrange(tree.root_dir()));
        assert!(!landscape.needs_rearrange(tree.root()));

        let (big, mid, small) = (slot(&landscape, s.big), slot(&landscape, s.mid), slot(&landscape, s.small));
        assert!(big > mid && big > small, "slots {big} {mid} {small}");
        assert!(matches!(landscape.tree_form(tree, s.mid), TreeForm::Platform { .. }));
    }

    #[test]
    fn test_tree_expand_passes_through_morphing_form() {
        let s = scenario();
        let tree = &s.tree;
        let open: HashSet<NodeId> = [tree.root_dir()].into_iter().collect();
        let mut landscape = Landscape::new(tree, LayoutMode::Tree, &Config::default(), &open);

        landscape.colexp(tree, s.big, ColExpMessage::Expand);
        landscape.update(tree, 0.5);
        let TreeForm::Morphing { scale, .. } = landscape.tree_form(tree, s.big) else {
            panic!("expected a morphing platform");
        };
        assert!(scale > 0.0 && scale < 1.0);
        // Geometry was rebuilt as soon as the platform started to show
        assert!(landscape.dir_state(s.big).geom_expanded);
        assert!(!landscape.should_highlight(tree, s.big));
    }

    #[test]
    fn test_collapse_recursive_goes_deepest_first() {
        let (tree, a, b) = chain_tree();
        let mut landscape = Landscape::new(&tree, LayoutMode::Disc, &Config::default(), &AllExpanded);

        landscape.colexp(&tree, a, ColExpMessage::CollapseRecursive);
        assert_eq!(landscape.phase(a), ColExpPhase::Collapsing);
        assert_eq!(landscape.phase(b), ColExpPhase::Collapsing);
        assert_eq!(landscape.phase(tree.root_dir()), ColExpPhase::Expanded);

        // Halfway through b's collapse, a has not moved
        landscape.update(&tree, 0.375);
        assert!(landscape.deployment(b) < 1.0 && landscape.deployment(b) > 0.0);
        assert_eq!(landscape.deployment(a), 1.0);

        run_until_idle(&mut landscape, &tree, 0.375);
        assert_eq!(landscape.deployment(a), 0.0);
        assert_eq!(landscape.deployment(b), 0.0);
        assert_eq!(landscape.phase(a), ColExpPhase::Collapsed);
        assert_eq!(landscape.phase(b), ColExpPhase::Collapsed);
    }

    #[test]
    fn test_expand_recursive_cascades_down() {
        let (tree, a, b) = chain_tree();
        let mut landscape = Landscape::new(&tree, LayoutMode::Map, &Config::default(), &AllCollapsed);

        landscape.colexp(&tree, tree.root_dir(), ColExpMessage::ExpandRecursive);
        for dir in [tree.root_dir(), a, b] {
            assert_eq!(landscape.phase(dir), ColExpPhase::Expanding);
        }

        landscape.update(&tree, 0.25);
        assert!(landscape.deployment(tree.root_dir()) > 0.0);
        assert_eq!(landscape.deployment(a), 0.0);
        assert_eq!(landscape.deployment(b), 0.0);

        run_until_idle(&mut landscape, &tree, 0.25);
        for dir in [tree.root_dir(), a, b] {
            assert_eq!(landscape.deployment(dir), 1.0);
        }
    }

    #[test]
    fn test_expand_any_opens_ancestors() {
        let (tree, a, b) = chain_tree();
        let mut landscape = Landscape::new(&tree, LayoutMode::Tree, &Config::default(), &AllCollapsed);

        landscape.colexp(&tree, b, ColExpMessage::ExpandAny);
        for dir in [tree.root_dir(), a, b] {
            assert!(landscape.expansion().is_expanded(dir));
        }
        run_until_idle(&mut landscape, &tree, 0.0);
        for dir in [tree.root_dir(), a, b] {
            assert_eq!(landscape.deployment(dir), 1.0);
        }
        assert!(matches!(landscape.tree_form(&tree, b), TreeForm::Platform { .. }));
    }

    #[test]
    fn test_reversal_starts_from_current_deployment() {
        let (tree, a, _) = chain_tree();
        let open: HashSet<NodeId> = [tree.root_dir()].into_iter().collect();
        let mut landscape = Landscape::new(&tree, LayoutMode::Disc, &Config::default(), &open);

        landscape.colexp(&tree, a, ColExpMessage::Expand);
        // Sigmoid midpoint
        landscape.update(&tree, 0.375);
        assert!((landscape.deployment(a) - 0.5).abs() < 1e-9);

        landscape.colexp(&tree, a, ColExpMessage::Collapse);
        assert_eq!(landscape.phase(a), ColExpPhase::Collapsing);
        assert!((landscape.deployment(a) - 0.5).abs() < 1e-9);

        // Half the distance takes half the time
        landscape.update(&tree, 0.375 + 0.375);
        assert_eq!(landscape.deployment(a), 0.0);
        assert_eq!(landscape.phase(a), ColExpPhase::Collapsed);
    }

    #[test]
    fn test_force_complete_lands_exactly() {
        let (tree, a, b) = chain_tree();
        let mut landscape = Landscape::new(&tree, LayoutMode::Tree, &Config::default(), &AllExpanded);

        landscape.colexp(&tree, a, ColExpMessage::CollapseRecursive);
        landscape.update(&tree, 0.2);
        landscape.force_complete(&tree, b);
        landscape.force_complete(&tree, a);
        assert_eq!(landscape.deployment(a), 0.0);
        assert_eq!(landscape.deployment(b), 0.0);
        assert_eq!(landscape.phase(a), ColExpPhase::Collapsed);
        assert!(!landscape.is_animating());

        let report = landscape.update(&tree, 0.25);
        assert!(report.rearranged);
        assert!(matches!(landscape.tree_form(&tree, a), TreeForm::Leaf { .. }));
        assert!(!landscape.dir_state(a).geom_expanded);
    }

    #[test]
    fn test_force_complete_shapes_held_platform() {
        let mut tree = FileTree::new("/held");
        let a = tree.add_child(tree.root_dir(), "a", NodeKind::Directory, 0);
        for i in 0..20 {
            tree.add_child(a, &format!("f{i}"), NodeKind::RegularFile, 1024);
        }
        tree.finalize();
        let root_dir = tree.root_dir();
        let mut landscape = Landscape::new(&tree, LayoutMode::Tree, &Config::default(), &AllCollapsed);

        landscape.colexp(&tree, root_dir, ColExpMessage::ExpandRecursive);
        assert_eq!(landscape.phase(a), ColExpPhase::Expanding);
        assert_eq!(landscape.deployment(a), 0.0);
        let r0 = landscape.platform_r0(&tree, a);

        landscape.force_complete(&tree, a);
        landscape.force_complete(&tree, root_dir);
        landscape.update(&tree, 0.1);

        assert_eq!(landscape.deployment(a), 1.0);
        let arc_width = landscape.tree().unwrap().get(a).platform.arc_width;
        assert_eq!(arc_width, platform::reshape(20, r0).arc_width);
        assert!(arc_width < crate::tree_layout::MIN_ARC_WIDTH);
    }

    #[test]
    fn test_set_mode_snaps_and_keeps_intent() {
        let s = scenario();
        let tree = &s.tree;
        let open: HashSet<NodeId> = [tree.root_dir()].into_iter().collect();
        let mut landscape = Landscape::new(tree, LayoutMode::Tree, &Config::default(), &open);

        landscape.colexp(tree, s.big, ColExpMessage::Expand);
        landscape.update(tree, 0.3);
        landscape.set_mode(tree, LayoutMode::Map);

        assert_eq!(landscape.mode(), LayoutMode::Map);
        assert_eq!(landscape.deployment(s.big), 1.0);
        assert_eq!(landscape.phase(s.big), ColExpPhase::Expanded);
        assert!(!landscape.is_animating());
        assert!(landscape.tree().is_none());
        assert_eq!(landscape.core_radius(), None);
        assert_eq!(landscape.map().map(|m| m.len()), Some(tree.node_count()));
    }

    #[test]
    fn test_highlight_rules_per_mode() {
        let s = scenario();
        let tree = &s.tree;
        let open: HashSet<NodeId> = [tree.root_dir(), s.big].into_iter().collect();
        let Some(file) = tree.children(s.big).next() else {
            panic!("scenario has files");
        };

        let mut landscape = Landscape::new(tree, LayoutMode::Disc, &Config::default(), &open);
        assert!(landscape.should_highlight(tree, s.big));
        assert!(landscape.should_highlight(tree, file));
        assert!(!landscape.should_highlight(tree, tree.root()));

        landscape.set_mode(tree, LayoutMode::Map);
        assert!(!landscape.should_highlight(tree, s.big));
        assert!(landscape.should_highlight(tree, s.mid));

        landscape.set_mode(tree, LayoutMode::Tree);
        assert!(!landscape.should_highlight(tree, s.big));
        assert!(landscape.should_highlight(tree, s.mid));
        assert!(landscape.should_highlight(tree, file));
    }

    #[test]
    fn test_locate_follows_mode() {
        let s = scenario();
        let tree = &s.tree;
        let mut landscape = Landscape::new(tree, LayoutMode::Disc, &Config::default(), &AllExpanded);
        let NodeLocation::Disc { pos } = landscape.locate(tree, s.small) else {
            panic!("expected a disc location");
        };
        assert_eq!(pos, landscape.disc_position(tree, s.small));

        landscape.set_mode(tree, LayoutMode::Map);
        let NodeLocation::Map { c0, c1, z0 } = landscape.locate(tree, s.small) else {
            panic!("expected a map location");
        };
        assert!(c1.x > c0.x && c1.y > c0.y);
        assert_eq!(z0, landscape.map_node_z0(tree, s.small));
        assert!(landscape.map_max_expanded_height(tree, tree.root_dir()) > 0.0);

        landscape.set_mode(tree, LayoutMode::Tree);
        let NodeLocation::Tree { r, theta, z } = landscape.locate(tree, s.small) else {
            panic!("expected a tree location");
        };
        assert_eq!(r, landscape.platform_r0(tree, s.small));
        assert_eq!(theta, landscape.platform_theta(tree, s.small));
        assert_eq!(z, 0.0);
        assert!(landscape.core_radius().is_some());
    }

    #[test]
    fn test_map_geometry_unchanged_by_colexp() {
        let s = scenario();
        let tree = &s.tree;
        let mut landscape = Landscape::new(tree, LayoutMode::Map, &Config::default(), &AllCollapsed);
        let before = landscape.map().cloned();

        landscape.colexp(tree, tree.root_dir(), ColExpMessage::ExpandRecursive);
        run_until_idle(&mut landscape, tree, 0.0);
        assert_eq!(landscape.map().cloned(), before);
    }

    #[test]
    #[should_panic(expected = "tree geometry requested in disc mode")]
    fn test_wrong_mode_query_panics() {
        let s = scenario();
        let landscape = Landscape::new(&s.tree, LayoutMode::Disc, &Config::default(), &AllExpanded);
        landscape.platform_r0(&s.tree, s.big);
    }

    #[test]
    #[should_panic(expected = "collapse/expand of a RegularFile")]
    fn test_colexp_on_file_panics() {
        let s = scenario();
        let mut landscape = Landscape::new(&s.tree, LayoutMode::Map, &Config::default(), &AllExpanded);
        let Some(file) = s.tree.children(s.big).next() else {
            return;
        };
        landscape.colexp(&s.tree, file, ColExpMessage::Collapse);
    }
}
