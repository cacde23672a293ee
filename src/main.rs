use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;

use fsland::scan::Scanner;
use fsland::{ColExpMessage, Config, FileTree, Landscape, LayoutMode, NodeLocation};

const FRAME_RATE: f64 = 60.0;

/// Lay a directory out as a 3D landscape and report the result
#[derive(Parser, Debug)]
#[command(name = "fsland", version, about)]
struct Cli {
    /// Directory to scan
    path: PathBuf,

    /// Layout mode: disc, map or tree (defaults to the config file's choice)
    #[arg(long)]
    mode: Option<LayoutMode>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Expand every directory (animated) after the initial layout
    #[arg(long)]
    expand_all: bool,

    /// Frames to simulate at 60 Hz
    #[arg(long, default_value_t = 120)]
    frames: u32,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(Config::load).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("fsland: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (tree, stats) = match Scanner::new().scan(&cli.path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("fsland: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!(
        "{}: {} files, {} directories, {} bytes ({} skipped) in {}ms",
        cli.path.display(),
        stats.total_files,
        stats.total_dirs,
        stats.total_size,
        stats.skipped,
        stats.duration_ms
    );

    let mode = cli.mode.unwrap_or(config.layout.mode);
    // Only the top directory starts open
    let open: HashSet<_> = [tree.root_dir()].into_iter().collect();
    let mut landscape = Landscape::new(&tree, mode, &config, &open);
    if cli.expand_all {
        landscape.colexp(&tree, tree.root_dir(), ColExpMessage::ExpandRecursive);
    }

    let mut now = 0.0;
    let mut rebuilt = 0;
    let mut frames = 0;
    for frame in 1..=cli.frames {
        now = f64::from(frame) / FRAME_RATE;
        let report = landscape.update(&tree, now);
        rebuilt += report.rebuilt;
        frames = frame;
        if report.core_resized {
            log::info!("frame {frame}: core radius now {:.0}", landscape.core_radius().unwrap_or_default());
        }
        if !report.animating {
            break;
        }
    }
    println!(
        "{mode} mode: {frames} frames ({now:.2}s), {rebuilt} directory rebuilds, still animating: {}",
        landscape.is_animating()
    );

    print_summary(&landscape, &tree);
    ExitCode::SUCCESS
}

fn print_summary(landscape: &Landscape, tree: &FileTree) {
    let root = tree.root_dir();
    match landscape.locate(tree, root) {
        NodeLocation::Disc { pos } => {
            let radius = landscape.disc().map(|g| g.get(root).radius).unwrap_or_default();
            println!("root disc: center ({:.1}, {:.1}), radius {radius:.1}", pos.x, pos.y);
        }
        NodeLocation::Map { c0, c1, z0 } => {
            println!(
                "root block: {:.1} x {:.1} at z {z0:.1}, tallest stack {:.1}",
                c1.x - c0.x,
                c1.y - c0.y,
                landscape.map_max_expanded_height(tree, root)
            );
        }
        NodeLocation::Tree { r, theta, .. } => {
            if landscape.expansion().is_expanded(root) {
                let (e0, e1) = landscape.tree_extents(tree, root);
                println!(
                    "core radius {:.0}; root platform at r {r:.0}, theta {theta:.1}; extents r {:.0}..{:.0}, theta {:.1}..{:.1}",
                    landscape.core_radius().unwrap_or_default(),
                    e0.r,
                    e1.r,
                    e0.theta,
                    e1.theta
                );
            } else {
                println!("root leaf at r {r:.0}, theta {theta:.1}");
            }
        }
    }

    let shown = tree
        .children(root)
        .filter(|&n| landscape.should_highlight(tree, n))
        .count();
    println!(
        "{} of {} entries under the root can take the cursor",
        shown,
        tree.children(root).count()
    );
}
