pub mod animation;
pub mod config;
pub mod disc_layout;
pub mod error;
pub mod expand_state;
pub mod geometry;
pub mod landscape;
pub mod platform;
pub mod scan;
pub mod tree;
pub mod tree_layout;
pub mod treemap;

pub use config::Config;
pub use error::{ConfigError, ScanError};
pub use geometry::LayoutMode;
pub use landscape::{ColExpMessage, FrameReport, Landscape, NodeLocation};
pub use tree::{FileTree, NodeKind};
