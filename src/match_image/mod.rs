//! Recognition primitives: geometry, color statistics, correlation, elements and grids

pub mod color;
pub mod config;
pub mod correlation;
pub mod element;
pub mod geometry;
pub mod grid;
pub mod resource;
pub mod template;


pub use config::{MatchConfig, create_emulator_config, create_lossy_capture_config};
pub use element::{MatchMode, Reference, ReferenceSource, VisualElement};
pub use geometry::{Area, Offset, Point, SearchOffset, SearchWindow};
pub use grid::ElementGrid;
pub use resource::{Resource, ResourceCache};
pub use template::Template;
