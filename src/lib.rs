//! Screen recognition and page navigation for driving Android games.
//!
//! A loop captures one frame through a [`DisplayChannel`], runs every detection
//! of the iteration against it, and acts through the same channel. The layers,
//! from the bottom up:
//!
//! - [`match_image`]: elements, grids, color and template matching
//! - [`driver`]: the frame holder with click, swipe and interval bookkeeping
//! - [`widgets`]: tab bars, scrollbars, switches and option panels
//! - [`navigation`]: the page graph, interrupts and story dialogs

pub mod adb;
pub mod display;
pub mod driver;
pub mod error;
pub mod match_image;
pub mod navigation;
pub mod timer;
pub mod widgets;

pub use adb::AdbChannel;
pub use display::{DisplayChannel, Frame};
pub use driver::{ActionDriver, Check, Detect};
pub use error::{AutomationError, AutomationResult};
pub use match_image::{Area, ElementGrid, MatchConfig, Point, ResourceCache, VisualElement};
pub use navigation::{InterruptChain, Navigator, PageGraph, PageId};
pub use timer::Timer;
