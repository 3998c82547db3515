//! Page graph navigation with an always-on interrupt chain.
//!
//! `Navigator::goto` computes a fresh `Route` for every call, so hops toward an
//! earlier destination never leak into a later walk.

pub mod interrupt;
pub mod navigator;
pub mod page;
pub mod peaks;
pub mod story;

#[cfg(test)]
mod tests;

pub use interrupt::{CountedRule, InterruptChain, InterruptRule, Popup};
pub use navigator::{Navigator, NavigatorConfig, UiClick};
pub use page::{Page, PageGraph, PageId, Route};
pub use peaks::{Peak, PeakParams, find_peaks};
pub use story::{StoryHandler, StoryOptionConfig, option_signal, story_options};
