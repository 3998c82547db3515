//! Capture and input capability the recognition loop runs against.

use image::RgbImage;
use std::time::Duration;

use crate::error::AutomationResult;
use crate::match_image::Point;

#[cfg(test)]
pub(crate) mod mock;

/// A captured screen. All detections of one loop iteration read the same frame.
pub type Frame = RgbImage;

// Trait defining the device side of the loop (ADB, emulator bridge, test double)
#[allow(async_fn_in_trait)]
pub trait DisplayChannel {
    /// Capture the current screen. Failures are reported, never retried here.
    async fn capture_frame(&mut self) -> AutomationResult<Frame>;

    async fn tap(&mut self, point: Point) -> AutomationResult<()>;

    async fn swipe(&mut self, from: Point, to: Point, duration: Duration) -> AutomationResult<()>;

    fn name(&self) -> &str {
        "display"
    }
}
