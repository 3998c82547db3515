//! Binds a display channel to the recognition primitives.
//!
//! The driver owns the latest captured frame; every detection between two
//! `screenshot()` calls reads that same frame. Per-element interval timers keep
//! a detection from firing again right after it was acted on.

mod check;
#[cfg(test)]
mod tests;

pub use check::{Check, Detect, FramePredicate};

use std::collections::HashMap;
use std::time::Duration;

use image::{Rgb, RgbImage};
use rand::Rng;

use crate::display::{DisplayChannel, Frame};
use crate::error::{AutomationError, AutomationResult};
use crate::match_image::color::{count_similar, crop};
use crate::match_image::correlation::best_match;
use crate::match_image::{Area, MatchConfig, MatchMode, Point, SearchOffset, VisualElement};
use crate::timer::Timer;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

pub struct ActionDriver<C> {
    channel: C,
    config: MatchConfig,
    frame: Option<Frame>,
    capture_timer: Timer,
    interval_timers: HashMap<String, Timer>,
}

impl<C: DisplayChannel> ActionDriver<C> {
    pub fn new(channel: C, config: MatchConfig) -> Self {
        let capture_timer = Timer::new(config.capture_interval);
        Self {
            channel,
            config,
            frame: None,
            capture_timer,
            interval_timers: HashMap::new(),
        }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Capture a new frame, keeping at least `capture_interval` between captures.
    pub async fn screenshot(&mut self) -> AutomationResult<&Frame> {
        self.capture_timer.wait().await;
        self.capture_timer.reset();
        let frame = self.channel.capture_frame().await?;
        Ok(self.frame.insert(frame))
    }

    /// Use a given image as the current frame instead of capturing one.
    pub fn set_frame(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }

    pub fn frame(&self) -> AutomationResult<&Frame> {
        self.frame.as_ref().ok_or_else(|| AutomationError::Capture {
            description: "no frame captured yet".into(),
        })
    }

    /// Whether `element` is visible on the current frame.
    ///
    /// With an interval, a detection is suppressed until the interval has passed
    /// since the last successful one.
    pub fn appear(&mut self, element: &VisualElement, detect: Detect) -> AutomationResult<bool> {
        if !detect.interval.is_zero() {
            let timer = self
                .interval_timers
                .entry(element.name().to_string())
                .or_insert_with(|| Timer::new(detect.interval));
            if timer.limit() != detect.interval {
                *timer = Timer::new(detect.interval);
            }
            if !timer.reached() {
                return Ok(false);
            }
        }

        let frame = self.frame.as_ref().ok_or_else(|| AutomationError::Capture {
            description: "no frame captured yet".into(),
        })?;
        let appeared = match detect.offset {
            None => {
                let threshold = detect.color_threshold.unwrap_or(self.config.color_threshold);
                element.appears_in(frame, threshold)
            }
            Some(offset) => {
                let similarity = detect.similarity.unwrap_or(match detect.mode {
                    MatchMode::Raw => self.config.similarity,
                    MatchMode::Binary | MatchMode::Luma => self.config.gray_similarity,
                });
                element.match_in(frame, offset, similarity, detect.mode)?
            }
        };

        if appeared && !detect.interval.is_zero() {
            if let Some(timer) = self.interval_timers.get_mut(element.name()) {
                timer.reset();
            }
        }
        Ok(appeared)
    }

    /// Positional match of `element` in the current frame.
    pub fn match_element(
        &mut self,
        element: &VisualElement,
        offset: Option<SearchOffset>,
        similarity: Option<f32>,
    ) -> AutomationResult<bool> {
        let detect = Detect {
            offset: Some(offset.unwrap_or_else(|| self.config.default_search())),
            similarity,
            ..Detect::default()
        };
        self.appear(element, detect)
    }

    pub fn evaluate(&mut self, check: &Check) -> AutomationResult<bool> {
        match check {
            Check::Element(element, detect) => self.appear(element, *detect),
            Check::Predicate(name, predicate) => {
                let hit = predicate(self.frame()?);
                if hit {
                    log::debug!("Predicate {} holds", name);
                }
                Ok(hit)
            }
            Check::AnyOf(checks) => {
                for check in checks {
                    if self.evaluate(check)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Tap a random point inside the element's action area.
    pub async fn click(&mut self, element: &VisualElement) -> AutomationResult<()> {
        let area = element.action_area();
        let point = random_point(area);
        log::info!("👆 Click ({}, {}) @ {}", point.x, point.y, element.name());
        self.channel.tap(point).await
    }

    pub async fn multi_click(
        &mut self,
        element: &VisualElement,
        times: u32,
        interval: Duration,
    ) -> AutomationResult<()> {
        for i in 0..times {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            self.click(element).await?;
        }
        Ok(())
    }

    pub async fn swipe(
        &mut self,
        from: Point,
        to: Point,
        duration: Duration,
    ) -> AutomationResult<()> {
        log::info!("👉 Swipe ({}, {}) -> ({}, {})", from.x, from.y, to.x, to.y);
        self.channel.swipe(from, to, duration).await
    }

    pub async fn appear_then_click(
        &mut self,
        element: &VisualElement,
        detect: Detect,
    ) -> AutomationResult<bool> {
        if self.appear(element, detect)? {
            self.click(element).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Positional match, a settle delay, then a click at the matched position.
    pub async fn match_then_click(
        &mut self,
        element: &VisualElement,
        offset: Option<SearchOffset>,
        similarity: Option<f32>,
    ) -> AutomationResult<bool> {
        if self.match_element(element, offset, similarity)? {
            tokio::time::sleep(self.config.settle_delay).await;
            self.click(element).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Poll until `element` appears. There is no timeout; bound it from outside if needed.
    pub async fn wait_until_appear(
        &mut self,
        element: &VisualElement,
        detect: Detect,
        skip_first_screenshot: bool,
    ) -> AutomationResult<()> {
        let mut skip = skip_first_screenshot;
        loop {
            if skip {
                skip = false;
            } else {
                self.screenshot().await?;
            }
            if self.appear(element, detect)? {
                return Ok(());
            }
        }
    }

    pub async fn wait_until_appear_then_click(
        &mut self,
        element: &VisualElement,
        detect: Detect,
    ) -> AutomationResult<()> {
        self.wait_until_appear(element, detect, false).await?;
        self.click(element).await
    }

    pub async fn wait_until_disappear(
        &mut self,
        element: &VisualElement,
        detect: Detect,
    ) -> AutomationResult<()> {
        loop {
            self.screenshot().await?;
            if !self.appear(element, detect)? {
                return Ok(());
            }
        }
    }

    /// Wait until the element's region stops changing.
    ///
    /// The region must stay similar to its snapshot for the whole `settle`
    /// timer; any change retakes the snapshot. Gives up when `timeout` is
    /// reached and returns `false`.
    pub async fn wait_until_stable(
        &mut self,
        element: &VisualElement,
        mut settle: Timer,
        mut timeout: Timer,
        skip_first_screenshot: bool,
    ) -> AutomationResult<bool> {
        if !skip_first_screenshot {
            self.screenshot().await?;
        }
        let mut baseline = self.image_crop(element.area())?;
        settle.reset();
        timeout.reset();

        loop {
            self.screenshot().await?;
            let current = self.image_crop(element.area())?;
            let same = best_match(&current, &baseline)
                .is_some_and(|best| best.similarity > self.config.stable_similarity);
            if same {
                if settle.reached() {
                    log::info!("⏸️ {} stabled", element.name());
                    return Ok(true);
                }
            } else {
                baseline = current;
                settle.reset();
            }
            if timeout.reached() {
                log::warn!("wait_until_stable({}) timeout after {}", element.name(), timeout);
                return Ok(false);
            }
        }
    }

    pub fn image_crop(&self, area: Area) -> AutomationResult<RgbImage> {
        Ok(crop(self.frame()?, area).0)
    }

    /// True if more than `count` pixels in `area` are within `threshold` of `color`.
    pub fn image_color_count(
        &self,
        area: Area,
        color: Rgb<u8>,
        threshold: u8,
        count: usize,
    ) -> AutomationResult<bool> {
        Ok(count_similar(self.frame()?, area, color, threshold) > count)
    }

    /// Restart the interval of each element, suppressing its next detections.
    ///
    /// Elements never detected with an interval get a 3 s one.
    pub fn interval_reset(&mut self, elements: &[&VisualElement]) {
        for element in elements {
            self.interval_timer(element).reset();
        }
    }

    /// Let each element be detected again on the next poll.
    pub fn interval_clear(&mut self, elements: &[&VisualElement]) {
        for element in elements {
            self.interval_timer(element).clear();
        }
    }

    fn interval_timer(&mut self, element: &VisualElement) -> &mut Timer {
        self.interval_timers
            .entry(element.name().to_string())
            .or_insert_with(|| Timer::new(DEFAULT_INTERVAL))
    }
}

/// Uniform point inside `area`, keeping a fifth of the size away from each edge.
pub fn random_point(area: Area) -> Point {
    let mut rng = rand::thread_rng();
    let pick = |lo: i32, hi: i32, rng: &mut rand::rngs::ThreadRng| {
        let margin = (hi - lo) / 5;
        let (a, b) = (lo + margin, hi - 1 - margin);
        if a >= b { (lo + hi) / 2 } else { rng.gen_range(a..=b) }
    };
    Point::new(pick(area.x1, area.x2, &mut rng), pick(area.y1, area.y2, &mut rng))
}
