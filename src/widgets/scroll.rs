use std::time::Duration;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::display::DisplayChannel;
use crate::driver::{ActionDriver, random_point};
use crate::error::AutomationResult;
use crate::match_image::color::color_similarity_2d;
use crate::match_image::Area;
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Similarity a pixel needs to count as part of the thumb
    pub color_threshold: u8,
    /// Positions closer than this are considered reached
    pub drag_threshold: f64,
    /// Targets within this distance of an end are treated as that end
    pub edge_threshold: f64,
    /// Overshoot used when dragging to an end
    pub edge_add: (f64, f64),
    /// Jitter applied to the drag target
    pub random_range: (f64, f64),
    /// Screen bounds drag points are kept inside
    pub screen_size: (u32, u32),
    pub swipe_duration: Duration,
    /// Total time `set` may spend dragging, visible thumb or not
    pub drag_timeout: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            color_threshold: 221,
            drag_threshold: 0.05,
            edge_threshold: 0.05,
            edge_add: (0.3, 0.5),
            random_range: (-0.05, 0.05),
            screen_size: (1280, 720),
            swipe_duration: Duration::from_millis(300),
            drag_timeout: Duration::from_secs(10),
        }
    }
}

/// A scrollbar whose thumb is found by color.
///
/// Positions are normalized: 0 is the start of the track and 1 the end.
pub struct Scroll {
    name: String,
    area: Area,
    color: Rgb<u8>,
    vertical: bool,
    length: f64,
    pub config: ScrollConfig,
}

impl Scroll {
    pub fn new(name: impl Into<String>, area: Area, color: Rgb<u8>, vertical: bool) -> Self {
        let total = if vertical { area.height() } else { area.width() };
        Self {
            name: name.into(),
            area,
            color,
            vertical,
            length: total as f64 / 2.0,
            config: ScrollConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ScrollConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Track length along the scroll axis.
    pub fn total(&self) -> f64 {
        (if self.vertical { self.area.height() } else { self.area.width() }) as f64
    }

    /// Thumb length measured by the last `match_color`.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Which rows (or columns) of the track contain the thumb color.
    pub fn match_color<C: DisplayChannel>(
        &mut self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<Vec<bool>> {
        let image = driver.image_crop(self.area)?;
        let similarity = color_similarity_2d(&image, self.color);
        let (w, h) = similarity.dimensions();
        let hit = |x: u32, y: u32| similarity.get_pixel(x, y)[0] > self.config.color_threshold;
        let mask: Vec<bool> = if self.vertical {
            (0..h).map(|y| (0..w).any(|x| hit(x, y))).collect()
        } else {
            (0..w).map(|x| (0..h).any(|y| hit(x, y))).collect()
        };
        self.length = mask.iter().filter(|m| **m).count() as f64;
        Ok(mask)
    }

    /// Current thumb position, clamped to `[0, 1]`; 0 when the thumb is not visible.
    pub fn cal_position<C: DisplayChannel>(
        &mut self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<f64> {
        let mask = self.match_color(driver)?;
        let hits: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, m)| **m)
            .map(|(i, _)| i)
            .collect();
        if hits.is_empty() {
            return Ok(0.0);
        }
        let middle = hits.iter().sum::<usize>() as f64 / hits.len() as f64;
        let travel = self.total() - self.length;
        if travel <= 0.0 {
            return Ok(0.0);
        }
        Ok(((middle - self.length / 2.0) / travel).clamp(0.0, 1.0))
    }

    /// Screen strip where the thumb middle would be for `position + random_range`.
    ///
    /// Needs a thumb length, so call `cal_position` or `match_color` first.
    pub fn position_to_screen(&self, position: f64, random_range: (f64, f64)) -> Area {
        let travel = self.total() - self.length;
        let to_pixel = |p: f64| (p * travel + self.length / 2.0) as i32;
        let mut middle = [to_pixel(position + random_range.0), to_pixel(position + random_range.1)];
        let (origin, bound) = if self.vertical {
            (self.area.y1, self.config.screen_size.1 as i32)
        } else {
            (self.area.x1, self.config.screen_size.0 as i32)
        };
        for m in middle.iter_mut() {
            *m += origin;
        }
        while middle.iter().max().is_some_and(|m| *m >= bound) {
            middle.iter_mut().for_each(|m| *m -= 2);
        }
        while middle.iter().min().is_some_and(|m| *m <= 0) {
            middle.iter_mut().for_each(|m| *m += 2);
        }
        middle.sort_unstable();
        if self.vertical {
            Area::new(self.area.x1, middle[0], self.area.x2, middle[1])
        } else {
            Area::new(middle[0], self.area.y1, middle[1], self.area.y2)
        }
    }

    /// The thumb covers more than a tenth of the track.
    pub fn appear<C: DisplayChannel>(
        &mut self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<bool> {
        let mask = self.match_color(driver)?;
        if mask.is_empty() {
            return Ok(false);
        }
        Ok(mask.iter().filter(|m| **m).count() as f64 / mask.len() as f64 > 0.1)
    }

    pub fn at_top<C: DisplayChannel>(
        &mut self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<bool> {
        Ok(self.cal_position(driver)? < self.config.edge_threshold)
    }

    pub fn at_bottom<C: DisplayChannel>(
        &mut self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<bool> {
        Ok(self.cal_position(driver)? > 1.0 - self.config.edge_threshold)
    }

    /// Drag the thumb until it is within `drag_threshold` of `position`.
    ///
    /// Gives up if the thumb stays invisible for 5 s, or once `drag_timeout`
    /// has passed in total. A thumb filling the whole track cannot move, so
    /// nothing is dragged. Returns the number of drags performed.
    pub async fn set<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        position: f64,
        random_range: Option<(f64, f64)>,
        skip_first_screenshot: bool,
    ) -> AutomationResult<u32> {
        let mut drag_interval = Timer::secs(1.0, 2);
        let mut drag_timeout = Timer::secs(5.0, 10);
        drag_interval.clear();
        drag_timeout.reset();
        let cfg = self.config;
        let mut give_up = Timer::new(cfg.drag_timeout).with_count(20);
        give_up.start();

        let mut random_range = random_range.unwrap_or(cfg.random_range);
        if position <= cfg.edge_threshold {
            random_range = (-cfg.edge_add.0, -cfg.edge_add.1);
        }
        if position >= 1.0 - cfg.edge_threshold {
            random_range = cfg.edge_add;
        }

        let mut dragged = 0;
        let mut skip = skip_first_screenshot;
        loop {
            if skip {
                skip = false;
            } else {
                driver.screenshot().await?;
            }

            let current = self.cal_position(driver)?;
            if (position - current).abs() < cfg.drag_threshold {
                break;
            }
            if self.length > 0.0 && self.total() - self.length <= 0.0 {
                log::info!("{} thumb fills the track, nothing to scroll", self.name);
                break;
            }
            if give_up.reached() {
                log::warn!("{} scroll did not reach {:.3}, stop dragging", self.name, position);
                break;
            }
            if self.length > 0.0 {
                drag_timeout.reset();
            } else if drag_timeout.reached() {
                log::warn!("{} scroll not found, stop dragging", self.name);
                break;
            } else {
                continue;
            }

            if drag_interval.reached() {
                let from = random_point(self.position_to_screen(current, cfg.random_range));
                let to = random_point(self.position_to_screen(position, random_range));
                log::debug!("{} drag {:.3} -> {:.3}", self.name, current, position);
                driver.swipe(from, to, cfg.swipe_duration).await?;
                drag_interval.reset();
                dragged += 1;
            }
        }
        Ok(dragged)
    }

    pub async fn set_top<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        skip_first_screenshot: bool,
    ) -> AutomationResult<u32> {
        self.set(driver, 0.0, None, skip_first_screenshot).await
    }

    pub async fn set_bottom<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        skip_first_screenshot: bool,
    ) -> AutomationResult<u32> {
        self.set(driver, 1.0, None, skip_first_screenshot).await
    }

    /// Drag by `page` thumb lengths; positive is forward.
    pub async fn drag_page<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        page: f64,
        random_range: Option<(f64, f64)>,
        skip_first_screenshot: bool,
    ) -> AutomationResult<u32> {
        if !skip_first_screenshot {
            driver.screenshot().await?;
        }
        let current = self.cal_position(driver)?;
        let travel = self.total() - self.length;
        let multiply = if travel > 0.0 { self.length / travel } else { 0.0 };
        let target = ((current + page * multiply).clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
        self.set(driver, target, random_range, true).await
    }

    pub async fn next_page<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        page: f64,
        skip_first_screenshot: bool,
    ) -> AutomationResult<u32> {
        self.drag_page(driver, page, Some((-0.01, 0.01)), skip_first_screenshot).await
    }

    pub async fn prev_page<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        page: f64,
        skip_first_screenshot: bool,
    ) -> AutomationResult<u32> {
        self.drag_page(driver, -page, Some((-0.01, 0.01)), skip_first_screenshot).await
    }
}
