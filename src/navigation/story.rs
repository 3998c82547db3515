//! Story dialogs: skipping them, and picking an option when the story branches.
//!
//! Options are white bars stacked vertically. Their number varies, so they are
//! found per frame by scanning a thin strip on their left edge row by row and
//! segmenting the rows that match the bar color.

use std::sync::Arc;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::display::{DisplayChannel, Frame};
use crate::driver::{ActionDriver, Detect};
use crate::error::AutomationResult;
use crate::match_image::color::{color_similar, color_similarity_2d, crop, mean_color};
use crate::match_image::{Area, SearchOffset, VisualElement};
use crate::timer::Timer;

use super::interrupt::Popup;
use super::peaks::{PeakParams, find_peaks};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoryOptionConfig {
    /// Full extent of the option bars; clicks land inside it
    pub option_area: Area,
    /// Strip scanned for the bar color, usually the left end of `option_area`
    pub detect_area: Area,
    pub option_color: [u8; 3],
    /// Rows whose mean similarity is below this are background
    pub row_level: u8,
    pub peaks: PeakParams,
    /// Pixels removed from each side of a detected bar
    pub inset: i32,
    /// Zero-based option to choose; out of range falls back to the first
    pub preferred: usize,
}

impl Default for StoryOptionConfig {
    fn default() -> Self {
        Self {
            option_area: Area::new(330, 200, 980, 465),
            detect_area: Area::new(330, 200, 355, 465),
            option_color: [247, 247, 247],
            row_level: 200,
            // Options are about 300 x 50 px
            peaks: PeakParams {
                height: Some(200.0),
                width: Some(40.0),
                distance: Some(40),
                rel_height: 4.0,
            },
            inset: 5,
            preferred: 0,
        }
    }
}

/// Row signal of the detect strip: 255 where the row matches the option color.
pub fn option_signal(frame: &Frame, config: &StoryOptionConfig) -> (Vec<f64>, Area) {
    let (image, clipped) = crop(frame, config.detect_area);
    let similarity = color_similarity_2d(&image, Rgb(config.option_color));
    let (w, h) = similarity.dimensions();
    if w == 0 {
        return (Vec::new(), clipped);
    }
    let line = (0..h)
        .map(|y| {
            let sum: u32 = (0..w).map(|x| similarity.get_pixel(x, y)[0] as u32).sum();
            let mean = (sum as f64 / w as f64).round();
            if mean < config.row_level as f64 { 0.0 } else { 255.0 }
        })
        .collect();
    (line, clipped)
}

/// Visible options from top to bottom, named `STORY_OPTION_{n}_OF_{total}`.
pub fn story_options(frame: &Frame, config: &StoryOptionConfig) -> Vec<VisualElement> {
    let (line, strip) = option_signal(frame, config);
    let peaks = find_peaks(&line, &config.peaks);
    let total = peaks.len();
    peaks
        .iter()
        .enumerate()
        .map(|(n, peak)| {
            let area = Area::new(
                config.option_area.x1,
                strip.y1 + peak.left_base as i32,
                config.option_area.x2,
                strip.y1 + peak.right_base as i32,
            )
            .padded(-config.inset);
            VisualElement::new(
                format!("STORY_OPTION_{}_OF_{}", n + 1, total),
                area,
                Rgb(config.option_color),
            )
        })
        .collect()
}

/// Interrupt rule that skips story dialogs and answers their options.
pub struct StoryHandler {
    /// Skip button as it looks on screen
    check: Arc<VisualElement>,
    /// Where to click to skip
    skip: Arc<VisualElement>,
    /// Letters-on-black stories: the background sample and its continue button
    letters: Option<(Arc<VisualElement>, Arc<VisualElement>)>,
    close: Option<Arc<VisualElement>>,
    popup: Option<Popup>,
    pub offset: Option<SearchOffset>,
    pub config: StoryOptionConfig,
    option_timer: Timer,
    option_record: usize,
    option_confirm: Timer,
    story_confirm: Timer,
    popup_timeout: Timer,
}

impl StoryHandler {
    pub fn new(check: &Arc<VisualElement>, skip: &Arc<VisualElement>) -> Self {
        Self {
            check: Arc::clone(check),
            skip: Arc::clone(skip),
            letters: None,
            close: None,
            popup: None,
            offset: Some(SearchOffset::Symmetric(20, 20)),
            config: StoryOptionConfig::default(),
            option_timer: Timer::secs(2.0, 0),
            option_record: 0,
            option_confirm: Timer::secs(0.3, 0),
            story_confirm: Timer::secs(0.5, 1),
            popup_timeout: Timer::secs(10.0, 20),
        }
    }

    pub fn with_config(mut self, config: StoryOptionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_offset(mut self, offset: Option<SearchOffset>) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_letters(
        mut self,
        background: &Arc<VisualElement>,
        letters_only: &Arc<VisualElement>,
    ) -> Self {
        self.letters = Some((Arc::clone(background), Arc::clone(letters_only)));
        self
    }

    pub fn with_close(mut self, close: &Arc<VisualElement>) -> Self {
        self.close = Some(Arc::clone(close));
        self
    }

    /// The "skip story?" confirmation shown after clicking skip.
    pub fn with_popup(mut self, popup: Popup) -> Self {
        self.popup = Some(popup);
        self
    }

    fn detect(&self) -> Detect {
        Detect {
            offset: self.offset,
            ..Detect::default()
        }
    }

    fn is_story_black(&self, frame: &Frame, background: &VisualElement) -> bool {
        let color = mean_color(frame, background.area());
        color_similar(color, background.color(), 10) || color_similar(color, Rgb([0, 0, 0]), 10)
    }

    fn suppress_story_checks<C: DisplayChannel>(&self, driver: &mut ActionDriver<C>) {
        let mut elements = vec![self.check.as_ref()];
        if let Some((_, letters_only)) = &self.letters {
            elements.push(letters_only.as_ref());
        }
        driver.interval_reset(&elements);
    }

    /// Choose an option once the same number of options was seen twice in a
    /// row, the second time at least the confirm delay after the first.
    async fn handle_options<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
    ) -> AutomationResult<bool> {
        let options = story_options(driver.frame()?, &self.config);
        if options.is_empty() {
            self.option_record = 0;
            self.option_confirm.reset();
            return Ok(false);
        }
        if options.len() != self.option_record {
            log::debug!("Story options: {}", options.len());
            self.option_record = options.len();
            self.option_confirm.reset();
            return Ok(false);
        }
        if !self.option_confirm.reached() {
            return Ok(false);
        }

        let select = options.get(self.config.preferred).unwrap_or(&options[0]);
        log::info!("📖 Story option {}", select.name());
        driver.click(select).await?;
        self.option_timer.reset();
        self.popup_timeout.reset();
        self.suppress_story_checks(driver);
        self.option_record = 0;
        self.option_confirm.reset();
        Ok(true)
    }

    pub async fn handle<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
    ) -> AutomationResult<bool> {
        if self.popup_timeout.started()
            && !self.popup_timeout.reached()
            && let Some(popup) = &self.popup
            && popup.handle_confirm(driver, "STORY_SKIP").await?
        {
            self.popup_timeout = Timer::secs(10.0, 0);
            self.suppress_story_checks(driver);
            return Ok(true);
        }

        if let Some((background, letters_only)) = &self.letters
            && self.is_story_black(driver.frame()?, background)
            && driver
                .appear_then_click(letters_only, self.detect().interval(2.0))
                .await?
        {
            self.popup_timeout.reset();
            return Ok(true);
        }

        if self.option_timer.reached()
            && driver.appear(&self.check, self.detect())?
            && self.handle_options(driver).await?
        {
            return Ok(true);
        }

        if driver.appear(&self.check, self.detect().interval(2.0))? {
            // Confirm it is still a story: at fast play speed it may already be gone
            driver.interval_reset(&[self.check.as_ref()]);
            if self.story_confirm.reached() {
                log::info!("📖 Skip story");
                driver.click(&self.skip).await?;
                self.story_confirm.reset();
                self.popup_timeout.reset();
                return Ok(true);
            }
            driver.interval_clear(&[self.check.as_ref()]);
        } else {
            self.story_confirm.reset();
        }

        if let Some(close) = &self.close
            && driver.appear_then_click(close, self.detect().interval(2.0)).await?
        {
            self.popup_timeout.reset();
            return Ok(true);
        }

        Ok(false)
    }

    /// Keep skipping until no story action was needed for 3 seconds.
    pub async fn ensure_no_story<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        skip_first_screenshot: bool,
    ) -> AutomationResult<()> {
        let mut story_timer = Timer::secs(3.0, 6);
        story_timer.start();
        let mut skip = skip_first_screenshot;
        loop {
            if skip {
                skip = false;
            } else {
                driver.screenshot().await?;
            }

            if self.handle(driver).await? {
                story_timer.reset();
            }
            if story_timer.reached() {
                return Ok(());
            }
        }
    }
}
