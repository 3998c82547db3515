use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::display::DisplayChannel;
use crate::driver::ActionDriver;
use crate::error::AutomationResult;
use crate::match_image::{ElementGrid, VisualElement};
use crate::timer::Timer;

/// Position of a tab counted from one edge, starting at 1.
///
/// `Upper` is an alias of `Left` and `Bottom` of `Right` for vertical bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavIndex {
    Left(usize),
    Right(usize),
    Upper(usize),
    Bottom(usize),
}

/// Classification of one tab by pixel counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TabStyle {
    pub color: [u8; 3],
    pub threshold: u8,
    pub count: usize,
}

/// Result of scanning the bar: which tab is active and which tabs are visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavbarInfo {
    pub active: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
}

/// A row or column of tabs, one of which is highlighted.
pub struct Navbar {
    name: String,
    tabs: Vec<VisualElement>,
    pub active: TabStyle,
    pub inactive: TabStyle,
}

impl Navbar {
    pub fn new(grid: &ElementGrid) -> Self {
        Self {
            name: grid.name.clone(),
            tabs: grid.elements(),
            active: TabStyle {
                color: [247, 251, 181],
                threshold: 180,
                count: 100,
            },
            inactive: TabStyle {
                color: [140, 162, 181],
                threshold: 180,
                count: 50,
            },
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_styles(mut self, active: TabStyle, inactive: TabStyle) -> Self {
        self.active = active;
        self.inactive = inactive;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tabs(&self) -> &[VisualElement] {
        &self.tabs
    }

    fn is_styled<C: DisplayChannel>(
        &self,
        driver: &ActionDriver<C>,
        tab: &VisualElement,
        style: TabStyle,
    ) -> AutomationResult<bool> {
        driver.image_color_count(tab.area(), Rgb(style.color), style.threshold, style.count)
    }

    /// Scan every tab of the current frame. Indexes are 0-based.
    pub fn get_info<C: DisplayChannel>(
        &self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<NavbarInfo> {
        let mut total = Vec::new();
        let mut active = Vec::new();
        for (index, tab) in self.tabs.iter().enumerate() {
            if self.is_styled(driver, tab, self.active)? {
                total.push(index);
                active.push(index);
            } else if self.is_styled(driver, tab, self.inactive)? {
                total.push(index);
            }
        }

        if active.len() > 1 {
            log::warn!("Too many active nav items found in {}, items: {:?}", self.name, active);
        }
        if total.len() < 2 {
            log::warn!("Too few nav items found in {}, items: {:?}", self.name, total);
        }
        Ok(NavbarInfo {
            active: active.first().copied(),
            left: total.iter().min().copied(),
            right: total.iter().max().copied(),
        })
    }

    pub fn get_active<C: DisplayChannel>(
        &self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<Option<usize>> {
        Ok(self.get_info(driver)?.active)
    }

    /// Number of tabs between the leftmost and rightmost visible ones.
    pub fn get_total<C: DisplayChannel>(
        &self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<usize> {
        let info = self.get_info(driver)?;
        Ok(match (info.left, info.right) {
            (Some(left), Some(right)) => right - left + 1,
            _ => 0,
        })
    }

    /// Click tabs until the requested one is active.
    ///
    /// Returns `Ok(false)` when the index is 0 or the bar never settles on it
    /// within the timeout.
    pub async fn set<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
        index: NavIndex,
        skip_first_screenshot: bool,
    ) -> AutomationResult<bool> {
        let (from_left, n) = match index {
            NavIndex::Left(n) | NavIndex::Upper(n) => (true, n),
            NavIndex::Right(n) | NavIndex::Bottom(n) => (false, n),
        };
        if n == 0 {
            log::warn!("Invalid index to set {}, indexes start from 1", self.name);
            return Ok(false);
        }
        log::info!("{} set to {:?}", self.name, index);

        let mut interval = Timer::secs(2.0, 4);
        let mut timeout = Timer::secs(10.0, 20);
        timeout.start();
        let mut skip = skip_first_screenshot;
        loop {
            if skip {
                skip = false;
            } else {
                driver.screenshot().await?;
            }

            if timeout.reached() {
                log::warn!("{} failed to set {:?}", self.name, index);
                return Ok(false);
            }

            let info = self.get_info(driver)?;
            log::info!(
                "Nav item active: {:?} from range ({:?}, {:?})",
                info.active,
                info.left,
                info.right
            );
            // A black frame shows no tabs at all
            let (Some(left), Some(right)) = (info.left, info.right) else {
                continue;
            };

            let target = if from_left {
                (left + n - 1) as i64
            } else {
                right as i64 - n as i64 + 1
            };
            if target < left as i64 || target > right as i64 {
                log::warn!(
                    "Index to set ({}) is not within the nav items that appear ({}, {})",
                    target,
                    left,
                    right
                );
                continue;
            }
            let target = target as usize;

            if info.active == Some(target) {
                return Ok(true);
            }

            if interval.reached() {
                driver.click(&self.tabs[target]).await?;
                interval.reset();
            }
        }
    }
}
