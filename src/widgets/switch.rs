use std::sync::Arc;

use crate::display::DisplayChannel;
use crate::driver::{ActionDriver, Detect};
use crate::error::{AutomationError, AutomationResult};
use crate::match_image::{SearchOffset, VisualElement};
use crate::timer::Timer;

pub const UNKNOWN: &str = "unknown";

/// One state of a switch: how it is recognized and what to click to get there.
#[derive(Debug, Clone)]
pub struct SwitchStatus {
    pub status: String,
    pub check: Arc<VisualElement>,
    pub click: Arc<VisualElement>,
    pub offset: Option<SearchOffset>,
}

/// An in-game toggle or a group of mutually exclusive choices.
///
/// A selector (`| [Daily] | Urgent |`) is changed by clicking the target
/// option; a toggle (`| [ON] |`) by clicking the current state in place.
pub struct Switch {
    name: String,
    is_selector: bool,
    offset: Option<SearchOffset>,
    statuses: Vec<SwitchStatus>,
}

impl Switch {
    pub fn new(name: impl Into<String>, is_selector: bool, offset: Option<SearchOffset>) -> Self {
        Self {
            name: name.into(),
            is_selector,
            offset,
            statuses: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a state. The click element defaults to the check element and
    /// the offset to the switch-wide offset.
    pub fn add_status(
        &mut self,
        status: impl Into<String>,
        check: &Arc<VisualElement>,
        click: Option<&Arc<VisualElement>>,
        offset: Option<SearchOffset>,
    ) -> AutomationResult<()> {
        let status = status.into();
        if status == UNKNOWN || self.statuses.iter().any(|s| s.status == status) {
            return Err(AutomationError::configuration(format!(
                "Switch {} declares status '{}' twice or uses a reserved name",
                self.name, status
            )));
        }
        self.statuses.push(SwitchStatus {
            status,
            check: Arc::clone(check),
            click: Arc::clone(click.unwrap_or(check)),
            offset: offset.or(self.offset),
        });
        Ok(())
    }

    fn detect(row: &SwitchStatus) -> Detect {
        Detect {
            offset: row.offset,
            ..Detect::default()
        }
    }

    pub fn appear<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
    ) -> AutomationResult<bool> {
        Ok(self.get(driver)? != UNKNOWN)
    }

    /// First declared status whose check element is visible, or `"unknown"`.
    pub fn get<C: DisplayChannel>(&self, driver: &mut ActionDriver<C>) -> AutomationResult<&str> {
        for row in &self.statuses {
            if driver.appear(&row.check, Self::detect(row))? {
                return Ok(&row.status);
            }
        }
        Ok(UNKNOWN)
    }

    pub fn get_data(&self, status: &str) -> AutomationResult<&SwitchStatus> {
        self.statuses.iter().find(|row| row.status == status).ok_or_else(|| {
            log::warn!("Switch {} received an invalid status {}", self.name, status);
            AutomationError::configuration(format!(
                "Switch {} received an invalid status {}",
                self.name, status
            ))
        })
    }

    /// Click until the switch shows `status`.
    ///
    /// Returns whether anything was clicked. Fails with `UnknownState` when no
    /// status is recognized for two warning periods.
    pub async fn set<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
        status: &str,
        skip_first_screenshot: bool,
    ) -> AutomationResult<bool> {
        self.get_data(status)?;

        let mut counter = 0;
        let mut changed = false;
        let mut warning = Timer::secs(5.0, 10);
        warning.start();
        let mut click_timer = Timer::secs(1.0, 3);
        let mut skip = skip_first_screenshot;
        loop {
            if skip {
                skip = false;
            } else {
                driver.screenshot().await?;
            }

            let current = self.get(driver)?.to_string();
            log::info!("[{}] {}", self.name, current);

            if current == status {
                return Ok(changed);
            }

            if current == UNKNOWN {
                if warning.reached() {
                    log::warn!("Unknown {} switch", self.name);
                    warning.reset();
                    if counter >= 1 {
                        log::warn!(
                            "{} switch {} asset has evaluated to unknown too many times, asset should be re-verified",
                            self.name,
                            status
                        );
                        return Err(AutomationError::UnknownState {
                            widget: self.name.clone(),
                            description: format!("no status recognized while setting {}", status),
                        });
                    }
                    counter += 1;
                }
                continue;
            }

            if click_timer.reached() {
                let target = if self.is_selector { status } else { current.as_str() };
                let click = Arc::clone(&self.get_data(target)?.click);
                driver.click(&click).await?;
                click_timer.reset();
                changed = true;
            }
        }
    }
}
