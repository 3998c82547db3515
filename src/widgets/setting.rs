use std::collections::{BTreeMap, BTreeSet};

use image::Rgb;

use crate::display::DisplayChannel;
use crate::driver::ActionDriver;
use crate::error::{AutomationError, AutomationResult};
use crate::match_image::VisualElement;
use crate::timer::Timer;

/// What a setting should be changed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionRequest {
    /// Leave the setting alone.
    Keep,
    One(String),
    Many(Vec<String>),
}

impl From<&str> for OptionRequest {
    fn from(option: &str) -> Self {
        OptionRequest::One(option.to_string())
    }
}

impl From<Vec<&str>> for OptionRequest {
    fn from(options: Vec<&str>) -> Self {
        OptionRequest::Many(options.into_iter().map(str::to_string).collect())
    }
}

struct SettingOption {
    setting: String,
    option: String,
    element: VisualElement,
}

/// A panel of settings, each a group of highlightable options (sort, filter...).
pub struct Setting {
    name: String,
    /// Return every setting to its default before applying a request.
    pub reset_first: bool,
    /// Highlight colors of an active option; any one of them counts.
    pub active_colors: Vec<Rgb<u8>>,
    pub active_threshold: u8,
    pub active_count: usize,
    options: Vec<SettingOption>,
    defaults: BTreeMap<String, String>,
}

impl Setting {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reset_first: true,
            active_colors: vec![Rgb([181, 142, 90]), Rgb([74, 117, 189])],
            active_threshold: 235,
            active_count: 250,
            options: Vec::new(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a setting with one element per option name.
    pub fn add_setting(
        &mut self,
        setting: &str,
        elements: Vec<VisualElement>,
        names: &[&str],
        default: &str,
    ) -> AutomationResult<()> {
        if elements.len() != names.len() {
            return Err(AutomationError::configuration(format!(
                "Setting {}/{} has {} elements for {} option names",
                self.name,
                setting,
                elements.len(),
                names.len()
            )));
        }
        if !names.contains(&default) {
            return Err(AutomationError::configuration(format!(
                "Define option_default=\"{}\", but default is not in option_names={:?}",
                default, names
            )));
        }
        for (element, name) in elements.into_iter().zip(names) {
            self.options.push(SettingOption {
                setting: setting.to_string(),
                option: name.to_string(),
                element,
            });
        }
        self.defaults.insert(setting.to_string(), default.to_string());
        Ok(())
    }

    pub fn is_option_active<C: DisplayChannel>(
        &self,
        driver: &ActionDriver<C>,
        element: &VisualElement,
    ) -> AutomationResult<bool> {
        for color in &self.active_colors {
            let (threshold, count) = (self.active_threshold, self.active_count);
            if driver.image_color_count(element.area(), *color, threshold, count)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Desired state of every affected option, in declaration order.
    ///
    /// Settings not named in `requests` fall back to their defaults.
    pub fn product_status(
        &self,
        requests: &[(&str, OptionRequest)],
    ) -> AutomationResult<Vec<(usize, bool)>> {
        let mut required: BTreeMap<&str, OptionRequest> = self
            .defaults
            .iter()
            .map(|(k, v)| (k.as_str(), OptionRequest::One(v.clone())))
            .collect();
        for (setting, request) in requests {
            if !self.defaults.contains_key(*setting) {
                return Err(AutomationError::configuration(format!(
                    "Setting {} has no setting named {}",
                    self.name, setting
                )));
            }
            let wanted: Vec<&String> = match request {
                OptionRequest::Keep => Vec::new(),
                OptionRequest::One(o) => vec![o],
                OptionRequest::Many(list) => list.iter().collect(),
            };
            for option in wanted {
                if !self.options.iter().any(|o| o.setting == *setting && o.option == *option) {
                    return Err(AutomationError::configuration(format!(
                        "Setting {}/{} has no option named {}",
                        self.name, setting, option
                    )));
                }
            }
            required.insert(*setting, request.clone());
        }

        let mut status = Vec::new();
        for (index, option) in self.options.iter().enumerate() {
            let enable = match required.get(option.setting.as_str()) {
                Some(OptionRequest::One(o)) => *o == option.option,
                Some(OptionRequest::Many(list)) => list.contains(&option.option),
                Some(OptionRequest::Keep) | None => continue,
            };
            status.push((index, enable));
        }
        Ok(status)
    }

    /// Active options as `setting/option`, also logged.
    pub fn show_active<C: DisplayChannel>(
        &self,
        driver: &ActionDriver<C>,
    ) -> AutomationResult<Vec<String>> {
        let mut active = Vec::new();
        for option in &self.options {
            if self.is_option_active(driver, &option.element)? {
                active.push(format!("{}/{}", option.setting, option.option));
            }
        }
        log::info!("[{}] {}", self.name, active.join(", "));
        Ok(active)
    }

    /// Options that should be active but are not.
    pub fn buttons_to_click<C: DisplayChannel>(
        &self,
        driver: &ActionDriver<C>,
        status: &[(usize, bool)],
    ) -> AutomationResult<Vec<usize>> {
        let mut click = Vec::new();
        for &(index, enable) in status {
            if enable && !self.is_option_active(driver, &self.options[index].element)? {
                click.push(index);
            }
        }
        Ok(click)
    }

    async fn set_execute<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
        requests: &[(&str, OptionRequest)],
    ) -> AutomationResult<bool> {
        let status = self.product_status(requests)?;
        log::info!("Setting {} options, {:?}", self.name, requests);

        let mut retry = Timer::secs(1.0, 2);
        let mut timeout = Timer::secs(10.0, 20);
        timeout.start();
        let mut skip = true;
        loop {
            if skip {
                skip = false;
            } else {
                driver.screenshot().await?;
            }

            if timeout.reached() {
                log::warn!(
                    "Set {} options timeout, assuming current options are correct.",
                    self.name
                );
                return Ok(false);
            }

            self.show_active(driver)?;
            let clicks = self.buttons_to_click(driver, &status)?;
            if clicks.is_empty() {
                return Ok(true);
            }
            if retry.reached() {
                for index in clicks {
                    driver.click(&self.options[index].element).await?;
                }
                retry.reset();
            }
        }
    }

    /// Apply `requests`, first resetting to defaults when `reset_first` is set.
    ///
    /// The current frame is used for the first check.
    pub async fn set<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
        requests: &[(&str, OptionRequest)],
    ) -> AutomationResult<bool> {
        if self.reset_first {
            self.set_execute(driver, &[]).await?;
        }
        self.set_execute(driver, requests).await
    }

    pub fn settings(&self) -> BTreeSet<&str> {
        self.defaults.keys().map(String::as_str).collect()
    }
}
