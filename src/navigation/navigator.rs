use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::display::{DisplayChannel, Frame};
use crate::driver::{ActionDriver, Check, Detect};
use crate::error::{AutomationError, AutomationResult};
use crate::match_image::{SearchOffset, VisualElement};
use crate::timer::Timer;

use super::interrupt::InterruptChain;
use super::page::{PageGraph, PageId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// How page checks are detected; `None` samples their color
    pub page_offset: Option<SearchOffset>,
    /// Minimum seconds between two clicks from the same page
    pub page_interval: f64,
    /// Unknown-page timeout in seconds and polls, restarted by every recovery action
    pub unknown_timeout: (f64, u32),
    /// Minimum seconds between two clicks on the home button
    pub home_interval: f64,
    /// Give up a `goto` after this long; `None` waits as long as it takes
    pub goto_timeout: Option<Duration>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            page_offset: Some(SearchOffset::Symmetric(30, 30)),
            page_interval: 5.0,
            unknown_timeout: (10.0, 20),
            home_interval: 2.0,
            goto_timeout: None,
        }
    }
}

/// Click-then-verify request for `Navigator::ui_click`.
#[derive(Debug, Clone)]
pub struct UiClick {
    pub click: Arc<VisualElement>,
    /// Holds once the click took effect
    pub check: Check,
    /// Holds while clicking makes sense; defaults to the click element appearing
    pub appear: Option<Check>,
    /// Run the interrupt chain while waiting
    pub additional: bool,
    /// Seconds the check must keep holding, only with `additional`
    pub confirm_wait: f64,
    /// Seconds between two clicks
    pub retry_wait: f64,
    pub skip_first_screenshot: bool,
}

impl UiClick {
    pub fn new(click: &Arc<VisualElement>, check: impl Into<Check>) -> Self {
        Self {
            click: Arc::clone(click),
            check: check.into(),
            appear: None,
            additional: false,
            confirm_wait: 1.0,
            retry_wait: 10.0,
            skip_first_screenshot: false,
        }
    }

    pub fn appear(mut self, appear: impl Into<Check>) -> Self {
        self.appear = Some(appear.into());
        self
    }

    pub fn with_additional(mut self) -> Self {
        self.additional = true;
        self
    }

    pub fn confirm_wait(mut self, seconds: f64) -> Self {
        self.confirm_wait = seconds;
        self
    }

    pub fn retry_wait(mut self, seconds: f64) -> Self {
        self.retry_wait = seconds;
        self
    }

    pub fn skip_first_screenshot(mut self) -> Self {
        self.skip_first_screenshot = true;
        self
    }
}

/// Walks the page graph, draining interrupts along the way.
pub struct Navigator {
    graph: PageGraph,
    pub interrupts: InterruptChain,
    home: Option<Arc<VisualElement>>,
    back: Option<Arc<VisualElement>>,
    current: Option<PageId>,
    pub config: NavigatorConfig,
}

impl Navigator {
    pub fn new(graph: PageGraph) -> Self {
        Self {
            graph,
            interrupts: InterruptChain::new(),
            home: None,
            back: None,
            current: None,
            config: NavigatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: NavigatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_interrupts(mut self, interrupts: InterruptChain) -> Self {
        self.interrupts = interrupts;
        self
    }

    /// Button that leads back to a known page from anywhere, tried on unknown pages.
    pub fn with_home(mut self, home: &Arc<VisualElement>) -> Self {
        self.home = Some(Arc::clone(home));
        self
    }

    pub fn with_back(mut self, back: &Arc<VisualElement>) -> Self {
        self.back = Some(Arc::clone(back));
        self
    }

    pub fn graph(&self) -> &PageGraph {
        &self.graph
    }

    /// Page recognized by the last `get_current_page` or reached by the last `goto`.
    pub fn current(&self) -> Option<PageId> {
        self.current
    }

    fn page_detect(&self) -> Detect {
        Detect {
            offset: self.config.page_offset,
            ..Detect::default()
        }
    }

    pub fn page_appear<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
        page: PageId,
    ) -> AutomationResult<bool> {
        match self.graph.page(page).and_then(|p| p.check()) {
            Some(check) => driver.appear(check, self.page_detect()),
            None => Ok(false),
        }
    }

    /// Poll until a page check matches.
    ///
    /// While nothing matches, the home button or the interrupt chain is given a
    /// chance to recover; each recovery restarts the timeout.
    pub async fn get_current_page<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        skip_first_screenshot: bool,
    ) -> AutomationResult<PageId> {
        let (limit, count) = self.config.unknown_timeout;
        let mut timeout = Timer::secs(limit, count);
        timeout.start();
        let mut skip = skip_first_screenshot;
        loop {
            if skip && driver.frame().is_ok() {
                skip = false;
            } else {
                skip = false;
                driver.screenshot().await?;
            }

            if timeout.reached() {
                log::error!("Unknown page after {:.1}s", timeout.current().as_secs_f64());
                return Err(AutomationError::UnknownPage {
                    elapsed: timeout.current(),
                });
            }

            for (id, page) in self.graph.iter() {
                if let Some(check) = page.check()
                    && driver.appear(check, self.page_detect())?
                {
                    log::info!("📍 Page: {}", page.name());
                    self.current = Some(id);
                    return Ok(id);
                }
            }

            let home_clicked = match &self.home {
                Some(home) => {
                    let detect = self.page_detect().interval(self.config.home_interval);
                    driver.appear_then_click(home, detect).await?
                }
                None => false,
            };
            if home_clicked || self.interrupts.handle(driver).await? {
                timeout.reset();
            }
        }
    }

    /// Click along the route until the destination's check appears.
    ///
    /// Any visible page that has a route clicks its link one step closer;
    /// frames showing no routed page go to the interrupt chain.
    pub async fn goto<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        destination: PageId,
        skip_first_screenshot: bool,
    ) -> AutomationResult<()> {
        let target = self
            .graph
            .page(destination)
            .and_then(|p| p.check())
            .map(Arc::clone)
            .ok_or_else(|| {
                AutomationError::configuration(format!(
                    "Cannot go to page {}: it has no check element",
                    self.graph.name(destination)
                ))
            })?;
        let route = self.graph.connect(destination);
        driver.interval_clear(&self.graph.check_elements());
        log::info!("🧭 Goto {}", self.graph.name(destination));

        let started = Instant::now();
        let mut skip = skip_first_screenshot;
        loop {
            if let Some(home) = &self.home {
                home.clear_offset();
            }
            if skip && driver.frame().is_ok() {
                skip = false;
            } else {
                skip = false;
                driver.screenshot().await?;
            }

            if driver.appear(&target, self.page_detect())? {
                break;
            }

            if let Some(limit) = self.config.goto_timeout
                && started.elapsed() > limit
            {
                log::error!("Goto {} timed out", self.graph.name(destination));
                return Err(AutomationError::NavigationTimeout {
                    destination: self.graph.name(destination).to_string(),
                    duration: started.elapsed(),
                });
            }

            let mut clicked = false;
            for (id, page) in self.graph.iter() {
                let (Some(next), Some(check)) = (route.next_hop(id), page.check()) else {
                    continue;
                };
                let detect = self.page_detect().interval(self.config.page_interval);
                if driver.appear(check, detect)? {
                    if let Some(button) = page.links().get(&next) {
                        log::info!("{} -> {}", page.name(), self.graph.name(next));
                        driver.click(button).await?;
                        clicked = true;
                    }
                    break;
                }
            }
            if clicked {
                continue;
            }

            self.interrupts.handle(driver).await?;
        }

        log::info!("📍 Page arrive: {}", self.graph.name(destination));
        self.current = Some(destination);
        Ok(())
    }

    /// Go to `destination` unless already there. Returns whether a switch happened.
    pub async fn ensure<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        destination: PageId,
        skip_first_screenshot: bool,
    ) -> AutomationResult<bool> {
        let current = self.get_current_page(driver, skip_first_screenshot).await?;
        if current == destination {
            log::info!("Already at {}", self.graph.name(destination));
            return Ok(false);
        }
        self.goto(driver, destination, true).await?;
        Ok(true)
    }

    /// Click until `check` holds, retrying every `retry_wait` seconds.
    pub async fn ui_click<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        request: UiClick,
    ) -> AutomationResult<()> {
        let appear = request
            .appear
            .clone()
            .unwrap_or_else(|| Check::element_with(&request.click, self.page_detect()));
        let mut click_timer = Timer::secs(request.retry_wait, (request.retry_wait / 0.5) as u32);
        let confirm_wait = if request.additional { request.confirm_wait } else { 0.0 };
        let mut confirm_timer = Timer::secs(confirm_wait, (confirm_wait / 0.5) as u32);
        confirm_timer.start();

        let mut skip = request.skip_first_screenshot;
        loop {
            if skip {
                skip = false;
            } else {
                driver.screenshot().await?;
            }

            if driver.evaluate(&request.check)? {
                if confirm_timer.reached() {
                    return Ok(());
                }
            } else {
                confirm_timer.reset();
            }

            if click_timer.reached() && driver.evaluate(&appear)? {
                driver.click(&request.click).await?;
                click_timer.reset();
                continue;
            }

            if request.additional {
                self.interrupts.handle(driver).await?;
            }
        }
    }

    /// `ui_click` on the back button.
    pub async fn ui_back<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        check: impl Into<Check>,
        retry_wait: f64,
        skip_first_screenshot: bool,
    ) -> AutomationResult<()> {
        let back = self
            .back
            .clone()
            .ok_or_else(|| AutomationError::configuration("Navigator has no back button"))?;
        let mut request = UiClick::new(&back, check).retry_wait(retry_wait);
        request.skip_first_screenshot = skip_first_screenshot;
        self.ui_click(driver, request).await
    }

    /// Step an on-screen index with next/prev buttons until `reader` reports `index`.
    ///
    /// With `fast`, the whole difference is clicked at once, `interval` apart.
    #[allow(clippy::too_many_arguments)]
    pub async fn ensure_index<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
        index: i32,
        reader: impl Fn(&Frame) -> i32,
        next: &VisualElement,
        prev: &VisualElement,
        fast: bool,
        interval: Duration,
        skip_first_screenshot: bool,
    ) -> AutomationResult<()> {
        let mut retry = Timer::secs(1.0, 2);
        let mut skip = skip_first_screenshot;
        loop {
            if skip {
                skip = false;
            } else {
                driver.screenshot().await?;
            }

            let current = reader(driver.frame()?);
            log::info!("Index: {}", current);
            let diff = index - current;
            if diff == 0 {
                return Ok(());
            }

            if retry.reached() {
                let button = if diff > 0 { next } else { prev };
                if fast {
                    driver.multi_click(button, diff.unsigned_abs(), interval).await?;
                } else {
                    driver.click(button).await?;
                }
                retry.reset();
            }
        }
    }
}
