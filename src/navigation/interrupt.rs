use std::sync::Arc;

use crate::display::DisplayChannel;
use crate::driver::{ActionDriver, Check, Detect};
use crate::error::{AutomationError, AutomationResult};
use crate::match_image::{SearchOffset, VisualElement};

use super::story::StoryHandler;

/// A confirm/cancel dialog. Either button is only clicked while the other is
/// also visible, so a lone confirm button elsewhere is never mistaken for it.
#[derive(Debug, Clone)]
pub struct Popup {
    confirm: Arc<VisualElement>,
    cancel: Arc<VisualElement>,
    pub offset: Option<SearchOffset>,
    pub interval: f64,
}

impl Popup {
    pub fn new(confirm: &Arc<VisualElement>, cancel: &Arc<VisualElement>) -> Self {
        Self {
            confirm: Arc::clone(confirm),
            cancel: Arc::clone(cancel),
            offset: Some(SearchOffset::Symmetric(3, 30)),
            interval: 2.0,
        }
    }

    pub fn with_offset(mut self, offset: Option<SearchOffset>) -> Self {
        self.offset = offset;
        self
    }

    fn detect(&self) -> Detect {
        Detect {
            offset: self.offset,
            ..Detect::default()
        }
    }

    async fn press<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
        press: &VisualElement,
        other: &VisualElement,
        name: &str,
    ) -> AutomationResult<bool> {
        if driver.appear(other, self.detect())?
            && driver.appear(press, self.detect().interval(self.interval))?
        {
            log::info!("💬 Popup {} -> {}", name, press.name());
            driver.click(press).await?;
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn handle_confirm<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
        name: &str,
    ) -> AutomationResult<bool> {
        self.press(driver, &self.confirm, &self.cancel, name).await
    }

    pub async fn handle_cancel<C: DisplayChannel>(
        &self,
        driver: &mut ActionDriver<C>,
        name: &str,
    ) -> AutomationResult<bool> {
        self.press(driver, &self.cancel, &self.confirm, name).await
    }

    pub fn interval_clear<C: DisplayChannel>(&self, driver: &mut ActionDriver<C>) {
        driver.interval_clear(&[self.confirm.as_ref(), self.cancel.as_ref()]);
    }
}

/// A dismissal that may only happen a bounded number of times.
///
/// Clicking the same popup again and again means the game is rejecting what
/// we keep confirming; past the limit the rule asks for a person instead.
#[derive(Debug, Clone)]
pub struct CountedRule {
    element: Arc<VisualElement>,
    pub detect: Detect,
    limit: u32,
    count: u32,
    also_reset: Vec<Arc<VisualElement>>,
}

impl CountedRule {
    pub fn new(element: &Arc<VisualElement>, limit: u32) -> Self {
        Self {
            element: Arc::clone(element),
            detect: Detect::at((30, 30)).interval(3.0),
            limit,
            count: 0,
            also_reset: Vec::new(),
        }
    }

    pub fn with_detect(mut self, detect: Detect) -> Self {
        self.detect = detect;
        self
    }

    /// Elements whose interval restarts after each dismissal.
    pub fn resetting(mut self, elements: &[&Arc<VisualElement>]) -> Self {
        self.also_reset.extend(elements.iter().map(|e| Arc::clone(*e)));
        self
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    async fn handle<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
    ) -> AutomationResult<bool> {
        if self.count >= self.limit {
            log::error!(
                "Failed to get past {}, clicked it {} times",
                self.element.name(),
                self.count
            );
            return Err(AutomationError::RuntimeTakeover {
                reason: format!("too many clicks on {}", self.element.name()),
            });
        }
        if driver.appear_then_click(&self.element, self.detect).await? {
            self.count += 1;
            let reset: Vec<&VisualElement> = self.also_reset.iter().map(|e| e.as_ref()).collect();
            driver.interval_reset(&reset);
            return Ok(true);
        }
        Ok(false)
    }
}

/// One check of the interrupt chain.
pub enum InterruptRule {
    /// Click `click` whenever `check` holds.
    Click { check: Check, click: Arc<VisualElement> },
    PopupConfirm(Popup),
    PopupCancel(Popup),
    Counted(CountedRule),
    Story(Box<StoryHandler>),
}

impl InterruptRule {
    /// Click the element itself when it appears.
    pub fn appear_then_click(element: &Arc<VisualElement>, detect: Detect) -> Self {
        InterruptRule::Click {
            check: Check::element_with(element, detect),
            click: Arc::clone(element),
        }
    }

    /// Click `click` when `check` holds, e.g. leave a page opened by mistake.
    pub fn redirect(check: impl Into<Check>, click: &Arc<VisualElement>) -> Self {
        InterruptRule::Click {
            check: check.into(),
            click: Arc::clone(click),
        }
    }

    pub fn name(&self) -> String {
        match self {
            InterruptRule::Click { check, click } => {
                format!("{} -> {}", check.name(), click.name())
            }
            InterruptRule::PopupConfirm(popup) => format!("confirm {}", popup.confirm.name()),
            InterruptRule::PopupCancel(popup) => format!("cancel {}", popup.cancel.name()),
            InterruptRule::Counted(rule) => {
                format!("{} ({}/{})", rule.element.name(), rule.count, rule.limit)
            }
            InterruptRule::Story(_) => "story".to_string(),
        }
    }

    pub async fn handle<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
    ) -> AutomationResult<bool> {
        match self {
            InterruptRule::Click { check, click } => {
                if driver.evaluate(check)? {
                    log::info!("Interrupt: {} -> {}", check.name(), click.name());
                    driver.click(click).await?;
                    return Ok(true);
                }
                Ok(false)
            }
            InterruptRule::PopupConfirm(popup) => popup.handle_confirm(driver, "interrupt").await,
            InterruptRule::PopupCancel(popup) => popup.handle_cancel(driver, "interrupt").await,
            InterruptRule::Counted(rule) => rule.handle(driver).await,
            InterruptRule::Story(story) => story.handle(driver).await,
        }
    }
}

impl From<Popup> for InterruptRule {
    fn from(popup: Popup) -> Self {
        InterruptRule::PopupConfirm(popup)
    }
}

impl From<CountedRule> for InterruptRule {
    fn from(rule: CountedRule) -> Self {
        InterruptRule::Counted(rule)
    }
}

impl From<StoryHandler> for InterruptRule {
    fn from(story: StoryHandler) -> Self {
        InterruptRule::Story(Box::new(story))
    }
}

/// Prioritized list of dismissals for transient screens.
///
/// `handle` stops at the first rule that acted, so the caller re-polls with a
/// fresh frame instead of stacking several clicks on one.
#[derive(Default)]
pub struct InterruptChain {
    rules: Vec<InterruptRule>,
}

impl InterruptChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rule: impl Into<InterruptRule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn push(&mut self, rule: impl Into<InterruptRule>) {
        self.rules.push(rule.into());
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.iter().map(InterruptRule::name).collect()
    }

    /// Zero the click count of every counted rule.
    pub fn reset_counters(&mut self) {
        for rule in &mut self.rules {
            if let InterruptRule::Counted(rule) = rule {
                rule.reset();
            }
        }
    }

    pub async fn handle<C: DisplayChannel>(
        &mut self,
        driver: &mut ActionDriver<C>,
    ) -> AutomationResult<bool> {
        for rule in &mut self.rules {
            if rule.handle(driver).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
