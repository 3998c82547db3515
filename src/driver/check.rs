use std::sync::Arc;
use std::time::Duration;

use crate::display::Frame;
use crate::match_image::{MatchMode, SearchOffset, VisualElement};

/// How an element is detected.
///
/// No offset means color sampling of the detection area; with an offset the
/// reference image is searched around it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Detect {
    pub offset: Option<SearchOffset>,
    /// Minimum time between two successful detections of the same element.
    pub interval: Duration,
    pub color_threshold: Option<i32>,
    pub similarity: Option<f32>,
    pub mode: MatchMode,
}

impl Detect {
    /// Color sampling with the configured threshold.
    pub fn color() -> Self {
        Self::default()
    }

    /// Positional search within `offset`.
    pub fn at(offset: impl Into<SearchOffset>) -> Self {
        Self {
            offset: Some(offset.into()),
            ..Self::default()
        }
    }

    pub fn interval(mut self, seconds: f64) -> Self {
        self.interval = Duration::from_secs_f64(seconds.max(0.0));
        self
    }

    pub fn color_threshold(mut self, threshold: i32) -> Self {
        self.color_threshold = Some(threshold);
        self
    }

    pub fn similarity(mut self, similarity: f32) -> Self {
        self.similarity = Some(similarity);
        self
    }

    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }
}

pub type FramePredicate = Arc<dyn Fn(&Frame) -> bool + Send + Sync>;

/// A condition evaluated against the current frame.
#[derive(Clone)]
pub enum Check {
    Element(Arc<VisualElement>, Detect),
    Predicate(String, FramePredicate),
    AnyOf(Vec<Check>),
}

impl Check {
    pub fn element(element: &Arc<VisualElement>) -> Self {
        Check::Element(Arc::clone(element), Detect::color())
    }

    pub fn element_with(element: &Arc<VisualElement>, detect: Detect) -> Self {
        Check::Element(Arc::clone(element), detect)
    }

    pub fn predicate(
        name: impl Into<String>,
        f: impl Fn(&Frame) -> bool + Send + Sync + 'static,
    ) -> Self {
        Check::Predicate(name.into(), Arc::new(f))
    }

    pub fn any_of(checks: impl IntoIterator<Item = Check>) -> Self {
        Check::AnyOf(checks.into_iter().collect())
    }

    pub fn name(&self) -> String {
        match self {
            Check::Element(element, _) => element.name().to_string(),
            Check::Predicate(name, _) => name.clone(),
            Check::AnyOf(checks) => {
                let names: Vec<String> = checks.iter().map(Check::name).collect();
                format!("any({})", names.join(", "))
            }
        }
    }

    /// Every element referenced by this check, in order.
    pub fn elements(&self) -> Vec<Arc<VisualElement>> {
        match self {
            Check::Element(element, _) => vec![Arc::clone(element)],
            Check::Predicate(..) => Vec::new(),
            Check::AnyOf(checks) => checks.iter().flat_map(Check::elements).collect(),
        }
    }
}

impl From<&Arc<VisualElement>> for Check {
    fn from(element: &Arc<VisualElement>) -> Self {
        Check::element(element)
    }
}

impl std::fmt::Debug for Check {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Check({})", self.name())
    }
}
