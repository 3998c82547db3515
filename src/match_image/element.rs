use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::{DynamicImage, GrayImage, ImageBuffer, Pixel, Rgb, RgbImage};
use imageproc::integral_image::ArrayData;
use imageproc::map::{ChannelMap, WithChannel};
use serde::{Deserialize, Serialize};

use super::color::{binarize, color_similar, crop, luma, mean_color};
use super::correlation::{BestMatch, best_match};
use super::geometry::{Area, Offset, SearchOffset};
use super::resource::Resource;
use crate::error::{AutomationError, AutomationResult};

/// Which representation of frame and reference is correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchMode {
    /// Full RGB.
    #[default]
    Raw,
    /// Luma thresholded with Otsu's level; robust to color shifts.
    Binary,
    /// Luma only.
    Luma,
}

/// A reference image, either a single picture or the frames of an animation.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference<T> {
    Static(T),
    Animated(Vec<T>),
}

impl<T> Reference<T> {
    pub fn frames(&self) -> &[T] {
        match self {
            Reference::Static(image) => std::slice::from_ref(image),
            Reference::Animated(frames) => frames,
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Reference::Animated(_))
    }

    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Reference<U> {
        match self {
            Reference::Static(image) => Reference::Static(f(image)),
            Reference::Animated(frames) => Reference::Animated(frames.iter().map(f).collect()),
        }
    }
}

impl Reference<RgbImage> {
    /// Animated reference from raw frames; every frame is followed by its mirror image.
    pub fn animated(frames: Vec<RgbImage>) -> Self {
        let mut all = Vec::with_capacity(frames.len() * 2);
        for frame in frames {
            let mirrored = image::imageops::flip_horizontal(&frame);
            all.push(frame);
            all.push(mirrored);
        }
        Reference::Animated(all)
    }

    /// Load a PNG/JPEG as static or a GIF as animated.
    pub fn load(path: &Path) -> AutomationResult<Self> {
        let asset_error = |description: String| AutomationError::Asset {
            path: path.to_path_buf(),
            description,
        };
        let is_gif = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("gif"));

        if is_gif {
            use image::AnimationDecoder;
            use image::codecs::gif::GifDecoder;

            let file = std::fs::File::open(path).map_err(|e| asset_error(e.to_string()))?;
            let decoder = GifDecoder::new(std::io::BufReader::new(file))
                .map_err(|e| asset_error(e.to_string()))?;
            let frames = decoder
                .into_frames()
                .collect_frames()
                .map_err(|e| asset_error(e.to_string()))?;
            let frames = frames
                .into_iter()
                .map(|f| DynamicImage::ImageRgba8(f.into_buffer()).to_rgb8())
                .collect();
            Ok(Reference::animated(frames))
        } else {
            let image = image::open(path).map_err(|e| asset_error(e.to_string()))?;
            Ok(Reference::Static(image.to_rgb8()))
        }
    }
}

/// Where an element's reference pixels come from.
#[derive(Debug, Clone)]
pub enum ReferenceSource {
    /// No reference; positional matching always misses.
    None,
    /// Full-screen capture on disk, cropped to the element area when loaded.
    File(PathBuf),
    /// Reference images already cropped to the element area.
    Images(Reference<RgbImage>),
}

#[derive(Default)]
struct ElementState {
    offset: Option<Offset>,
    raw: Option<Reference<RgbImage>>,
    binary: Option<Reference<GrayImage>>,
    luma: Option<Reference<GrayImage>>,
}

/// A named screen region that can be recognized and clicked.
///
/// The detection `area` and action `button` are fixed; a positional match
/// records where the reference was found as a relative offset, and the action
/// area follows it. Reference pixels load on first use and can be released.
pub struct VisualElement {
    name: String,
    area: Area,
    color: Rgb<u8>,
    button: Area,
    source: ReferenceSource,
    state: Mutex<ElementState>,
}

impl VisualElement {
    pub fn new(name: impl Into<String>, area: Area, color: Rgb<u8>) -> Self {
        Self {
            name: name.into(),
            area,
            color,
            button: area,
            source: ReferenceSource::None,
            state: Mutex::new(ElementState::default()),
        }
    }

    pub fn with_button(mut self, button: Area) -> Self {
        self.button = button;
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = ReferenceSource::File(path.into());
        self
    }

    pub fn with_reference(mut self, reference: Reference<RgbImage>) -> Self {
        self.source = ReferenceSource::Images(reference);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn area(&self) -> Area {
        self.area
    }

    pub fn color(&self) -> Rgb<u8> {
        self.color
    }

    /// The base action area, ignoring any learned offset.
    pub fn button(&self) -> Area {
        self.button
    }

    pub fn source(&self) -> &ReferenceSource {
        &self.source
    }

    pub fn offset(&self) -> Option<Offset> {
        self.state().offset
    }

    /// Where a click should land: the base action area moved by the learned offset.
    pub fn action_area(&self) -> Area {
        self.button.moved(self.offset().unwrap_or_default())
    }

    pub fn load_offset(&self, other: &VisualElement) {
        self.state().offset = other.offset();
    }

    pub fn clear_offset(&self) {
        self.state().offset = None;
    }

    /// Mean color of the detection area compared with the expected color.
    pub fn appears_in(&self, frame: &RgbImage, threshold: i32) -> bool {
        color_similar(mean_color(frame, self.area), self.color, threshold)
    }

    /// Color check at the position found by the last positional match.
    pub fn match_appear_on(&self, frame: &RgbImage, threshold: i32) -> bool {
        let area = self.area.moved(self.offset().unwrap_or_default());
        color_similar(mean_color(frame, area), self.color, threshold)
    }

    /// Search the reference around the detection area.
    ///
    /// Returns `Ok(false)` on a miss, when no reference is configured, or when
    /// the clipped search window is smaller than the reference.
    pub fn match_in(
        &self,
        frame: &RgbImage,
        offset: SearchOffset,
        threshold: f32,
        mode: MatchMode,
    ) -> AutomationResult<bool> {
        let search = self.area.expanded(offset.window());
        let (window, clipped) = crop(frame, search);
        if clipped.is_empty() {
            return Ok(false);
        }

        let mut guard = self.state();
        let state = &mut *guard;
        if !self.ensure_loaded(state)? {
            return Ok(false);
        }
        let found = match mode {
            MatchMode::Raw => state
                .raw
                .as_ref()
                .and_then(|r| first_above(&window, r.frames(), threshold)),
            MatchMode::Binary => {
                if state.binary.is_none() {
                    state.binary = state.raw.as_ref().map(|r| r.map(binarize));
                }
                let window = binarize(&window);
                state
                    .binary
                    .as_ref()
                    .and_then(|r| first_above(&window, r.frames(), threshold))
            }
            MatchMode::Luma => {
                if state.luma.is_none() {
                    state.luma = state.raw.as_ref().map(|r| r.map(luma));
                }
                let window = luma(&window);
                state
                    .luma
                    .as_ref()
                    .and_then(|r| first_above(&window, r.frames(), threshold))
            }
        };

        match found {
            Some(best) => {
                let learned = Offset::new(
                    clipped.x1 - self.area.x1 + best.x as i32,
                    clipped.y1 - self.area.y1 + best.y as i32,
                );
                log::debug!(
                    "{} matched {:.3} ({:?}) offset ({}, {})",
                    self.name,
                    best.similarity,
                    mode,
                    learned.dx,
                    learned.dy
                );
                state.offset = Some(learned);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// New element for a rectangle given relative to this element's detection area.
    pub fn crop(&self, relative: Area, name: Option<&str>) -> VisualElement {
        let area = self.area.sub_area(relative);
        let source = match &self.source {
            ReferenceSource::Images(reference) => {
                ReferenceSource::Images(reference.map(|image| crop(image, relative).0))
            }
            other => other.clone(),
        };
        VisualElement {
            name: name.map_or_else(|| format!("{}_crop", self.name), str::to_string),
            area,
            color: self.color,
            button: area,
            source,
            state: Mutex::new(ElementState::default()),
        }
    }

    /// Copy of this element translated by `offset`; pixels are not carried over.
    pub fn moved(&self, offset: Offset, name: Option<&str>) -> VisualElement {
        VisualElement {
            name: name.map_or_else(|| self.name.clone(), str::to_string),
            area: self.area.moved(offset),
            color: self.color,
            button: self.button.moved(offset),
            source: match &self.source {
                ReferenceSource::File(path) => ReferenceSource::File(path.clone()),
                _ => ReferenceSource::None,
            },
            state: Mutex::new(ElementState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ElementState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Loads raw reference frames if needed. False when there is nothing to match against.
    fn ensure_loaded(&self, state: &mut ElementState) -> AutomationResult<bool> {
        if state.raw.is_none() {
            state.raw = match &self.source {
                ReferenceSource::None => None,
                ReferenceSource::Images(reference) => Some(reference.clone()),
                ReferenceSource::File(path) => {
                    let full = Reference::load(path)?;
                    log::debug!("📂 Loaded reference for {} from {:?}", self.name, path);
                    Some(full.map(|image| crop(image, self.area).0))
                }
            };
        }
        Ok(state
            .raw
            .as_ref()
            .is_some_and(|r| r.frames().iter().any(|f| f.width() > 0 && f.height() > 0)))
    }
}

fn first_above<P>(
    window: &ImageBuffer<P, Vec<u8>>,
    frames: &[ImageBuffer<P, Vec<u8>>],
    threshold: f32,
) -> Option<BestMatch>
where
    P: Pixel<Subpixel = u8> + WithChannel<u64>,
    ChannelMap<P, u64>: ArrayData + Copy,
    <ChannelMap<P, u64> as ArrayData>::DataType: AsRef<[u64]>,
{
    frames
        .iter()
        .filter_map(|frame| best_match(window, frame))
        .find(|best| best.similarity > threshold)
}

impl Resource for VisualElement {
    fn resource_key(&self) -> &str {
        &self.name
    }

    fn release(&self) {
        let mut state = self.state();
        state.raw = None;
        state.binary = None;
        state.luma = None;
    }

    fn is_loaded(&self) -> bool {
        let state = self.state();
        state.raw.is_some() || state.binary.is_some() || state.luma.is_some()
    }
}

impl Clone for VisualElement {
    fn clone(&self) -> Self {
        VisualElement {
            name: self.name.clone(),
            area: self.area,
            color: self.color,
            button: self.button,
            source: self.source.clone(),
            state: Mutex::new(ElementState {
                offset: self.offset(),
                ..ElementState::default()
            }),
        }
    }
}

impl std::fmt::Debug for VisualElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualElement")
            .field("name", &self.name)
            .field("area", &self.area)
            .field("color", &self.color.0)
            .field("button", &self.button)
            .field("offset", &self.offset())
            .finish()
    }
}

impl std::fmt::Display for VisualElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl PartialEq for VisualElement {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
