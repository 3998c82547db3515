//! Free-standing reference images that are searched over a whole image.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::{GrayImage, Rgb, RgbImage};

use super::color::{binarize, mean_color};
use super::correlation::best_match;
use super::element::{Reference, VisualElement};
use super::geometry::Area;
use super::resource::Resource;
use crate::error::AutomationResult;

enum TemplateSource {
    File(PathBuf),
    Images(Reference<RgbImage>),
}

#[derive(Default)]
struct TemplateCache {
    raw: Option<Reference<RgbImage>>,
    binary: Option<Reference<GrayImage>>,
}

pub struct Template {
    name: String,
    source: TemplateSource,
    cache: Mutex<TemplateCache>,
}

impl Template {
    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: TemplateSource::File(path.into()),
            cache: Mutex::new(TemplateCache::default()),
        }
    }

    pub fn from_reference(name: impl Into<String>, reference: Reference<RgbImage>) -> Self {
        Self {
            name: name.into(),
            source: TemplateSource::Images(reference),
            cache: Mutex::new(TemplateCache::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_animated(&self) -> AutomationResult<bool> {
        Ok(self.reference()?.is_animated())
    }

    /// Width and height of the first frame.
    pub fn size(&self) -> AutomationResult<(u32, u32)> {
        let reference = self.reference()?;
        Ok(reference
            .frames()
            .first()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0)))
    }

    /// True if any frame scores above `similarity` anywhere in `image`.
    ///
    /// `scaling` resizes the reference first, for screens captured at a
    /// different resolution than the asset.
    pub fn match_image(
        &self,
        image: &RgbImage,
        scaling: f32,
        similarity: f32,
    ) -> AutomationResult<bool> {
        let reference = self.reference()?;
        for frame in reference.frames() {
            let frame = scaled(frame, scaling);
            if let Some(best) = best_match(image, &frame)
                && best.similarity > similarity
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn match_binary(&self, image: &RgbImage, similarity: f32) -> AutomationResult<bool> {
        let mut cache = self.cache();
        if cache.binary.is_none() {
            let raw = self.load(&mut cache)?;
            cache.binary = Some(raw.map(binarize));
        }
        let image = binarize(image);
        Ok(cache.binary.as_ref().is_some_and(|reference| {
            reference
                .frames()
                .iter()
                .filter_map(|frame| best_match(&image, frame))
                .any(|best| best.similarity > similarity)
        }))
    }

    /// Best similarity over all frames, and an element placed where it was found.
    ///
    /// The element's color is sampled from the matched region of `image`.
    pub fn match_result(
        &self,
        image: &RgbImage,
        name: Option<&str>,
    ) -> AutomationResult<(f32, VisualElement)> {
        let reference = self.reference()?;
        let mut best_score = f32::MIN;
        let mut best_area = Area::new(0, 0, 0, 0);
        for frame in reference.frames() {
            if let Some(best) = best_match(image, frame)
                && best.similarity > best_score
            {
                best_score = best.similarity;
                best_area = Area::new(
                    best.x as i32,
                    best.y as i32,
                    (best.x + frame.width()) as i32,
                    (best.y + frame.height()) as i32,
                );
            }
        }
        if best_score == f32::MIN {
            best_score = 0.0;
        }
        let color: Rgb<u8> = mean_color(image, best_area);
        let element = VisualElement::new(name.unwrap_or(&self.name), best_area, color);
        Ok((best_score, element))
    }

    fn cache(&self) -> MutexGuard<'_, TemplateCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reference(&self) -> AutomationResult<Reference<RgbImage>> {
        let mut cache = self.cache();
        self.load(&mut cache)
    }

    fn load(&self, cache: &mut TemplateCache) -> AutomationResult<Reference<RgbImage>> {
        if let Some(raw) = &cache.raw {
            return Ok(raw.clone());
        }
        let raw = match &self.source {
            TemplateSource::File(path) => Reference::load(path)?,
            TemplateSource::Images(reference) => reference.clone(),
        };
        cache.raw = Some(raw.clone());
        Ok(raw)
    }
}

fn scaled(frame: &RgbImage, scaling: f32) -> RgbImage {
    if (scaling - 1.0).abs() < f32::EPSILON || scaling <= 0.0 {
        return frame.clone();
    }
    let width = ((frame.width() as f32 * scaling).round() as u32).max(1);
    let height = ((frame.height() as f32 * scaling).round() as u32).max(1);
    image::imageops::resize(frame, width, height, image::imageops::FilterType::Triangle)
}

impl Resource for Template {
    fn resource_key(&self) -> &str {
        &self.name
    }

    fn release(&self) {
        let mut cache = self.cache();
        cache.raw = None;
        cache.binary = None;
    }

    fn is_loaded(&self) -> bool {
        let cache = self.cache();
        cache.raw.is_some() || cache.binary.is_some()
    }
}
