use image::{GrayImage, Luma, Rgb};
use serde::{Deserialize, Serialize};

use super::element::VisualElement;
use super::geometry::{Area, Offset};

/// A regular lattice of same-sized elements, such as tabs or inventory slots.
///
/// Element `(x, y)` sits at `origin + (x, y) * delta`, rounded to whole pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementGrid {
    pub name: String,
    pub origin: (f64, f64),
    pub delta: (f64, f64),
    pub element_shape: (i32, i32),
    /// `(columns, rows)`
    pub grid_shape: (u32, u32),
}

impl ElementGrid {
    pub fn new(
        name: impl Into<String>,
        origin: (f64, f64),
        delta: (f64, f64),
        element_shape: (i32, i32),
        grid_shape: (u32, u32),
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            delta,
            element_shape,
            grid_shape,
        }
    }

    pub fn len(&self) -> usize {
        (self.grid_shape.0 * self.grid_shape.1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn area(&self, x: u32, y: u32) -> Area {
        let x1 = (self.origin.0 + x as f64 * self.delta.0).round() as i32;
        let y1 = (self.origin.1 + y as f64 * self.delta.1).round() as i32;
        Area::new(x1, y1, x1 + self.element_shape.0, y1 + self.element_shape.1)
    }

    pub fn element(&self, x: u32, y: u32) -> VisualElement {
        VisualElement::new(
            format!("{}_{}_{}", self.name, x, y),
            self.area(x, y),
            Rgb([0, 0, 0]),
        )
    }

    /// Every cell with its grid coordinate, row-major with x varying fastest.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, VisualElement)> + '_ {
        let (cols, rows) = self.grid_shape;
        (0..rows).flat_map(move |y| (0..cols).map(move |x| (x, y, self.element(x, y))))
    }

    pub fn elements(&self) -> Vec<VisualElement> {
        self.iter().map(|(_, _, element)| element).collect()
    }

    /// Same lattice with a smaller element rectangle, given relative to each cell.
    pub fn crop(&self, relative: Area, name: Option<&str>) -> ElementGrid {
        ElementGrid {
            name: name.map_or_else(|| self.name.clone(), str::to_string),
            origin: (
                self.origin.0 + relative.x1 as f64,
                self.origin.1 + relative.y1 as f64,
            ),
            delta: self.delta,
            element_shape: (relative.width(), relative.height()),
            grid_shape: self.grid_shape,
        }
    }

    pub fn moved(&self, offset: Offset, name: Option<&str>) -> ElementGrid {
        ElementGrid {
            name: name.map_or_else(|| self.name.clone(), str::to_string),
            origin: (self.origin.0 + offset.dx as f64, self.origin.1 + offset.dy as f64),
            ..self.clone()
        }
    }

    /// White cells on black, for checking a grid definition against a screenshot.
    pub fn mask(&self, width: u32, height: u32) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for (x, y, _) in self.iter() {
            let area = self.area(x, y).clipped(width, height);
            for py in area.y1..area.y2 {
                for px in area.x1..area.x2 {
                    mask.put_pixel(px as u32, py as u32, Luma([255]));
                }
            }
        }
        mask
    }
}
