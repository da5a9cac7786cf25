//! Page geometry: where an image lands on its page, in PDF points.
//!
//! Declared pixel sizes are converted with `points = px × 72 / page_dpi`.
//! For [`PageGeometry::FixedWidth`] and [`PageGeometry::FixedSize`] without
//! an explicit size, the first image placed fixes the page size for the rest
//! of the batch. That value is set once through a [`OnceLock`], so two
//! threads racing on the first placement still agree on one size.

use crate::config::{PageGeometry, Parameters};
use crate::output::DecodedImage;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const POINTS_PER_INCH: f32 = 72.0;

/// Page and image rectangles for one page, in points. The image origin is
/// the lower-left corner of the image relative to the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub image_x: f32,
    pub image_y: f32,
    pub image_width: f32,
    pub image_height: f32,
}

/// Computes [`PageLayout`]s for a batch.
#[derive(Debug)]
pub struct PageLayouter {
    geometry: PageGeometry,
    dpi: f32,
    fixed: OnceLock<(f32, f32)>,
}

impl PageLayouter {
    pub fn new(geometry: PageGeometry, dpi: f32) -> Self {
        let fixed = match geometry {
            PageGeometry::FixedWidth { width: Some(w) } => OnceLock::from((w, 0.0)),
            PageGeometry::FixedSize { size: Some(size) } => OnceLock::from(size),
            _ => OnceLock::new(),
        };
        Self {
            geometry,
            dpi: if dpi > 0.0 { dpi } else { POINTS_PER_INCH },
            fixed,
        }
    }

    pub fn from_params(params: &Parameters) -> Self {
        Self::new(params.page_geometry, params.page_dpi)
    }

    /// Page size fixed so far, if any. For fixed-width pages the height is 0.
    pub fn fixed_size(&self) -> Option<(f32, f32)> {
        self.fixed.get().copied()
    }

    /// Lay out one image.
    pub fn place(&self, image: &DecodedImage) -> PageLayout {
        let scale = POINTS_PER_INCH / self.dpi;
        let w = image.declared_width * scale;
        let h = image.declared_height * scale;

        match self.geometry {
            PageGeometry::FollowImage => PageLayout {
                page_width: w,
                page_height: h,
                image_x: 0.0,
                image_y: 0.0,
                image_width: w,
                image_height: h,
            },
            PageGeometry::FixedWidth { .. } => {
                let (pw, _) = *self.fixed.get_or_init(|| (w, 0.0));
                let ph = pw / w * h;
                PageLayout {
                    page_width: pw,
                    page_height: ph,
                    image_x: 0.0,
                    image_y: 0.0,
                    image_width: pw,
                    image_height: ph,
                }
            }
            PageGeometry::FixedSize { .. } => {
                let (pw, ph) = *self.fixed.get_or_init(|| (w, h));
                let r = (pw / w).min(ph / h);
                let (iw, ih) = (w * r, h * r);
                PageLayout {
                    page_width: pw,
                    page_height: ph,
                    image_x: (pw - iw) / 2.0,
                    image_y: (ph - ih) / 2.0,
                    image_width: iw,
                    image_height: ih,
                }
            }
        }
    }
}
