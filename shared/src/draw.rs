//! Overlay drawing for detection results.
//!
//! The shell owns the actual 2D context; this module decides *what* gets drawn.
//! A [`DrawPass`] is an ordered command list the shell replays verbatim onto a
//! canvas laid exactly over the displayed image.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::{BoundingBox, Prediction};
use crate::model::ImageRef;
use crate::{DEFAULT_ACCENT_COLOR, DEFAULT_LABEL_FONT, DEFAULT_LINE_WIDTH};

/// A label goes above its box only when the box top is strictly below this.
pub const LABEL_HEADROOM_PX: f64 = 10.0;
pub const LABEL_ABOVE_OFFSET_PX: f64 = 5.0;
pub const LABEL_BELOW_OFFSET_PX: f64 = 15.0;

#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawError {
    #[error("drawing surface is not ready")]
    SurfaceNotReady,

    #[error("drawing surface has zero area: {width}x{height}")]
    EmptySurface { width: u32, height: u32 },

    #[error("invalid overlay style: {reason}")]
    InvalidStyle { reason: String },
}

/// Pixel size of the canvas, fixed when the image finishes loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Result<Self, DrawError> {
        if width == 0 || height == 0 {
            return Err(DrawError::EmptySurface { width, height });
        }
        Ok(Self { width, height })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayStyle {
    /// CSS color used for both box stroke and label fill.
    pub color: String,
    pub line_width: f64,
    /// CSS font shorthand.
    pub font: String,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_ACCENT_COLOR.into(),
            line_width: DEFAULT_LINE_WIDTH,
            font: DEFAULT_LABEL_FONT.into(),
        }
    }
}

impl OverlayStyle {
    pub fn validate(&self) -> Result<(), DrawError> {
        if !self.line_width.is_finite() || self.line_width <= 0.0 {
            return Err(DrawError::InvalidStyle {
                reason: format!("line_width must be positive, got {}", self.line_width),
            });
        }
        if self.color.trim().is_empty() {
            return Err(DrawError::InvalidStyle {
                reason: "color is empty".into(),
            });
        }
        if self.font.trim().is_empty() {
            return Err(DrawError::InvalidStyle {
                reason: "font is empty".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear {
        width: u32,
        height: u32,
    },
    DrawImage {
        image: ImageRef,
        x: f64,
        y: f64,
    },
    StrokeRect {
        rect: BoundingBox,
        color: String,
        line_width: f64,
    },
    FillText {
        text: String,
        x: f64,
        y: f64,
        font: String,
        color: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawPass {
    pub surface: Surface,
    pub commands: Vec<DrawCommand>,
}

impl DrawPass {
    /// Clear, repaint the source image, then one box and one label per
    /// prediction in the given order.
    pub fn build(
        surface: Option<Surface>,
        image: &ImageRef,
        predictions: &[Prediction],
        style: &OverlayStyle,
    ) -> Result<Self, DrawError> {
        let surface = surface.ok_or(DrawError::SurfaceNotReady)?;

        let mut commands = Vec::with_capacity(2 + predictions.len() * 2);
        commands.push(DrawCommand::Clear {
            width: surface.width,
            height: surface.height,
        });
        commands.push(DrawCommand::DrawImage {
            image: image.clone(),
            x: 0.0,
            y: 0.0,
        });

        for prediction in predictions {
            commands.push(DrawCommand::StrokeRect {
                rect: prediction.bbox,
                color: style.color.clone(),
                line_width: style.line_width,
            });

            let (x, y) = label_anchor(&prediction.bbox);
            commands.push(DrawCommand::FillText {
                text: prediction.label.clone(),
                x,
                y,
                font: style.font.clone(),
                color: style.color.clone(),
            });
        }

        Ok(Self { surface, commands })
    }

    #[must_use]
    pub fn rect_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::StrokeRect { .. }))
            .count()
    }

    #[must_use]
    pub fn text_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillText { .. }))
            .count()
    }
}

/// Text baseline position for a box's label.
///
/// Sits 5px above the box when there is headroom, otherwise 15px below the top
/// edge so it is not clipped off the image.
#[must_use]
pub fn label_anchor(bbox: &BoundingBox) -> (f64, f64) {
    let y = if bbox.y > LABEL_HEADROOM_PX {
        bbox.y - LABEL_ABOVE_OFFSET_PX
    } else {
        bbox.y + LABEL_BELOW_OFFSET_PX
    };
    (bbox.x, y)
}
