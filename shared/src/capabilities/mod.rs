mod canvas;
mod detector;
mod media;

pub use self::canvas::{Canvas, CanvasOperation};
pub use self::detector::{
    Detector, DetectorError, DetectorOperation, DetectorOutput, DetectorResult,
};
pub use self::media::{Media, MediaOperation};

// Crux's built-in Render covers view updates.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub render: Render<Event>,
    pub detector: Detector<Event>,
    pub canvas: Canvas<Event>,
    pub media: Media<Event>,
}
