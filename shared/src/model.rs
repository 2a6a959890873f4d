use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::detection::{DetectorHandle, Prediction};
use crate::draw::Surface;
use crate::event::ScanId;
use crate::AppError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageRefError {
    #[error("image handle is empty")]
    Empty,

    #[error("image handle is not a URL: {0}")]
    Invalid(#[from] url::ParseError),
}

/// Displayable handle for the uploaded bitmap, usually a `blob:` object URL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(Url);

impl ImageRef {
    pub fn parse(s: &str) -> Result<Self, ImageRefError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ImageRefError::Empty);
        }
        Ok(Self(Url::parse(s)?))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl FromStr for ImageRef {
    type Err = ImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the shell reports after the user picks a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedImage {
    /// Object URL the shell minted for the file.
    pub url: String,
    pub name: String,
    pub mime_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedImage {
    pub image: ImageRef,
    pub name: String,
    pub mime_type: String,
    /// `None` until the shell reports the image finished loading.
    pub surface: Option<Surface>,
}

impl LoadedImage {
    #[must_use]
    pub fn new(image: ImageRef, name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            image,
            name: name.into(),
            mime_type: mime_type.into(),
            surface: None,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.surface.is_some()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Idle,
    Detecting {
        scan: ScanId,
    },
}

impl ScanState {
    #[must_use]
    pub const fn is_detecting(self) -> bool {
        matches!(self, Self::Detecting { .. })
    }

    #[must_use]
    pub fn is_current(self, scan: ScanId) -> bool {
        matches!(self, Self::Detecting { scan: current } if current == scan)
    }

    #[must_use]
    pub const fn scan(self) -> Option<ScanId> {
        match self {
            Self::Idle => None,
            Self::Detecting { scan } => Some(scan),
        }
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub image: Option<LoadedImage>,
    pub scan: ScanState,
    pub results: Vec<Prediction>,
    pub detector: Option<DetectorHandle>,
    pub active_error: Option<AppError>,
    pub config: Config,
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    /// Swaps in a new image, dropping results and any in-flight scan.
    ///
    /// Re-selecting the current handle keeps its surface: the shell will not
    /// report a load for an image it is already showing.
    ///
    /// Returns the superseded handle so the caller can release it.
    pub fn replace_image(&mut self, mut image: LoadedImage) -> Option<ImageRef> {
        self.results.clear();
        self.scan = ScanState::Idle;
        if let Some(current) = self.image.as_ref().filter(|c| c.image == image.image) {
            image.surface = current.surface;
        }
        self.image.replace(image).map(|previous| previous.image)
    }

    pub fn clear_image(&mut self) -> Option<ImageRef> {
        self.results.clear();
        self.scan = ScanState::Idle;
        self.image.take().map(|previous| previous.image)
    }

    #[must_use]
    pub fn is_current_image(&self, image: &ImageRef) -> bool {
        self.image.as_ref().is_some_and(|i| &i.image == image)
    }

    pub fn begin_scan(&mut self) -> ScanId {
        let scan = ScanId::generate();
        self.scan = ScanState::Detecting { scan };
        scan
    }

    /// Returns `false` when `scan` was cancelled or already finished.
    pub fn finish_scan(&mut self, scan: ScanId) -> bool {
        if self.scan.is_current(scan) {
            self.scan = ScanState::Idle;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn cached_detector(&self) -> Option<DetectorHandle> {
        if self.config.cache_detector {
            self.detector.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(url: &str) -> LoadedImage {
        LoadedImage::new(ImageRef::parse(url).unwrap(), "a.png", "image/png")
    }

    #[test]
    fn test_image_ref_parsing() {
        let r = ImageRef::parse("blob:http://localhost:5173/8a1c").unwrap();
        assert_eq!(r.as_str(), "blob:http://localhost:5173/8a1c");
        assert_eq!(r.url().scheme(), "blob");

        assert_eq!(ImageRef::parse("   "), Err(ImageRefError::Empty));
        assert!(matches!(
            "not a url".parse::<ImageRef>(),
            Err(ImageRefError::Invalid(_))
        ));
    }

    #[test]
    fn test_replace_image_returns_previous_and_clears() {
        let mut model = Model::default();
        assert_eq!(model.replace_image(loaded("blob:http://h/a")), None);

        model.results.push(crate::detection::Prediction::new(
            [0.0, 0.0, 1.0, 1.0],
            "cat",
            0.9,
        ));
        model.begin_scan();

        let previous = model.replace_image(loaded("blob:http://h/b"));
        assert_eq!(previous.unwrap().as_str(), "blob:http://h/a");
        assert!(model.results.is_empty());
        assert_eq!(model.scan, ScanState::Idle);
    }

    #[test]
    fn test_reselecting_current_image_keeps_surface() {
        let mut model = Model::default();
        model.replace_image(loaded("blob:http://h/a"));
        model.image.as_mut().unwrap().surface = Some(Surface::new(320, 240).unwrap());
        model.begin_scan();

        let previous = model.replace_image(loaded("blob:http://h/a"));
        assert_eq!(previous.unwrap().as_str(), "blob:http://h/a");
        assert!(model.image.as_ref().unwrap().is_ready());
        assert_eq!(model.scan, ScanState::Idle);

        model.replace_image(loaded("blob:http://h/b"));
        assert!(!model.image.as_ref().unwrap().is_ready());
    }

    #[test]
    fn test_scan_lifecycle() {
        let mut model = Model::default();
        let first = model.begin_scan();
        assert!(model.scan.is_detecting());
        assert_eq!(model.scan.scan(), Some(first));

        assert!(model.finish_scan(first));
        assert!(!model.scan.is_detecting());
        assert!(!model.finish_scan(first), "finishing twice is a no-op");
    }

    #[test]
    fn test_stale_scan_cannot_finish_newer_one() {
        let mut model = Model::default();
        let old = model.begin_scan();
        model.scan = ScanState::Idle;
        let new = model.begin_scan();

        assert!(!model.finish_scan(old));
        assert!(model.scan.is_current(new));
    }

    #[test]
    fn test_cache_respects_config() {
        let mut model = Model::default();
        model.detector = Some(DetectorHandle::new("coco-ssd#1"));
        assert!(model.cached_detector().is_some());

        model.config.cache_detector = false;
        assert!(model.cached_detector().is_none());
    }
}
