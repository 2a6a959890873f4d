// lib.rs - MiniScan core: upload, detect, draw

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod config;
pub mod detection;
pub mod draw;
pub mod event;
pub mod model;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::Config;
pub use crux_core::{render::Render, App as CruxApp};
pub use detection::{BoundingBox, DetectOptions, DetectorHandle, Prediction};
pub use draw::{DrawCommand, DrawPass, OverlayStyle, Surface};
pub use event::{Event, ScanId};
pub use model::{ImageRef, LoadedImage, Model, ScanState, SelectedImage};

pub const APP_TITLE: &str = "📸 MiniScan";
pub const APP_TAGLINE: &str = "Upload an image and detect objects in it";
pub const ACCEPTED_IMAGE_TYPES: &str = "image/*";
pub const SCAN_LABEL: &str = "🚀 Scan Image";
pub const SCANNING_LABEL: &str = "Scanning...";
pub const RESULTS_HEADING: &str = "Detected Objects:";
pub const DEFAULT_ACCENT_COLOR: &str = "#00FF00";
pub const DEFAULT_LINE_WIDTH: f64 = 2.0;
pub const DEFAULT_LABEL_FONT: &str = "16px sans-serif";
pub const DEFAULT_MAX_BOXES: u32 = 20;
pub const DEFAULT_MIN_SCORE: f64 = 0.5;
pub const MAX_DETECT_BOXES: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DetectorLoad,
    Detection,
    InvalidImage,
    Render,
    Configuration,
    InvalidState,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::DetectorLoad => "DETECTOR_LOAD_ERROR",
            Self::Detection => "DETECTION_ERROR",
            Self::InvalidImage => "INVALID_IMAGE",
            Self::Render => "RENDER_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::DetectorLoad | Self::Detection => ErrorSeverity::Transient,
            Self::InvalidImage | Self::Configuration => ErrorSeverity::Permanent,
            Self::Render | Self::InvalidState => ErrorSeverity::Fatal,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::DetectorLoad | Self::Detection)
    }

    #[must_use]
    pub const fn user_facing_message(self) -> &'static str {
        match self {
            Self::DetectorLoad => {
                "The detection model could not be loaded. Please check your connection and try again."
            }
            Self::Detection => "Object detection failed. Please try again.",
            Self::InvalidImage => "This image could not be displayed. Please choose another file.",
            Self::Render => "The results could not be drawn on the image.",
            Self::Configuration => "Invalid settings:",
            Self::InvalidState => "Something went wrong. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Configuration => {
                format!("{} {}", self.kind.user_facing_message(), self.message)
            }
            kind => kind.user_facing_message().to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " ({internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<capabilities::DetectorError> for AppError {
    fn from(e: capabilities::DetectorError) -> Self {
        use capabilities::DetectorError;

        let kind = match &e {
            DetectorError::LoadFailed(_) => ErrorKind::DetectorLoad,
            DetectorError::DetectFailed(_) | DetectorError::InvalidHandle => ErrorKind::Detection,
            DetectorError::ImageUnavailable => ErrorKind::InvalidImage,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<draw::DrawError> for AppError {
    fn from(e: draw::DrawError) -> Self {
        use draw::DrawError;

        let kind = match &e {
            DrawError::SurfaceNotReady => ErrorKind::Render,
            DrawError::EmptySurface { .. } => ErrorKind::InvalidImage,
            DrawError::InvalidStyle { .. } => ErrorKind::Configuration,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::new(ErrorKind::Configuration, e.to_string())
    }
}

impl From<model::ImageRefError> for AppError {
    fn from(e: model::ImageRefError) -> Self {
        AppError::new(ErrorKind::InvalidImage, "image handle rejected").with_internal(e.to_string())
    }
}

// ============================================================================
// View model
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadView {
    pub accept: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageView {
    pub url: String,
    pub name: String,
    pub mime_type: String,
    /// Known once the image has loaded; the overlay canvas takes this size.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanButtonView {
    pub label: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultsView {
    pub heading: String,
    pub items: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub error_code: String,
    pub is_retryable: bool,
    pub dismissible: bool,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            error_code: e.code().to_string(),
            is_retryable: e.is_retryable(),
            dismissible: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub title: String,
    pub tagline: String,
    pub upload: UploadView,
    pub image: Option<ImageView>,
    pub scan_button: Option<ScanButtonView>,
    pub results: Option<ResultsView>,
    pub error: Option<UserFacingError>,
}

pub mod app {
    use tracing::{debug, info, instrument, warn};

    use super::*;
    use crate::capabilities::{DetectorOutput, DetectorResult};
    use crate::draw::DrawError;

    #[derive(Default)]
    pub struct App;

    impl App {
        /// Returns the handle that is no longer referenced, if any.
        fn select_image(
            model: &mut Model,
            selected: SelectedImage,
        ) -> Result<Option<ImageRef>, AppError> {
            let image = ImageRef::parse(&selected.url)
                .map_err(|e| AppError::from(e).with_context("name", selected.name.clone()))?;

            if let Some(scan) = model.scan.scan() {
                info!(%scan, "new upload cancels in-flight scan");
            }

            let previous = model.replace_image(LoadedImage::new(
                image.clone(),
                selected.name,
                selected.mime_type,
            ));
            model.clear_error();
            debug!(%image, "image selected");

            Ok(previous.filter(|p| *p != image))
        }

        /// Repaints the overlay from the current image and result list.
        fn draw_overlay(model: &Model, caps: &Capabilities) -> Result<(), DrawError> {
            let current = model.image.as_ref().ok_or(DrawError::SurfaceNotReady)?;
            let pass = DrawPass::build(
                current.surface,
                &current.image,
                &model.results,
                &model.config.style,
            )?;
            caps.canvas.draw(pass);
            Ok(())
        }

        /// Drops the result list and wipes boxes already on a loaded canvas.
        fn clear_results(model: &mut Model, caps: &Capabilities) {
            model.results.clear();
            if model.image.as_ref().is_some_and(LoadedImage::is_ready) {
                if let Err(e) = Self::draw_overlay(model, caps) {
                    warn!(error = %e, "overlay not cleared");
                }
            }
        }

        fn is_current(model: &Model, reported: &str) -> bool {
            ImageRef::parse(reported).is_ok_and(|image| model.is_current_image(&image))
        }

        fn on_image_loaded(model: &mut Model, image: &str, width: u32, height: u32) {
            if !Self::is_current(model, image) {
                debug!(image, "load report for a replaced image");
                return;
            }

            match Surface::new(width, height) {
                Ok(surface) => {
                    if let Some(current) = model.image.as_mut() {
                        current.surface = Some(surface);
                    }
                    debug!(width, height, "surface ready");
                }
                Err(e) => {
                    warn!(error = %e, "image reported without area");
                    model.set_error(e.into());
                }
            }
        }

        fn on_image_load_failed(model: &mut Model, caps: &Capabilities, image: String) {
            if !Self::is_current(model, &image) {
                debug!(image, "failure report for a replaced image");
                return;
            }

            if let Some(scan) = model.scan.scan() {
                info!(%scan, "image failed, cancelling scan");
            }
            if let Some(dropped) = model.clear_image() {
                caps.media.revoke(dropped);
            }
            warn!(image, "image could not be displayed");
            model.set_error(
                AppError::new(ErrorKind::InvalidImage, "image failed to load")
                    .with_context("image", image),
            );
        }

        fn start_scan(model: &mut Model, caps: &Capabilities) {
            let Some(current) = model.image.as_ref() else {
                debug!("scan requested without an image");
                return;
            };
            if !current.is_ready() {
                debug!("scan requested before the image finished loading");
                return;
            }
            if let Some(scan) = model.scan.scan() {
                debug!(%scan, "scan already in flight");
                return;
            }

            let image = current.image.clone();
            let scan = model.begin_scan();
            model.clear_error();
            info!(%scan, %image, "scan started");

            match model.cached_detector() {
                Some(detector) => {
                    Self::request_detection(caps, scan, detector, image, model.config.detect.clone());
                }
                None => caps.detector.load(move |result| Event::DetectorLoaded {
                    scan,
                    result: Box::new(result),
                }),
            }
        }

        fn request_detection(
            caps: &Capabilities,
            scan: ScanId,
            detector: DetectorHandle,
            image: ImageRef,
            options: DetectOptions,
        ) {
            caps.detector
                .detect(detector, image, options, move |result| Event::DetectionCompleted {
                    scan,
                    result: Box::new(result),
                });
        }

        /// Releases the scan and surfaces `error`, unless the scan was
        /// already cancelled.
        fn fail_scan(model: &mut Model, scan: ScanId, error: AppError) {
            if model.finish_scan(scan) {
                warn!(%scan, code = error.code(), "scan failed: {error}");
                model.set_error(error);
            } else {
                warn!(%scan, "failure of a cancelled scan ignored: {error}");
            }
        }

        fn on_detector_loaded(
            model: &mut Model,
            caps: &Capabilities,
            scan: ScanId,
            result: DetectorResult,
        ) {
            match result {
                Ok(DetectorOutput::Loaded(handle)) => {
                    debug!(%scan, detector = %handle, "detector loaded");
                    if model.config.cache_detector {
                        model.detector = Some(handle.clone());
                    }
                    if !model.scan.is_current(scan) {
                        warn!(%scan, "detector arrived for a cancelled scan");
                        return;
                    }

                    match model.image.as_ref() {
                        Some(current) => Self::request_detection(
                            caps,
                            scan,
                            handle,
                            current.image.clone(),
                            model.config.detect.clone(),
                        ),
                        None => Self::fail_scan(
                            model,
                            scan,
                            AppError::new(ErrorKind::InvalidState, "no image to scan"),
                        ),
                    }
                }
                Ok(DetectorOutput::Predictions(_)) => Self::fail_scan(
                    model,
                    scan,
                    AppError::new(ErrorKind::DetectorLoad, "unexpected detector output")
                        .with_internal("expected Loaded, got Predictions"),
                ),
                Err(e) => Self::fail_scan(model, scan, e.into()),
            }
        }

        fn on_detection_completed(
            model: &mut Model,
            caps: &Capabilities,
            scan: ScanId,
            result: DetectorResult,
        ) {
            if !model.scan.is_current(scan) {
                warn!(%scan, "discarding results of a cancelled scan");
                return;
            }

            match result {
                Ok(DetectorOutput::Predictions(predictions)) => {
                    model.finish_scan(scan);
                    model.results = predictions;
                    info!(%scan, count = model.results.len(), "scan finished");

                    if let Err(e) = Self::draw_overlay(model, caps) {
                        warn!(error = %e, "draw pass skipped");
                        model.set_error(e.into());
                    }
                }
                Ok(DetectorOutput::Loaded(_)) => Self::fail_scan(
                    model,
                    scan,
                    AppError::new(ErrorKind::Detection, "unexpected detector output")
                        .with_internal("expected Predictions, got Loaded"),
                ),
                Err(e) => {
                    // next scan reloads the model
                    model.detector = None;
                    Self::fail_scan(model, scan, e.into());
                }
            }
        }

        fn configure(model: &mut Model, config: Config) {
            match config.validate() {
                Ok(()) => {
                    if !config.cache_detector {
                        model.detector = None;
                    }
                    model.config = config;
                    debug!("configuration applied");
                }
                Err(e) => {
                    warn!(error = %e, "configuration rejected");
                    model.set_error(e.into());
                }
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        #[instrument(skip_all, fields(event = event.name()))]
        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            if event.is_user_initiated() {
                debug!("user action");
            }

            match event {
                Event::Noop => return,

                Event::ImageSelected(None) => {
                    debug!("file picker closed without a file");
                    return;
                }

                Event::ImageSelected(Some(selected)) => {
                    match Self::select_image(model, selected) {
                        Ok(Some(previous)) => caps.media.revoke(previous),
                        Ok(None) => {}
                        Err(e) => {
                            warn!("rejected image handle: {e}");
                            model.set_error(e);
                        }
                    }
                    Self::clear_results(model, caps);
                }

                Event::ImageLoaded {
                    image,
                    width,
                    height,
                } => Self::on_image_loaded(model, &image, width, height),

                Event::ImageLoadFailed { image } => Self::on_image_load_failed(model, caps, image),

                Event::ScanRequested => Self::start_scan(model, caps),

                Event::DetectorLoaded { scan, result } => {
                    Self::on_detector_loaded(model, caps, scan, *result);
                }

                Event::DetectionCompleted { scan, result } => {
                    Self::on_detection_completed(model, caps, scan, *result);
                }

                Event::DismissError => model.clear_error(),

                Event::Configure(config) => Self::configure(model, config),
            }

            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            let image = model.image.as_ref().map(|current| ImageView {
                url: current.image.to_string(),
                name: current.name.clone(),
                mime_type: current.mime_type.clone(),
                width: current.surface.map(|s| s.width),
                height: current.surface.map(|s| s.height),
            });

            let scan_button = model.image.as_ref().map(|_| {
                let detecting = model.scan.is_detecting();
                ScanButtonView {
                    label: if detecting { SCANNING_LABEL } else { SCAN_LABEL }.into(),
                    enabled: !detecting,
                }
            });

            let results = (!model.results.is_empty()).then(|| ResultsView {
                heading: RESULTS_HEADING.into(),
                items: model.results.iter().map(Prediction::summary).collect(),
            });

            ViewModel {
                title: APP_TITLE.into(),
                tagline: APP_TAGLINE.into(),
                upload: UploadView {
                    accept: ACCEPTED_IMAGE_TYPES.into(),
                },
                image,
                scan_button,
                results,
                error: model.active_error.as_ref().map(UserFacingError::from),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_tests {
        use super::*;
        use crate::capabilities::DetectorError;
        use crate::draw::DrawError;

        #[test]
        fn test_detector_errors_map_to_kinds() {
            let load: AppError = DetectorError::LoadFailed("fetch failed".into()).into();
            assert_eq!(load.kind, ErrorKind::DetectorLoad);
            assert!(load.is_retryable());

            let detect: AppError = DetectorError::InvalidHandle.into();
            assert_eq!(detect.kind, ErrorKind::Detection);

            let img: AppError = DetectorError::ImageUnavailable.into();
            assert_eq!(img.kind, ErrorKind::InvalidImage);
            assert!(!img.is_retryable());
        }

        #[test]
        fn test_draw_errors_map_to_kinds() {
            let e: AppError = DrawError::SurfaceNotReady.into();
            assert_eq!(e.kind, ErrorKind::Render);
            assert_eq!(e.severity, ErrorSeverity::Fatal);
            assert!(!e.is_retryable());

            let e: AppError = DrawError::EmptySurface {
                width: 0,
                height: 0,
            }
            .into();
            assert_eq!(e.code(), "INVALID_IMAGE");
        }

        #[test]
        fn test_fatal_kinds_are_never_retryable() {
            for kind in [ErrorKind::Render, ErrorKind::InvalidState] {
                assert_eq!(kind.default_severity(), ErrorSeverity::Fatal);
                assert!(!AppError::new(kind, "boom").is_retryable());
            }
        }

        #[test]
        fn test_display_includes_internal() {
            let e = AppError::new(ErrorKind::Render, "no surface").with_internal("draw before load");
            assert_eq!(e.to_string(), "[RENDER_ERROR] no surface (draw before load)");
        }

        #[test]
        fn test_user_facing_projection() {
            let e = AppError::new(ErrorKind::DetectorLoad, "model fetch failed")
                .with_context("url", "https://example.invalid/model.json");
            let view = UserFacingError::from(&e);
            assert!(view.dismissible);
            assert!(view.is_retryable);
            assert_eq!(view.error_code, "DETECTOR_LOAD_ERROR");
            assert!(!view.message.contains("example.invalid"));
        }
    }

    mod view_tests {
        use super::*;

        fn with_image() -> Model {
            let mut model = Model::default();
            model.replace_image(LoadedImage::new(
                ImageRef::parse("blob:http://localhost/img-a").unwrap(),
                "a.jpg",
                "image/jpeg",
            ));
            model
        }

        #[test]
        fn test_empty_model_shows_upload_only() {
            let view = App.view(&Model::default());
            assert_eq!(view.upload.accept, "image/*");
            assert_eq!(view.title, APP_TITLE);
            assert!(view.image.is_none());
            assert!(view.scan_button.is_none());
            assert!(view.results.is_none());
            assert!(view.error.is_none());
        }

        #[test]
        fn test_scan_button_states() {
            let mut model = with_image();
            let idle = App.view(&model).scan_button.unwrap();
            assert_eq!(idle.label, "🚀 Scan Image");
            assert!(idle.enabled);

            model.begin_scan();
            let busy = App.view(&model).scan_button.unwrap();
            assert_eq!(busy.label, "Scanning...");
            assert!(!busy.enabled);
        }

        #[test]
        fn test_image_view_reports_surface_once_loaded() {
            let mut model = with_image();
            let view = App.view(&model).image.unwrap();
            assert_eq!(view.url, "blob:http://localhost/img-a");
            assert_eq!(view.mime_type, "image/jpeg");
            assert_eq!(view.width, None);

            model.image.as_mut().unwrap().surface = Some(Surface::new(300, 200).unwrap());
            let view = App.view(&model).image.unwrap();
            assert_eq!((view.width, view.height), (Some(300), Some(200)));
        }

        #[test]
        fn test_results_formatted_in_order() {
            let mut model = with_image();
            model.results = vec![
                Prediction::new([0.0, 0.0, 5.0, 5.0], "person", 0.873),
                Prediction::new([1.0, 1.0, 5.0, 5.0], "kite", 0.005),
            ];
            let results = App.view(&model).results.unwrap();
            assert_eq!(results.heading, "Detected Objects:");
            assert_eq!(results.items, ["person – 87%", "kite – 1%"]);
        }

        #[test]
        fn test_view_model_serializes_for_shell() {
            let json = serde_json::to_value(App.view(&with_image())).unwrap();
            assert_eq!(json["scan_button"]["enabled"], true);
            assert!(json["results"].is_null());
        }
    }
}
