//! Pretrained object detector, run by the shell.
//!
//! The core never touches model weights. It asks the shell to `Load` a
//! detector once, keeps the returned handle, and sends `Detect` requests that
//! name the handle and the image to scan.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::{DetectOptions, DetectorHandle, Prediction};
use crate::model::ImageRef;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DetectorOperation {
    Load,
    Detect {
        detector: DetectorHandle,
        image: ImageRef,
        options: DetectOptions,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DetectorOutput {
    Loaded(DetectorHandle),
    Predictions(Vec<Prediction>),
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DetectorError {
    #[error("model failed to load: {0}")]
    LoadFailed(String),

    #[error("detection failed: {0}")]
    DetectFailed(String),

    #[error("detector handle is no longer valid")]
    InvalidHandle,

    #[error("image element is not available")]
    ImageUnavailable,
}

pub type DetectorResult = Result<DetectorOutput, DetectorError>;

impl Operation for DetectorOperation {
    type Output = DetectorResult;
}

pub struct Detector<Ev> {
    context: CapabilityContext<DetectorOperation, Ev>,
}

impl<Ev> Capability<Ev> for Detector<Ev> {
    type Operation = DetectorOperation;
    type MappedSelf<MappedEv> = Detector<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Detector::new(self.context.map_event(f))
    }
}

impl<Ev> Detector<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<DetectorOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn load<F>(&self, callback: F)
    where
        F: FnOnce(DetectorResult) -> Ev + Send + 'static,
    {
        self.request(DetectorOperation::Load, callback);
    }

    pub fn detect<F>(
        &self,
        detector: DetectorHandle,
        image: ImageRef,
        options: DetectOptions,
        callback: F,
    ) where
        F: FnOnce(DetectorResult) -> Ev + Send + 'static,
    {
        self.request(
            DetectorOperation::Detect {
                detector,
                image,
                options,
            },
            callback,
        );
    }

    fn request<F>(&self, operation: DetectorOperation, callback: F)
    where
        F: FnOnce(DetectorResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(callback(result));
        });
    }
}
