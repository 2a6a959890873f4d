use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::capabilities::DetectorResult;
use crate::config::Config;
use crate::model::SelectedImage;

/// Identifies one click of the scan button. Shell responses carry it back so
/// answers for a cancelled scan can be told apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(Uuid);

impl ScanId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Event {
    #[default]
    Noop,

    // --- from the shell UI ---
    ImageSelected(Option<SelectedImage>),
    ImageLoaded {
        image: String,
        width: u32,
        height: u32,
    },
    ImageLoadFailed {
        image: String,
    },
    ScanRequested,
    DismissError,
    Configure(Config),

    // --- capability responses ---
    #[serde(skip)]
    DetectorLoaded {
        scan: ScanId,
        result: Box<DetectorResult>,
    },
    #[serde(skip)]
    DetectionCompleted {
        scan: ScanId,
        result: Box<DetectorResult>,
    },
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::ImageSelected(_) => "image_selected",
            Self::ImageLoaded { .. } => "image_loaded",
            Self::ImageLoadFailed { .. } => "image_load_failed",
            Self::ScanRequested => "scan_requested",
            Self::DismissError => "dismiss_error",
            Self::Configure(_) => "configure",
            Self::DetectorLoaded { .. } => "detector_loaded",
            Self::DetectionCompleted { .. } => "detection_completed",
        }
    }

    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::ImageSelected(_) | Self::ScanRequested | Self::DismissError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_ids_are_unique() {
        assert_ne!(ScanId::generate(), ScanId::generate());
    }

    #[test]
    fn test_shell_events_deserialize() {
        let e: Event = serde_json::from_str(r#""ScanRequested""#).unwrap();
        assert_eq!(e, Event::ScanRequested);

        let e: Event = serde_json::from_str(
            r#"{"ImageLoaded":{"image":"blob:http://h/1","width":320,"height":240}}"#,
        )
        .unwrap();
        assert_eq!(e.name(), "image_loaded");
    }

    #[test]
    fn test_user_initiated() {
        assert!(Event::ScanRequested.is_user_initiated());
        assert!(!Event::Noop.is_user_initiated());
    }
}
