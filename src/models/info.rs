//! The serialized metadata record cached alongside variant images.

use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characteristics of a source image, persisted as a JSON object.
///
/// The serialization timestamp is optional in the persisted form; readers
/// backfill it from the object's last-modified time when absent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageInfo {
    /// Pixel width of the source image.
    pub width: u32,

    /// Pixel height of the source image.
    pub height: u32,

    /// Media type of the source image, if known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub media_type: Option<String>,

    /// When this record was serialized.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serialization_timestamp: Option<DateTime<Utc>>,
}

impl ImageInfo {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            media_type: None,
            serialization_timestamp: None,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let mut info = ImageInfo::new(640, 480);
        info.media_type = Some("image/jpeg".into());
        let restored = ImageInfo::from_json(&info.to_json().unwrap()).unwrap();
        assert_eq!(restored, info);
    }

    #[test]
    fn timestamp_is_optional_in_persisted_form() {
        let info = ImageInfo::from_json(br#"{"width":10,"height":20}"#).unwrap();
        assert_eq!(info.width, 10);
        assert!(info.serialization_timestamp.is_none());
    }
}
