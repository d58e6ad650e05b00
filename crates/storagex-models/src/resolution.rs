//! Target resolutions for transcoding.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target vertical resolution.
///
/// Unrecognized labels fall back to [`Resolution::P720`] instead of failing,
/// including when deserializing a queue payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(from = "String", into = "String")]
pub enum Resolution {
    P480,
    #[default]
    P720,
    P1080,
}

impl Resolution {
    /// Parse a label such as `"1080p"`; anything unknown yields the default.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "480p" | "480" => Resolution::P480,
            "720p" | "720" => Resolution::P720,
            "1080p" | "1080" => Resolution::P1080,
            _ => Resolution::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }

    /// Output height in pixels.
    pub fn height(&self) -> u32 {
        match self {
            Resolution::P480 => 480,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
        }
    }

    /// FFmpeg scale filter keeping aspect ratio with an even width.
    pub fn scale_filter(&self) -> String {
        format!("scale=-2:{}", self.height())
    }
}

impl From<String> for Resolution {
    fn from(s: String) -> Self {
        Self::from_label(&s)
    }
}

impl From<Resolution> for String {
    fn from(r: Resolution) -> Self {
        r.as_str().to_string()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert_eq!(Resolution::from_label("480p"), Resolution::P480);
        assert_eq!(Resolution::from_label("720p"), Resolution::P720);
        assert_eq!(Resolution::from_label("1080P"), Resolution::P1080);
    }

    #[test]
    fn test_unknown_labels_fall_back_to_720p() {
        for label in ["4k", "", "2160p", "banana", "360p"] {
            assert_eq!(Resolution::from_label(label), Resolution::P720, "{label}");
        }
    }

    #[test]
    fn test_deserialize_is_lenient() {
        let r: Resolution = serde_json::from_str("\"8k\"").unwrap();
        assert_eq!(r, Resolution::P720);
        let r: Resolution = serde_json::from_str("\"1080p\"").unwrap();
        assert_eq!(r.scale_filter(), "scale=-2:1080");
    }
}
