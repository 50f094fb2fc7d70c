//! Represents a stored video and the properties it is served with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Extension every stored video is forced to.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Content type stored alongside every video.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// HTTP properties persisted with a blob and replayed when it is served.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContentSettings {
    pub content_type: String,
    pub content_disposition: String,
}

impl ContentSettings {
    /// Browser-playable video, rendered inline rather than downloaded.
    pub fn inline_video() -> Self {
        Self {
            content_type: VIDEO_CONTENT_TYPE.into(),
            content_disposition: "inline".into(),
        }
    }
}

/// A time-boxed, read-only URL for a stored blob.
#[derive(Clone, Debug)]
pub struct SignedUrl {
    pub url: String,
    pub starts_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of storing an upload: where to fetch it and the name it lives under.
#[derive(Serialize, Clone, Debug)]
pub struct StoredVideo {
    pub video_url: String,
    pub video_name: String,
}

/// Normalize an uploaded filename to the `.mp4` name it is stored under.
///
/// Names already ending in `.mp4` (any case) are kept as is. Otherwise the
/// text after the last `.` is replaced; a name without a `.` gets the
/// extension appended.
pub fn normalize_video_name(filename: &str) -> String {
    let suffix = format!(".{VIDEO_EXTENSION}");
    if filename.to_ascii_lowercase().ends_with(&suffix) {
        return filename.to_string();
    }

    let base = filename
        .rsplit_once('.')
        .map(|(base, _)| base)
        .unwrap_or(filename);
    format!("{base}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp4_names_are_preserved() {
        assert_eq!(normalize_video_name("holiday.mp4"), "holiday.mp4");
        assert_eq!(normalize_video_name("Holiday.MP4"), "Holiday.MP4");
        assert_eq!(normalize_video_name("a.b.Mp4"), "a.b.Mp4");
    }

    #[test]
    fn other_extensions_are_replaced() {
        assert_eq!(normalize_video_name("holiday.mov"), "holiday.mp4");
        assert_eq!(normalize_video_name("trip.2024.avi"), "trip.2024.mp4");
        assert_eq!(normalize_video_name("clip.mp4.bak"), "clip.mp4.mp4");
    }

    #[test]
    fn missing_extension_is_appended() {
        assert_eq!(normalize_video_name("holiday"), "holiday.mp4");
        assert_eq!(normalize_video_name(""), ".mp4");
    }

    #[test]
    fn trailing_dot_keeps_base() {
        assert_eq!(normalize_video_name("holiday."), "holiday.mp4");
    }
}
