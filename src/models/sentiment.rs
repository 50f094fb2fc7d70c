//! Sentiment labels and confidence scores attached to a comment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label returned by the classifier for a single text.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
    Mixed,
    /// The classifier could not be reached or answered with garbage.
    Unknown,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a label as spelled by the classifier. Anything outside the
    /// closed set maps to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Self::Positive,
            "neutral" => Self::Neutral,
            "negative" => Self::Negative,
            "mixed" => Self::Mixed,
            _ => Self::Unknown,
        }
    }

    /// Interpret a stored column value. A NULL or empty label reads back as
    /// `Neutral`.
    pub fn from_column(value: Option<&str>) -> Self {
        value
            .filter(|v| !v.is_empty())
            .map(Self::parse)
            .unwrap_or(Self::Neutral)
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized classifier output: one label plus three confidence scores.
///
/// Scores are expected in `[0, 1]` and to sum to roughly one, but neither is
/// enforced.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl Sentiment {
    /// Fallback used whenever classification fails.
    pub fn unknown() -> Self {
        Self {
            label: SentimentLabel::Unknown,
            positive: 0.0,
            neutral: 0.0,
            negative: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(SentimentLabel::parse("Positive"), SentimentLabel::Positive);
        assert_eq!(SentimentLabel::parse(" MIXED "), SentimentLabel::Mixed);
    }

    #[test]
    fn unrecognized_label_is_unknown() {
        assert_eq!(SentimentLabel::parse("ecstatic"), SentimentLabel::Unknown);
    }

    #[test]
    fn null_column_reads_as_neutral() {
        assert_eq!(SentimentLabel::from_column(None), SentimentLabel::Neutral);
        assert_eq!(
            SentimentLabel::from_column(Some("negative")),
            SentimentLabel::Negative
        );
    }

    #[test]
    fn empty_column_reads_as_neutral() {
        assert_eq!(SentimentLabel::from_column(Some("")), SentimentLabel::Neutral);
    }

    #[test]
    fn label_serializes_lowercase() {
        let json = serde_json::to_string(&SentimentLabel::Unknown).unwrap();
        assert_eq!(json, "\"unknown\"");
    }
}
