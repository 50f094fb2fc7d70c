//! Sentiment classification of comment text.
//!
//! `SentimentService` wraps whichever `SentimentClassifier` is configured and
//! turns every failure into `Sentiment::unknown()`, so comment submission
//! never blocks on the classifier.

use crate::models::sentiment::{Sentiment, SentimentLabel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("sentiment classifier is not configured")]
    NotConfigured,
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("classifier response malformed: {0}")]
    Malformed(String),
    #[error("classifier rejected document ({code}): {message}")]
    Document { code: String, message: String },
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Classify exactly one text.
    async fn classify(&self, text: &str) -> Result<Sentiment, ClassifierError>;
}

/// Stand-in used when no classifier endpoint is configured.
#[derive(Debug, Default)]
pub struct DisabledClassifier;

#[async_trait]
impl SentimentClassifier for DisabledClassifier {
    async fn classify(&self, _text: &str) -> Result<Sentiment, ClassifierError> {
        Err(ClassifierError::NotConfigured)
    }
}

/// Client for the Azure AI Language sentiment endpoint (Text Analytics v3.1).
#[derive(Clone)]
pub struct TextAnalyticsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
}

impl std::fmt::Debug for TextAnalyticsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextAnalyticsClient")
            .field("endpoint", &self.endpoint)
            .field("language", &self.language)
            .finish_non_exhaustive()
    }
}

impl TextAnalyticsClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            language: language.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/text/analytics/v3.1/sentiment", self.endpoint)
    }
}

#[derive(Serialize)]
struct SentimentRequest<'a> {
    documents: [RequestDocument<'a>; 1],
}

#[derive(Serialize)]
struct RequestDocument<'a> {
    id: &'static str,
    language: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct SentimentResponse {
    #[serde(default)]
    documents: Vec<DocumentSentiment>,
    #[serde(default)]
    errors: Vec<DocumentError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentSentiment {
    sentiment: String,
    confidence_scores: ConfidenceScores,
}

#[derive(Deserialize)]
struct ConfidenceScores {
    positive: f64,
    neutral: f64,
    negative: f64,
}

#[derive(Deserialize)]
struct DocumentError {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl SentimentResponse {
    fn into_sentiment(self) -> Result<Sentiment, ClassifierError> {
        if let Some(DocumentError { error }) = self.errors.into_iter().next() {
            return Err(ClassifierError::Document {
                code: error.code,
                message: error.message,
            });
        }
        let doc = self
            .documents
            .into_iter()
            .next()
            .ok_or_else(|| ClassifierError::Malformed("no document in response".into()))?;

        Ok(Sentiment {
            label: SentimentLabel::parse(&doc.sentiment),
            positive: doc.confidence_scores.positive,
            neutral: doc.confidence_scores.neutral,
            negative: doc.confidence_scores.negative,
        })
    }
}

#[async_trait]
impl SentimentClassifier for TextAnalyticsClient {
    async fn classify(&self, text: &str) -> Result<Sentiment, ClassifierError> {
        let body = SentimentRequest {
            documents: [RequestDocument {
                id: "1",
                language: &self.language,
                text,
            }],
        };

        let response = self
            .http
            .post(self.url())
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw = response.bytes().await?;
        let parsed: SentimentResponse = serde_json::from_slice(&raw)
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
        parsed.into_sentiment()
    }
}

/// Infallible front for a classifier.
#[derive(Clone)]
pub struct SentimentService {
    classifier: Arc<dyn SentimentClassifier>,
}

impl SentimentService {
    pub fn new(classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self { classifier }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(DisabledClassifier))
    }

    /// Classify `text`, falling back to `Sentiment::unknown()` on any error.
    pub async fn classify(&self, text: &str) -> Sentiment {
        let start = Instant::now();
        match self.classifier.classify(text).await {
            Ok(sentiment) => {
                debug!(
                    label = %sentiment.label,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "classified comment"
                );
                sentiment
            }
            Err(ClassifierError::NotConfigured) => {
                debug!("sentiment classifier disabled, tagging comment as unknown");
                Sentiment::unknown()
            }
            Err(err) => {
                warn!(error = %err, "sentiment analysis failed, tagging comment as unknown");
                Sentiment::unknown()
            }
        }
    }
}
