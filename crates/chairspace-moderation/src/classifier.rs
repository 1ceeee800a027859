use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

/// Label -> confidence, as reported by the detection service.
pub type Detections = HashMap<String, f32>;

#[derive(Debug, Clone)]
pub enum ImageClassifier {
    /// Object detection service reached over HTTP.
    Remote(RemoteClassifier),
    /// Fixed answer for every image. An empty map lets everything through.
    Static(Detections),
}

impl ImageClassifier {
    pub fn disabled() -> Self {
        Self::Static(Detections::new())
    }

    pub async fn classify(&self, image_url: &str) -> Result<Detections> {
        match self {
            Self::Remote(remote) => remote.classify(image_url).await,
            Self::Static(detections) => Ok(detections.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteClassifier {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image_url: &'a str,
}

impl RemoteClassifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build classifier HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// POST `{"image_url": ...}` to the endpoint and read back a JSON map of
    /// label to confidence.
    pub async fn classify(&self, image_url: &str) -> Result<Detections> {
        let detections = self
            .client
            .post(&self.endpoint)
            .json(&ClassifyRequest { image_url })
            .send()
            .await
            .with_context(|| format!("classifier request to {} failed", self.endpoint))?
            .error_for_status()?
            .json::<Detections>()
            .await
            .context("classifier returned a malformed body")?;

        debug!(image_url, labels = detections.len(), "Image classified");
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_classifier_returns_its_map() {
        let detections = Detections::from([("dining table".to_string(), 0.91)]);
        let classifier = ImageClassifier::Static(detections.clone());

        let result = classifier.classify("/static/uploads/a.png").await.unwrap();
        assert_eq!(result, detections);
    }

    #[tokio::test]
    async fn disabled_classifier_detects_nothing() {
        let result = ImageClassifier::disabled()
            .classify("/static/uploads/a.png")
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
