use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use room_core::{Similarity, SimilarityGateway};
use room_types::RoomError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SimilarityRequest<'a> {
    word1: &'a str,
    word2: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SimilarityResponse {
    similarity: Option<f64>,
    rank: Option<i32>,
    error: Option<String>,
}

/// Similarity Gateway backed by the word-embedding HTTP service.
pub struct HttpSimilarityGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSimilarityGateway {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn unavailable(message: impl std::fmt::Display) -> RoomError {
        RoomError::GatewayUnavailable {
            message: message.to_string(),
        }
    }

    fn is_vocabulary_error(error: &str) -> bool {
        error.to_lowercase().contains("vocabulary")
    }
}

#[async_trait]
impl SimilarityGateway for HttpSimilarityGateway {
    async fn similarity(&self, target: &str, candidate: &str) -> Result<Similarity, RoomError> {
        let url = format!("{}/similarity", self.base_url);
        debug!("Scoring '{}' at {}", candidate, url);

        let mut request = self.client.post(&url).json(&SimilarityRequest {
            word1: target,
            word2: candidate,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            warn!("Similarity request failed: {:?}", e);
            Self::unavailable(e)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(RoomError::OutOfVocabulary {
                word: candidate.to_string(),
            });
        }

        let body: SimilarityResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                warn!("Failed to parse similarity response: {:?}", e);
                return Err(Self::unavailable(e));
            }
            Err(_) => SimilarityResponse::default(),
        };

        if let Some(error) = body.error {
            if Self::is_vocabulary_error(&error) {
                return Err(RoomError::OutOfVocabulary {
                    word: candidate.to_string(),
                });
            }
            warn!("Similarity service error ({}): {}", status, error);
            return Err(Self::unavailable(error));
        }

        if !status.is_success() {
            warn!("Similarity service returned status: {}", status);
            return Err(Self::unavailable(format!("service returned {}", status)));
        }

        let score = body
            .similarity
            .ok_or_else(|| Self::unavailable("response carried no similarity"))?;
        Ok(Similarity {
            score,
            rank: body.rank,
        })
    }
}
