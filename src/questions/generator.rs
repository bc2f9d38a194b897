//! Upstream question generation seam.

use futures::future::BoxFuture;
use thiserror::Error;

use super::model::{GenerationCriteria, Question};

/// Errors surfaced by a question generator backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No generator endpoint is configured for this deployment.
    #[error("no question generator is configured")]
    Unavailable,
    /// The backend answered with something that does not deserialize.
    #[error("generator returned an invalid payload: {0}")]
    InvalidPayload(String),
    /// Transport-level failure talking to the backend.
    #[error("generator request failed: {0}")]
    Request(String),
}

/// Abstraction over the upstream service that authors question sets.
pub trait QuestionGenerator: Send + Sync {
    /// Produce `count` questions matching `criteria`.
    fn generate(
        &self,
        criteria: GenerationCriteria,
        count: usize,
    ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>>;
}

/// Stand-in used when no upstream endpoint is configured.
///
/// Always fails, so the source immediately falls through to the curated pool.
pub struct UnavailableGenerator;

impl QuestionGenerator for UnavailableGenerator {
    fn generate(
        &self,
        _criteria: GenerationCriteria,
        _count: usize,
    ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>> {
        Box::pin(async { Err(GenerationError::Unavailable) })
    }
}

#[cfg(feature = "http-generator")]
pub use self::http::HttpQuestionGenerator;

#[cfg(feature = "http-generator")]
mod http {
    use std::sync::Arc;

    use futures::future::BoxFuture;
    use reqwest::Client;
    use serde::Serialize;

    use super::{GenerationError, QuestionGenerator};
    use crate::questions::model::{GenerationCriteria, Question};

    /// JSON client for an external question generation endpoint.
    pub struct HttpQuestionGenerator {
        client: Client,
        endpoint: Arc<str>,
    }

    #[derive(Serialize)]
    struct GenerateRequest {
        topics: Vec<String>,
        difficulty: crate::questions::model::Difficulty,
        age_group: crate::questions::model::AgeGroup,
        #[serde(skip_serializing_if = "Option::is_none")]
        theme: Option<String>,
        count: usize,
    }

    impl HttpQuestionGenerator {
        /// Build a generator posting to `endpoint`.
        pub fn new(endpoint: &str) -> Result<Self, GenerationError> {
            let client = Client::builder()
                .build()
                .map_err(|err| GenerationError::Request(err.to_string()))?;
            Ok(Self {
                client,
                endpoint: Arc::from(endpoint.trim_end_matches('/')),
            })
        }
    }

    impl QuestionGenerator for HttpQuestionGenerator {
        fn generate(
            &self,
            criteria: GenerationCriteria,
            count: usize,
        ) -> BoxFuture<'static, Result<Vec<Question>, GenerationError>> {
            let client = self.client.clone();
            let endpoint = self.endpoint.clone();
            Box::pin(async move {
                let body = GenerateRequest {
                    topics: criteria.topics,
                    difficulty: criteria.difficulty,
                    age_group: criteria.age_group,
                    theme: criteria.theme,
                    count,
                };
                let response = client
                    .post(format!("{endpoint}/questions"))
                    .json(&body)
                    .send()
                    .await
                    .map_err(|err| GenerationError::Request(err.to_string()))?;
                if !response.status().is_success() {
                    return Err(GenerationError::Request(format!(
                        "generator answered {}",
                        response.status()
                    )));
                }
                response
                    .json::<Vec<Question>>()
                    .await
                    .map_err(|err| GenerationError::InvalidPayload(err.to_string()))
            })
        }
    }
}
