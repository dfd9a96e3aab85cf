use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedder, EmbeddingError};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    /// Asks the provider to truncate to the configured width.
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint.
/// Inputs are sent in batches of `batch_size`; no retries.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HttpEmbedder {
    pub fn new(
        url: String,
        api_key: Option<String>,
        model: String,
        dimension: usize,
        batch_size: usize,
    ) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            url,
            api_key,
            model,
            dimension,
            batch_size: batch_size.max(1),
        })
    }

    async fn request_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut request = self.client.post(&self.url).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.dimension,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(EmbeddingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        order_batch(parsed.data, texts.len(), self.dimension)
    }
}

/// Reorders response items by `index` and validates count and dimension.
fn order_batch(
    data: Vec<EmbeddingDatum>,
    expected: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for datum in data {
        if datum.embedding.len() != dimension {
            return Err(EmbeddingError::Dimension {
                expected: dimension,
                actual: datum.embedding.len(),
            });
        }
        if let Some(slot) = slots.get_mut(datum.index) {
            *slot = Some(datum.embedding);
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| slot.ok_or(EmbeddingError::MissingResult(idx)))
        .collect()
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn name(&self) -> &'static str {
        "http"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (batch_no, chunk) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch = batch_no, size = chunk.len(), model = %self.model, "Requesting embeddings");
            vectors.extend(self.request_batch(chunk).await?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datum(index: usize, embedding: Vec<f32>) -> EmbeddingDatum {
        EmbeddingDatum { index, embedding }
    }

    #[test]
    fn test_order_batch_sorts_by_index() {
        let out = order_batch(
            vec![datum(1, vec![0.0, 1.0]), datum(0, vec![1.0, 0.0])],
            2,
            2,
        )
        .unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_order_batch_detects_missing_item() {
        let err = order_batch(vec![datum(0, vec![1.0])], 2, 1).unwrap_err();
        assert!(matches!(err, EmbeddingError::MissingResult(1)));
    }

    #[test]
    fn test_order_batch_rejects_wrong_dimension() {
        let err = order_batch(vec![datum(0, vec![1.0, 2.0, 3.0])], 1, 2).unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::Dimension {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_response_shape_deserializes() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}],"model":"m"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }

    #[test]
    fn test_request_body_asks_for_configured_dimension() {
        let input = vec!["rust developer".to_string()];
        let body = serde_json::to_value(EmbeddingRequest {
            model: "text-embedding-3-small",
            input: &input,
            dimensions: 384,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "text-embedding-3-small",
                "input": ["rust developer"],
                "dimensions": 384
            })
        );
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let embedder = HttpEmbedder::new(
            "http://127.0.0.1:9/unreachable".to_string(),
            None,
            "m".to_string(),
            4,
            8,
        )
        .unwrap();
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
