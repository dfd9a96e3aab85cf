use std::hash::Hasher;

use async_trait::async_trait;
use siphasher::sip::SipHasher13;

use super::{Embedder, EmbeddingError};

/// Fixed SipHash keys. Changing them changes every embedding, so existing
/// `processed/` matrices and trained models must be regenerated.
const HASH_SEED_K0: u64 = 0x6a6f_6272_6563_0001;
const HASH_SEED_K1: u64 = 0x7369_6d69_6c61_7200;

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing embedder over unigrams and bigrams.
///
/// Each feature hashes to one dimension with a sign taken from the top bit of
/// the hash, so collisions cancel on average. Vectors are L2-normalised; an
/// empty text yields the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn hash_feature(feature: &str) -> u64 {
        let mut hasher = SipHasher13::new_with_keys(HASH_SEED_K0, HASH_SEED_K1);
        hasher.write(feature.as_bytes());
        hasher.finish()
    }

    fn accumulate(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let h = Self::hash_feature(feature);
        let idx = (h % self.dimension as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        vector[idx] += sign * weight;
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        for token in &tokens {
            self.accumulate(&mut vector, token, UNIGRAM_WEIGHT);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]), BIGRAM_WEIGHT);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
