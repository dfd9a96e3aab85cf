use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Bijection between category strings and dense codes `0..len`.
///
/// Classes are kept sorted and unique, so code `i` is the `i`-th category in
/// lexicographic order. Deserialization re-checks that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VocabularyFile", into = "VocabularyFile")]
pub struct LabelVocabulary {
    classes: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct VocabularyFile {
    classes: Vec<String>,
}

impl TryFrom<VocabularyFile> for LabelVocabulary {
    type Error = String;

    fn try_from(file: VocabularyFile) -> Result<Self, Self::Error> {
        if file.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err("label vocabulary classes must be sorted and unique".to_string());
        }
        Ok(Self {
            classes: file.classes,
        })
    }
}

impl From<LabelVocabulary> for VocabularyFile {
    fn from(vocab: LabelVocabulary) -> Self {
        Self {
            classes: vocab.classes,
        }
    }
}

impl LabelVocabulary {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let classes: BTreeSet<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
    }

    pub fn encode_all<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, AppError> {
        labels
            .iter()
            .map(|l| {
                self.encode(l.as_ref()).ok_or_else(|| {
                    AppError::Artifact(format!("label '{}' is not in the vocabulary", l.as_ref()))
                })
            })
            .collect()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}
