use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::ranking::{argmax, similarity_scores};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Softmax,
    Centroid,
}

impl FromStr for ClassifierKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "softmax" => Ok(Self::Softmax),
            "centroid" => Ok(Self::Centroid),
            other => Err(AppError::Validation(format!(
                "unknown classifier '{other}', expected 'softmax' or 'centroid'"
            ))),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Softmax => f.write_str("softmax"),
            Self::Centroid => f.write_str("centroid"),
        }
    }
}

/// Gradient descent settings for the softmax model.
#[derive(Debug, Clone, Copy)]
pub struct FitParams {
    pub learning_rate: f32,
    pub epochs: usize,
    pub l2: f32,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 300,
            l2: 1e-4,
        }
    }
}

/// Trained multi-class model mapping an embedding to a class code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classifier {
    Softmax(SoftmaxRegression),
    Centroid(NearestCentroid),
}

impl Classifier {
    pub fn fit(
        kind: ClassifierKind,
        features: ArrayView2<f32>,
        codes: &[usize],
        n_classes: usize,
        params: FitParams,
    ) -> Result<Self, AppError> {
        if features.nrows() == 0 {
            return Err(AppError::Artifact(
                "cannot fit a classifier on zero rows".to_string(),
            ));
        }
        if features.nrows() != codes.len() {
            return Err(AppError::Artifact(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                codes.len()
            )));
        }
        if n_classes == 0 || codes.iter().any(|&c| c >= n_classes) {
            return Err(AppError::Artifact(format!(
                "label codes must lie in 0..{n_classes}"
            )));
        }

        Ok(match kind {
            ClassifierKind::Softmax => {
                Self::Softmax(SoftmaxRegression::fit(features, codes, n_classes, params))
            }
            ClassifierKind::Centroid => {
                Self::Centroid(NearestCentroid::fit(features, codes, n_classes))
            }
        })
    }

    pub fn kind(&self) -> ClassifierKind {
        match self {
            Self::Softmax(_) => ClassifierKind::Softmax,
            Self::Centroid(_) => ClassifierKind::Centroid,
        }
    }

    /// Checks that the parameter arrays agree with each other.
    /// Deserialized models can carry any shapes.
    pub fn check_shape(&self) -> Result<(), String> {
        match self {
            Self::Softmax(m) if m.weights.ncols() != m.bias.len() => Err(format!(
                "softmax weights have {} columns but bias has {} entries",
                m.weights.ncols(),
                m.bias.len()
            )),
            _ => Ok(()),
        }
    }

    pub fn input_dim(&self) -> usize {
        match self {
            Self::Softmax(m) => m.weights.nrows(),
            Self::Centroid(m) => m.centroids.ncols(),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            Self::Softmax(m) => m.bias.len(),
            Self::Centroid(m) => m.centroids.nrows(),
        }
    }

    /// Predicts the class code of one embedding.
    pub fn predict(&self, features: ArrayView1<f32>) -> Result<usize, AppError> {
        if features.len() != self.input_dim() {
            return Err(AppError::Artifact(format!(
                "embedding dimension mismatch: model expects {}, got {}",
                self.input_dim(),
                features.len()
            )));
        }
        let scores = match self {
            Self::Softmax(m) => m.logits(features).to_vec(),
            Self::Centroid(m) => similarity_scores(features, m.centroids.view())?,
        };
        argmax(&scores)
            .ok_or_else(|| AppError::Artifact("classifier produced no finite score".to_string()))
    }

    pub fn predict_rows(&self, features: ArrayView2<f32>) -> Result<Vec<usize>, AppError> {
        features
            .axis_iter(Axis(0))
            .map(|row| self.predict(row))
            .collect()
    }
}

/// Multinomial logistic regression, fitted by full-batch gradient descent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    /// `(input_dim, n_classes)`
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl SoftmaxRegression {
    fn fit(features: ArrayView2<f32>, codes: &[usize], n_classes: usize, params: FitParams) -> Self {
        let (n, dim) = features.dim();
        let mut weights = Array2::<f32>::zeros((dim, n_classes));
        let mut bias = Array1::<f32>::zeros(n_classes);

        // A single class needs no training: every logit ties and argmax picks 0.
        if n_classes < 2 {
            return Self { weights, bias };
        }

        let mut targets = Array2::<f32>::zeros((n, n_classes));
        for (row, &code) in codes.iter().enumerate() {
            targets[[row, code]] = 1.0;
        }
        let scale = 1.0 / n as f32;

        for _ in 0..params.epochs {
            let mut probs = features.dot(&weights) + &bias;
            for mut row in probs.axis_iter_mut(Axis(0)) {
                softmax_in_place(row.view_mut());
            }
            let residual = probs - &targets;

            let grad_w = features.t().dot(&residual) * scale + &weights * params.l2;
            let grad_b = residual.sum_axis(Axis(0)) * scale;

            weights.scaled_add(-params.learning_rate, &grad_w);
            bias.scaled_add(-params.learning_rate, &grad_b);
        }

        Self { weights, bias }
    }

    fn logits(&self, features: ArrayView1<f32>) -> Array1<f32> {
        features.dot(&self.weights) + &self.bias
    }
}

fn softmax_in_place(mut row: ndarray::ArrayViewMut1<f32>) {
    let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    if sum > 0.0 {
        row.mapv_inplace(|v| v / sum);
    }
}

/// One mean embedding per class; predicts the class with the most similar centroid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestCentroid {
    /// `(n_classes, input_dim)`. Classes absent from training stay zero and score 0.
    centroids: Array2<f32>,
}

impl NearestCentroid {
    fn fit(features: ArrayView2<f32>, codes: &[usize], n_classes: usize) -> Self {
        let mut centroids = Array2::<f32>::zeros((n_classes, features.ncols()));
        let mut counts = vec![0usize; n_classes];
        for (row, &code) in features.axis_iter(Axis(0)).zip(codes) {
            let mut centroid = centroids.row_mut(code);
            centroid += &row;
            counts[code] += 1;
        }
        for (mut centroid, count) in centroids.axis_iter_mut(Axis(0)).zip(counts) {
            if count > 0 {
                centroid /= count as f32;
            }
        }
        Self { centroids }
    }
}

/// Share of predictions equal to the truth. Empty input scores 0.
pub fn accuracy(predicted: &[usize], truth: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = predicted
        .iter()
        .zip(truth)
        .filter(|(p, t)| p == t)
        .count();
    hits as f64 / truth.len() as f64
}
