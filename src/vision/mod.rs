//! Image classification: preprocessing, label lookup and top-k decoding.

mod labels;
#[cfg(feature = "onnx")]
mod onnx;
mod preprocess;

pub use labels::ClassLabels;
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;
pub use preprocess::{INPUT_SIZE, InputTensor, decode_image, preprocess};

use crate::{Error, Result, config::ClassifierConfig};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tracing::info;

/// A loaded model producing one score per class for a preprocessed image.
pub trait ImageClassifier: Send + Sync {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_id: usize,
    pub label: String,
    pub score: f32,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:.2}", self.label, self.score)
    }
}

const PROBABILITY_TOLERANCE: f32 = 1e-3;

fn is_probability_vector(scores: &[f32]) -> bool {
    scores.iter().all(|s| (0.0..=1.0).contains(s))
        && (scores.iter().sum::<f32>() - 1.0).abs() <= PROBABILITY_TOLERANCE
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Raw model output as probabilities; already-normalized vectors pass through.
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    if is_probability_vector(scores) {
        scores.to_vec()
    } else {
        softmax(scores)
    }
}

/// The `k` best classes by descending score, ties broken by lower class id.
pub fn top_k(scores: &[f32], labels: &ClassLabels, k: usize) -> Result<Vec<Prediction>> {
    if scores.len() != labels.len() {
        return Err(Error::inference(format!(
            "model produced {} scores but {} labels are loaded",
            scores.len(),
            labels.len()
        )));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(Error::inference("model produced non-finite scores"));
    }

    let probabilities = to_probabilities(scores);
    let mut ranked: Vec<(usize, f32)> = probabilities.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(k)
        .map(|(class_id, score)| {
            let label = labels
                .get(class_id)
                .ok_or_else(|| Error::internal(format!("no label for class {class_id}")))?;
            Ok(Prediction {
                class_id,
                label: label.to_string(),
                score,
            })
        })
        .collect()
}

/// Full pipeline for one uploaded image. CPU bound.
pub fn classify_image(
    classifier: &dyn ImageClassifier,
    labels: &ClassLabels,
    bytes: &[u8],
    k: usize,
) -> Result<Vec<Prediction>> {
    let input = preprocess(bytes)?;
    let scores = classifier.predict(&input)?;
    let predictions = top_k(&scores, labels, k)?;
    if let Some(best) = predictions.first() {
        info!(class_id = best.class_id, score = best.score, "Top prediction: {}", best);
    }
    Ok(predictions)
}

/// Classifier handle and its labels, shared by every request.
#[derive(Clone)]
pub struct LoadedClassifier {
    pub model: Arc<dyn ImageClassifier>,
    pub labels: Arc<ClassLabels>,
}

/// Loads the configured model, or `None` when no model is configured.
pub async fn load_classifier(config: &ClassifierConfig) -> Result<Option<LoadedClassifier>> {
    let (Some(model_path), Some(labels_path)) = (&config.model_path, &config.labels_path) else {
        info!("No classifier model configured, classification disabled");
        return Ok(None);
    };

    let labels = ClassLabels::load(labels_path).await?;
    let model = open_model(model_path.clone()).await?;
    info!("Classifier ready with {} classes", labels.len());

    Ok(Some(LoadedClassifier {
        model,
        labels: Arc::new(labels),
    }))
}

#[cfg(feature = "onnx")]
async fn open_model(model_path: String) -> Result<Arc<dyn ImageClassifier>> {
    let classifier = tokio::task::spawn_blocking(move || OnnxClassifier::load(model_path))
        .await
        .map_err(|e| Error::internal(format!("classifier loader panicked: {e}")))??;
    Ok(Arc::new(classifier))
}

#[cfg(not(feature = "onnx"))]
async fn open_model(_model_path: String) -> Result<Arc<dyn ImageClassifier>> {
    Err(Error::config(
        "a classifier model is configured but this build lacks the `onnx` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct FixedScores(Vec<f32>);

    impl ImageClassifier for FixedScores {
        fn predict(&self, input: &InputTensor) -> Result<Vec<f32>> {
            assert_eq!(input.shape, [1, 224, 224, 3]);
            Ok(self.0.clone())
        }
    }

    fn labels(n: usize) -> ClassLabels {
        ClassLabels::new((0..n).map(|i| format!("class {i}")).collect())
    }

    #[test]
    fn ranks_descending_with_index_tiebreak() {
        let scores = [0.1, 0.3, 0.3, 0.2, 0.1];
        let top = top_k(&scores, &labels(5), 3).unwrap();

        let ids: Vec<usize> = top.iter().map(|p| p.class_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(top[0].label, "class 1");
    }

    #[test]
    fn logits_are_turned_into_probabilities() {
        let top = top_k(&[2.0, -1.0, 5.0, 0.5], &labels(4), 3).unwrap();

        assert_eq!(top.len(), 3);
        assert_eq!(top[0].class_id, 2);
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(top.iter().all(|p| (0.0..=1.0).contains(&p.score)));
    }

    #[test]
    fn probabilities_pass_through_unchanged() {
        let probs = [0.7, 0.2, 0.1];
        assert_eq!(to_probabilities(&probs), probs.to_vec());
    }

    #[rstest]
    #[case(2)]
    #[case(5)]
    fn label_count_must_match_output(#[case] label_count: usize) {
        let err = top_k(&[0.2, 0.3, 0.5], &labels(label_count), 3).unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn displays_label_with_two_decimals() {
        let prediction = Prediction {
            class_id: 281,
            label: "tabby cat".to_string(),
            score: 0.8712,
        };
        assert_eq!(prediction.to_string(), "tabby cat: 0.87");
    }

    #[test]
    fn classify_is_deterministic_for_the_same_image() {
        let classifier = FixedScores(vec![0.05, 0.6, 0.25, 0.1]);
        let image = preprocess::tests::png_bytes(50, 80, [120, 60, 200]);

        let first = classify_image(&classifier, &labels(4), &image, 3).unwrap();
        let second = classify_image(&classifier, &labels(4), &image, 3).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].class_id, 1);
    }

    #[test]
    fn undecodable_image_is_reported() {
        let classifier = FixedScores(vec![1.0]);
        let err = classify_image(&classifier, &labels(1), b"GIF89a?", 3).unwrap_err();
        assert!(matches!(err, Error::ImageDecode(_)));
    }

    #[tokio::test]
    async fn no_model_configured_means_no_classifier() {
        let loaded = load_classifier(&ClassifierConfig::default()).await.unwrap();
        assert!(loaded.is_none());
    }
}
