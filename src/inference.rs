use crate::{
    error::{ModelError, PredictError},
    labels::ClassLabelTable,
    model::Classifier,
    models::PredictionResult,
    preprocess::{self, CHANNELS, INPUT_SIZE},
};
use image::GenericImageView;
use ndarray::Array4;
use std::sync::Arc;

/// Decimal places kept in the reported confidence.
const CONFIDENCE_DECIMALS: i32 = 4;

/// Turns uploaded bytes into a labeled prediction.
///
/// Holds the model and label table read-only; one instance serves every request.
pub struct InferencePipeline {
    classifier: Arc<dyn Classifier>,
    labels: ClassLabelTable,
}

impl InferencePipeline {
    pub fn new(classifier: Arc<dyn Classifier>, labels: ClassLabelTable) -> Self {
        Self { classifier, labels }
    }

    pub fn labels(&self) -> &ClassLabelTable {
        &self.labels
    }

    pub fn classify(&self, bytes: &[u8]) -> Result<PredictionResult, PredictError> {
        let image = preprocess::decode(bytes)?;
        let (width, height) = image.dimensions();
        tracing::debug!(width, height, color = ?image.color(), "decoded upload");

        let tensor = preprocess::preprocess(&image);
        let scores = self.score(&tensor)?;
        tracing::debug!(?scores, "model scores");

        let (index, score) = select_top(&scores)
            .ok_or_else(|| ModelError::Inference("model returned no scores".to_string()))?;
        if !score.is_finite() {
            return Err(ModelError::Inference(format!("non-finite top score {}", score)).into());
        }

        let label = self
            .labels
            .get(index)
            .ok_or_else(|| PredictError::Internal(format!("no label for class index {}", index)))?;

        Ok(PredictionResult {
            label: label.to_string(),
            confidence: round_confidence(score),
        })
    }

    /// Runs a blank image through the model and checks the output arity
    /// against the label table.
    pub fn warmup(&self) -> Result<(), ModelError> {
        let side = INPUT_SIZE as usize;
        let blank = Array4::<f32>::zeros((1, side, side, CHANNELS));
        self.score(&blank).map(|_| ())
    }

    fn score(&self, tensor: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        let scores = self.classifier.predict(tensor)?;
        if scores.len() != self.labels.len() {
            return Err(ModelError::OutputMismatch {
                expected: self.labels.len(),
                got: scores.len(),
            });
        }
        Ok(scores)
    }
}

/// Position and value of the highest score; the first one wins ties.
pub fn select_top(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .reduce(|best, current| if current.1 > best.1 { current } else { best })
}

// Half away from zero on the binary value; may differ from a correctly rounded
// decimal result only when the score sits exactly on a fifth-decimal half.
pub fn round_confidence(score: f32) -> f64 {
    let scale = 10f64.powi(CONFIDENCE_DECIMALS);
    (f64::from(score) * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    struct FixedScores {
        scores: Vec<f32>,
        seen_shapes: Mutex<Vec<Vec<usize>>>,
    }

    impl FixedScores {
        fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                seen_shapes: Mutex::new(Vec::new()),
            }
        }
    }

    impl Classifier for FixedScores {
        fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
            self.seen_shapes.lock().unwrap().push(input.shape().to_vec());
            Ok(self.scores.clone())
        }
    }

    fn pipeline(scores: Vec<f32>) -> (InferencePipeline, Arc<FixedScores>) {
        let classifier = Arc::new(FixedScores::new(scores));
        let pipeline = InferencePipeline::new(classifier.clone(), ClassLabelTable::default());
        (pipeline, classifier)
    }

    fn jpeg_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([40, 160, 60])));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Jpeg).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_select_top_picks_maximum() {
        assert_eq!(select_top(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
    }

    #[test]
    fn test_select_top_first_wins_ties() {
        assert_eq!(select_top(&[0.3, 0.5, 0.5, 0.1, 0.5]), Some((1, 0.5)));
    }

    #[test]
    fn test_select_top_empty() {
        assert_eq!(select_top(&[]), None);
    }

    #[test]
    fn test_select_top_handles_negative_scores() {
        assert_eq!(select_top(&[-3.0, -1.5, -2.0]), Some((1, -1.5)));
    }

    #[test]
    fn test_select_top_later_nan_never_wins() {
        assert_eq!(select_top(&[0.2, f32::NAN, 0.4]), Some((2, 0.4)));
    }

    #[test]
    fn test_round_confidence_four_places() {
        assert_eq!(round_confidence(0.9), 0.9);
        assert_eq!(round_confidence(0.123456), 0.1235);
        assert_eq!(round_confidence(0.99996), 1.0);
        assert_eq!(round_confidence(0.0), 0.0);
    }

    #[test]
    fn test_classify_healthy_leaf() {
        let (pipeline, classifier) = pipeline(vec![0.01, 0.02, 0.9, 0.01, 0.02, 0.02, 0.02]);

        let result = pipeline.classify(&jpeg_bytes()).unwrap();
        assert_eq!(
            result,
            PredictionResult {
                label: "Healthy".to_string(),
                confidence: 0.9,
            }
        );
        assert_eq!(
            *classifier.seen_shapes.lock().unwrap(),
            vec![vec![1, 224, 224, 3]]
        );
    }

    #[test]
    fn test_classify_is_repeatable() {
        let (pipeline, _) = pipeline(vec![0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.4]);
        let bytes = jpeg_bytes();

        let first = pipeline.classify(&bytes).unwrap();
        let second = pipeline.classify(&bytes).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.label, "Virus");
    }

    #[test]
    fn test_classify_rejects_non_image() {
        let (pipeline, classifier) = pipeline(vec![0.0; 7]);

        match pipeline.classify(b"%PDF-1.4 not an image") {
            Err(PredictError::InvalidImage(_)) => {}
            other => panic!("Expected InvalidImage, got {:?}", other),
        }
        assert!(classifier.seen_shapes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_classify_output_length_mismatch() {
        let (pipeline, _) = pipeline(vec![0.5; 1000]);

        match pipeline.classify(&jpeg_bytes()) {
            Err(PredictError::Model(ModelError::OutputMismatch { expected: 7, got: 1000 })) => {}
            other => panic!("Expected OutputMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_non_finite_top_score() {
        let (pipeline, _) = pipeline(vec![f32::NAN, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]);

        match pipeline.classify(&jpeg_bytes()) {
            Err(PredictError::Model(ModelError::Inference(_))) => {}
            other => panic!("Expected Inference error, got {:?}", other),
        }
    }

    #[test]
    fn test_warmup_checks_arity() {
        let (ok, _) = pipeline(vec![0.0; 7]);
        assert!(ok.warmup().is_ok());

        let (bad, _) = pipeline(vec![0.0; 3]);
        assert!(matches!(
            bad.warmup(),
            Err(ModelError::OutputMismatch { expected: 7, got: 3 })
        ));
    }
}
