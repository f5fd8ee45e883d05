use crate::{
    error::ModelError,
    preprocess::{CHANNELS, INPUT_SIZE},
};
use ndarray::Array4;
use std::path::{Path, PathBuf};
use tract_core::prelude::Tensor;
use tract_onnx::prelude::*;

/// Model backend: one image batch in, one score per class out.
///
/// Implementations are shared read-only across concurrently handled requests.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError>;
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX classifier run by tract.
///
/// The plan is built once at load time. `run` takes `&self` and creates its own
/// execution state, so no lock is needed around inference.
pub struct OnnxClassifier {
    plan: OnnxPlan,
    path: PathBuf,
}

impl OnnxClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelError::NotFound(path.display().to_string()));
        }

        let side = INPUT_SIZE as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| ModelError::Load(format!("failed to read ONNX model: {}", e)))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, side, side, CHANNELS)),
            )
            .map_err(|e| ModelError::Load(format!("failed to pin input shape: {}", e)))?
            .into_optimized()
            .map_err(|e| ModelError::Load(format!("failed to optimize model: {}", e)))?
            .into_runnable()
            .map_err(|e| ModelError::Load(format!("failed to make model runnable: {}", e)))?;

        tracing::info!(path = %path.display(), "loaded ONNX model");

        Ok(Self {
            plan,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        let data = input
            .as_slice()
            .ok_or_else(|| ModelError::Inference("input tensor is not contiguous".to_string()))?;
        let tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| ModelError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| ModelError::Inference("model produced no outputs".to_string()))?;
        let scores = output
            .to_array_view::<f32>()
            .map_err(|e| ModelError::Inference(format!("failed to read scores: {}", e)))?;

        Ok(scores.iter().copied().collect())
    }
}
