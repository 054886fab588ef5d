use super::{ImageClassifier, InputTensor};
use crate::{Error, Result};
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// ImageNet classifier running on ONNX Runtime.
///
/// `Session::run` takes `&mut self`, so the session sits behind a mutex and
/// concurrent requests run one at a time.
pub struct OnnxClassifier {
    session: Mutex<Session>,
}

impl OnnxClassifier {
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(Error::config(format!(
                "classifier model not found at '{}'",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| Error::config(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e: ort::Error| Error::config(format!("ONNX load failed: {e}")))?;

        info!("ONNX classifier loaded from {}", model_path.display());

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl ImageClassifier for OnnxClassifier {
    fn predict(&self, input: &InputTensor) -> Result<Vec<f32>> {
        use ort::value::TensorRef;

        let [n, h, w, c] = input.shape;
        let array = ndarray::Array4::from_shape_vec((n, h, w, c), input.data.clone())
            .map_err(|e| Error::inference(e.to_string()))?;
        let tensor =
            TensorRef::from_array_view(&array).map_err(|e| Error::inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::inference("classifier session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| Error::inference(format!("ONNX inference failed: {e}")))?;

        let (shape, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::inference(format!("output extraction: {e}")))?;

        debug!("Classifier output shape {:?}", shape);
        if scores.is_empty() {
            return Err(Error::inference("classifier produced no scores"));
        }
        Ok(scores.to_vec())
    }
}
