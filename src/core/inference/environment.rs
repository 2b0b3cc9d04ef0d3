//! Process-wide ONNX Runtime environment.

use crate::core::errors::OcrResult;
use once_cell::sync::OnceCell;
use tracing::debug;

static ENVIRONMENT: OnceCell<InferenceEnvironment> = OnceCell::new();

/// Name registered with ONNX Runtime for this process.
const ENVIRONMENT_NAME: &str = "ppocr-onnx";

/// Handle proving the ONNX Runtime environment has been committed.
///
/// Obtained once by whoever builds the stages and handed to every
/// [`ModelSession`](super::ModelSession) by reference.
#[derive(Debug)]
pub struct InferenceEnvironment {
    name: &'static str,
}

impl InferenceEnvironment {
    /// Returns the shared environment, committing it on first use.
    ///
    /// # Errors
    ///
    /// Fails when ONNX Runtime rejects the environment. The next call retries.
    pub fn global() -> OcrResult<&'static InferenceEnvironment> {
        ENVIRONMENT.get_or_try_init(|| {
            let fresh = ort::init().with_name(ENVIRONMENT_NAME).commit()?;
            debug!(fresh, name = ENVIRONMENT_NAME, "ONNX Runtime environment committed");
            Ok(InferenceEnvironment {
                name: ENVIRONMENT_NAME,
            })
        })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// An environment that never touches ONNX Runtime.
    #[cfg(test)]
    pub(crate) fn detached() -> &'static InferenceEnvironment {
        static DETACHED: InferenceEnvironment = InferenceEnvironment { name: "detached" };
        &DETACHED
    }
}
