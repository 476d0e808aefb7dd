use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use sha2::{Sha256, Digest};

use crate::classifier::{BodyPartModel, ClassifierError};
use crate::model_spec::{ModelSpec, DEFAULT_CHECKPOINT_NAME};
use crate::runtime::{Device, RuntimeConfig};

/// Binds checkpoints to the topology described by a `ModelSpec`.
#[derive(Debug, Clone)]
pub struct ModelLoader {
    spec: ModelSpec,
    runtime_config: RuntimeConfig,
    device: Device,
}

impl ModelLoader {
    pub fn new(spec: ModelSpec, runtime_config: RuntimeConfig, device: Device) -> Self {
        Self {
            spec,
            runtime_config,
            device,
        }
    }

    /// Loader for the deployed body-part model. The device is resolved here,
    /// once, from the runtime configuration.
    pub fn for_runtime(runtime_config: RuntimeConfig) -> Self {
        let device = Device::resolve(runtime_config.device);
        Self::new(ModelSpec::mura_bodypart(), runtime_config, device)
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Returns the default checkpoint location: next to the running executable,
    /// independent of the working directory.
    ///
    /// # Errors
    /// - `ModelLoadFailure` if the executable path cannot be determined
    pub fn default_checkpoint_path() -> Result<PathBuf, ClassifierError> {
        let exe = env::current_exe()
            .map_err(|e| ClassifierError::load_failure(format!("Cannot locate executable: {}", e)))?;
        let base_dir = exe.parent().unwrap_or_else(|| Path::new("."));
        Ok(base_dir.join(DEFAULT_CHECKPOINT_NAME))
    }

    /// Loads the checkpoint from `default_checkpoint_path()`.
    ///
    /// # Errors
    /// - Forwards all errors from `default_checkpoint_path()` and `load()`
    pub fn load_default(&self) -> Result<BodyPartModel, ClassifierError> {
        let path = Self::default_checkpoint_path()?;
        self.load(path)
    }

    /// Loads the checkpoint at `path` and validates it against the spec.
    ///
    /// The checks run in this order:
    /// 1. The path must name a regular file
    /// 2. Its SHA-256 must match the pinned hash, if the spec pins one
    /// 3. ONNX Runtime must accept the graph
    /// 4. Input, output and declared spec version must match the spec
    ///
    /// # Errors
    /// - `ModelFileNotFound` if `path` is missing or is not a regular file
    /// - `ModelLoadFailure` if the file cannot be read or its hash differs
    /// - `ModelLoadFailure` if ONNX Runtime rejects the checkpoint
    /// - `ModelLoadFailure` if the graph does not match the spec's shapes or version
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<BodyPartModel, ClassifierError> {
        let path = path.as_ref();
        log::info!("Checking checkpoint at {:?} (exists: {})", path, path.exists());
        if !path.is_file() {
            return Err(ClassifierError::ModelFileNotFound(path.display().to_string()));
        }

        self.try_load(path).map_err(|e| {
            log::error!("{}", e);
            e
        })
    }

    fn try_load(&self, path: &Path) -> Result<BodyPartModel, ClassifierError> {
        log::info!("Loading model from: {}", path.display());

        if let Some(expected_hash) = self.spec.checkpoint_sha256 {
            let verified = verify_file(path, expected_hash)
                .map_err(|e| ClassifierError::load_failure(format!("Cannot read checkpoint: {}", e)))?;
            if !verified {
                return Err(ClassifierError::load_failure(format!(
                    "Checkpoint hash does not match {} (expected {})",
                    self.spec.version, expected_hash
                )));
            }
            log::info!("Checkpoint hash verified");
        }

        let session = self
            .spec
            .builder(&self.runtime_config, self.device)?
            .commit_from_file(path)?;

        self.spec.validate_session(&session)?;
        log::info!("Model structure validated against {}", self.spec.version);
        log::debug!(
            "  Inputs: {:?}, Outputs: {:?}",
            session.inputs.iter().map(|i| &i.name).collect::<Vec<_>>(),
            session.outputs.iter().map(|o| &o.name).collect::<Vec<_>>()
        );

        log::info!("Model loaded successfully on {}", self.device);
        Ok(BodyPartModel::new(session, self.spec.clone(), self.device, path))
    }
}

/// Compares the SHA-256 of the file at `path` with `expected_hash` (hex, any case).
///
/// # Errors
/// Returns the I/O error if the file cannot be read.
pub fn verify_file(path: &Path, expected_hash: &str) -> io::Result<bool> {
    log::info!("Verifying file: {:?}", path);
    let bytes = fs::read(path)?;
    log::debug!("Read {} bytes", bytes.len());
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let hash = format!("{:x}", hasher.finalize());
    log::debug!("Calculated hash: {}", hash);
    log::debug!("Expected hash:   {}", expected_hash);
    Ok(hash.eq_ignore_ascii_case(expected_hash))
}
