use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::TrainError;
use crate::features::FeatureFrame;

/// Candidate artifact filenames, in preference order.
pub const MODEL_FILES: [&str; 3] = ["model.bin", "model_pipeline.bin", "best_model.bin"];

/// Fitted impute -> standardize -> logistic pipeline, flattened to the
/// statistics needed at inference time. Treated as immutable once loaded;
/// a reload replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    /// Per-feature imputation value (train-split median, missing ignored).
    pub medians: Vec<f64>,
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
    pub intercept: f64,
    pub weights: Vec<f64>,
}

impl ModelArtifact {
    /// Positive-class probability for one input row. Checks column identity
    /// first: the frame must carry exactly the names this artifact was
    /// trained with, in the same order.
    pub fn predict_proba(&self, frame: &FeatureFrame) -> Result<f64> {
        let columns = FeatureFrame::columns();
        if self.feature_names.len() != columns.len()
            || !self.feature_names.iter().zip(columns).all(|(a, b)| a == b)
        {
            bail!(
                "feature names do not match trained model: expected {:?}, got {:?}",
                self.feature_names,
                columns
            );
        }

        let mut z = self.intercept;
        for (i, value) in frame.values().iter().enumerate() {
            let raw = value.unwrap_or(self.medians[i]);
            let scaled = (raw - self.means[i]) / self.stds[i];
            z += self.weights[i] * scaled;
        }
        Ok(1.0 / (1.0 + (-z).exp()))
    }

    /// Class label plus positive-class probability.
    pub fn predict(&self, frame: &FeatureFrame) -> Result<(i32, f64)> {
        let proba = self.predict_proba(frame)?;
        Ok((i32::from(proba >= 0.5), proba))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read model at {}", path.display()))?;
        let artifact: Self = bincode::deserialize(&bytes)
            .with_context(|| format!("failed to decode model at {}", path.display()))?;

        // Probe internal consistency before serving anything with it.
        let n = artifact.feature_names.len();
        if artifact.medians.len() != n
            || artifact.means.len() != n
            || artifact.stds.len() != n
            || artifact.weights.len() != n
        {
            bail!(
                "inconsistent model artifact at {}: {} feature names but {} weights",
                path.display(),
                n,
                artifact.weights.len()
            );
        }
        Ok(artifact)
    }

    /// Atomic save: encode to a temporary sibling, then rename over the final
    /// path. A crash or failure mid-write leaves the destination either
    /// untouched or absent, never truncated.
    pub fn save_atomic(&self, path: &Path) -> Result<(), TrainError> {
        let bytes =
            bincode::serialize(self).map_err(|e| TrainError::SaveFailed(e.to_string()))?;

        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &bytes)
            .map_err(|e| TrainError::SaveFailed(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            TrainError::SaveFailed(format!(
                "rename {} -> {}: {}",
                tmp.display(),
                path.display(),
                e
            ))
        })?;
        Ok(())
    }
}

/// First candidate artifact that exists under `dir`, if any.
pub fn resolve_model_path(dir: &Path) -> Option<PathBuf> {
    MODEL_FILES.iter().map(|f| dir.join(f)).find(|p| p.exists())
}
