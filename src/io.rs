use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use strum::{Display, EnumString};

use crate::{
    agent::dqn::DqnAgent,
    error::{IoError, RebalancerError, RebalancerResult},
    math::scaler::StandardScaler,
};

// ================================================================================================
// Serde Formats
// ================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SerdeFormat {
    Postcard,
    Json,
}

impl SerdeFormat {
    pub fn from_path(path: &Path) -> RebalancerResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| err(&path.display().to_string(), true))?;

        match ext.to_lowercase().as_str() {
            "postcard" => Ok(Self::Postcard),
            "json" => Ok(Self::Json),
            ext => Err(err(ext, false)),
        }
    }
}

fn err(s: &str, missing_extension: bool) -> RebalancerError {
    let msg = if missing_extension {
        format!("missing or invalid extension in path '{s}'")
    } else {
        format!("'{s}'")
    };
    IoError::UnsupportedFormat(msg).into()
}

// ================================================================================================
// Local Files
// ================================================================================================

/// Serialize `value` to `path` in the format implied by its extension.
///
/// Parent directories are created when missing.
pub fn save<T: Serialize>(path: &Path, value: &T) -> RebalancerResult<()> {
    let format = SerdeFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            IoError::FileSystem(format!("Failed to create directory {parent:?}: {e}"))
        })?;
    }

    let mut writer = BufWriter::new(File::create(path).map_err(IoError::from)?);
    match format {
        SerdeFormat::Postcard => {
            let bytes = postcard::to_stdvec(value).map_err(IoError::from)?;
            writer.write_all(&bytes).map_err(IoError::from)?;
        }
        SerdeFormat::Json => serde_json::to_writer_pretty(&mut writer, value).map_err(IoError::from)?,
    }
    writer.flush().map_err(IoError::from)?;
    Ok(())
}

/// Deserialize a value from `path`, failing with [`IoError::MissingArtifact`] if it does not exist.
pub fn load<T: DeserializeOwned>(path: &Path) -> RebalancerResult<T> {
    let format = SerdeFormat::from_path(path)?;
    if !path.is_file() {
        return Err(IoError::MissingArtifact(path.to_path_buf()).into());
    }

    let value = match format {
        SerdeFormat::Postcard => {
            let bytes = std::fs::read(path).map_err(IoError::from)?;
            postcard::from_bytes(&bytes).map_err(IoError::from)?
        }
        SerdeFormat::Json => {
            let reader = BufReader::new(File::open(path).map_err(IoError::from)?);
            serde_json::from_reader(reader).map_err(IoError::from)?
        }
    };
    Ok(value)
}

// ================================================================================================
// Artifact Store
// ================================================================================================

/// Directory holding the artifacts of a training run.
///
/// Note: `dir` must be a **directory path only**; file names are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub const MODEL_FILE: &'static str = "dqn.postcard";
    pub const SCALER_FILE: &'static str = "scaler.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(Self::MODEL_FILE)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(Self::SCALER_FILE)
    }

    /// Fails with [`IoError::MissingArtifact`] unless both artifacts are present.
    pub fn ensure_complete(&self) -> RebalancerResult<()> {
        for path in [self.model_path(), self.scaler_path()] {
            if !path.is_file() {
                return Err(IoError::MissingArtifact(path).into());
            }
        }
        Ok(())
    }

    pub fn save_model(&self, agent: &DqnAgent) -> RebalancerResult<()> {
        agent.save(&self.model_path())
    }

    pub fn load_model(&self, agent: &mut DqnAgent) -> RebalancerResult<()> {
        agent.load(&self.model_path())
    }

    pub fn save_scaler(&self, scaler: &StandardScaler) -> RebalancerResult<()> {
        save(&self.scaler_path(), scaler)
    }

    pub fn load_scaler(&self) -> RebalancerResult<StandardScaler> {
        load(&self.scaler_path())
    }
}
