use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IoError, Result};
use crate::json::ensure_parent_dir;

pub const RESTART_SCHEMA_VERSION: u32 = 1;

/// Converged time-integration state, stored in homogeneous coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestartState {
    pub schema_version: u32,
    pub step: usize,
    pub time: f64,
    pub displacement: Vec<f64>,
    pub velocity: Vec<f64>,
    pub acceleration: Vec<f64>,
    pub metadata: BTreeMap<String, String>,
}

impl Default for RestartState {
    fn default() -> Self {
        Self {
            schema_version: RESTART_SCHEMA_VERSION,
            step: 0,
            time: 0.0,
            displacement: Vec::new(),
            velocity: Vec::new(),
            acceleration: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

impl RestartState {
    /// Check that the three state vectors describe the same number of dofs.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != RESTART_SCHEMA_VERSION {
            return Err(IoError::InvalidData(format!(
                "unsupported restart schema version {}",
                self.schema_version
            )));
        }
        let n = self.displacement.len();
        if self.velocity.len() != n || self.acceleration.len() != n {
            return Err(IoError::InvalidData(format!(
                "restart vectors differ in length: d={}, v={}, a={}",
                n,
                self.velocity.len(),
                self.acceleration.len()
            )));
        }
        Ok(())
    }
}

pub fn save_restart(path: impl AsRef<Path>, state: &RestartState) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let bytes = serde_json::to_vec_pretty(state)?;
    fs::write(path, bytes)?;
    tracing::debug!(path = %path.display(), step = state.step, "restart written");
    Ok(())
}

pub fn load_restart(path: impl AsRef<Path>) -> Result<RestartState> {
    let bytes = fs::read(path)?;
    let state: RestartState = serde_json::from_slice(&bytes)?;
    state.validate()?;
    Ok(state)
}
