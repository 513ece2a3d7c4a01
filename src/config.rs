// ⚙️ Flow configuration - bucketing and validation knobs as data
//
// Loaded from a JSON file; every field is optional and falls back to its
// default.

use crate::error::BudgetError;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default number of children drawn per parent before folding into "Other"
pub const DEFAULT_MAX_VISIBLE_CHILDREN: usize = 8;

/// Default minimum share of the parent total for a child to stay visible
pub const DEFAULT_MIN_SHARE: f64 = 0.01;

/// Default relative tolerance used when auditing flow conservation
pub const DEFAULT_CONSERVATION_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// K: children kept per parent before the remainder is folded
    pub max_visible_children: usize,

    /// Children below this fraction of the parent total are folded
    pub min_share: f64,

    /// Sub-program levels drawn below departments (0 = departments only)
    pub program_depth: usize,

    /// Relative tolerance for inflow/outflow comparisons
    pub conservation_tolerance: f64,

    /// Accept negative spending amounts instead of rejecting the dataset
    pub allow_negative_spending: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        FlowConfig {
            max_visible_children: DEFAULT_MAX_VISIBLE_CHILDREN,
            min_share: DEFAULT_MIN_SHARE,
            program_depth: 0,
            conservation_tolerance: DEFAULT_CONSERVATION_TOLERANCE,
            allow_negative_spending: false,
        }
    }
}

impl FlowConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: FlowConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn with_max_visible_children(mut self, k: usize) -> Self {
        self.max_visible_children = k;
        self
    }

    pub fn with_min_share(mut self, min_share: f64) -> Self {
        self.min_share = min_share;
        self
    }

    pub fn with_program_depth(mut self, depth: usize) -> Self {
        self.program_depth = depth;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), BudgetError> {
        if self.max_visible_children == 0 {
            return Err(BudgetError::Config(
                "max_visible_children must be at least 1".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.min_share) {
            return Err(BudgetError::Config(format!(
                "min_share must be in [0, 1), got {}",
                self.min_share
            )));
        }

        if !self.conservation_tolerance.is_finite() || self.conservation_tolerance < 0.0 {
            return Err(BudgetError::Config(format!(
                "conservation_tolerance must be a non-negative number, got {}",
                self.conservation_tolerance
            )));
        }

        Ok(())
    }
}
