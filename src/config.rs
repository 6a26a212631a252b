use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "CLASSLENS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Edges handed to the aggregator per batch; also bounds the in-flight edge buffer.
    pub batch_size: usize,
    /// Files parsed concurrently.
    pub workers: usize,
    /// Extensions (without the dot) treated as source files.
    pub extensions: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            extensions: vec!["java".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub node_radius: f64,
    pub repulsion: f64,
    pub spring: f64,
    pub damping: f64,
    pub max_velocity: f64,
    /// Floor applied to pairwise distances before dividing by them.
    pub min_distance: f64,
    /// Ideal edge length expressed in node radii.
    pub ideal_length_radii: f64,
    /// Total per-step movement below which the layout counts as settled.
    pub settle_threshold: f64,
    pub max_iterations: usize,
    /// New nodes are seeded within `viewport * spread_factor` around the center.
    pub spread_factor: f64,
    /// Positions are clamped to `viewport * bounds_factor` around the center.
    pub bounds_factor: f64,
    pub tick_interval_ms: u64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    /// Seed for node placement; `None` draws from entropy.
    pub seed: Option<u64>,
    pub color_seed: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_radius: 15.0,
            repulsion: 1500.0,
            spring: 0.02,
            damping: 0.85,
            max_velocity: 6.0,
            min_distance: 0.1,
            ideal_length_radii: 50.0,
            settle_threshold: 1.0,
            max_iterations: 100,
            spread_factor: 3.0,
            bounds_factor: 2.0,
            tick_interval_ms: 16,
            viewport_width: 800.0,
            viewport_height: 600.0,
            seed: None,
            color_seed: 42,
        }
    }
}

impl LayoutConfig {
    pub fn ideal_length(&self) -> f64 {
        self.node_radius * self.ideal_length_radii
    }
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// CLI path wins over the environment, which wins over defaults.
    pub fn resolve(cli_config: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = cli_config {
            Self::load_from_file(path)
        } else if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            Self::load_from_file(env_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            anyhow::bail!("pipeline.batch_size must be at least 1");
        }
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        if !(0.0..1.0).contains(&self.layout.damping) {
            anyhow::bail!("layout.damping must be in [0, 1)");
        }
        if !(self.layout.min_distance.is_finite() && self.layout.min_distance > 0.0) {
            anyhow::bail!("layout.min_distance must be positive");
        }
        let non_negative = [
            ("bounds_factor", self.layout.bounds_factor),
            ("max_velocity", self.layout.max_velocity),
            ("settle_threshold", self.layout.settle_threshold),
            ("spread_factor", self.layout.spread_factor),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("layout.{} must be a non-negative number", name);
            }
        }
        Ok(())
    }
}
