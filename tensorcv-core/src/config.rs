// Per-operation parameters and the binding configuration file

use crate::error::{Error, Result};
use crate::matcher::{MatchOptions, SearchRange};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Number of point pairs in the full FREAK sampling pattern (43 choose 2).
pub const FREAK_PAIR_COUNT: i32 = 903;

/// Pairs used by one FREAK descriptor (512 bits).
pub const FREAK_DESCRIPTOR_PAIRS: usize = 512;

fn invalid(msg: impl Into<String>) -> Error {
    Error::Configuration(msg.into())
}

/// Corner selection and pyramidal Lucas-Kanade tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackParams {
    pub max_corners: usize,
    pub quality_level: f32,
    pub min_distance: f32,
    pub block_size: i32,
    /// Side of the square LK search window.
    pub win_size: i32,
    pub max_level: i32,
    pub use_harris: bool,
}

impl Default for TrackParams {
    fn default() -> Self {
        Self {
            max_corners: 500,
            quality_level: 0.01,
            min_distance: 5.0,
            block_size: 3,
            win_size: 21,
            max_level: 3,
            use_harris: false,
        }
    }
}

impl TrackParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_corners == 0 {
            return Err(invalid("track.max_corners must be > 0"));
        }
        if !(self.quality_level > 0.0 && self.quality_level <= 1.0) {
            return Err(invalid("track.quality_level must be in (0, 1]"));
        }
        if !(self.min_distance >= 0.0) {
            return Err(invalid("track.min_distance must be >= 0"));
        }
        if self.block_size <= 0 {
            return Err(invalid("track.block_size must be > 0"));
        }
        if self.win_size < 3 {
            return Err(invalid("track.win_size must be >= 3"));
        }
        if self.max_level < 0 {
            return Err(invalid("track.max_level must be >= 0"));
        }
        Ok(())
    }
}

/// Dense optical flow reported on a block grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    pub block_size: i32,
    /// Distance between neighbouring blocks.
    pub shift_size: i32,
    /// Largest expected displacement in pixels.
    pub max_range: i32,
    /// Start from the flow passed in instead of zero.
    pub use_previous: bool,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            block_size: 8,
            shift_size: 4,
            max_range: 16,
            use_previous: false,
        }
    }
}

impl FlowParams {
    pub fn validate(&self) -> Result<()> {
        if self.block_size <= 0 {
            return Err(invalid("flow.block_size must be > 0"));
        }
        if self.shift_size <= 0 {
            return Err(invalid("flow.shift_size must be > 0"));
        }
        if self.max_range < 0 {
            return Err(invalid("flow.max_range must be >= 0"));
        }
        Ok(())
    }

    /// Pyramid levels needed so the coarsest level sees `max_range` as at
    /// most one block.
    pub fn pyramid_levels(&self) -> i32 {
        let mut levels = 0;
        let mut reach = self.block_size.max(1);
        while reach < self.max_range && levels < 8 {
            reach *= 2;
            levels += 1;
        }
        levels
    }
}

/// FREAK extractor construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreakParams {
    pub oriented_normalization: bool,
    pub scale_normalization: bool,
    pub pattern_scale: f32,
    pub n_octaves: i32,
    /// Trained pair indices; empty selects the library default.
    pub selected_pairs: Vec<i32>,
}

impl Default for FreakParams {
    fn default() -> Self {
        Self {
            oriented_normalization: true,
            scale_normalization: true,
            pattern_scale: 22.0,
            n_octaves: 4,
            selected_pairs: Vec::new(),
        }
    }
}

impl FreakParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.pattern_scale > 0.0) {
            return Err(invalid("freak.pattern_scale must be > 0"));
        }
        if self.n_octaves <= 0 {
            return Err(invalid("freak.n_octaves must be > 0"));
        }
        if !self.selected_pairs.is_empty() && self.selected_pairs.len() != FREAK_DESCRIPTOR_PAIRS {
            return Err(invalid(format!(
                "freak.selected_pairs must be empty or hold {} entries, got {}",
                FREAK_DESCRIPTOR_PAIRS,
                self.selected_pairs.len()
            )));
        }
        if let Some(p) = self
            .selected_pairs
            .iter()
            .find(|&&p| !(0..FREAK_PAIR_COUNT).contains(&p))
        {
            return Err(invalid(format!(
                "freak.selected_pairs entry {} outside 0..{}",
                p, FREAK_PAIR_COUNT
            )));
        }
        Ok(())
    }
}

/// FAST keypoint detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastParams {
    pub threshold: i32,
    pub nonmax_suppression: bool,
}

impl Default for FastParams {
    fn default() -> Self {
        Self {
            threshold: 20,
            nonmax_suppression: true,
        }
    }
}

impl FastParams {
    /// Same parameters with a host-supplied threshold, truncated toward zero.
    pub fn with_threshold(&self, threshold: f32) -> Self {
        Self {
            threshold: threshold as i32,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=255).contains(&self.threshold) {
            return Err(invalid("fast.threshold must be in 0..=255"));
        }
        Ok(())
    }
}

/// FREAK pair training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    pub corr_threshold: f64,
    pub max_pairs: usize,
    pub fast: FastParams,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            corr_threshold: 0.7,
            max_pairs: crate::pairs::DEFAULT_MAX_PAIRS,
            fast: FastParams::default(),
        }
    }
}

impl TrainParams {
    pub fn validate(&self) -> Result<()> {
        self.fast.validate()?;
        if !(self.corr_threshold > 0.0 && self.corr_threshold <= 1.0) {
            return Err(invalid("train.corr_threshold must be in (0, 1]"));
        }
        if self.max_pairs == 0 {
            return Err(invalid("train.max_pairs must be > 0"));
        }
        Ok(())
    }
}

/// Descriptor matching defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    pub threshold: u32,
    pub search_range: SearchRange,
    pub parallel: bool,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            threshold: 64,
            search_range: SearchRange::FromRow,
            parallel: false,
        }
    }
}

impl MatchParams {
    pub fn options(&self) -> MatchOptions {
        MatchOptions {
            search_range: self.search_range,
            parallel: self.parallel,
        }
    }
}

/// Interpolation used when remapping images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    Cubic,
}

impl FromStr for Interpolation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INTER_LINEAR" | "LINEAR" => Ok(Interpolation::Linear),
            "INTER_CUBIC" | "CUBIC" => Ok(Interpolation::Cubic),
            other => Err(invalid(format!("unknown interpolation mode '{}'", other))),
        }
    }
}

/// Defaults for every host operation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub interpolation: Interpolation,
    pub track: TrackParams,
    pub flow: FlowParams,
    pub freak: FreakParams,
    pub fast: FastParams,
    pub train: TrainParams,
    pub matcher: MatchParams,
}

impl BindingConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_str(&content)?;
        debug!(path = %path.display(), "loaded binding configuration");
        Ok(config)
    }

    /// Parse JSON or TOML.
    pub fn from_str(content: &str) -> Result<Self> {
        if let Ok(config) = serde_json::from_str::<BindingConfig>(content) {
            return Ok(config);
        }
        toml::from_str::<BindingConfig>(content)
            .map_err(|e| Error::Serialization(format!("invalid configuration: {}", e)))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Apply `TENSORCV_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TENSORCV_MATCH_THRESHOLD") {
            match v.parse::<u32>() {
                Ok(t) => self.matcher.threshold = t,
                Err(_) => warn!(value = %v, "ignoring invalid TENSORCV_MATCH_THRESHOLD"),
            }
        }
        if let Some(v) = lookup("TENSORCV_FULL_SCAN") {
            if parse_flag(&v) {
                self.matcher.search_range = SearchRange::Full;
            }
        }
        if let Some(v) = lookup("TENSORCV_PARALLEL") {
            self.matcher.parallel = parse_flag(&v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.track.validate()?;
        self.flow.validate()?;
        self.freak.validate()?;
        self.fast.validate()?;
        self.train.validate()?;
        Ok(())
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
