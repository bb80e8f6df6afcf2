use crate::search::SearchMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub segmentation: SegmentationConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Thresholds of the encoding heuristic. These are calibration values, not
/// derived constants, so every one of them can be overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Bytes inspected from the start of a document.
    pub sample_size: usize,
    /// Share of invalid bytes a sample may carry and still count as UTF-8.
    pub max_invalid_utf8_ratio: f64,
    /// Share of replacement/control characters that disqualifies a decode.
    pub garbage_ratio: f64,
    /// Consecutive replacement/control characters that disqualify a decode.
    pub garbage_run: usize,
    /// Minimum score a legacy encoding needs to be chosen at all.
    pub legacy_floor: f64,
    /// How much a legacy score has to beat the UTF-8 score by.
    pub legacy_ratio: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            sample_size: 64 * 1024,
            max_invalid_utf8_ratio: 0.001,
            garbage_ratio: 0.005,
            garbage_run: 3,
            legacy_floor: 0.15,
            legacy_ratio: 1.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub header_chars: usize,
    pub best_pattern_sample_bytes: usize,
    pub large_text_threshold: usize,
    pub large_text_sample_bytes: usize,
    pub min_sample_matches: usize,
    pub whole_document_fallback: bool,
    pub fallback_title: String,
    /// Additional heading regexes tried after the built-in table.
    pub extra_patterns: Vec<String>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            header_chars: 2000,
            best_pattern_sample_bytes: 100 * 1024,
            large_text_threshold: 5 * 1024 * 1024,
            large_text_sample_bytes: 500 * 1024,
            min_sample_matches: 5,
            whole_document_fallback: true,
            fallback_title: "正文".to_string(),
            extra_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_mode: SearchMode,
    pub context_length: usize,
    pub max_results: usize,
    pub max_results_per_chapter: usize,
    /// Upper bound on the compiled size of a user supplied regex, in bytes.
    pub regex_size_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_mode: SearchMode::Overview,
            context_length: 60,
            max_results: 2000,
            max_results_per_chapter: 100,
            regex_size_limit: 10 * (1 << 20),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::find_config_path()?;
        if let Some(path) = config_path {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content).with_context(|| "Failed to parse config file")
    }

    fn find_config_path() -> Result<Option<PathBuf>> {
        if let Some(xdg_config) = dirs::config_dir() {
            let xdg_path = xdg_config.join("novelscan/config.toml");
            if xdg_path.exists() {
                return Ok(Some(xdg_path));
            }
        }

        if let Some(home) = dirs::home_dir() {
            let home_path = home.join(".novelscan.toml");
            if home_path.exists() {
                return Ok(Some(home_path));
            }
        }

        let current_path = Path::new(".novelscan.toml");
        if current_path.exists() {
            return Ok(Some(current_path.to_path_buf()));
        }

        Ok(None)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
