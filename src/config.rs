use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::ingest::DEFAULT_CHUNK_SIZE;
use crate::sample::{DEFAULT_MAP_CAP, DEFAULT_SEED};

/// Name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string with comments.
    /// All fields are commented out so defaults are used, but users can uncomment to override.
    pub fn generate_default_config(&self) -> Result<String> {
        let toml_str = toml::to_string_pretty(&AppConfig::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        Ok(Self::comment_all_fields(&toml_str, &Self::collect_all_comments()))
    }

    fn collect_all_comments() -> HashMap<String, String> {
        let mut comments = HashMap::new();
        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), comment.to_string());
        }
        let sections: [(&str, &[(&str, &str)]); 5] = [
            ("source", SOURCE_COMMENTS),
            ("ingest", INGEST_COMMENTS),
            ("map", MAP_COMMENTS),
            ("filters", FILTER_COMMENTS),
            ("chart", CHART_COMMENTS),
        ];
        for (section, fields) in sections {
            for (field, comment) in fields {
                comments.insert(format!("{}.{}", section, field), comment.to_string());
            }
        }
        comments
    }

    /// Comment out every section header and field, prefixing fields with their comment.
    /// Option fields that serialize to nothing are added as `# field = null`.
    fn comment_all_fields(toml: &str, comments: &HashMap<String, String>) -> String {
        let mut result = String::new();
        result.push_str("# acidentes configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        let mut pending_options: Vec<&str> = Vec::new();

        let flush_options = |result: &mut String, pending: &mut Vec<&str>| {
            for field_path in pending.drain(..) {
                if let Some(comment) = comments.get(field_path) {
                    for line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(line);
                        result.push('\n');
                    }
                }
                let name = field_path.rsplit('.').next().unwrap_or(field_path);
                result.push_str(&format!("# {} = null\n", name));
            }
        };

        for line in toml.lines() {
            if let Some(section) = extract_section_name(line) {
                flush_options(&mut result, &mut pending_options);
                current_section = section;
                if let Some((_, header)) = SECTION_HEADERS.iter().find(|(s, _)| *s == current_section) {
                    result.push_str(header);
                    result.push('\n');
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                pending_options = OPTION_FIELDS
                    .iter()
                    .copied()
                    .filter(|f| f.starts_with(&format!("{}.", current_section)))
                    .collect();
                continue;
            }

            if let Some(field_path) = extract_field_path(line, &current_section) {
                pending_options.retain(|f| *f != field_path);
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }
        flush_options(&mut result, &mut pending_options);

        result
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path(CONFIG_FILE);

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config()?)?;

        Ok(config_path)
    }
}

/// Extract section name from TOML line like "[map]"
fn extract_section_name(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        Some(trimmed[1..trimmed.len() - 1].to_string())
    } else {
        None
    }
}

/// Extract "section.field" from a `field = value` line
fn extract_field_path(line: &str, current_section: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('[') {
        return None;
    }
    let eq_pos = trimmed.find('=')?;
    let field_name = trimmed[..eq_pos].trim();
    if current_section.is_empty() {
        Some(field_name.to_string())
    } else {
        Some(format!("{}.{}", current_section, field_name))
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub source: SourceConfig,
    pub ingest: IngestConfig,
    pub map: MapConfig,
    pub filters: FilterConfig,
    pub chart: ChartConfig,
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "source",
        "# ============================================================================\n# Data Source\n# ============================================================================",
    ),
    (
        "ingest",
        "# ============================================================================\n# Ingestion\n# ============================================================================",
    ),
    (
        "map",
        "# ============================================================================\n# Map Sampling\n# ============================================================================",
    ),
    (
        "filters",
        "# ============================================================================\n# Default Filters\n# ============================================================================",
    ),
    (
        "chart",
        "# ============================================================================\n# Chart Export\n# ============================================================================",
    ),
];

/// Option fields that serialize to nothing when unset but should still appear in the template.
const OPTION_FIELDS: &[&str] = &["source.path", "source.delimiter"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceConfig {
    /// CSV used when no path is given on the command line.
    pub path: Option<String>,
    /// Field delimiter as an ASCII value (44 = comma, 59 = semicolon).
    pub delimiter: Option<u8>,
}

const SOURCE_COMMENTS: &[(&str, &str)] = &[
    (
        "path",
        "CSV file used when no path is given on the command line",
    ),
    (
        "delimiter",
        "Field delimiter as an ASCII value (44 = comma, 59 = semicolon). null = comma",
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub chunk_size: usize,
}

const INGEST_COMMENTS: &[(&str, &str)] = &[(
    "chunk_size",
    "Rows parsed per chunk while loading. Bounds peak memory during parsing",
)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub sample_cap: usize,
    pub seed: u64,
}

const MAP_COMMENTS: &[(&str, &str)] = &[
    (
        "sample_cap",
        "Maximum number of points drawn on the map. Larger tables are sampled",
    ),
    (
        "seed",
        "Random seed for map sampling. Same seed, same points",
    ),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FilterConfig {
    pub default_causes: Vec<String>,
}

const FILTER_COMMENTS: &[(&str, &str)] = &[(
    "default_causes",
    "Causes selected when none are given with --cause. Empty = all causes\nExample: [\"Demais falhas mecânicas ou elétricas\"]",
)];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
}

const CHART_COMMENTS: &[(&str, &str)] = &[
    ("width", "Width in pixels of exported PNG charts"),
    ("height", "Height in pixels of exported PNG charts"),
];

/// Upper bound on exported chart sides, in pixels.
pub const MAX_CHART_SIDE: u32 = 8192;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            source: SourceConfig::default(),
            ingest: IngestConfig::default(),
            map: MapConfig::default(),
            filters: FilterConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            sample_cap: DEFAULT_MAP_CAP,
            seed: DEFAULT_SEED,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let manager = ConfigManager::new(app_name)?;
        Self::load_from(&manager.config_path(CONFIG_FILE))
    }

    /// Load configuration with `path` as the user layer. A missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = AppConfig::default();
        if let Some(user_config) = Self::load_user_config(path)? {
            config.merge(user_config);
        }

        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {}", path.display(), e))?;

        Ok(config)
    }

    fn load_user_config(path: &Path) -> Result<Option<AppConfig>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file at {}: {}", path.display(), e))?;

        toml::from_str(&content)
            .map(Some)
            .map_err(|e| eyre!("Failed to parse config file at {}: {}", path.display(), e))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }
        self.source.merge(other.source);
        self.ingest.merge(other.ingest);
        self.map.merge(other.map);
        self.filters.merge(other.filters);
        self.chart.merge(other.chart);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.ingest.chunk_size == 0 {
            return Err(eyre!("ingest.chunk_size must be greater than 0"));
        }

        if let Some(d) = self.source.delimiter {
            if !d.is_ascii() || d == b'"' || d == b'\n' || d == b'\r' {
                return Err(eyre!(
                    "source.delimiter must be an ASCII character other than a quote or newline, got {}",
                    d
                ));
            }
        }

        for (name, side) in [("chart.width", self.chart.width), ("chart.height", self.chart.height)] {
            if side == 0 || side > MAX_CHART_SIDE {
                return Err(eyre!(
                    "{} must be between 1 and {}, got {}",
                    name,
                    MAX_CHART_SIDE,
                    side
                ));
            }
        }

        Ok(())
    }
}

// Merge implementations for each config section
impl SourceConfig {
    pub fn merge(&mut self, other: Self) {
        if other.path.is_some() {
            self.path = other.path;
        }
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
    }
}

impl IngestConfig {
    pub fn merge(&mut self, other: Self) {
        let default = IngestConfig::default();
        if other.chunk_size != default.chunk_size {
            self.chunk_size = other.chunk_size;
        }
    }
}

impl MapConfig {
    pub fn merge(&mut self, other: Self) {
        let default = MapConfig::default();
        if other.sample_cap != default.sample_cap {
            self.sample_cap = other.sample_cap;
        }
        if other.seed != default.seed {
            self.seed = other.seed;
        }
    }
}

impl FilterConfig {
    pub fn merge(&mut self, other: Self) {
        if !other.default_causes.is_empty() {
            self.default_causes = other.default_causes;
        }
    }
}

impl ChartConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ChartConfig::default();
        if other.width != default.width {
            self.width = other.width;
        }
        if other.height != default.height {
            self.height = other.height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_helpers() {
        assert_eq!(extract_section_name("[map]"), Some("map".to_string()));
        assert_eq!(extract_section_name("seed = 42"), None);
        assert_eq!(
            extract_field_path("seed = 42", "map"),
            Some("map.seed".to_string())
        );
        assert_eq!(
            extract_field_path("version = \"0.1\"", ""),
            Some("version".to_string())
        );
        assert_eq!(extract_field_path("# comment", "map"), None);
    }

    #[test]
    fn test_merge_prefers_non_default_values() {
        let mut base = AppConfig::default();
        base.map.sample_cap = 10;
        let mut other = AppConfig::default();
        other.map.seed = 7;
        other.source.delimiter = Some(b';');
        base.merge(other);
        assert_eq!(base.map.sample_cap, 10);
        assert_eq!(base.map.seed, 7);
        assert_eq!(base.source.delimiter, Some(b';'));
    }
}
