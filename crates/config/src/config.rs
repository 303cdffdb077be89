//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FfmpegConfig {
    /// Tool path; a bare name is looked up on PATH (default "ffmpeg")
    #[serde(default = "default_ffmpeg_path")]
    pub path: String,
    /// Extra arguments inserted between the fixed flags and the output path
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            path: default_ffmpeg_path(),
            args: Vec::new(),
        }
    }
}

/// Stitching behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StitchConfig {
    /// Container extension treated as input, without the dot (default "mp4")
    #[serde(default = "default_media_extension")]
    pub media_extension: String,
    /// Output file name prefixes that disable source deletion
    #[serde(default = "default_protected_output_prefixes")]
    pub protected_output_prefixes: Vec<String>,
    /// Directory for concat list files (source folder if unset)
    #[serde(default)]
    pub list_dir: Option<PathBuf>,
    /// Tool invocations allowed to run at once (0 = unbounded)
    #[serde(default)]
    pub max_concurrent_jobs: u32,
}

fn default_media_extension() -> String {
    "mp4".to_string()
}

fn default_protected_output_prefixes() -> Vec<String> {
    vec!["_comp_".to_string()]
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            media_extension: default_media_extension(),
            protected_output_prefixes: default_protected_output_prefixes(),
            list_dir: None,
            max_concurrent_jobs: 0,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    #[serde(default)]
    pub stitch: StitchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - STITCH_FFMPEG_PATH -> ffmpeg.path
    /// - STITCH_FFMPEG_ARGS -> ffmpeg.args (split on whitespace)
    /// - STITCH_MEDIA_EXTENSION -> stitch.media_extension
    /// - STITCH_MAX_CONCURRENT_JOBS -> stitch.max_concurrent_jobs
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("STITCH_FFMPEG_PATH") {
            if !val.trim().is_empty() {
                self.ffmpeg.path = val;
            }
        }

        if let Ok(val) = env::var("STITCH_FFMPEG_ARGS") {
            self.ffmpeg.args = val.split_whitespace().map(String::from).collect();
        }

        if let Ok(val) = env::var("STITCH_MEDIA_EXTENSION") {
            let ext = val.trim().trim_start_matches('.');
            if !ext.is_empty() {
                self.stitch.media_extension = ext.to_string();
            }
        }

        if let Ok(val) = env::var("STITCH_MAX_CONCURRENT_JOBS") {
            if let Ok(jobs) = val.parse::<u32>() {
                self.stitch.max_concurrent_jobs = jobs;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    ///
    /// Parse errors and other IO errors are still reported.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = match Self::load_from_file(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Config::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env_vars() {
        env::remove_var("STITCH_FFMPEG_PATH");
        env::remove_var("STITCH_FFMPEG_ARGS");
        env::remove_var("STITCH_MEDIA_EXTENSION");
        env::remove_var("STITCH_MAX_CONCURRENT_JOBS");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_config_parses_all_sections(
            path in "[a-zA-Z0-9_/.-]{1,40}",
            args in proptest::collection::vec("[a-zA-Z0-9:+-]{1,12}", 0..6),
            ext in "[a-z0-9]{2,5}",
            max_jobs in 0u32..16,
        ) {
            let args_toml = args
                .iter()
                .map(|a| format!("\"{}\"", a))
                .collect::<Vec<_>>()
                .join(", ");
            let toml_str = format!(
                r#"
[ffmpeg]
path = "{}"
args = [{}]

[stitch]
media_extension = "{}"
max_concurrent_jobs = {}
"#,
                path, args_toml, ext, max_jobs
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(&config.ffmpeg.path, &path);
            prop_assert_eq!(&config.ffmpeg.args, &args);
            prop_assert_eq!(&config.stitch.media_extension, &ext);
            prop_assert_eq!(config.stitch.max_concurrent_jobs, max_jobs);
            prop_assert_eq!(
                config.stitch.protected_output_prefixes,
                vec!["_comp_".to_string()]
            );
        }

        #[test]
        fn prop_env_overrides_max_concurrent_jobs(
            initial_jobs in 0u32..8,
            override_jobs in 0u32..16,
        ) {
            let _guard = ENV_MUTEX.lock().unwrap();
            clear_env_vars();

            let toml_str = format!("[stitch]\nmax_concurrent_jobs = {}\n", initial_jobs);
            let mut config = Config::parse_toml(&toml_str).expect("Valid TOML");

            env::set_var("STITCH_MAX_CONCURRENT_JOBS", override_jobs.to_string());
            config.apply_env_overrides();
            clear_env_vars();

            prop_assert_eq!(config.stitch.max_concurrent_jobs, override_jobs);
        }
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(config.ffmpeg.path, "ffmpeg");
        assert!(config.ffmpeg.args.is_empty());
        assert_eq!(config.stitch.media_extension, "mp4");
        assert_eq!(config.stitch.protected_output_prefixes, vec!["_comp_"]);
        assert_eq!(config.stitch.list_dir, None);
        assert_eq!(config.stitch.max_concurrent_jobs, 0);
    }

    #[test]
    fn test_env_overrides_tool_settings() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("STITCH_FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg");
        env::set_var("STITCH_FFMPEG_ARGS", "-movflags +faststart  -y");
        env::set_var("STITCH_MEDIA_EXTENSION", ".mkv");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.ffmpeg.path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.ffmpeg.args, vec!["-movflags", "+faststart", "-y"]);
        assert_eq!(config.stitch.media_extension, "mkv");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let config = Config::load_or_default("/nonexistent/stitch/config.toml")
            .expect("Missing file should fall back to defaults");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_reports_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[ffmpeg\npath = ").unwrap();

        let result = Config::load_or_default(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let toml_str = r#"
[stitch]
protected_output_prefixes = ["_comp_", "draft_"]
list_dir = "/tmp/stitch-lists"
"#;
        let config = Config::parse_toml(toml_str).expect("Partial TOML should parse");

        assert_eq!(config.ffmpeg, FfmpegConfig::default());
        assert_eq!(config.stitch.media_extension, "mp4");
        assert_eq!(
            config.stitch.protected_output_prefixes,
            vec!["_comp_", "draft_"]
        );
        assert_eq!(
            config.stitch.list_dir,
            Some(PathBuf::from("/tmp/stitch-lists"))
        );
    }
}
