use bankshield_core::{Error, Result};
use bankshield_inference::HttpClassifierConfig;
use bankshield_pii::{CrossValidationPolicy, DetectionConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name given to the classifier configured through `BANKSHIELD_CLASSIFIER_URL`
pub const ENV_CLASSIFIER_NAME: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub validation: CrossValidationPolicy,

    #[serde(default)]
    pub classifiers: Vec<HttpClassifierConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            schema_path: default_schema_path(),
            logging: LoggingConfig::default(),
            detection: DetectionConfig::default(),
            validation: CrossValidationPolicy::default(),
            classifiers: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        // Server settings
        if let Ok(val) = std::env::var("BANKSHIELD_HOST") {
            self.host = val;
        }

        if let Ok(val) = std::env::var("BANKSHIELD_PORT") {
            match val.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => eprintln!("Warning: Invalid BANKSHIELD_PORT '{}', ignoring", val),
            }
        }

        if let Ok(val) = std::env::var("BANKSHIELD_SCHEMA") {
            self.schema_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("BANKSHIELD_LOG_LEVEL") {
            self.logging.level = val;
        }

        // Detection threshold
        if let Ok(val) = std::env::var("BANKSHIELD_MIN_CONFIDENCE") {
            match val.parse::<f32>() {
                Ok(t) if (0.0..=1.0).contains(&t) => self.detection.min_confidence = t,
                _ => eprintln!(
                    "Warning: Invalid BANKSHIELD_MIN_CONFIDENCE '{}', expected 0..=1",
                    val
                ),
            }
        }

        // Classifier endpoint; replaces the endpoint of an existing `default` entry
        if let Ok(url) = std::env::var("BANKSHIELD_CLASSIFIER_URL") {
            let classifier = self.env_classifier();
            classifier.endpoint = url;
            classifier.enabled = true;
        }

        if let Ok(api_key) = std::env::var("BANKSHIELD_CLASSIFIER_API_KEY") {
            if let Some(classifier) = self
                .classifiers
                .iter_mut()
                .find(|c| c.name == ENV_CLASSIFIER_NAME)
            {
                classifier.api_key = Some(api_key);
            } else {
                eprintln!(
                    "Warning: BANKSHIELD_CLASSIFIER_API_KEY set without a `{}` classifier, ignoring",
                    ENV_CLASSIFIER_NAME
                );
            }
        }
    }

    fn env_classifier(&mut self) -> &mut HttpClassifierConfig {
        let index = match self
            .classifiers
            .iter()
            .position(|c| c.name == ENV_CLASSIFIER_NAME)
        {
            Some(index) => index,
            None => {
                self.classifiers
                    .push(HttpClassifierConfig::new(ENV_CLASSIFIER_NAME, ""));
                self.classifiers.len() - 1
            }
        };
        &mut self.classifiers[index]
    }

    /// Classifiers that should be wired into the pipeline
    pub fn enabled_classifiers(&self) -> impl Iterator<Item = &HttpClassifierConfig> {
        self.classifiers.iter().filter(|c| c.enabled)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("config/data_schema.json")
}

fn default_log_level() -> String {
    "info".to_string()
}
