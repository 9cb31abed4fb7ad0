use serde::Deserialize;
#[allow(unused_imports)]
use validator::{ValidationError, Validate};
use validator_derive::Validate;

use std::path::{Path, PathBuf};

use crate::fetch::{ModelSource, WEIGHTS_FILE, CONFIG_FILE, MIN_MODEL_BYTES};

pub const MODEL_TYPES: &[&str] = &["bert", "distilbert", "roberta", "xlmroberta", "electra", "mobilebert"];

#[derive(Debug, Deserialize, Validate, Clone)]
#[validate(schema(function = "ensure_merges_file"))]
pub struct Config {
    /// Hugging Face repository holding the converted model.
    #[serde(default = "default_model_repo")]
    #[validate(custom = "ensure_repo_id")]
    pub model_repo: String,

    #[serde(default)]
    pub revision: Option<String>,

    /// Use a local model directory instead of the hub.
    #[serde(default)]
    #[validate(custom = "ensure_model_dir")]
    pub model_dir: Option<String>,

    #[serde(default = "default_model_type")]
    #[validate(custom = "ensure_model_type")]
    pub model_type: String,

    #[serde(default = "default_vocab_file")]
    #[validate(length(min = 1))]
    pub vocab_file: String,

    #[serde(default)]
    pub merges_file: Option<String>,

    #[serde(default = "default_lower_case")]
    pub lower_case: bool,

    #[serde(default)]
    pub cache_dir: Option<String>,

    #[serde(default = "default_min_model_bytes")]
    pub min_model_bytes: u64,

    #[serde(default)]
    pub cpu_only: bool,

    #[serde(default)]
    pub html_report: Option<String>,

    #[serde(default = "deault_debug")]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_repo: default_model_repo(),
            revision: None,
            model_dir: None,
            model_type: default_model_type(),
            vocab_file: default_vocab_file(),
            merges_file: None,
            lower_case: default_lower_case(),
            cache_dir: None,
            min_model_bytes: default_min_model_bytes(),
            cpu_only: false,
            html_report: None,
            debug: deault_debug(),
        }
    }
}

impl Config {
    pub fn model_source(&self) -> ModelSource {
        match &self.model_dir {
            Some(dir) => ModelSource::Local(PathBuf::from(dir)),
            None => ModelSource::Hub {
                repo: self.model_repo.clone(),
                revision: self.revision.clone(),
            },
        }
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref().map(Path::new)
    }
}

fn default_model_repo() -> String {
    "Mozkyy/ner-laporgub-jateng".to_string()
}

fn default_model_type() -> String {
    "bert".to_string()
}

fn default_vocab_file() -> String {
    "vocab.txt".to_string()
}

fn default_lower_case() -> bool {
    true
}

fn default_min_model_bytes() -> u64 {
    MIN_MODEL_BYTES
}

fn deault_debug() -> bool {
    false
}

fn ensure_repo_id(repo: &str) -> Result<(), ValidationError> {
    let mut parts = repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(()),
        _ => Err(ValidationError::new("Model repo must look like owner/name")),
    }
}

fn ensure_model_type(model_type: &str) -> Result<(), ValidationError> {
    if MODEL_TYPES.contains(&model_type) {
        Ok(())
    } else {
        Err(ValidationError::new("Unsupported model type"))
    }
}

/// Byte-level BPE tokenizers need a merges file next to the vocabulary.
fn ensure_merges_file(config: &Config) -> Result<(), ValidationError> {
    match (config.model_type.as_str(), &config.merges_file) {
        ("roberta", None) => Err(ValidationError::new("Roberta models need a merges file")),
        _ => Ok(()),
    }
}

fn ensure_model_dir(model_dir: &str) -> Result<(), ValidationError> {
    let dir = PathBuf::from(model_dir);
    if ! dir.is_dir() {
        Err(ValidationError::new("Model directory missing"))
    }
    else if ! dir.join(WEIGHTS_FILE).exists() {
        Err(ValidationError::new("Rust model missing"))
    }
    else if ! dir.join(CONFIG_FILE).exists() {
        Err(ValidationError::new("Config model missing"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() -> anyhow::Result<()> {
        let config: Config = toml::from_str("")?;
        config.validate()?;
        assert_eq!(config.model_repo, "Mozkyy/ner-laporgub-jateng");
        assert_eq!(config.model_type, "bert");
        assert_eq!(config.vocab_file, "vocab.txt");
        assert_eq!(config.min_model_bytes, MIN_MODEL_BYTES);
        assert!(config.lower_case);
        assert!(!config.debug);
        assert!(matches!(config.model_source(), ModelSource::Hub { revision: None, .. }));
        Ok(())
    }

    #[test]
    fn default_matches_empty_file() -> anyhow::Result<()> {
        let parsed: Config = toml::from_str("")?;
        let built = Config::default();
        assert_eq!(parsed.model_repo, built.model_repo);
        assert_eq!(parsed.model_type, built.model_type);
        assert_eq!(parsed.lower_case, built.lower_case);
        assert_eq!(parsed.min_model_bytes, built.min_model_bytes);
        Ok(())
    }

    #[test]
    fn rejects_bad_values() -> anyhow::Result<()> {
        let config: Config = toml::from_str(r#"model_repo = "no-owner""#)?;
        assert!(config.validate().is_err());

        let config: Config = toml::from_str(r#"model_type = "gpt2""#)?;
        assert!(config.validate().is_err());

        let config: Config = toml::from_str(r#"model_dir = "/does/not/exist""#)?;
        assert!(config.validate().is_err());
        Ok(())
    }

    #[test]
    fn roberta_needs_merges() -> anyhow::Result<()> {
        let config: Config = toml::from_str(
            r#"
model_type = "roberta"
vocab_file = "vocab.json"
"#,
        )?;
        let errors = config.validate().unwrap_err();
        assert!(errors.errors().contains_key("__all__"));

        let config: Config = toml::from_str(
            r#"
model_type = "roberta"
vocab_file = "vocab.json"
merges_file = "merges.txt"
"#,
        )?;
        config.validate()?;
        Ok(())
    }

    #[test]
    fn local_model_dir() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(WEIGHTS_FILE), b"weights")?;
        let toml_str = format!("model_dir = {:?}\ncpu_only = true", dir.path().display().to_string());
        let config: Config = toml::from_str(&toml_str)?;
        // config.json is still missing
        assert!(config.validate().is_err());

        std::fs::write(dir.path().join(CONFIG_FILE), b"{}")?;
        config.validate()?;
        assert!(config.cpu_only);
        match config.model_source() {
            ModelSource::Local(path) => assert_eq!(path, dir.path()),
            other => panic!("unexpected source {:?}", other),
        }
        Ok(())
    }
}
