//! Runtime configuration.
//!
//! Defaults, then an optional JSON file named by `CATEGORIZER_CONFIG`, then
//! individual environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use language_utils::Language;

use crate::chunked::ChunkPolicy;
use crate::error::CategorizerError;
use crate::matcher::DEFAULT_CANDIDATE_LIMIT;

pub const CONFIG_PATH_VAR: &str = "CATEGORIZER_CONFIG";

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CategorizerConfig {
    pub language: Language,
    /// Maximum rows fetched per reference lookup.
    pub candidate_limit: usize,
    /// Reference matches above this confidence are used as-is.
    pub short_circuit_threshold: f64,
    pub fallback: FallbackConfig,
    pub chunking: ChunkConfig,
    pub backend: BackendConfig,
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            language: Language::Spanish,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
            short_circuit_threshold: 0.8,
            fallback: FallbackConfig::default(),
            chunking: ChunkConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStrategy {
    #[default]
    Rules,
    Ai,
}

impl std::str::FromStr for FallbackStrategy {
    type Err = CategorizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rules" => Ok(FallbackStrategy::Rules),
            "ai" => Ok(FallbackStrategy::Ai),
            other => Err(CategorizerError::Config(format!(
                "unknown fallback strategy {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub strategy: FallbackStrategy,
    /// Chat model used by the `ai` strategy.
    pub model: String,
    /// Model answers below this confidence are discarded.
    pub min_confidence: f64,
    pub cache_directory: Option<PathBuf>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            strategy: FallbackStrategy::Rules,
            model: "gpt-4o-mini".to_string(),
            min_confidence: 0.5,
            cache_directory: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub delay_ms: u64,
    pub deadline_secs: u64,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            delay_ms: 1000,
            deadline_secs: 60,
        }
    }
}

impl ChunkConfig {
    pub fn policy(&self) -> ChunkPolicy {
        ChunkPolicy {
            chunk_size: self.chunk_size.max(1),
            delay: Duration::from_millis(self.delay_ms),
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }
}

/// Where the reference vocabulary and the teachers' items live.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory {
        reference_jsonl: Option<PathBuf>,
        #[serde(default)]
        items_jsonl: Option<PathBuf>,
    },
    Sqlite {
        path: PathBuf,
    },
    Supabase {
        url: String,
        service_role_key: String,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory {
            reference_jsonl: None,
            items_jsonl: None,
        }
    }
}

impl CategorizerConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, CategorizerError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CategorizerError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply individual overrides. `lookup` maps a variable name to its value.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), CategorizerError> {
        if let Some(language) = lookup("CATEGORIZER_LANGUAGE") {
            self.language = language
                .parse()
                .map_err(|e| CategorizerError::Config(format!("{e}")))?;
        }
        if let Some(strategy) = lookup("CATEGORIZER_FALLBACK") {
            self.fallback.strategy = strategy.parse()?;
        }

        if let Some(path) = lookup("CATEGORIZER_SQLITE_PATH") {
            self.backend = BackendConfig::Sqlite { path: path.into() };
        } else if let (Some(url), Some(service_role_key)) =
            (lookup("SUPABASE_URL"), lookup("SUPABASE_SERVICE_ROLE_KEY"))
        {
            self.backend = BackendConfig::Supabase {
                url,
                service_role_key,
            };
        } else if let Some(path) = lookup("CATEGORIZER_REFERENCE_JSONL") {
            let items_jsonl = match &self.backend {
                BackendConfig::Memory { items_jsonl, .. } => items_jsonl.clone(),
                _ => None,
            };
            self.backend = BackendConfig::Memory {
                reference_jsonl: Some(path.into()),
                items_jsonl,
            };
        }
        Ok(())
    }
}
