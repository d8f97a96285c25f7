//! Per-board parsing configuration.
//!
//! A config file has a `[defaults]` table and optional `[boards.<id>]`
//! tables holding partial overrides:
//!
//! ```toml
//! [defaults]
//! reference_sigil = ">>"
//! nesting_policy = { allow_depth = 4 }
//!
//! [boards.a]
//! nesting_policy = "reject"
//! allowed_markup = ["quote", "reference"]
//! ```
//!
//! Boards without a table, and a missing file altogether, get the defaults.

mod store;

pub use store::ConfigStore;

use postlink_syntax::{Grammar, MarkupKind, NestingPolicy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config for board {board}: {reason}")]
    InvalidBoard { board: String, reason: String },
}

/// Board identifier, e.g. `a` or `g`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub String);

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Fully resolved parsing options for one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub allowed_markup: BTreeSet<MarkupKind>,
    pub reference_sigil: String,
    pub nesting_policy: NestingPolicy,
    pub max_depth: usize,
    /// In bytes
    pub max_body_length: usize,
    pub quote_prefix: String,
    pub code_marker: String,
    pub spoiler_open: String,
    pub spoiler_close: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let grammar = Grammar::default();
        Self {
            allowed_markup: grammar.allowed,
            reference_sigil: grammar.reference_sigil,
            nesting_policy: grammar.nesting,
            max_depth: grammar.max_depth,
            max_body_length: 2000,
            quote_prefix: grammar.quote_prefix,
            code_marker: grammar.code_marker,
            spoiler_open: grammar.spoiler_open,
            spoiler_close: grammar.spoiler_close,
        }
    }
}

impl BoardConfig {
    /// The lexer/assembler view of this config.
    pub fn grammar(&self) -> Grammar {
        Grammar {
            allowed: self.allowed_markup.clone(),
            reference_sigil: self.reference_sigil.clone(),
            quote_prefix: self.quote_prefix.clone(),
            code_marker: self.code_marker.clone(),
            spoiler_open: self.spoiler_open.clone(),
            spoiler_close: self.spoiler_close.clone(),
            nesting: self.nesting_policy,
            max_depth: self.max_depth,
        }
    }

    /// Reject enabled markup that has no delimiter to recognize it by.
    pub fn validate(&self, board: &str) -> Result<(), ConfigError> {
        let required = [
            (MarkupKind::Reference, "reference_sigil", &self.reference_sigil),
            (MarkupKind::Quote, "quote_prefix", &self.quote_prefix),
            (MarkupKind::Code, "code_marker", &self.code_marker),
            (MarkupKind::Spoiler, "spoiler_open", &self.spoiler_open),
            (MarkupKind::Spoiler, "spoiler_close", &self.spoiler_close),
        ];
        for (kind, field, value) in required {
            if self.allowed_markup.contains(&kind) && value.is_empty() {
                return Err(ConfigError::InvalidBoard {
                    board: board.to_string(),
                    reason: format!("{field} is empty but {kind:?} markup is enabled"),
                });
            }
        }
        Ok(())
    }
}

/// Partial per-board settings layered over the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_markup: Option<BTreeSet<MarkupKind>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_sigil: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nesting_policy: Option<NestingPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_body_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler_open: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler_close: Option<String>,
}

impl BoardOverrides {
    pub fn apply(&self, base: &BoardConfig) -> BoardConfig {
        let pick = |over: &Option<String>, base: &String| over.clone().unwrap_or_else(|| base.clone());
        BoardConfig {
            allowed_markup: self
                .allowed_markup
                .clone()
                .unwrap_or_else(|| base.allowed_markup.clone()),
            reference_sigil: pick(&self.reference_sigil, &base.reference_sigil),
            nesting_policy: self.nesting_policy.unwrap_or(base.nesting_policy),
            max_depth: self.max_depth.unwrap_or(base.max_depth),
            max_body_length: self.max_body_length.unwrap_or(base.max_body_length),
            quote_prefix: pick(&self.quote_prefix, &base.quote_prefix),
            code_marker: pick(&self.code_marker, &base.code_marker),
            spoiler_open: pick(&self.spoiler_open, &base.spoiler_open),
            spoiler_close: pick(&self.spoiler_close, &base.spoiler_close),
        }
    }
}

/// On-disk layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    defaults: BoardConfig,
    #[serde(default)]
    boards: BTreeMap<String, BoardOverrides>,
}

/// Every board's config, with overrides already merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardConfigs {
    defaults: BoardConfig,
    overrides: BTreeMap<BoardId, BoardOverrides>,
    boards: BTreeMap<BoardId, BoardConfig>,
}

impl BoardConfigs {
    pub fn new(defaults: BoardConfig) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Add or replace a board's overrides.
    pub fn with_board(mut self, board: impl Into<BoardId>, overrides: BoardOverrides) -> Self {
        let board = board.into();
        self.boards
            .insert(board.clone(), overrides.apply(&self.defaults));
        self.overrides.insert(board, overrides);
        self
    }

    pub fn defaults(&self) -> &BoardConfig {
        &self.defaults
    }

    /// Config for `board`, falling back to the defaults.
    pub fn board(&self, board: &BoardId) -> &BoardConfig {
        self.boards.get(board).unwrap_or(&self.defaults)
    }

    pub fn has_board(&self, board: &BoardId) -> bool {
        self.boards.contains_key(board)
    }

    pub fn from_toml_str(content: &str, config_path: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        file.defaults.validate("defaults")?;
        let mut configs = Self::new(file.defaults);
        for (board, overrides) in file.boards {
            overrides.apply(&configs.defaults).validate(&board)?;
            configs = configs.with_board(BoardId(board), overrides);
        }
        Ok(configs)
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let configs = Self::from_toml_str(&content, config_path)?;
        log::debug!(
            "loaded config for {} board(s) from {}",
            configs.boards.len(),
            config_path.display()
        );
        Ok(Some(configs))
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = ConfigFile {
            defaults: self.defaults.clone(),
            boards: self
                .overrides
                .iter()
                .map(|(board, overrides)| (board.0.clone(), overrides.clone()))
                .collect(),
        };
        let content = toml::to_string_pretty(&file)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}
