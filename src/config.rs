//! Configuration System
//!
//! Hierarchical configuration loading, the same three-tier merge the rest of
//! the `inputlayer` family uses:
//! - `config.toml` (default configuration)
//! - `config.local.toml` (git-ignored local overrides)
//! - Environment variables (`LVMC_` prefix)
//!
//! ```bash
//! LVMC_CODEGEN__PARALLEL_MODE=fork
//! LVMC_CODEGEN__INDIRECT_ARITY_THRESHOLD=16
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level compiler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Code-generation knobs.
    #[serde(default)]
    pub codegen: CodegenConfig,
    /// Logging knobs.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the code generator lowers `Parallel` statement blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParallelMode {
    /// Children emitted in sequence (the documented current
    /// behaviour; the fork scaffolding is otherwise dead code).
    Serial,
    /// Children emitted behind a fork/join opcode pair, one label per
    /// branch. Still executed by a single-threaded interpreter in this
    /// crate; the point is to stop shipping unreachable lowering code.
    Fork,
}

impl Default for ParallelMode {
    fn default() -> Self {
        ParallelMode::Serial
    }
}

/// Code-generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Relations with arity strictly greater than this threshold are always
    /// encoded with [`crate::relation::StorageKind::Indirect`].
    #[serde(default = "default_indirect_arity_threshold")]
    pub indirect_arity_threshold: usize,

    /// Bit width of a machine word; also the number of type-mask bits
    /// packed per word in existence-check/indexed-scan operands.
    #[serde(default = "default_word_bits")]
    pub word_bits: u32,

    /// Lowering strategy for `Parallel` statement blocks.
    #[serde(default)]
    pub parallel_mode: ParallelMode,
}

fn default_indirect_arity_threshold() -> usize {
    12
}

fn default_word_bits() -> u32 {
    64
}

impl Default for CodegenConfig {
    fn default() -> Self {
        CodegenConfig {
            indirect_arity_threshold: default_indirect_arity_threshold(),
            word_bits: default_word_bits(),
            parallel_mode: ParallelMode::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            codegen: CodegenConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default locations, merging
    /// `config.toml`, then `config.local.toml`, then `LVMC_`-prefixed
    /// environment variables, each overriding the last.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("LVMC_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path, still applying the
    /// environment-variable overlay.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("LVMC_").split("__"))
            .extract()
    }
}

/// Initialise a `tracing` subscriber according to [`LoggingConfig`].
///
/// Safe to call more than once per process (e.g. from multiple test
/// binaries); subsequent calls are no-ops if a global subscriber is already
/// installed.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    // A previously-installed global subscriber is not an error for us.
    let _ = result;
}
