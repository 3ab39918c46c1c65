use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// What a drain does when a reversal action returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReversalFailurePolicy {
    /// Log the failure and keep reversing the remaining operations.
    #[default]
    Continue,
    /// Stop reversing; the remaining operations are discarded un-reversed.
    Abort,
}

/// How the asynchronous executor runs reversal actions during a drain.
///
/// Blocking executors always reverse inline and ignore this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispatchMode {
    /// Await every reversal, in LIFO order, before reporting the failure.
    #[default]
    Await,
    /// Spawn each reversal onto the runtime and report the failure right away.
    ///
    /// The caller may observe the failure before the reversals finish, and
    /// detached reversals may complete in any order. The reversal failure
    /// policy does not apply.
    Detached,
}

/// Settings shared by the blocking and asynchronous executors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecutorConfig {
    on_reversal_failure: ReversalFailurePolicy,
    dispatch: DispatchMode,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    transactions: ExecutorConfig,
}

impl ExecutorConfig {
    #[must_use]
    pub fn on_reversal_failure(&self) -> ReversalFailurePolicy {
        self.on_reversal_failure
    }

    #[must_use]
    pub fn dispatch(&self) -> DispatchMode {
        self.dispatch
    }

    #[must_use]
    pub fn with_reversal_failure(mut self, policy: ReversalFailurePolicy) -> Self {
        self.on_reversal_failure = policy;
        self
    }

    #[must_use]
    pub fn with_dispatch(mut self, dispatch: DispatchMode) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Parse the `[transactions]` table of a TOML document.
    ///
    /// A document without that table yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the document is not valid TOML or the
    /// table holds unknown values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Ok(file.transactions)
    }

    /// Load the `[transactions]` table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, or
    /// `ConfigError::Parse` if its content is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
