//! Common types and configuration for the wait indicator

use serde::{Deserialize, Serialize};

use crate::error::{ArgumentError, ConfigError, ConfigResult};

/// Configuration for the wait indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitIndicatorConfig {
    /// Name of the thread spawned by [`crate::scheduler::ForegroundThread`]
    pub foreground_thread_name: String,

    /// Whether asynchronous operations run inside the tokio runtime that
    /// initialized the instance, so they can spawn work and use timers
    pub enter_runtime: bool,
}

impl Default for WaitIndicatorConfig {
    fn default() -> Self {
        Self {
            foreground_thread_name: "wait-indicator-foreground".to_string(),
            enter_runtime: true,
        }
    }
}

impl WaitIndicatorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name of the foreground thread
    pub fn with_foreground_thread_name(mut self, name: impl Into<String>) -> ConfigResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        self.foreground_thread_name = name;
        Ok(self)
    }

    /// Enable or disable entering the captured runtime during async waits
    pub fn with_enter_runtime(mut self, enabled: bool) -> Self {
        self.enter_runtime = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.foreground_thread_name.trim().is_empty() {
            return Err(ConfigError::EmptyThreadName);
        }
        Ok(())
    }
}

/// What a wait displays while the operation runs.
///
/// Title and message are optional so requests built from untrusted input can
/// be rejected with an argument error instead of being silently defaulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitRequest {
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub cancelable: bool,
}

impl WaitRequest {
    /// Create a non-cancelable request
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            message: Some(message.into()),
            cancelable: false,
        }
    }

    /// Create a request from possibly missing parts
    pub fn from_parts(title: Option<&str>, message: Option<&str>, cancelable: bool) -> Self {
        Self {
            title: title.map(str::to_string),
            message: message.map(str::to_string),
            cancelable,
        }
    }

    /// Set whether the user may cancel the wait
    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }

    /// Returns the title and message, failing if either is missing
    pub fn validate(&self) -> Result<(&str, &str), ArgumentError> {
        let title = self.title.as_deref().ok_or(ArgumentError::null("title"))?;
        let message = self.message.as_deref().ok_or(ArgumentError::null("message"))?;
        Ok((title, message))
    }
}
