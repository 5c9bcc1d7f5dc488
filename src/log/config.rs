// Log config

use crate::utils::get_env_bool;

/// Logger configuration
#[derive(Clone)]
pub struct LogConfig {
    // Prefix for all the logs
    pub prefix: String,

    // Error messages enabled?
    pub error_enabled: bool,

    // Warning messages enabled?
    pub warning_enabled: bool,

    // Info messages enabled?
    pub info_enabled: bool,

    // Debug messages enabled?
    pub debug_enabled: bool,
}

impl LogConfig {
    /// Loads the log configuration from environment variables
    ///
    /// # Return value
    ///
    /// A configuration with each level toggled by LOG_ERROR, LOG_WARNING,
    /// LOG_INFO and LOG_DEBUG (errors, warnings and info default to enabled)
    pub fn from_env() -> LogConfig {
        LogConfig {
            prefix: "".to_string(),
            error_enabled: get_env_bool("LOG_ERROR", true),
            warning_enabled: get_env_bool("LOG_WARNING", true),
            info_enabled: get_env_bool("LOG_INFO", true),
            debug_enabled: get_env_bool("LOG_DEBUG", false),
        }
    }

    /// Creates a child configuration for a child logger
    ///
    /// The prefix parameter will be added to the parent's prefix
    ///
    /// Returns a new configuration for the child logger
    pub fn child_config(&self, prefix: &str) -> LogConfig {
        LogConfig {
            prefix: format!("{}{}", self.prefix, prefix),
            error_enabled: self.error_enabled,
            warning_enabled: self.warning_enabled,
            info_enabled: self.info_enabled,
            debug_enabled: self.debug_enabled,
        }
    }
}
