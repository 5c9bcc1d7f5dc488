// Connection configuration

use crate::rtmp::RTMP_PING_PERIOD_SECONDS;
use crate::utils::{get_env_bool, get_env_u32};

/// Tunables of a single RTMP connection
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Period of the keepalive ping timer, in seconds
    pub ping_period_seconds: u32,

    /// Pre-serialize inbound audio and video payloads into chunk-sized
    /// fragments so they can be forwarded without re-chunking
    pub prechunking_enabled: bool,

    /// Log per-message protocol traffic at debug level
    pub log_requests: bool,
}

impl ConnectionConfig {
    /// Loads the configuration from environment variables
    ///
    /// # Return value
    ///
    /// A configuration taken from RTMP_PING_PERIOD, RTMP_PRECHUNKING and
    /// LOG_REQUESTS, with the defaults filling the gaps
    pub fn from_env() -> ConnectionConfig {
        ConnectionConfig {
            ping_period_seconds: get_env_u32("RTMP_PING_PERIOD", RTMP_PING_PERIOD_SECONDS),
            prechunking_enabled: get_env_bool("RTMP_PRECHUNKING", true),
            log_requests: get_env_bool("LOG_REQUESTS", true),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> ConnectionConfig {
        ConnectionConfig {
            ping_period_seconds: RTMP_PING_PERIOD_SECONDS,
            prechunking_enabled: true,
            log_requests: true,
        }
    }
}
