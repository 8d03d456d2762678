//! Board and session configuration.

use std::time::Duration;

use wishtree_store::ColorTag;
use wishtree_topology::{BoardGeometry, DEFAULT_BOARD_SIZE};

use crate::error::{Error, Result};

/// Configuration shared by the synchronizer and the submitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardConfig {
    /// One past the last row; rows run `1..board_size`
    pub board_size: u32,

    /// Longest accepted message, in characters
    pub max_message_len: usize,

    /// Longest kept author name, in characters (longer names are cut)
    pub max_author_len: usize,

    /// Colors a new claim may be given
    pub palette: Vec<ColorTag>,

    /// Author recorded when none is given
    pub anonymous_label: String,

    /// Upper bound on a single claims store request
    pub request_timeout: Duration,

    /// First retry delay after a failed bootstrap or subscribe
    pub retry_base_delay: Duration,

    /// Cap on the retry delay
    pub retry_max_delay: Duration,

    /// Re-read the full board after the live feed reconnects
    pub heal_on_reconnect: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            board_size: DEFAULT_BOARD_SIZE,
            max_message_len: 150,
            max_author_len: 30,
            palette: ColorTag::ALL.to_vec(),
            anonymous_label: "Anonymous".to_string(),
            request_timeout: Duration::from_secs(10),
            retry_base_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_secs(10),
            heal_on_reconnect: true,
        }
    }
}

impl BoardConfig {
    /// Check that the configuration can drive a session.
    pub fn validate(&self) -> Result<()> {
        self.geometry()?;
        if self.palette.is_empty() {
            return Err(Error::InvalidConfig("color palette is empty".into()));
        }
        if self.max_message_len == 0 {
            return Err(Error::InvalidConfig("max message length is zero".into()));
        }
        if self.max_author_len == 0 {
            return Err(Error::InvalidConfig("max author length is zero".into()));
        }
        if self.anonymous_label.trim().is_empty() {
            return Err(Error::InvalidConfig("anonymous label is blank".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig("request timeout is zero".into()));
        }
        Ok(())
    }

    /// Board geometry for the configured size.
    pub fn geometry(&self) -> Result<BoardGeometry> {
        BoardGeometry::new(self.board_size).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Delay before retry number `attempt` (0-based): doubles each time,
    /// capped at `retry_max_delay`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.retry_base_delay
            .checked_mul(factor)
            .map_or(self.retry_max_delay, |d| d.min(self.retry_max_delay))
    }
}
