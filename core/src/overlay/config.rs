//! Overlay configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which of the two overlay protocols this node speaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlayMode {
    /// Free-text messages into the inbox
    #[default]
    Text,
    /// Lamport clock synchronization with a bootstrap timer
    Clock,
}

impl FromStr for OverlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "clock" => Ok(Self::Clock),
            other => Err(format!("unknown overlay mode '{}' (expected text or clock)", other)),
        }
    }
}

impl fmt::Display for OverlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Clock => f.write_str("clock"),
        }
    }
}

/// Configuration for a [`MessageOverlay`](super::MessageOverlay)
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub mode: OverlayMode,

    /// Period of the bootstrap timer (clock mode). First tick is immediate.
    pub bootstrap_interval: Duration,

    /// Sent once to every known peer when the runtime starts (text mode)
    pub greeting: Option<String>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            mode: OverlayMode::Text,
            bootstrap_interval: Duration::from_secs(5),
            greeting: None,
        }
    }
}

impl OverlayConfig {
    /// Clock-synchronizing overlay with the default bootstrap period
    pub fn clock() -> Self {
        Self {
            mode: OverlayMode::Clock,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OverlayConfig::default();
        assert_eq!(config.mode, OverlayMode::Text);
        assert_eq!(config.bootstrap_interval, Duration::from_secs(5));
        assert!(config.greeting.is_none());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("text".parse::<OverlayMode>(), Ok(OverlayMode::Text));
        assert_eq!("Clock".parse::<OverlayMode>(), Ok(OverlayMode::Clock));
        assert!("lamport".parse::<OverlayMode>().is_err());
        assert_eq!(OverlayMode::Clock.to_string(), "clock");
    }
}
