//! Configuration module for the SV publisher
//!
//! This module handles the publisher's startup configuration:
//! - Capacity limits for channels and values
//! - The configuration file model ([`PublisherConfig`])
//! - Stream addressing for the Ethernet transport ([`StreamSettings`])
//! - Signal tunables ([`SignalSettings`], in [`settings`])
//!
//! # File Location
//!
//! Without an explicit path the binary looks for `svpub.toml` in the
//! platform configuration directory under [`APP_ID`]:
//! - **Linux**: `~/.config/svpub/svpub.toml`
//! - **macOS**: `~/Library/Application Support/svpub/svpub.toml`
//!
//! Files ending in `.json` are read as JSON, everything else as TOML.
//!
//! # Example
//!
//! ```toml
//! interface = "eth0"
//!
//! [signal]
//! sample_rate = 80
//! hertz = 50
//! amplitude = 230.0
//!
//! [[channels]]
//! name = "svpub1"
//! values = ["sine", "timestamp"]
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, ResultExt, SvPubError};
use crate::transport::encoding::{parse_mac, SvFrameEncoder, VlanTag, DEFAULT_APP_ID};
use crate::types::ValueMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for configuration directories
pub const APP_ID: &str = "svpub";

/// Default configuration filename
pub const CONFIG_FILE: &str = "svpub.toml";

/// Maximum number of channels per publisher
pub const MAX_CHANNELS: usize = 8;

/// Maximum number of values per channel
pub const MAX_VALUES_PER_CHANNEL: usize = 8;

/// Interface used when none is configured (loopback)
pub const DEFAULT_INTERFACE: &str = "lo";

/// Name of the channel created by default
pub const DEFAULT_CHANNEL_NAME: &str = "svpub1";

// ==================== Config Directory ====================

/// Get the application configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default configuration file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Stream Settings ====================

/// Link-layer addressing of the published stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Destination MAC (`aa:bb:cc:dd:ee:ff`)
    pub destination_mac: String,
    /// Application identifier
    pub app_id: u16,
    /// Configuration revision
    pub conf_rev: u32,
    /// Synchronisation indicator
    pub smp_synch: u8,
    /// Whether frames carry an 802.1Q tag
    pub vlan_tagged: bool,
    /// 802.1Q priority (0-7)
    pub vlan_priority: u8,
    /// 802.1Q VLAN id (0-4095)
    pub vlan_id: u16,
}

impl Default for StreamSettings {
    fn default() -> Self {
        let vlan = VlanTag::default();
        Self {
            destination_mac: "01:0c:cd:04:00:01".to_string(),
            app_id: DEFAULT_APP_ID,
            conf_rev: 1,
            smp_synch: 0,
            vlan_tagged: true,
            vlan_priority: vlan.priority,
            vlan_id: vlan.id,
        }
    }
}

impl StreamSettings {
    /// Check addressing fields
    pub fn validate(&self) -> Result<()> {
        parse_mac(&self.destination_mac)?;
        if self.vlan_priority > 7 {
            return Err(SvPubError::InvalidParameter(format!(
                "vlan_priority {} outside 0..=7",
                self.vlan_priority
            )));
        }
        if self.vlan_id > 0x0FFF {
            return Err(SvPubError::InvalidParameter(format!(
                "vlan_id {} outside 0..=4095",
                self.vlan_id
            )));
        }
        Ok(())
    }

    /// Build a frame encoder sending from `source`
    pub fn encoder(&self, source: [u8; 6]) -> Result<SvFrameEncoder> {
        let vlan = self.vlan_tagged.then_some(VlanTag {
            priority: self.vlan_priority,
            id: self.vlan_id,
        });
        Ok(SvFrameEncoder::new(source)
            .with_destination(parse_mac(&self.destination_mac)?)
            .with_vlan(vlan)
            .with_app_id(self.app_id)
            .with_conf_rev(self.conf_rev)
            .with_smp_synch(self.smp_synch))
    }
}

// ==================== Channel Layout ====================

/// Startup layout of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name (becomes the stream identifier)
    pub name: String,
    /// Value modes in wire order
    #[serde(default)]
    pub values: Vec<ValueMode>,
}

impl ChannelConfig {
    /// Create a channel layout
    pub fn new(name: impl Into<String>, values: Vec<ValueMode>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

// ==================== Publisher Config ====================

/// Complete startup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Network interface to publish on
    pub interface: String,
    /// Channels created at startup
    pub channels: Vec<ChannelConfig>,
    /// Signal tunables
    pub signal: SignalSettings,
    /// Link-layer addressing
    pub stream: StreamSettings,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            channels: vec![ChannelConfig::new(
                DEFAULT_CHANNEL_NAME,
                vec![ValueMode::Manual],
            )],
            signal: SignalSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl PublisherConfig {
    /// Load a configuration file (JSON for `.json`, TOML otherwise)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SvPubError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content)
                .map_err(|e| SvPubError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            toml::from_str(&content)
                .map_err(|e| SvPubError::Config(format!("Failed to parse config: {}", e)))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the file at the default location, falling back to defaults if absent
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Save to a file (JSON for `.json`, TOML otherwise)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| SvPubError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| SvPubError::Config(format!("Failed to serialize config: {}", e)))?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SvPubError::Config(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| SvPubError::Config(format!("Failed to write config: {}", e)))
    }

    /// Check limits and ranges
    pub fn validate(&self) -> Result<()> {
        if self.interface.is_empty() {
            return Err(SvPubError::Config("interface must not be empty".to_string()));
        }
        if self.channels.len() > MAX_CHANNELS {
            return Err(SvPubError::CapacityExceeded {
                what: "channels",
                max: MAX_CHANNELS,
            });
        }
        if let Some(channel) = self
            .channels
            .iter()
            .find(|c| c.values.len() > MAX_VALUES_PER_CHANNEL)
        {
            return Err(SvPubError::Config(format!(
                "channel '{}' has {} values, at most {} allowed",
                channel.name,
                channel.values.len(),
                MAX_VALUES_PER_CHANNEL
            )));
        }
        self.signal.validate()?;
        self.stream.validate()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
