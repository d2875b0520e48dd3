//! Configuration management for the MSC bridge
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

pub use watcher::ConfigWatcher;

use crate::address::{parse_tracked_list, ConsoleDialect, TrackedExecutor};
use crate::ingest::{ALL_CALL_DEVICE_ID, GROUP_DEVICE_ID_BASE};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub transmitter: TransmitterConfig,
    #[serde(default)]
    pub receiver: ReceiverConfig,
    #[serde(default)]
    pub bounds: BoundsConfig,
    /// Comma separated `executor[.page]` list exposed as variables
    #[serde(default)]
    pub tracked_executors: String,
}

/// Console specific configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub dialect: ConsoleDialect,
}

/// Outbound MSC link (bridge => console MSC In)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransmitterConfig {
    #[serde(default = "default_tx_address")]
    pub address: String,
    /// Destination port, no transmitter is bound when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default = "default_device_id")]
    pub device_id: u8,
    #[serde(default = "default_group_id")]
    pub group_id: u8,
    #[serde(default)]
    pub send_to: SendTo,
}

/// Who should react on transmitted messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendTo {
    #[default]
    All,
    Device,
    Group,
}

impl TransmitterConfig {
    /// MSC device id outbound messages are addressed to
    pub fn target_device_id(&self) -> u8 {
        match self.send_to {
            SendTo::All => ALL_CALL_DEVICE_ID,
            SendTo::Device => self.device_id,
            SendTo::Group => GROUP_DEVICE_ID_BASE.saturating_add(self.group_id),
        }
    }
}

/// Inbound MSC link (console MSC Out => bridge)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReceiverConfig {
    #[serde(default = "default_rx_address")]
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default = "default_device_id")]
    pub device_id: u8,
    #[serde(default = "default_group_id")]
    pub group_id: u8,
    #[serde(default)]
    pub enabled: bool,
}

/// Inclusive numeric range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Range {
    pub min: i64,
    pub max: i64,
}

impl Range {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Bounds applied to action options before anything is sent
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BoundsConfig {
    #[serde(default = "default_executor_range")]
    pub executor: Range,
    #[serde(default = "default_page_range")]
    pub page: Range,
    #[serde(default = "default_fade_max")]
    pub fade_max: f64,
    #[serde(rename = "macro", default = "default_macro_range")]
    pub macro_number: Range,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        // Validate the loaded configuration
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Dialect used for every address compilation of this instance
    pub fn dialect(&self) -> ConsoleDialect {
        self.console.dialect
    }

    /// Parsed tracked executor list
    pub fn tracked(&self) -> Result<Vec<TrackedExecutor>> {
        parse_tracked_list(&self.tracked_executors)
            .context("Invalid tracked_executors list")
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if let Some(port) = self.transmitter.port {
            validate_port("transmitter", port)?;
        }
        validate_ids("transmitter", self.transmitter.device_id, self.transmitter.group_id)?;
        if self.transmitter.address.trim().is_empty() {
            anyhow::bail!("transmitter address cannot be empty");
        }

        if let Some(port) = self.receiver.port {
            validate_port("receiver", port)?;
        }
        validate_ids("receiver", self.receiver.device_id, self.receiver.group_id)?;
        if self.receiver.enabled && self.receiver.port.is_none() {
            anyhow::bail!("receiver is enabled but has no port");
        }

        // Same port on both sides would loop our own messages back
        if let (Some(tx), Some(rx)) = (self.transmitter.port, self.receiver.port) {
            if tx == rx && self.receiver.enabled {
                anyhow::bail!("transmitter and receiver ports must differ (both are {})", tx);
            }
        }

        let bounds = &self.bounds;
        for (name, range) in [
            ("executor", bounds.executor),
            ("page", bounds.page),
            ("macro", bounds.macro_number),
        ] {
            if range.min > range.max {
                anyhow::bail!("bounds.{} is empty ({})", name, range);
            }
        }
        if bounds.executor.min < 0 {
            anyhow::bail!("bounds.executor cannot go below 0 ({})", bounds.executor);
        }
        if bounds.page.min < 1 {
            anyhow::bail!("bounds.page cannot go below 1 ({})", bounds.page);
        }
        if bounds.fade_max.is_nan() || bounds.fade_max < 0.0 {
            anyhow::bail!("bounds.fade_max must be a non-negative number");
        }

        self.tracked()?;

        Ok(())
    }
}

fn validate_port(side: &str, port: u16) -> Result<()> {
    if !(6000..=6100).contains(&port) {
        anyhow::bail!("{} port {} is invalid (must be 6000-6100)", side, port);
    }
    Ok(())
}

fn validate_ids(side: &str, device_id: u8, group_id: u8) -> Result<()> {
    if device_id > 111 {
        anyhow::bail!("{} device_id {} is invalid (must be 0-111)", side, device_id);
    }
    if !(1..=15).contains(&group_id) {
        anyhow::bail!("{} group_id {} is invalid (must be 1-15)", side, group_id);
    }
    Ok(())
}

impl Default for TransmitterConfig {
    fn default() -> Self {
        Self {
            address: default_tx_address(),
            port: None,
            device_id: default_device_id(),
            group_id: default_group_id(),
            send_to: SendTo::All,
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            address: default_rx_address(),
            port: None,
            device_id: default_device_id(),
            group_id: default_group_id(),
            enabled: false,
        }
    }
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            executor: default_executor_range(),
            page: default_page_range(),
            fade_max: default_fade_max(),
            macro_number: default_macro_range(),
        }
    }
}

// Default value functions
fn default_tx_address() -> String { "255.255.255.255".to_string() }
fn default_rx_address() -> String { "0.0.0.0".to_string() }
fn default_device_id() -> u8 { 1 }
fn default_group_id() -> u8 { 1 }
fn default_executor_range() -> Range { Range::new(0, 127) }
fn default_page_range() -> Range { Range::new(1, 127) }
fn default_fade_max() -> f64 { 3600.0 }
fn default_macro_range() -> Range { Range::new(1, 255) }
