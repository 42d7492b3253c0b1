//! Cloud provider VM control
//!
//! The power-cycling tests need to kill and revive the VMs behind cluster
//! nodes. Providers implement the small capability set below; selection is
//! explicit via `[cloud]` in the config and happens once at startup, so an
//! unknown provider name fails construction, not first use.

pub mod vmware;

use crate::config::CloudConfig;
use crate::error::{ConfigError, HarnessError, Result};
use async_trait::async_trait;

/// Power state of a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
}

impl PowerState {
    /// Normalize a provider-reported state string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "poweredon" | "powered_on" | "on" => Ok(PowerState::PoweredOn),
            "poweredoff" | "powered_off" | "off" => Ok(PowerState::PoweredOff),
            "suspended" => Ok(PowerState::Suspended),
            other => Err(HarnessError::CloudProvider {
                provider: "unknown".to_string(),
                message: format!("unrecognized power state {:?}", other),
                source: None,
            }),
        }
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PowerState::PoweredOn => "poweredOn",
            PowerState::PoweredOff => "poweredOff",
            PowerState::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

/// Capability set every VM provider implements.
#[async_trait]
pub trait CloudProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Resolve the provider-side VM name from a node's IP or hostname.
    async fn find_vm_name_by_ip_or_hostname(&self, ip_or_hostname: &str) -> Result<String>;

    async fn vm_power_state(&self, name: &str) -> Result<PowerState>;

    async fn power_on(&self, name: &str) -> Result<()>;

    async fn power_off(&self, name: &str) -> Result<()>;

    /// Wait until the guest reports a hostname (set late in boot) and
    /// return it.
    async fn wait_for_hostname(&self, name: &str, timeout: u64, interval: u64) -> Result<String>;
}

/// Build the configured provider. Unsupported names fail here, before any
/// polling starts.
pub fn from_config(config: &CloudConfig) -> Result<Box<dyn CloudProvider>> {
    match config.provider.as_str() {
        "vmware" => Ok(Box::new(vmware::VmWare::new(config)?)),
        other => Err(ConfigError::InvalidProvider(other.to_string()).into()),
    }
}
