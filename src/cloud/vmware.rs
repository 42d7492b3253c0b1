//! vSphere provider backed by the `govc` CLI
//!
//! All vCenter access goes through `govc` with credentials passed in the
//! `GOVC_*` environment, so nothing here speaks SOAP directly. The binary
//! is located at construction time; a missing `govc` fails configuration,
//! not the first power operation.

use super::{CloudProvider, PowerState};
use crate::config::CloudConfig;
use crate::error::{ConfigError, HarnessError, Result};
use crate::waiter::Waiter;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct VmWare {
    govc: PathBuf,
    url: String,
    username: String,
    password: String,
    insecure: bool,
}

impl VmWare {
    pub fn new(config: &CloudConfig) -> Result<Self> {
        let govc = which::which("govc").map_err(|e| HarnessError::CloudProvider {
            provider: "vmware".to_string(),
            message: "govc binary not found in PATH".to_string(),
            source: Some(Box::new(e)),
        })?;
        let url = require(&config.endpoint, "cloud.endpoint")?;
        let username = require(&config.username, "cloud.username")?;
        let password = require(&config.password, "cloud.password")?;
        Ok(Self {
            govc,
            url,
            username,
            password,
            insecure: config.insecure,
        })
    }

    async fn govc(&self, args: &[&str]) -> Result<String> {
        debug!(?args, "running govc");
        let output = Command::new(&self.govc)
            .args(args)
            .env("GOVC_URL", &self.url)
            .env("GOVC_USERNAME", &self.username)
            .env("GOVC_PASSWORD", &self.password)
            .env("GOVC_INSECURE", if self.insecure { "1" } else { "0" })
            .output()
            .await?;
        if !output.status.success() {
            return Err(HarnessError::CloudProvider {
                provider: "vmware".to_string(),
                message: format!(
                    "govc {} failed: {}",
                    args.first().unwrap_or(&""),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                source: None,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn vm_info(&self, name: &str) -> Result<Value> {
        let out = self.govc(&["vm.info", "-json", name]).await?;
        let parsed: Value = serde_json::from_str(&out)?;
        // Key casing differs across govc releases.
        let vm = parsed["virtualMachines"][0]
            .as_object()
            .or_else(|| parsed["VirtualMachines"][0].as_object())
            .cloned()
            .ok_or_else(|| HarnessError::CloudProvider {
                provider: "vmware".to_string(),
                message: format!("vm {:?} not found", name),
                source: None,
            })?;
        Ok(Value::Object(vm))
    }
}

fn require(field: &Option<String>, name: &str) -> Result<String> {
    field
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingField(name.to_string()).into())
}

fn json_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| value[k].as_str())
}

#[async_trait]
impl CloudProvider for VmWare {
    fn name(&self) -> &'static str {
        "vmware"
    }

    async fn find_vm_name_by_ip_or_hostname(&self, ip_or_hostname: &str) -> Result<String> {
        // Try the guest IP first, then the guest hostname.
        for flag in ["-guest.ipAddress", "-guest.hostName"] {
            let out = self
                .govc(&["find", "/", "-type", "m", flag, ip_or_hostname])
                .await?;
            if let Some(path) = out.lines().next() {
                let name = path.rsplit('/').next().unwrap_or(path).to_string();
                info!(vm = %name, query = ip_or_hostname, "resolved vm name");
                return Ok(name);
            }
        }
        Err(HarnessError::CloudProvider {
            provider: "vmware".to_string(),
            message: format!("no vm found for {:?}", ip_or_hostname),
            source: None,
        })
    }

    async fn vm_power_state(&self, name: &str) -> Result<PowerState> {
        let vm = self.vm_info(name).await?;
        let runtime = vm
            .get("runtime")
            .or_else(|| vm.get("Runtime"))
            .cloned()
            .unwrap_or(Value::Null);
        let state = json_str(&runtime, &["powerState", "PowerState"]).ok_or_else(|| {
            HarnessError::CloudProvider {
                provider: "vmware".to_string(),
                message: format!("vm {:?} reported no power state", name),
                source: None,
            }
        })?;
        PowerState::parse(state)
    }

    async fn power_on(&self, name: &str) -> Result<()> {
        info!(vm = name, "powering on");
        self.govc(&["vm.power", "-on", name]).await?;
        Ok(())
    }

    async fn power_off(&self, name: &str) -> Result<()> {
        // Hard off: the failure tests want an abrupt power loss, not a
        // guest shutdown.
        info!(vm = name, "powering off");
        self.govc(&["vm.power", "-off", "-force", name]).await?;
        Ok(())
    }

    async fn wait_for_hostname(&self, name: &str, timeout: u64, interval: u64) -> Result<String> {
        let mut w = Waiter::from_secs(timeout, interval);
        while w.next().await {
            match self.vm_info(name).await {
                Ok(vm) => {
                    let guest = vm
                        .get("guest")
                        .or_else(|| vm.get("Guest"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    if let Some(hostname) = json_str(&guest, &["hostName", "HostName"]) {
                        if !hostname.is_empty() {
                            info!(vm = name, hostname, "guest hostname assigned");
                            return Ok(hostname.to_string());
                        }
                    }
                    debug!(vm = name, "no guest hostname yet");
                }
                Err(e) => debug!(vm = name, error = %e, "vm.info failed, retrying"),
            }
        }
        Err(HarnessError::Timeout {
            what: format!("vm {} to report a hostname", name),
            seconds: timeout,
        })
    }
}
