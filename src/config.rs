//! Harness configuration
//!
//! Everything the harness needs to reach a cluster lives in one TOML file:
//! the master/storage nodes and SSH credentials, the storage-class
//! parameters handed to the provisioner, the heketi service location, and
//! (optionally) cloud-provider credentials for VM power operations.
//!
//! Lookup order: explicit `--config` path, `./ocs-harness.toml`, then
//! `~/.config/ocs-harness/config.toml`. An explicit path that does not
//! exist is an error; for the implicit locations a missing file is too,
//! since there are no sensible defaults for cluster hostnames.

use crate::error::{ConfigError, HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    pub cluster: ClusterConfig,
    pub storage_class: StorageClassConfig,
    pub secret: SecretConfig,
    pub heketi: HeketiConfig,
    pub cloud: Option<CloudConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Master node where `oc` commands run
    pub master: String,
    pub user: String,
    /// SSH private key, `~` expanded on load
    pub key_path: String,
    /// Storage nodes, in topology order
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageClassConfig {
    pub resturl: String,
    pub restuser: String,
    pub secret_namespace: String,
    #[serde(default = "default_provisioner")]
    pub provisioner: String,
    pub volume_name_prefix: Option<String>,
}

fn default_provisioner() -> String {
    "kubernetes.io/glusterfs".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    pub namespace: String,
    #[serde(default = "default_secret_type")]
    pub secret_type: String,
    /// Heketi admin key stored in the secret
    pub key: String,
}

fn default_secret_type() -> String {
    "kubernetes.io/glusterfs".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeketiConfig {
    /// Deployment controller running the heketi pod
    pub dc_name: String,
    pub namespace: String,
    /// Base URL of the heketi REST service
    pub server: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Provider name; only "vmware" is supported
    pub provider: String,
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub insecure: bool,
}

impl HarnessConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.display().to_string()).into());
                }
                p.to_path_buf()
            }
            None => {
                let local = PathBuf::from("ocs-harness.toml");
                if local.exists() {
                    local
                } else {
                    let fallback = dirs::config_dir()
                        .map(|d| d.join("ocs-harness").join("config.toml"))
                        .unwrap_or(local);
                    if !fallback.exists() {
                        return Err(ConfigError::NotFound(
                            "ocs-harness.toml (run 'ocsctl init' to create one)".to_string(),
                        )
                        .into());
                    }
                    fallback
                }
            }
        };

        let content = std::fs::read_to_string(&config_path)?;
        let mut config: HarnessConfig = toml::from_str(&content).map_err(|e| {
            HarnessError::Config(ConfigError::ParseError(format!(
                "{}: {}",
                config_path.display(),
                e
            )))
        })?;

        config.cluster.key_path = shellexpand::tilde(&config.cluster.key_path).into_owned();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HarnessError::Config(ConfigError::ParseError(e.to_string())))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.cluster.master.is_empty() {
            return Err(ConfigError::MissingField("cluster.master".to_string()).into());
        }
        if self.storage_class.resturl.is_empty() {
            return Err(ConfigError::MissingField("storage_class.resturl".to_string()).into());
        }
        Ok(())
    }

    /// Template config written by `ocsctl init`.
    pub fn example() -> Self {
        Self {
            cluster: ClusterConfig {
                master: "master.example.com".to_string(),
                user: "root".to_string(),
                key_path: "~/.ssh/id_rsa".to_string(),
                nodes: vec![
                    "node1.example.com".to_string(),
                    "node2.example.com".to_string(),
                    "node3.example.com".to_string(),
                ],
            },
            storage_class: StorageClassConfig {
                resturl: "http://heketi-storage.example.com:8080".to_string(),
                restuser: "admin".to_string(),
                secret_namespace: "glusterfs".to_string(),
                provisioner: default_provisioner(),
                volume_name_prefix: Some("autotests".to_string()),
            },
            secret: SecretConfig {
                namespace: "glusterfs".to_string(),
                secret_type: default_secret_type(),
                key: "admin-key".to_string(),
            },
            heketi: HeketiConfig {
                dc_name: "heketi-storage".to_string(),
                namespace: "glusterfs".to_string(),
                server: "http://heketi-storage.example.com:8080".to_string(),
            },
            cloud: Some(CloudConfig {
                provider: "vmware".to_string(),
                endpoint: Some("https://vcenter.example.com/sdk".to_string()),
                username: Some("administrator@vsphere.local".to_string()),
                password: Some("changeme".to_string()),
                insecure: true,
            }),
        }
    }
}

pub fn init_config(output: &Path) -> Result<()> {
    HarnessConfig::example().save(output)?;
    println!("Created config file: {}", output.display());
    Ok(())
}
