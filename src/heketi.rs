//! Heketi volume-management service
//!
//! Heketi is the REST service that allocates gluster volumes for the
//! provisioner. The harness only needs two things from it directly: a
//! liveness probe (the unauthenticated `/hello` endpoint) for the outage
//! tests, and verification that volumes created through a storage class
//! carry the configured name prefix.

use crate::error::{HarnessError, Result};
use crate::openshift::Cluster;
use crate::waiter::Waiter;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct HeketiClient {
    server: String,
    client: reqwest::Client,
}

impl HeketiClient {
    pub fn new(server: impl Into<String>) -> Result<Self> {
        let server = server.into();
        let server = server.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { server, client })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    /// Liveness probe against `GET /hello`.
    pub async fn hello(&self) -> Result<()> {
        let url = format!("{}/hello", self.server);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(HarnessError::Heketi(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }
        Ok(())
    }

    /// Poll `/hello` until heketi answers.
    pub async fn wait_until_up(&self, timeout: u64, interval: u64) -> Result<()> {
        let mut w = Waiter::from_secs(timeout, interval);
        while w.next().await {
            match self.hello().await {
                Ok(()) => {
                    info!(server = %self.server, "heketi is up");
                    return Ok(());
                }
                Err(e) => debug!(server = %self.server, error = %e, "heketi not up yet"),
            }
        }
        Err(HarnessError::Timeout {
            what: format!("heketi at {} to answer", self.server),
            seconds: timeout,
        })
    }

    /// Check that the gluster volume backing `pvc` carries the configured
    /// `volumenameprefix` (heketi names such volumes
    /// `<prefix>_<namespace>_<pvc>_<uuid>`).
    pub async fn verify_volume_name_prefix(
        &self,
        cluster: &Cluster,
        prefix: &str,
        namespace: &str,
        pvc: &str,
    ) -> Result<bool> {
        let volume = cluster.gluster_volume_for_pvc(pvc).await?;
        let expected = format!("{}_{}_{}", prefix, namespace, pvc);
        debug!(volume = %volume, expected = %expected, "checking volume name prefix");
        Ok(volume.starts_with(&expected))
    }
}
