//! Node lifecycle operations
//!
//! Reboot and power-cycle the machines behind cluster nodes and wait for
//! them to come back. The cloud provider is passed in explicitly by the
//! caller; there is no process-wide provider singleton.

use crate::cloud::CloudProvider;
use crate::error::{HarnessError, Result};
use crate::remote::Executor;
use crate::waiter::Waiter;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reboot `node` over SSH and wait up to `timeout` seconds for it to
/// accept connections again.
pub async fn reboot_by_command(
    exec: &Executor,
    node: &str,
    timeout: u64,
    interval: u64,
) -> Result<()> {
    info!(node, "rebooting");
    // The delay keeps the channel alive long enough for the command to be
    // accepted; sshd then dies underneath us, so a severed connection is
    // the expected outcome.
    let cmd = "sleep 3; /sbin/shutdown -r now 'Reboot triggered by ocs-harness'";
    match exec.run(node, cmd).await {
        Ok(out) if out.success() => {}
        Ok(out) => {
            // Exit 255 is the connection dropping before an exit status
            // arrives; anything else means shutdown itself failed.
            if out.exit_code != 255 {
                return Err(HarnessError::CommandFailed {
                    host: node.to_string(),
                    command: cmd.to_string(),
                    exit_code: out.exit_code,
                    stderr: out.stderr.trim().to_string(),
                });
            }
            debug!(node, "connection severed by reboot");
        }
        // run() only errors before the command starts, so a node we never
        // reached is not rebooting.
        Err(e) => return Err(e),
    }

    // The node restarts 3s after the command lands.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut w = Waiter::from_secs(timeout, interval);
    while w.next().await {
        match exec.run(node, "true").await {
            Ok(out) if out.success() => {
                info!(node, "node is back");
                return Ok(());
            }
            Ok(out) => debug!(node, exit = out.exit_code, "node not ready yet"),
            Err(e) => debug!(node, error = %e, "node not reachable yet"),
        }
    }
    Err(HarnessError::Timeout {
        what: format!("node {} to be reachable after reboot", node),
        seconds: timeout,
    })
}

/// Wait until `host` answers a trivial command over SSH.
pub async fn wait_for_ssh_connection(
    exec: &Executor,
    host: &str,
    timeout: u64,
    interval: u64,
) -> Result<()> {
    let mut w = Waiter::from_secs(timeout, interval);
    while w.next().await {
        match exec.run(host, "ls").await {
            Ok(out) if out.success() => return Ok(()),
            Ok(out) => debug!(host, exit = out.exit_code, "ssh probe failed"),
            Err(e) => debug!(host, error = %e, "waiting for ssh connection"),
        }
    }
    Err(HarnessError::Timeout {
        what: format!("ssh connection to {}", host),
        seconds: timeout,
    })
}

/// Hard power off the VM behind a node.
pub async fn power_off_vm(provider: &dyn CloudProvider, name: &str) -> Result<()> {
    provider.power_off(name).await?;
    info!(vm = name, "powered off");
    Ok(())
}

/// Power on the VM behind a node and wait for it to be usable: first for
/// the guest to report a hostname, then for SSH on that hostname.
pub async fn power_on_vm(
    provider: &dyn CloudProvider,
    exec: &Executor,
    name: &str,
    timeout: u64,
    interval: u64,
) -> Result<()> {
    provider.power_on(name).await?;
    info!(vm = name, "powered on");

    // One time budget covers both waits.
    let mut w = Waiter::from_secs(timeout, interval);
    let mut hostname = None;
    while w.next().await {
        match provider.wait_for_hostname(name, 1, 1).await {
            Ok(h) => {
                hostname = Some(h);
                break;
            }
            Err(e) => debug!(vm = name, error = %e, "no hostname yet"),
        }
    }
    let hostname = match hostname {
        Some(h) => h,
        None => {
            return Err(HarnessError::Timeout {
                what: format!("vm {} to report a hostname after power on", name),
                seconds: timeout,
            })
        }
    };

    while w.next().await {
        match wait_for_ssh_connection(exec, &hostname, 1, 1).await {
            Ok(()) => {
                info!(vm = name, %hostname, "vm is up and reachable");
                return Ok(());
            }
            Err(e) => debug!(vm = name, error = %e, "ssh not ready yet"),
        }
    }
    warn!(vm = name, %hostname, "vm powered on but ssh never came up");
    Err(HarnessError::Timeout {
        what: format!("ssh connection to {} after power on", hostname),
        seconds: timeout,
    })
}
