//! Remote command execution over SSH
//!
//! Every cluster operation in the harness is a command run on some node:
//! `oc` on the master, `gluster` inside storage pods (via `oc rsh`),
//! `shutdown` on a node under test. `Executor` owns the SSH credentials
//! and opens a fresh session per command; the nodes under test reboot and
//! power-cycle, so cached connections would mostly be dead anyway.
//!
//! ssh2 is synchronous, so each command runs under `spawn_blocking`.

use crate::error::{HarnessError, Result};
use ssh2::Session;
use std::io::Read;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const TCP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit status and captured output of one remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs commands on cluster nodes over SSH with a fixed user and key.
#[derive(Debug, Clone)]
pub struct Executor {
    user: String,
    key_path: PathBuf,
}

impl Executor {
    pub fn new(user: impl Into<String>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            user: user.into(),
            key_path: key_path.into(),
        }
    }

    pub fn from_config(cluster: &crate::config::ClusterConfig) -> Self {
        Self::new(cluster.user.clone(), cluster.key_path.clone())
    }

    /// Run `command` on `host`, capturing exit status and output.
    ///
    /// A non-zero exit is not an error here; callers that require success
    /// use [`run_ok`](Self::run_ok). Errors mean the command never started
    /// (resolve, connect, handshake, or auth failed). A connection severed
    /// after the command started comes back as exit 255, the ssh client's
    /// convention for a dropped connection.
    pub async fn run(&self, host: &str, command: &str) -> Result<CommandOutput> {
        let user = self.user.clone();
        let key_path = self.key_path.clone();
        let host_owned = host.to_string();
        let command_owned = command.to_string();

        debug!(host, command, "running remote command");
        tokio::task::spawn_blocking(move || {
            exec_blocking(&user, &key_path, &host_owned, &command_owned)
        })
        .await
        .map_err(|e| HarnessError::Ssh {
            host: host.to_string(),
            message: format!("ssh task panicked: {}", e),
            source: None,
        })?
    }

    /// Run `command` on `host` and return stdout, failing on non-zero exit.
    pub async fn run_ok(&self, host: &str, command: &str) -> Result<String> {
        let out = self.run(host, command).await?;
        if !out.success() {
            return Err(HarnessError::CommandFailed {
                host: host.to_string(),
                command: command.to_string(),
                exit_code: out.exit_code,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout)
    }

    /// Start `command` on `host` without waiting for it.
    ///
    /// The returned job keeps running while the caller does other work
    /// (kill pods, reboot nodes) and is collected with [`RemoteJob::join`].
    pub fn spawn(&self, host: &str, command: &str) -> RemoteJob {
        let exec = self.clone();
        let host = host.to_string();
        let command = command.to_string();
        RemoteJob {
            handle: tokio::spawn(async move { exec.run(&host, &command).await }),
        }
    }
}

/// Handle for a command started with [`Executor::spawn`].
pub struct RemoteJob {
    handle: tokio::task::JoinHandle<Result<CommandOutput>>,
}

impl RemoteJob {
    /// Block until the remote command completes and return its output.
    pub async fn join(self) -> Result<CommandOutput> {
        self.handle.await.map_err(|e| HarnessError::Ssh {
            host: "<remote job>".to_string(),
            message: format!("background command task failed: {}", e),
            source: None,
        })?
    }
}

fn severed(
    host: &str,
    phase: &str,
    err: &dyn std::fmt::Display,
    stdout: String,
    stderr: String,
) -> CommandOutput {
    debug!(host, phase, error = %err, "connection lost after exec, reporting exit 255");
    CommandOutput {
        exit_code: 255,
        stdout,
        stderr,
    }
}

fn ssh_err(host: &str, message: String, source: ssh2::Error) -> HarnessError {
    HarnessError::Ssh {
        host: host.to_string(),
        message,
        source: Some(Box::new(source)),
    }
}

fn exec_blocking(user: &str, key_path: &Path, host: &str, command: &str) -> Result<CommandOutput> {
    let addr = if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:22", host)
    };
    let sock_addr: std::net::SocketAddr = addr
        .parse()
        .or_else(|_| {
            use std::net::ToSocketAddrs;
            addr.to_socket_addrs()
                .map_err(|e| HarnessError::Ssh {
                    host: host.to_string(),
                    message: format!("failed to resolve {}: {}", addr, e),
                    source: None,
                })
                .and_then(|mut addrs| {
                    addrs.next().ok_or_else(|| HarnessError::Ssh {
                        host: host.to_string(),
                        message: format!("no address for {}", addr),
                        source: None,
                    })
                })
        })?;
    let tcp =
        TcpStream::connect_timeout(&sock_addr, TCP_CONNECT_TIMEOUT).map_err(|e| {
            HarnessError::Ssh {
                host: host.to_string(),
                message: format!("failed to connect to {}: {}", addr, e),
                source: Some(Box::new(e)),
            }
        })?;

    let mut sess = Session::new()
        .map_err(|e| ssh_err(host, "failed to create SSH session".to_string(), e))?;
    sess.set_tcp_stream(tcp);
    sess.handshake()
        .map_err(|e| ssh_err(host, "SSH handshake failed".to_string(), e))?;
    sess.userauth_pubkey_file(user, None, key_path, None).map_err(|e| {
        ssh_err(
            host,
            format!(
                "SSH authentication failed for {} with key {}",
                user,
                key_path.display()
            ),
            e,
        )
    })?;

    let mut channel = sess
        .channel_session()
        .map_err(|e| ssh_err(host, "failed to open channel".to_string(), e))?;
    channel
        .exec(command)
        .map_err(|e| ssh_err(host, format!("failed to exec: {}", command), e))?;

    // The command is running on the remote side now. A connection that
    // dies before an exit status arrives (sshd killed by a reboot) is
    // reported as exit 255, matching the ssh client, so callers can tell
    // it apart from a node that was never reached.
    let mut stdout = String::new();
    let mut stderr = String::new();
    if let Err(e) = channel.read_to_string(&mut stdout) {
        return Ok(severed(host, "reading stdout", &e, stdout, stderr));
    }
    if let Err(e) = channel.stderr().read_to_string(&mut stderr) {
        return Ok(severed(host, "reading stderr", &e, stdout, stderr));
    }
    if let Err(e) = channel.wait_close() {
        return Ok(severed(host, "closing channel", &e, stdout, stderr));
    }
    let exit_code = match channel.exit_status() {
        Ok(code) => code,
        Err(e) => return Ok(severed(host, "reading exit status", &e, stdout, stderr)),
    };

    debug!(host, exit_code, "remote command finished");
    Ok(CommandOutput {
        exit_code,
        stdout,
        stderr,
    })
}
