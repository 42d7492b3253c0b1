use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ocs_harness::cloud;
use ocs_harness::config::{init_config, HarnessConfig};
use ocs_harness::heketi::HeketiClient;
use ocs_harness::node;
use ocs_harness::openshift::Cluster;
use ocs_harness::remote::Executor;

#[derive(Parser)]
#[command(name = "ocsctl")]
#[command(
    about = "Operator CLI for the OpenShift container-storage e2e harness",
    long_about = "ocsctl drives the same cluster plumbing the e2e tests use:\n  - node reboot and VM power control\n  - heketi liveness checks\n  - ad-hoc PVC create/status/delete against the configured storage class"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example config file
    Init {
        /// Output path
        #[arg(default_value = "ocs-harness.toml")]
        output: PathBuf,
    },
    /// Node lifecycle operations
    Node {
        #[command(subcommand)]
        subcommand: NodeCommands,
    },
    /// Heketi service operations
    Heketi {
        #[command(subcommand)]
        subcommand: HeketiCommands,
    },
    /// PVC operations against the configured storage class
    Pvc {
        #[command(subcommand)]
        subcommand: PvcCommands,
    },
}

#[derive(Subcommand)]
enum NodeCommands {
    /// Reboot a node and wait for it to come back
    Reboot {
        host: String,
        #[arg(long, default_value_t = 600)]
        timeout: u64,
        #[arg(long, default_value_t = 10)]
        interval: u64,
    },
    /// Power on the VM behind a node and wait for SSH
    PowerOn {
        /// Node IP or hostname
        host: String,
        #[arg(long, default_value_t = 600)]
        timeout: u64,
        #[arg(long, default_value_t = 10)]
        interval: u64,
    },
    /// Hard power off the VM behind a node
    PowerOff {
        /// Node IP or hostname
        host: String,
    },
    /// Show the power state of the VM behind a node
    Status {
        /// Node IP or hostname
        host: String,
    },
}

#[derive(Subcommand)]
enum HeketiCommands {
    /// Check that the heketi REST service answers
    Ping {
        #[arg(long, default_value_t = 60)]
        timeout: u64,
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

#[derive(Subcommand)]
enum PvcCommands {
    /// Create a PVC and wait for it to bind
    Create {
        /// Storage class to claim from
        #[arg(long)]
        storage_class: String,
        /// Requested size in GiB
        #[arg(long, default_value_t = 1)]
        size: u32,
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
    /// Show the phase of a PVC
    Status { name: String },
    /// Delete a PVC and wait for it to disappear
    Delete {
        name: String,
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
}

fn provider_for(config: &HarnessConfig) -> Result<Box<dyn cloud::CloudProvider>> {
    let Some(cloud_config) = config.cloud.as_ref() else {
        bail!("no [cloud] section in config; VM power operations need one");
    };
    Ok(cloud::from_config(cloud_config)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Commands::Init { output } = &cli.command {
        init_config(output)?;
        return Ok(());
    }

    let config = HarnessConfig::load(cli.config.as_deref())?;
    let exec = Executor::from_config(&config.cluster);
    let cluster = Cluster::new(exec.clone(), config.cluster.master.clone());

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Node { subcommand } => match subcommand {
            NodeCommands::Reboot {
                host,
                timeout,
                interval,
            } => {
                node::reboot_by_command(&exec, &host, timeout, interval).await?;
                println!("{} rebooted and reachable", host);
            }
            NodeCommands::PowerOn {
                host,
                timeout,
                interval,
            } => {
                let provider = provider_for(&config)?;
                let vm = provider.find_vm_name_by_ip_or_hostname(&host).await?;
                node::power_on_vm(provider.as_ref(), &exec, &vm, timeout, interval).await?;
                println!("{} ({}) powered on and reachable", host, vm);
            }
            NodeCommands::PowerOff { host } => {
                let provider = provider_for(&config)?;
                let vm = provider.find_vm_name_by_ip_or_hostname(&host).await?;
                node::power_off_vm(provider.as_ref(), &vm).await?;
                println!("{} ({}) powered off", host, vm);
            }
            NodeCommands::Status { host } => {
                let provider = provider_for(&config)?;
                let vm = provider.find_vm_name_by_ip_or_hostname(&host).await?;
                let state = provider.vm_power_state(&vm).await?;
                println!("{} ({}): {}", host, vm, state);
            }
        },
        Commands::Heketi { subcommand } => match subcommand {
            HeketiCommands::Ping { timeout, interval } => {
                let client = HeketiClient::new(config.heketi.server.clone())?;
                client.wait_until_up(timeout, interval).await?;
                println!("heketi at {} is up", client.server());
            }
        },
        Commands::Pvc { subcommand } => match subcommand {
            PvcCommands::Create {
                storage_class,
                size,
                timeout,
            } => {
                let name = cluster
                    .create_pvc(&storage_class, "ocsctl-pvc", size)
                    .await?;
                cluster.wait_for_pvc_bound(&name, timeout, 5).await?;
                println!("{} bound", name);
            }
            PvcCommands::Status { name } => {
                let status = cluster.pvc_status(&name).await?;
                println!("{}: {}", name, status);
            }
            PvcCommands::Delete { name, timeout } => {
                cluster.delete("pvc", &name, true).await?;
                cluster
                    .wait_for_resource_absence("pvc", &name, timeout, 5)
                    .await?;
                println!("{} deleted", name);
            }
        },
    }

    Ok(())
}
