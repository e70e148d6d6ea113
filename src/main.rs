//! minimesos - disposable Apache Mesos clusters on Docker
//!
//! This is the main CLI entry point for minimesos.

use clap::{Parser, Subcommand};
use minimesos::cluster::{self, ArchitectureBuilder, ClusterStateFile, MesosCluster};
use minimesos::container::spec::{
    DEFAULT_AGENT_RESOURCES, MARATHON_IMAGE_TAG, MARATHON_PORT, MESOS_IMAGE_TAG,
    MESOS_MASTER_PORT, ZOOKEEPER_IMAGE_TAG,
};
use minimesos::container::ContainerRole;
use minimesos::docker::DockerClient;
use minimesos::error::{MinimesosError, Result};
use minimesos::marathon::MarathonClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// minimesos - in-memory Mesos clusters for integration testing
#[derive(Parser)]
#[command(name = "minimesos")]
#[command(version)]
#[command(about = "Run a disposable Apache Mesos cluster on Docker", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a Mesos cluster
    Up {
        /// Expose the service ports on the Docker host
        #[arg(long)]
        exposed_host_ports: bool,
        /// Mesos master and agent image tag
        #[arg(long, default_value = MESOS_IMAGE_TAG)]
        mesos_image_tag: String,
        /// Marathon image tag
        #[arg(long, default_value = MARATHON_IMAGE_TAG)]
        marathon_image_tag: String,
        /// ZooKeeper image tag
        #[arg(long, default_value = ZOOKEEPER_IMAGE_TAG)]
        zookeeper_image_tag: String,
        /// Number of Mesos agents
        #[arg(long, default_value = "1")]
        num_agents: usize,
        /// Also start a Consul server
        #[arg(long)]
        consul: bool,
        /// Cluster start timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Destroy the running cluster
    Destroy,

    /// Show cluster status and service URLs
    Info,

    /// Print the Mesos state of the master or one agent
    State {
        /// Container id of the agent to query instead of the master
        #[arg(long)]
        agent: Option<String>,
    },

    /// Deploy a Marathon app from a JSON descriptor
    Install {
        /// Path to the app descriptor
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli.command).await {
        eprintln!("minimesos: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<()> {
    let engine = Arc::new(DockerClient::from_env()?);
    let state_file = ClusterStateFile::new(&cluster::host_dir());

    // A record pointing at a dead cluster is healed before any command
    cluster::check_state_file(engine.as_ref(), &state_file).await;

    match command {
        Commands::Up {
            exposed_host_ports,
            mesos_image_tag,
            marathon_image_tag,
            zookeeper_image_tag,
            num_agents,
            consul,
            timeout,
        } => {
            if let Some(cluster_id) = state_file.read() {
                println!("Cluster {} is already running", cluster_id);
                return Ok(());
            }

            let mut builder = ArchitectureBuilder::new()
                .with_zookeeper(&zookeeper_image_tag)
                .with_master(&mesos_image_tag, exposed_host_ports)
                .with_marathon(&marathon_image_tag, exposed_host_ports)
                .with_agents(num_agents, &mesos_image_tag, DEFAULT_AGENT_RESOURCES);
            if consul {
                builder = builder.with_consul();
            }
            let architecture = builder.build()?;

            let mesos_cluster = MesosCluster::new(architecture, engine.clone());

            // Ctrl-C tears down everything registered so far, so an
            // interrupted `up` does not leave containers behind
            tokio::spawn(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    minimesos::cluster::cleanup::global().run_all().await;
                    std::process::exit(130);
                }
            });

            mesos_cluster.start(Duration::from_secs(timeout)).await?;
            mesos_cluster.write_cluster_id(&state_file)?;

            println!("Started cluster {}", mesos_cluster.cluster_id());
            print_service_urls(&mesos_cluster, exposed_host_ports)?;
            Ok(())
        }

        Commands::Destroy => cluster::destroy(engine.as_ref(), &state_file).await,

        Commands::Info => {
            let Some(cluster_id) = state_file.read() else {
                println!("Minimesos cluster is not running");
                return Ok(());
            };
            println!("Minimesos cluster is running: {}", cluster_id);

            if let Some(ip) =
                cluster::container_ip(engine.as_ref(), &cluster_id, ContainerRole::Master).await?
            {
                println!(
                    "Mesos version: master at http://{}:{}",
                    ip, MESOS_MASTER_PORT
                );
            }
            if let Some(ip) =
                cluster::container_ip(engine.as_ref(), &cluster_id, ContainerRole::Marathon).await?
            {
                println!("Marathon at http://{}:{}", ip, MARATHON_PORT);
            }
            Ok(())
        }

        Commands::State { agent } => {
            let Some(cluster_id) = state_file.read() else {
                return Err(MinimesosError::NotFound(
                    "minimesos cluster is not running".to_string(),
                ));
            };
            let state = match agent {
                Some(container_id) => {
                    cluster::container_state_info(engine.as_ref(), &container_id).await?
                }
                None => cluster::cluster_state_info(engine.as_ref(), &cluster_id).await?,
            };
            println!("{}", state);
            Ok(())
        }

        Commands::Install { path } => {
            let Some(cluster_id) = state_file.read() else {
                return Err(MinimesosError::NotFound(
                    "minimesos cluster is not running".to_string(),
                ));
            };
            let app_json = read_descriptor(&path)?;

            let marathon_ip =
                cluster::container_ip(engine.as_ref(), &cluster_id, ContainerRole::Marathon)
                    .await?
                    .ok_or_else(|| {
                        MinimesosError::NotFound(format!(
                            "no marathon container in cluster {}",
                            cluster_id
                        ))
                    })?;
            MarathonClient::new(&marathon_ip)
                .deploy_task(&app_json)
                .await
        }
    }
}

/// Read an app descriptor, trying the path as given and then relative
/// to the host directory.
fn read_descriptor(path: &PathBuf) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(json) => Ok(json),
        Err(_) => {
            let fallback = cluster::host_dir().join(path);
            std::fs::read_to_string(&fallback).map_err(|e| {
                MinimesosError::NotFound(format!(
                    "app descriptor {} not found: {}",
                    path.display(),
                    e
                ))
            })
        }
    }
}

/// Print where the cluster services can be reached. With exposed host
/// ports the Docker host address (`DOCKER_HOST_IP` if set) is the one
/// that matters; otherwise the container addresses are printed.
fn print_service_urls(mesos_cluster: &MesosCluster, exposed_host_ports: bool) -> Result<()> {
    if exposed_host_ports {
        let host = std::env::var("DOCKER_HOST_IP").unwrap_or_else(|_| "localhost".to_string());
        println!("Mesos master: http://{}:{}", host, MESOS_MASTER_PORT);
        println!("Marathon: http://{}:{}", host, MARATHON_PORT);
        return Ok(());
    }

    let master = mesos_cluster.master()?;
    if let Some(ip) = master.ip_address {
        println!("Mesos master: http://{}:{}", ip, MESOS_MASTER_PORT);
    }
    let marathon = mesos_cluster.marathon()?;
    if let Some(ip) = marathon.ip_address {
        println!("Marathon: http://{}:{}", ip, MARATHON_PORT);
    }
    println!("ZooKeeper: {}", mesos_cluster.zk_url()?);
    Ok(())
}
