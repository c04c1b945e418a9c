use std::path::PathBuf;

use anyhow::Context;
use jenkins_api::{
    ClientConfig,
    Jenkins,
};

const CONFIG_ENV: &str = "JENKINS_CONFIG";

/// Config file from the first argument or `JENKINS_CONFIG`, otherwise the
/// `JENKINS_*` environment variables
fn load_config() -> anyhow::Result<ClientConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);

    match path {
        Some(path) => {
            tracing::info!("Loading config from {}", path.display());
            ClientConfig::load(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => ClientConfig::from_env().context("Failed to read JENKINS_* environment"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    jenkins_api::logging::init();

    let config = load_config()?;
    let jenkins = Jenkins::from_config(&config)
        .await
        .context("Failed to create Jenkins client")?;

    tracing::info!(url = %jenkins.url(), "Connecting to Jenkins");

    if !jenkins.is_available().await {
        anyhow::bail!("Jenkins at {} is not available", jenkins.url());
    }

    println!("Jenkins {}", jenkins.url());

    println!("\nJobs:");
    for job in jenkins.jobs().await.context("Failed to list jobs")? {
        println!(
            "  {:<40} {:<14} last #{}",
            job.name(),
            job.color().unwrap_or("-"),
            job.last_build_number()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    println!("\nRunning:");
    for build in jenkins
        .last_builds_of_building_jobs()
        .await
        .context("Failed to list running builds")?
    {
        let remaining = build
            .remaining_execution_time()
            .await
            .context("Failed to estimate remaining time")?
            .map(|secs| format!("~{secs:.0}s left"))
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {} #{} ({remaining})",
            build.job_name(),
            build.number().unwrap_or_default()
        );
    }

    let queue = jenkins.queue().await.context("Failed to read queue")?;
    println!("\nQueue ({} items):", queue.len());
    for item in queue.items() {
        println!(
            "  {:>6} {:<40} {}",
            item.id(),
            item.job_name().unwrap_or("-"),
            item.why().unwrap_or_default()
        );
    }

    println!("\nNodes:");
    for node in jenkins.nodes().await.context("Failed to list nodes")? {
        let status = if node.is_offline() {
            format!("offline ({})", node.offline_cause_reason().unwrap_or("no reason given"))
        } else {
            "online".to_string()
        };
        println!(
            "  {:<30} {} executors, {status}",
            node.display_name().unwrap_or(node.name()),
            node.num_executors()
        );
    }

    Ok(())
}
