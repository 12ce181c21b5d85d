//! Harbormaster controller binary.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube::Client;
use tracing::info;
use tracing_subscriber::EnvFilter;

use harbormaster_config::Settings;
use harbormaster_executor::{KubectlJobExecutor, RunnerSettings};
use harbormaster_github::{GitHubHost, GitHubRegistry, GitWorkspace};
use harbormaster_reconciler::versions::VersionOptions;
use harbormaster_reconciler::{CommitReconciler, ReconcileLoop, VersionReconciler};
use harbormaster_store::ConfigMapStore;

#[derive(Parser)]
#[command(name = "harbormaster")]
#[command(about = "GitOps reconciliation controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile continuously (the normal in-cluster mode)
    Run,
    /// Run a single reconciliation pass and exit
    Once,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    info!(
        account = %settings.account,
        repo = %settings.repo_name,
        folder = %settings.folder_name,
        namespace = %settings.namespace,
        "Starting harbormaster"
    );

    let client = Client::try_default().await?;

    let store = Arc::new(ConfigMapStore::new(
        client.clone(),
        &settings.namespace,
        settings.state_configmap.clone(),
    ));
    let registry = Arc::new(GitHubRegistry::new(
        settings.account.clone(),
        settings.tokens.registry.clone(),
    ));
    let host = Arc::new(GitHubHost::new(
        settings.account.clone(),
        settings.repo_name.clone(),
        settings.tokens.commits.clone(),
    ));
    let workspace = Arc::new(GitWorkspace::new(
        settings.work_dir.clone(),
        &settings.account,
        &settings.repo_name,
        &settings.folder_name,
        settings.tokens.clone.clone(),
    ));
    let executor = Arc::new(KubectlJobExecutor::new(
        client,
        RunnerSettings {
            namespace: settings.namespace.clone(),
            pvc_claim: settings.pvc_claim.clone(),
            service_account: settings.service_account.clone(),
            mount_path: settings.work_dir.clone(),
            image_pull_token: settings.tokens.image_pull.clone(),
        },
    ));

    let versions = VersionReconciler::new(
        store.clone(),
        registry,
        executor.clone(),
        workspace.clone(),
        VersionOptions {
            account: settings.account.clone(),
            registry_host: settings.registry_host.clone(),
            custom_prefix: settings.custom_prefix.clone(),
            bootstrap_image: settings.bootstrap_image.clone(),
        },
    );
    let commits = CommitReconciler::new(
        store,
        host,
        workspace,
        executor,
        settings.bootstrap_image.clone(),
    );
    let runner = ReconcileLoop::new(versions, commits, settings.interval);

    match cli.command {
        Commands::Run => runner.run().await,
        Commands::Once => runner.run_once().await,
    }
    Ok(())
}
