//! VpsGate CLI - Command line interface for account provisioning.
//!
//! Adds, removes and lists VPS accounts across every configured access
//! protocol, and sweeps expired accounts once or periodically.

mod shell;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use zeroize::Zeroizing;

use vpsgate_common::{Credential, Username};
use vpsgate_orchestrator::{ManagerConfig, Orchestrator, OrchestratorError, AUDIT_TARGET};
use vpsgate_registry::Account;
use vpsgate_sweeper::{ExpirySweeper, SweepReport, SweepScheduler};

#[derive(Parser)]
#[command(name = "vpsgate")]
#[command(about = "VpsGate - Multi-protocol VPS account management")]
#[command(version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "VPSGATE_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision an account on every configured backend.
    Add {
        /// Account name.
        #[arg(short, long)]
        username: String,

        /// Days until the account expires.
        #[arg(short, long)]
        days: u32,
    },

    /// Remove an account from every backend it was provisioned on.
    Remove {
        /// Account name.
        #[arg(short, long)]
        username: String,
    },

    /// List accounts.
    List,

    /// Remove expired accounts once.
    Sweep,

    /// Remove expired accounts periodically until interrupted.
    Watch,

    /// Interactive menu.
    Shell,

    /// Check an account password against its stored digest.
    Verify {
        /// Account name.
        #[arg(short, long)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ManagerConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config {}", cli.config.display()))?;

    init_logging(cli.verbose, config.log_path.as_deref())?;

    let orchestrator = Arc::new(
        Orchestrator::from_config(&config)
            .await
            .context("Failed to initialize VPS manager")?,
    );

    match cli.command {
        Commands::Add { username, days } => {
            let password = prompt_new_password()?;
            cmd_add(&orchestrator, &username, &password, days).await
        }

        Commands::Remove { username } => cmd_remove(&orchestrator, &username).await,

        Commands::List => cmd_list(&orchestrator).await,

        Commands::Sweep => cmd_sweep(&orchestrator).await,

        Commands::Watch => cmd_watch(orchestrator, &config).await,

        Commands::Shell => shell::run(&orchestrator).await,

        Commands::Verify { username } => cmd_verify(&orchestrator, &username).await,
    }
}

/// Console logging to stderr, plus the audit trail appended to `log_path`.
fn init_logging(verbose: bool, log_path: Option<&Path>) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    });
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    let file = match log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let filter = EnvFilter::new(format!("{}=info,warn", AUDIT_TARGET));
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Prompt for a new password twice.
fn prompt_new_password() -> Result<Zeroizing<String>> {
    let password = prompt_password("Enter password: ")?;
    let confirm = prompt_password("Confirm password: ")?;

    if *password != *confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

/// Provision a new account.
async fn cmd_add(orchestrator: &Orchestrator, username: &str, password: &str, days: u32) -> Result<()> {
    let username = Username::new(username).context("Invalid username")?;
    let credential = Credential::new(password).context("Invalid password")?;

    info!("Adding account: {}", username);

    match orchestrator.add_account(&username, &credential, days).await {
        Ok(outcome) => {
            println!("User added successfully!");
            print_account(&outcome.account);
            if let Some(persistence) = outcome.persistence {
                eprintln!("Warning: {}", persistence);
                eprintln!("The account is provisioned but may be missing after a restart.");
            }
            Ok(())
        }
        Err(OrchestratorError::ProvisionFailed(failure)) => {
            eprintln!("Provisioning failed at backend '{}': {}", failure.backend, failure.cause);
            if !failure.suppressed.is_empty() {
                eprintln!("Cleanup also failed on:");
                for suppressed in &failure.suppressed {
                    eprintln!("  - {}", suppressed);
                }
            }
            anyhow::bail!("Failed to add user {}", username)
        }
        Err(e) => Err(e).context("Failed to add user"),
    }
}

/// Remove an account.
async fn cmd_remove(orchestrator: &Orchestrator, username: &str) -> Result<()> {
    let username = Username::new(username).context("Invalid username")?;

    info!("Removing account: {}", username);

    match orchestrator.remove_account(&username).await {
        Ok(()) => {
            println!("User removed successfully: {}", username);
            Ok(())
        }
        Err(OrchestratorError::DeprovisionFailed(report)) => {
            eprintln!("User {} removed from the registry, but some backends failed:", username);
            for failure in &report.failures {
                eprintln!("  - {}", failure);
            }
            if let Some(persistence) = &report.persistence {
                eprintln!("  - {}", persistence);
            }
            anyhow::bail!("Removal of {} incomplete", username)
        }
        Err(e) => Err(e).context("Failed to remove user"),
    }
}

/// Print the account table.
async fn cmd_list(orchestrator: &Orchestrator) -> Result<()> {
    let accounts = orchestrator.list().await;

    println!("Current Users:");
    println!("{:<15} {:<25} {:<30}", "Username", "Expire Date", "Protocols");
    println!("{}", "-".repeat(70));
    for account in &accounts {
        println!("{}", format_row(account));
    }
    if accounts.is_empty() {
        println!("(no users)");
    }
    Ok(())
}

/// Remove expired accounts once.
async fn cmd_sweep(orchestrator: &Arc<Orchestrator>) -> Result<()> {
    let report = ExpirySweeper::new(orchestrator.clone()).sweep(Utc::now()).await;
    print_sweep(&report);

    if !report.is_clean() {
        anyhow::bail!("{} expired user(s) not fully removed", report.failed.len());
    }
    Ok(())
}

/// Sweep every `sweep_interval_secs` until Ctrl-C.
async fn cmd_watch(orchestrator: Arc<Orchestrator>, config: &ManagerConfig) -> Result<()> {
    let sweeper = ExpirySweeper::new(orchestrator);
    let (scheduler, handle) = SweepScheduler::new(config.sweep_interval());

    let task = tokio::spawn(handle.run(move |now| {
        let sweeper = sweeper.clone();
        async move { sweeper.sweep(now).await }
    }));

    println!(
        "Watching for expired users every {}s (Ctrl-C to stop)",
        config.sweep_interval_secs
    );
    let report = scheduler.request_sweep().await?;
    print_sweep(&report);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    scheduler.shutdown().await;
    task.await.context("Sweep scheduler task failed")?;
    println!("Stopped.");
    Ok(())
}

/// Check a password against the stored digest.
async fn cmd_verify(orchestrator: &Orchestrator, username: &str) -> Result<()> {
    let username = Username::new(username).context("Invalid username")?;
    let password = prompt_password("Enter password: ")?;
    let credential = Credential::new(password.as_str()).context("Invalid password")?;

    if orchestrator
        .verify(&username, &credential)
        .await
        .context("Failed to verify password")?
    {
        println!("Password matches for {}", username);
        Ok(())
    } else {
        anyhow::bail!("Password does not match for {}", username)
    }
}

fn format_row(account: &Account) -> String {
    format!(
        "{:<15} {:<25} {:<30}",
        account.username.as_str(),
        account.expire_date.format("%Y-%m-%d").to_string(),
        account.protocols.join(", ")
    )
}

fn print_account(account: &Account) {
    println!("  Username: {}", account.username);
    println!("  Expires: {}", account.expire_date.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Protocols: {}", account.protocols.join(", "));
}

fn print_sweep(report: &SweepReport) {
    if report.attempted.is_empty() {
        println!("No expired users.");
        return;
    }
    for username in &report.attempted {
        match report.failed.iter().find(|f| &f.username == username) {
            Some(failure) => println!("Removing expired user: {} (incomplete: {})", username, failure.error),
            None => println!("Removing expired user: {}", username),
        }
    }
    println!(
        "Swept {} expired user(s), {} with errors",
        report.attempted.len(),
        report.failed.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from([
            "vpsgate", "--config", "/etc/vpsgate.json", "add", "--username", "alice", "--days", "30",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/vpsgate.json"));
        assert!(matches!(
            cli.command,
            Commands::Add { ref username, days: 30 } if username == "alice"
        ));
    }

    #[test]
    fn test_negative_days_rejected() {
        let result = Cli::try_parse_from(["vpsgate", "add", "-u", "alice", "-d", "-1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_row() {
        let account = Account::new(
            Username::new("alice").unwrap(),
            "$argon2id$...".to_string(),
            Utc.with_ymd_and_hms(2026, 11, 18, 9, 30, 0).unwrap(),
            vec!["ssh".to_string(), "xray".to_string()],
        );
        let row = format_row(&account);
        assert!(row.starts_with("alice           2026-11-18"));
        assert!(row.contains("ssh, xray"));
    }
}
