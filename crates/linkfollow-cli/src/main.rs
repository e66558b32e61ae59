use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use linkfollow_core::DispatchOutcome;
use linkfollow_runner::{Credentials, Runner};

#[derive(Parser)]
#[command(name = "linkfollow", version)]
struct Cli {
    /// State directory (config, checkpoint, queue); default ~/.linkfollow
    #[arg(long, global = true)]
    state_root: Option<PathBuf>,

    /// Delivery account user (or LINKFOLLOW_USER)
    #[arg(short = 'u', long, global = true)]
    user: Option<String>,

    /// Delivery account password (or LINKFOLLOW_PASSWORD)
    #[arg(short = 'p', long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List actors who referenced a tracked link since the last check
    Find,

    /// Discover actors and queue a follow request for each new one
    Follow,

    /// Attempt delivery of one queued follow request
    Push,

    /// Show checkpoint and queue counts
    Status,

    /// Reset the checkpoint and destroy the queue (full re-scrape)
    Reset,

    /// Delete delivered and abandoned items
    Purge,

    /// Return items orphaned by a crashed invocation to the ready set
    Recover,

    /// Install the periodic discovery trigger and exit
    Automate,
}

fn credentials(cli: &Cli) -> Credentials {
    let user = cli
        .user
        .clone()
        .or_else(|| std::env::var("LINKFOLLOW_USER").ok())
        .unwrap_or_default();
    let password = cli
        .password
        .clone()
        .or_else(|| std::env::var("LINKFOLLOW_PASSWORD").ok())
        .unwrap_or_default();
    Credentials { user, password }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let runner = Runner::open(cli.state_root.clone())?;

    match &cli.cmd {
        Command::Find => {
            for name in runner.find()? {
                println!("{name}");
            }
        }
        Command::Follow => {
            let names = runner.follow()?;
            for name in &names {
                println!("{name}");
            }
            if names.is_empty() {
                println!("no new actors");
            }
        }
        Command::Push => {
            let outcome = runner.push(&credentials(&cli))?;
            match outcome {
                DispatchOutcome::Idle => println!("push: nothing to do"),
                DispatchOutcome::Delivered { key } => println!("push: delivered {key}"),
                DispatchOutcome::Requeued { key, attempt_errors } => {
                    println!("push: requeued {key} (errors: {attempt_errors})")
                }
                DispatchOutcome::Abandoned { key } => println!("push: abandoned {key}"),
            }
        }
        Command::Status => {
            let status = runner.status()?;
            println!(
                "checkpoint: current={} previous={}",
                status.checkpoint.current, status.checkpoint.previous
            );
            println!("ready: {}", status.ready);
            println!("claimed: {}", status.claimed);
            println!("done: {}", status.done);
            println!("error: {}", status.error);
        }
        Command::Reset => {
            runner.reset()?;
            println!("reset: checkpoint and queue cleared");
        }
        Command::Purge => {
            let removed = runner.purge()?;
            println!("purged {removed} terminal items");
        }
        Command::Recover => {
            let recovered = runner.recover()?;
            println!("recovered {recovered} claimed items");
        }
        Command::Automate => {
            runner.automate()?;
            println!(
                "discovery trigger installed (every {} hours)",
                runner.cfg.dispatch.discover_every_hours
            );
            // kick off the first pass instead of waiting for the trigger
            for name in runner.follow()? {
                println!("{name}");
            }
        }
    }

    Ok(())
}
