//! `tempoq status` — query a running scheduler over the admin socket.
//!
//! Sends a `STATUS_CMD`/`show_scheduled_jobs` envelope and pretty-prints
//! the snapshot that comes back.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;

use tempoq_core::config::load_config;
use tempoq_core::transport::zmq::DealerTransport;
use tempoq_core::transport::Socket;
use tempoq_core::wire::{Command, Frame, SHOW_SCHEDULED_JOBS};

/// Run the status command.
pub async fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref());
    let addr = admin_dial_addr(&config.administrative_listen_addr);

    let mut socket = DealerTransport::connect(&addr)
        .await
        .with_context(|| format!("failed to reach scheduler at {}", addr))?;

    let request = Frame::new(Command::StatusCmd, vec![SHOW_SCHEDULED_JOBS.to_string()]);
    socket.send_multipart(request.encode()).await?;

    let frames = tokio::time::timeout(Duration::from_secs(5), socket.recv_multipart())
        .await
        .map_err(|_| anyhow!("timed out waiting for scheduler reply"))?
        .ok_or_else(|| anyhow!("admin socket closed"))?;
    let reply = Frame::decode(&frames)?;

    let snapshot: serde_json::Value =
        serde_json::from_str(reply.body.first().map(String::as_str).unwrap_or("{}"))
            .context("scheduler sent an unreadable snapshot")?;

    print_snapshot(&snapshot);
    Ok(())
}

/// A ROUTER bound on a wildcard address needs a concrete host to dial.
fn admin_dial_addr(listen_addr: &str) -> String {
    listen_addr.replace("0.0.0.0", "127.0.0.1").replace('*', "127.0.0.1")
}

fn print_snapshot(snapshot: &serde_json::Value) {
    let name = snapshot["name"].as_str().unwrap_or("<unknown>");

    println!();
    println!("{} {}", "Scheduler".cyan().bold(), name.bold());
    println!();

    let interval_jobs = snapshot["interval_jobs"].as_object();
    let cron_jobs = snapshot["cron_jobs"].as_object();

    println!("  {}", "Interval jobs:".bold());
    match interval_jobs {
        Some(jobs) if !jobs.is_empty() => {
            for (hash, entry) in jobs {
                let queue = entry.get(3).and_then(|v| v.as_str()).unwrap_or("?");
                let cadence = entry.get(2).and_then(|v| v.as_str()).unwrap_or("?");
                let run_count = entry.get(4).and_then(|v| v.as_i64()).unwrap_or(-1);
                let runs = if run_count < 0 {
                    "∞".to_string()
                } else {
                    run_count.to_string()
                };
                println!(
                    "    {}  {} → {} ({} runs left)",
                    short(hash).dimmed(),
                    cadence,
                    queue,
                    runs
                );
            }
        }
        _ => println!("    {}", "· none".dimmed()),
    }

    println!();
    println!("  {}", "Cron jobs:".bold());
    match cron_jobs {
        Some(jobs) if !jobs.is_empty() => {
            for (hash, entry) in jobs {
                let queue = entry.get(3).and_then(|v| v.as_str()).unwrap_or("?");
                let expr = entry.get(2).and_then(|v| v.as_str()).unwrap_or("?");
                let next = entry.get(0).and_then(|v| v.as_i64()).unwrap_or(0);
                println!(
                    "    {}  {:?} → {} (next at {})",
                    short(hash).dimmed(),
                    expr,
                    queue,
                    next
                );
            }
        }
        _ => println!("    {}", "· none".dimmed()),
    }

    println!();
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}
