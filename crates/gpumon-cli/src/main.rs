mod args;
mod check;
mod output;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use gpumon_dashboard::{Dashboard, HttpStatusSource, PollConfig, StatusSource};

use crate::args::{Args, Command};
use crate::check::check_bookings;
use crate::output::{format_booking_report, print_view};

async fn read(path: &std::path::Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let timeout = Duration::from_millis(args.timeout_ms);

    match args.command {
        Command::Status { json } => {
            let source = HttpStatusSource::new(&args.status_url, timeout)?;
            let snapshot = source
                .fetch()
                .await
                .with_context(|| format!("fetching {}", args.status_url))?;
            tracing::debug!(
                nodes = snapshot.nodes.len(),
                gpus = snapshot.gpu_count(),
                "snapshot fetched"
            );
            let view = gpumon_dashboard::render(&snapshot)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_view(&view);
            }
        }
        Command::Watch { interval_ms } => {
            let source = HttpStatusSource::new(&args.status_url, timeout)?;
            let dashboard = Dashboard::new(
                Arc::new(source),
                PollConfig {
                    interval: Duration::from_millis(interval_ms),
                    fetch_timeout: timeout,
                },
            );
            let mut views = WatchStream::new(dashboard.subscribe());
            dashboard.start().await;

            loop {
                tokio::select! {
                    next = views.next() => match next {
                        Some(Some(published)) => {
                            print!("\x1B[2J\x1B[H");
                            print_view(&published.view);
                            let at = published.rendered_at.format("%Y-%m-%d %H:%M:%S");
                            println!("rendered at {at}");
                        }
                        Some(None) => {}
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            dashboard.dispose().await;
        }
        Command::CheckBookings {
            file,
            roster,
            apply,
            json,
        } => {
            let bookings = read(&file).await?;
            let roster = match roster {
                Some(path) => Some(String::from_utf8(read(&path).await?)?),
                None => None,
            };
            let snapshot = match &apply {
                Some(path) => Some(read(path).await?),
                None => None,
            };

            tracing::debug!(file = %file.display(), "checking bookings");
            let out = check_bookings(&bookings, roster.as_deref(), snapshot.as_deref())?;
            match (out.snapshot, json) {
                (Some(snap), true) => println!("{}", serde_json::to_string_pretty(&snap)?),
                (Some(snap), false) => {
                    print_view(&gpumon_dashboard::render(&snap)?);
                    print!("{}", format_booking_report(&out.report));
                }
                (None, true) => {
                    println!("{}", serde_json::to_string_pretty(out.report.bookings())?)
                }
                (None, false) => print!("{}", format_booking_report(&out.report)),
            }
        }
    }
    Ok(())
}
