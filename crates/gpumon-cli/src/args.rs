use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "gpumon")]
#[command(about = "GPU cluster status from the terminal", long_about = None)]
pub struct Args {
    /// Cluster status endpoint
    #[arg(
        long,
        env = "GPUMON_STATUS_URL",
        default_value = "http://127.0.0.1:8000/get-status"
    )]
    pub status_url: String,

    /// Request timeout in milliseconds
    #[arg(long, env = "GPUMON_FETCH_TIMEOUT_MS", default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one snapshot and print it
    Status {
        /// Print the view tree as JSON
        #[arg(long)]
        json: bool,
    },
    /// Poll continuously and reprint on every new snapshot
    Watch {
        /// Poll period in milliseconds
        #[arg(long, env = "GPUMON_POLL_INTERVAL_MS", default_value_t = 3000)]
        interval_ms: u64,
    },
    /// Run the booking rules over a micro-booking list
    CheckBookings {
        /// JSON array of {title, who, hostname, index, day}
        file: PathBuf,

        /// Allowed booking titles, one per line
        #[arg(long)]
        roster: Option<PathBuf>,

        /// Snapshot to annotate with calendars and user codes from these bookings
        #[arg(long, value_name = "SNAPSHOT")]
        apply: Option<PathBuf>,

        /// Print every checked booking as JSON
        #[arg(long)]
        json: bool,
    },
}
