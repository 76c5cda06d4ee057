use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "azan-alarm", version, author, about = "Prayer time alarms that survive restarts")]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use this alarm database instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show today's computed prayer times and the next alarm
    Times,
    /// Compute today's times and store them as the alarm set
    Refresh,
    /// Set one prayer's alarm time
    Set {
        /// Prayer name (fajr, dhuhr, asr, maghrib, isha, tahajjud)
        prayer: String,
        /// Time as HH:MM (24-hour)
        time: String,
    },
    /// Turn a prayer's alarm on
    Enable {
        /// Prayer name
        prayer: String,
    },
    /// Turn a prayer's alarm off, keeping its time
    Disable {
        /// Prayer name
        prayer: String,
    },
    /// Show stored alarms and when each will next ring
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the alarm daemon in the foreground
    Run {
        /// Desktop notifications only, no full-screen alarm
        #[arg(long)]
        headless: bool,
    },
    /// Forget every stored alarm
    Reset,
}
