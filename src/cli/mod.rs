use clap::{Parser, Subcommand};

pub mod commands;
pub mod prompter;

#[derive(Parser)]
#[command(name = "attendance")]
#[command(about = "Record attendance with a verified location, address and photo")]
#[command(long_about = "Attendance captures your location, looks up the street address, takes a \
                       selfie and saves a timestamped attendance record. Start with \
                       'attendance session' for the guided flow.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record one attendance entry without interaction
    Mark {
        /// Email address the record belongs to
        #[arg(long, help = "Email address to record attendance for")]
        email: String,
        /// Grant location and camera access without asking
        #[arg(short = 'y', long, help = "Skip permission prompts and grant access")]
        yes: bool,
        /// Print the saved record as JSON
        #[arg(long, help = "Print the saved record as JSON instead of a summary")]
        json: bool,
    },
    /// Run the guided capture flow in the terminal
    Session {
        /// Grant location and camera access without asking
        #[arg(short = 'y', long, help = "Skip permission prompts and grant access")]
        yes: bool,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to a file instead of printing it
        #[arg(long, help = "File path to write the configuration to (secrets included)")]
        write: Option<String>,
    },
}
