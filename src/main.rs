use anyhow::Result;
use clap::Parser;

mod cli;

use attendance_tracker::{config, init_config, init_telemetry};
use cli::commands::config::ConfigCommand;
use cli::commands::mark::MarkCommand;
use cli::commands::session::SessionCommand;
use cli::commands::{show_how_to_record, Command};
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config()?.clone();
    init_telemetry(&config.observability)?;
    init_config()?;

    match cli.command {
        // Default behavior: no subcommand - explain how to record attendance
        None => show_how_to_record().await,
        Some(Commands::Mark { email, yes, json }) => {
            MarkCommand::new(config, email)
                .with_yes(yes)
                .with_json(json)
                .execute()
                .await
        }
        Some(Commands::Session { yes }) => SessionCommand::new(config).with_yes(yes).execute().await,
        Some(Commands::Config { write }) => {
            ConfigCommand::new(config).with_write(write).execute().await
        }
    }
}
