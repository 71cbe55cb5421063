use crate::infra::{seed_positions, RosterReport};
use crate::server;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use interview_queue::config::AppConfig;
use interview_queue::error::AppError;
use interview_queue::scheduling::{ActivityWindow, Roster, SchedulingService};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Interview Queue",
    about = "Run the interview queue scheduling service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect roster seed files
    Roster {
        #[command(subcommand)]
        command: RosterCommand,
    },
}

#[derive(Subcommand, Debug)]
enum RosterCommand {
    /// Parse the roster files and confirm the positions can be registered
    Check(RosterCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RosterCheckArgs {
    /// Users CSV (token,user_id,name,role,company_id); defaults to APP_ROSTER_USERS
    #[arg(long)]
    pub(crate) users: Option<PathBuf>,
    /// Positions CSV; defaults to APP_ROSTER_POSITIONS
    #[arg(long)]
    pub(crate) positions: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Roster {
            command: RosterCommand::Check(args),
        } => check_roster(args),
    }
}

fn check_roster(args: RosterCheckArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let users = args.users.or(config.roster.users_csv);
    let positions = args.positions.or(config.roster.positions_csv);
    let roster = Roster::load(users.as_deref(), positions.as_deref())?;

    let window = ActivityWindow::from_defaults(&config.scheduling, Utc::now());
    seed_positions(&SchedulingService::with_system_clock(window), &roster)?;

    let report = RosterReport::of(&roster);
    let rendered = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
