mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use svcctl::{ManagerKind, ServiceControl, Settings};

#[derive(Parser)]
#[command(name = "svcctl")]
#[command(about = "Control services by name across systemd, OpenRC and SysV init")]
struct Args {
    /// Directory holding the learned alias table
    #[arg(long, global = true)]
    resource_dir: Option<PathBuf>,

    /// Skip detection and use this init system (systemd, openrc, sysvinit)
    #[arg(long, global = true)]
    manager: Option<ManagerKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the concrete service name for a keyword
    Resolve {
        /// Service keyword (e.g., "docker" or "fail2ban")
        keyword: String,
    },

    /// Check whether a service is installed
    Exists { keyword: String },

    /// Start a service
    Start { keyword: String },

    /// Stop a service
    Stop { keyword: String },

    /// Restart a service
    Restart { keyword: String },

    /// Enable a service at boot
    Enable { keyword: String },

    /// Disable a service at boot
    Disable { keyword: String },

    /// Show service status
    Status {
        keyword: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print "active" or "inactive"
    IsActive { keyword: String },

    /// Print "enabled" or "disabled"
    IsEnabled { keyword: String },

    /// Show the unit file or init script path
    Path { keyword: String },

    /// Run an arbitrary verb through the init tool (e.g. reload)
    Action { verb: String, keyword: String },

    /// Restart only after config checks pass, then verify it is active
    SafeRestart {
        keyword: String,

        /// Config file that must exist (repeatable)
        #[arg(long = "config")]
        config_paths: Vec<PathBuf>,

        /// Self-test command line, e.g. "nginx -t"
        #[arg(long)]
        check: Option<String>,
    },

    /// Show the last lines of a log file
    Log {
        path: PathBuf,

        #[arg(short = 'n', long = "lines")]
        lines: Option<String>,
    },

    /// Show a config file, whole or its last lines
    Config {
        path: PathBuf,

        #[arg(short = 'n', long = "lines")]
        lines: Option<String>,
    },

    /// Inspect or seed learned aliases
    Aliases {
        #[command(subcommand)]
        command: AliasCommand,
    },

    /// Show the detected init system
    Manager,
}

#[derive(Subcommand)]
enum AliasCommand {
    /// List learned aliases
    List,
    /// Merge a JSON alias table into the store
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let args = Args::parse();

    let mut settings = Settings::from_env();
    if let Some(dir) = args.resource_dir {
        settings.resource_dir = dir;
    }
    if let Some(kind) = args.manager {
        settings.priority = vec![kind];
    }

    let control = match ServiceControl::init(settings).await {
        Ok(control) => control,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let result = run(&control, args.command).await;

    // Learned aliases would otherwise wait for the debounce timer
    control.shutdown().await;
    result
}

async fn run(control: &ServiceControl, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Resolve { keyword } => commands::resolve(control, &keyword).await,
        Command::Exists { keyword } => commands::exists(control, &keyword).await,
        Command::Start { keyword } => commands::action(control, "start", &keyword).await,
        Command::Stop { keyword } => commands::action(control, "stop", &keyword).await,
        Command::Restart { keyword } => commands::action(control, "restart", &keyword).await,
        Command::Enable { keyword } => commands::action(control, "enable", &keyword).await,
        Command::Disable { keyword } => commands::action(control, "disable", &keyword).await,
        Command::Status { keyword, json } => commands::status(control, &keyword, json).await,
        Command::IsActive { keyword } => commands::is_active(control, &keyword).await,
        Command::IsEnabled { keyword } => commands::is_enabled(control, &keyword).await,
        Command::Path { keyword } => commands::path(control, &keyword).await,
        Command::Action { verb, keyword } => commands::action(control, &verb, &keyword).await,
        Command::SafeRestart {
            keyword,
            config_paths,
            check,
        } => commands::safe_restart(control, &keyword, config_paths, check).await,
        Command::Log { path, lines } => commands::log(control, &path, lines).await,
        Command::Config { path, lines } => commands::config(control, &path, lines).await,
        Command::Aliases { command } => match command {
            AliasCommand::List => commands::aliases_list(control).await,
            AliasCommand::Import { file } => commands::aliases_import(control, &file).await,
        },
        Command::Manager => commands::manager(control).await,
    }
}
