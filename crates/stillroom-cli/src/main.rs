use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "stillroom-cli", version, about = "Stillroom meditation and breathing CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a guided practice
    Practice(commands::practice::PracticeArgs),
    /// Built-in presets
    Presets {
        #[command(subcommand)]
        action: commands::presets::PresetsAction,
    },
    /// Practice history
    Sessions {
        #[command(subcommand)]
        action: commands::sessions::SessionsAction,
    },
    /// Practice statistics
    Stats,
    /// User settings (bells, sound, display)
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Show who sessions are recorded for
    Whoami,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Practice(args) => commands::practice::run(args),
        Commands::Presets { action } => commands::presets::run(action),
        Commands::Sessions { action } => commands::sessions::run(action),
        Commands::Stats => commands::stats::run(),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Whoami => commands::whoami(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
