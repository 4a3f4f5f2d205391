use clap::{Parser, Subcommand};

pub mod config;
pub mod logging;
pub mod reset_credentials;
pub mod serve;
pub mod status;
pub mod version;

#[derive(Parser)]
#[command(name = "wagate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "WhatsApp gateway with QR pairing and a REST API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the gateway service
    Serve {
        /// Path to config file (default: ~/.local/share/wagate/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Address to listen on, overriding `[server] bind`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show the connection status of a running gateway
    Status {
        /// Base URL of the running gateway
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        url: String,
    },

    /// Delete persisted WhatsApp credentials
    ResetCredentials {
        /// Path to config file (default: ~/.local/share/wagate/config.toml)
        #[arg(long)]
        config: Option<String>,

        /// Skip confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Serve { config, bind } => serve::execute(config, bind).await,
        Commands::Status { url } => status::execute(url).await,
        Commands::ResetCredentials { config, yes } => {
            reset_credentials::execute(config, yes).await
        }
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}
