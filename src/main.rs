use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;
use tracing_subscriber::EnvFilter;

use tripper_client::api::client::ApiClient;
use tripper_client::app::ClientConfig;
use tripper_client::error::ClientError;
use tripper_client::identity::{FileIdentityProvider, Identity, IdentityProvider, Route, bootstrap};
use tripper_client::ui::{login, main_window};
use tripper_client::utils::normalize_url;

#[derive(Parser)]
#[command(name = "tripper")]
#[command(about = "Terminal client for the Tripper trip-planning chat", long_about = None)]
struct Cli {
    /// Backend base URL (overrides config and TRIPPER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Path to tripper.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the session file written by `login`
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat (default)
    Chat,
    /// Store the signed-in identity
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Forget the signed-in identity
    Logout,
    /// Ask for a one-off packing recommendation
    Plan {
        details: String,
        #[arg(long)]
        name: Option<String>,
        /// Also download the generated PDF
        #[arg(long)]
        download: bool,
    },
    /// Download a file generated by the backend
    Download { file: String },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::load(cli.config.as_deref());
    if let Err(e) = config.apply_env(|key| std::env::var(key).ok()) {
        error!("{e}");
    }
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    config.api_url = normalize_url(&config.api_url);
    config
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let config = load_config(&cli);
    let session_path = cli
        .session
        .clone()
        .or_else(FileIdentityProvider::default_path)
        .unwrap_or_else(|| PathBuf::from("session.toml"));
    let provider = FileIdentityProvider::new(session_path);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => match bootstrap(&provider) {
            Route::Landing => {
                for line in login::render_landing(main_window::terminal_width()) {
                    println!("{line}");
                }
            }
            Route::Chat(identity) => main_window::run(&config, identity).await?,
        },
        Commands::Login {
            email,
            name,
            id,
            image,
        } => {
            let identity = Identity {
                id,
                name,
                email,
                image,
            };
            if let Err(e) = provider.sign_in(&identity) {
                error!("could not store session: {e}");
            } else {
                println!("Signed in as {}", identity.display_name());
            }
        }
        Commands::Logout => {
            if let Err(e) = provider.sign_out() {
                error!("could not remove session: {e}");
            } else {
                println!("Signed out.");
            }
        }
        Commands::Plan {
            details,
            name,
            download,
        } => {
            let api = ApiClient::new(&config.api_url, config.request_timeout())?;
            let user_name = name
                .or_else(|| provider.current_identity().and_then(|i| i.name))
                .unwrap_or_else(|| login::DEFAULT_USER_NAME.to_string());
            match login::request_plan(&api, &details, &user_name).await {
                Ok(plan) => {
                    for line in login::render_plan(&plan, main_window::terminal_width()) {
                        println!("{line}");
                    }
                    if let (true, Some(file)) = (download, plan.pdf_file_name.as_deref()) {
                        let path = login::download(&api, file, &config.downloads_dir()).await?;
                        println!("Saved {}", path.display());
                    }
                }
                Err(message) => println!("{message}"),
            }
        }
        Commands::Download { file } => {
            let api = ApiClient::new(&config.api_url, config.request_timeout())?;
            let path = login::download(&api, &file, &config.downloads_dir()).await?;
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
