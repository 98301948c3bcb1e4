mod config;
mod logging;
mod osc;
mod ports;
mod services;
mod spotify_rs;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    config::{Config, Overrides},
    logging::setup_logging,
    osc::OscChatboxSink,
    services::now_playing::NowPlayingBridge,
    spotify_rs::{
        client::{SpotifyClient, login_interactive},
        token_cache::TokenCache,
    },
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, global = true, env = "SPOTIFY_CHATBOX_CONFIG")]
    config: Option<PathBuf>,

    /// Console log level
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "SPOTIFY_CHATBOX_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct CredentialArgs {
    /// Spotify app client id
    #[arg(long, env = "SPOTIPY_CLIENT_ID")]
    client_id: Option<String>,

    /// Spotify app client secret
    #[arg(long, env = "SPOTIPY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Redirect URI registered for the Spotify app
    #[arg(long, env = "SPOTIPY_REDIRECT_URI")]
    redirect_uri: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll Spotify and forward track changes to the VRChat chatbox
    Run {
        #[command(flatten)]
        credentials: CredentialArgs,

        /// Host the OSC messages are sent to
        #[arg(long, env = "OSC_HOST")]
        osc_host: Option<String>,

        /// Port the OSC messages are sent to
        #[arg(long, env = "OSC_PORT")]
        osc_port: Option<u16>,

        /// Pause between polls, e.g. "1s" or "500ms"
        #[arg(long, value_parser = humantime::parse_duration)]
        poll_interval: Option<Duration>,
    },
    /// Log in to Spotify and cache the token
    Login {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

impl CredentialArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            client_id: self.client_id,
            client_secret: self.client_secret,
            redirect_uri: self.redirect_uri,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("Loading configuration");
    let mut config = {
        if let Some(ref config) = args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load spotify-chatbox config")?;

    match args.command {
        Commands::Run {
            credentials,
            osc_host,
            osc_port,
            poll_interval,
        } => {
            config.apply(Overrides {
                osc_host,
                osc_port,
                poll_interval,
                ..credentials.into_overrides()
            });
            if let Err(e) = until_interrupted(run(config), ctrl_c()).await {
                log::error!("{}", fatal_error_line(&e));
                return Ok(ExitCode::FAILURE);
            }
            log::info!("&cProgram terminated by user.");
        }
        Commands::Login { credentials } => {
            config.apply(credentials.into_overrides());
            let cache = TokenCache::new(config.token_cache_path());
            login_interactive(&reqwest::Client::new(), &config.credentials()?, &cache).await?;
            log::info!("Token saved to {}", cache.path().display());
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                log::debug!("Creating default config");
                let path = Config::create_default()?;
                log::info!("Default config at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(ExitCode::SUCCESS)
}

/// Set everything up and poll until Ctrl-C. Only returns `Ok` on interrupt.
async fn run(config: Config) -> Result<()> {
    let credentials = config.credentials()?;

    log::info!("&aOpening UDP port for OSC communication...");
    let sink = OscChatboxSink::bind(&config.osc.host, config.osc.port, config.osc.address.clone())
        .await?;
    log::info!("&aUDP port successfully opened!");

    log::info!("&aPrompting Spotify login...");
    let client = SpotifyClient::connect(
        credentials,
        TokenCache::new(config.token_cache_path()),
        config.spotify.request_timeout,
        config.spotify.retries,
    )
    .await?;

    let mut bridge = NowPlayingBridge::new(client, sink, config.poll_interval);
    bridge.run_until(ctrl_c()).await
}

/// One line with the whole cause chain, without the report's extra sections.
fn fatal_error_line(error: &color_eyre::Report) -> String {
    format!("&4An error occurred: &r{:#}", error)
}

/// Resolves on Ctrl-C. Never resolves if the handler can't be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("&eCouldn't listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Drive `work` until it finishes or `interrupt` fires. An interrupt is a clean
/// exit, whether it lands during setup or while polling.
async fn until_interrupted(
    work: impl Future<Output = Result<()>>,
    interrupt: impl Future<Output = ()>,
) -> Result<()> {
    tokio::select! {
        biased;
        _ = interrupt => Ok(()),
        result = work => result,
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::eyre;

    use super::*;

    #[tokio::test]
    async fn test_interrupt_during_setup_is_clean() {
        // Setup stuck at the login prompt
        let result = until_interrupted(std::future::pending::<Result<()>>(), async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_interrupt_wins_over_ready_work() {
        let result = until_interrupted(async { Err::<(), _>(eyre!("fatal")) }, async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fatal_error_without_interrupt() {
        let result =
            until_interrupted(async { Err::<(), _>(eyre!("fatal")) }, std::future::pending::<()>())
                .await;
        assert_eq!(result.unwrap_err().to_string(), "fatal");
    }

    #[test]
    fn test_fatal_error_line_is_one_line_chain() {
        let error = eyre!("connection reset").wrap_err("Failed to refresh Spotify access token");
        let line = fatal_error_line(&error);
        assert_eq!(
            line,
            "&4An error occurred: &rFailed to refresh Spotify access token: connection reset"
        );
        assert!(!line.contains('\n'));
    }

    #[tokio::test]
    async fn test_work_finishing_first() {
        let result = until_interrupted(
            async { Ok::<_, color_eyre::Report>(()) },
            tokio::time::sleep(std::time::Duration::from_secs(60)),
        )
        .await;
        assert!(result.is_ok());
    }
}
