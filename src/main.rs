mod chart;
mod client;
mod config;
mod error;
mod lastfm;
mod middleware;
mod playlist;
mod spotify;
mod utils;
mod web;

#[cfg(test)]
mod testing;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use env_logger;
use log::info;

use client::chart::{ChartController, GridLayout};
use client::playlist::{PlaylistController, PortForm};
use client::storage::LocalStorage;
use client::TerminalUi;
use config::{Config, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(author, version, about = "Last.fm collage charts and Spotify playlist imports")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the web server
    Serve,
    /// Generate an album chart and open it
    Chart {
        #[arg(long)]
        username: String,
        /// Grid size such as 10x10; defaults to the layout's smallest
        #[arg(long)]
        size: Option<String>,
        /// Offer desktop wallpaper sizes instead of squares
        #[arg(long)]
        desktop: bool,
    },
    /// Open the Spotify login page
    Login,
    /// Finish a Spotify login with the URL Spotify redirected to
    Callback { url: String },
    /// Import Last.fm top tracks into a new Spotify playlist
    Port {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "50")]
        songs: String,
        /// overall, 7day, 1month, 3month, 6month or 12month
        #[arg(long, default_value = "overall")]
        period: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = config::load_config(&args.config)?;

    match args.command {
        Command::Serve => web::serve(config).await?,
        Command::Chart {
            username,
            size,
            desktop,
        } => {
            let mut chart = ChartController::new(reqwest::Client::new(), &config.client.server_url, ui(&config))?;
            if desktop {
                chart.select_layout(GridLayout::Desktop);
            }
            if let Some(size) = size {
                chart.select_size(&size);
            }
            let outcome = chart.generate(&username).await;
            info!("Chart request finished: {:?}", outcome);
        }
        Command::Login => {
            let login = format!("{}/login", config.client.server_url.trim_end_matches('/'));
            println!("Log into Spotify at {}", login);
            println!("Then run `lastools callback <url>` with the address you were sent back to.");
            if let Err(e) = open::that(&login) {
                log::warn!("Could not open a browser: {}", e);
            }
        }
        Command::Callback { url } => {
            let mut playlist = playlist_controller(&config)?;
            let outcome = playlist.load(&url).await?;
            info!("Login finished: {:?}", outcome);
        }
        Command::Port {
            username,
            songs,
            period,
        } => {
            let mut playlist = playlist_controller(&config)?;
            let form = PortForm {
                last_fm_username: username,
                song_number: songs,
                time_period: period,
            };
            let outcome = playlist.submit(&form).await?;
            info!("Port finished: {:?}", outcome);
        }
    }

    Ok(())
}

fn ui(config: &Config) -> TerminalUi {
    TerminalUi::new(&config.client.server_url)
}

fn playlist_controller(config: &Config) -> Result<PlaylistController<TerminalUi>, Box<dyn std::error::Error>> {
    let storage = LocalStorage::open(&config.client.token_store)?;
    Ok(PlaylistController::new(
        reqwest::Client::new(),
        &config.client.server_url,
        storage,
        ui(config),
    )?)
}
