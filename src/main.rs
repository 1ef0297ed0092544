use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing_subscriber::EnvFilter;

use aircheck::config::{Config, SpotifyConfig};
use aircheck::feed::HttpFeed;
use aircheck::jobs;
use aircheck::pacer::ApiPacer;
use aircheck::playlist::PlaylistBuilder;
use aircheck::resolver::{CatalogResolver, FirstResult};
use aircheck::spotify_auth::{self, SpotifySession};
use aircheck::store::PlayStore;

#[derive(Parser)]
#[command(name = "aircheck", about = "Radio playlog capture and daily playlist compilation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the station feed and store the current batch of plays (hourly).
    Ingest,
    /// Compile yesterday's plays into the dated and rolling playlists (daily).
    Compile,
    /// Interactive one-time authorization; prints the refresh token.
    Login,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("aircheck=info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Ingest => run_ingest().await,
        Command::Compile => run_compile().await,
        Command::Login => run_login().await,
    };

    if let Err(err) = outcome {
        tracing::error!("invocation failed: {:#}", err);
        std::process::exit(1);
    }
}

async fn run_ingest() -> Result<()> {
    let config = Config::from_env()?;
    let feed = HttpFeed::new(config.feed_url);
    let store = PlayStore::new(config.data_dir, config.play_id_secret);
    let mut session = SpotifySession::new(&config.spotify, config.spotify_refresh_token);
    let mut resolver = CatalogResolver::new(FirstResult, ApiPacer::default());

    jobs::ingest(
        &feed,
        &mut session,
        &mut resolver,
        &store,
        config.station_zone,
        chrono::Utc::now(),
    )
    .await?;
    Ok(())
}

async fn run_compile() -> Result<()> {
    let config = Config::from_env()?;
    let store = PlayStore::new(config.data_dir, config.play_id_secret);
    let mut session = SpotifySession::new(&config.spotify, config.spotify_refresh_token);
    let mut resolver = CatalogResolver::new(FirstResult, ApiPacer::default());
    let mut builder = PlaylistBuilder::new(
        config.station_label,
        config.rolling_playlist,
        config.playlists_public,
        ApiPacer::default(),
    );

    jobs::compile_playlists(
        &mut session,
        &mut resolver,
        &mut builder,
        &store,
        config.station_zone,
        chrono::Utc::now(),
    )
    .await?;
    Ok(())
}

async fn run_login() -> Result<()> {
    let spotify = SpotifyConfig::from_env()?;
    spotify_auth::login(&spotify).await
}
