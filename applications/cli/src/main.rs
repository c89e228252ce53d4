/// GlobeBeats - headless player over a simulated audio device
use clap::{Parser, Subcommand, ValueEnum};
use globebeats_cli::{
    config::CliConfig,
    demo,
    session::{self, SessionPlan, SessionReport, SessionStart},
};
use globebeats_core::TrendingSource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "globebeats")]
#[command(about = "GlobeBeats headless player", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./globebeats.toml when present)
    #[arg(short, long, global = true, env = "GLOBEBEATS_CONFIG_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a listening session
    Play {
        /// Where the session starts
        #[arg(value_enum, default_value_t = StartArg::Playlist)]
        from: StartArg,
        /// Click the top track of this country's chart instead (ISO code, e.g. JP)
        #[arg(long)]
        country: Option<String>,
        /// Stop after this many tracks have finished
        #[arg(short = 'n', long, default_value_t = 3)]
        max_tracks: usize,
        /// Trending charts as a JSON array (defaults to the built-in charts)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// List the countries in the trending catalog
    Countries {
        /// Trending charts as a JSON array
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StartArg {
    /// Play the built-in playlist from the top
    Playlist,
    /// Auto-play the charts and keep going with random picks
    Charts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "globebeats=info,globebeats_cli=info,globebeats_playback=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Play {
            from,
            country,
            max_tracks,
            catalog,
        } => {
            let start = match (country, from) {
                (Some(code), _) => SessionStart::Country(code),
                (None, StartArg::Playlist) => SessionStart::Playlist,
                (None, StartArg::Charts) => SessionStart::Charts,
            };
            play(&config, start, max_tracks, catalog).await?;
        }
        Commands::Countries { catalog } => {
            list_countries(catalog)?;
        }
        Commands::ShowConfig => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn load_catalog(path: Option<PathBuf>) -> anyhow::Result<globebeats_core::TrendingCatalog> {
    match path {
        Some(path) => {
            tracing::info!("Loading charts from {}", path.display());
            Ok(demo::load_catalog(&path)?)
        }
        None => Ok(demo::catalog()),
    }
}

async fn play(
    config: &CliConfig,
    start: SessionStart,
    max_tracks: usize,
    catalog: Option<PathBuf>,
) -> anyhow::Result<()> {
    anyhow::ensure!(max_tracks > 0, "--max-tracks must be at least 1");

    let catalog = Arc::new(load_catalog(catalog)?);
    let playlist = Arc::new(demo::playlist());
    let plan = SessionPlan { start, max_tracks };

    let report = session::run(config, catalog, playlist, plan).await?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &SessionReport) {
    println!("\nSession summary:");
    println!("{}", "-".repeat(60));
    for (i, track) in report.played.iter().enumerate() {
        println!("{:>2}. {} - {}", i + 1, track.title, track.artist);
    }
    if report.played.is_empty() {
        println!("Nothing played.");
    }
    println!("{}", "-".repeat(60));
    println!("Finished tracks: {}", report.finished);
    println!("Final state: {:?}", report.final_state.phase());
    println!("Errors: {}", report.errors.len());
    for error in &report.errors {
        println!("  - {}", error);
    }
    println!(
        "Auto-play: {}",
        if report.auto_play_enabled {
            "on"
        } else {
            "off (manual request this session)"
        }
    );
    if report.timed_out {
        println!("Session stopped after exceeding its time budget.");
    }
}

fn list_countries(catalog: Option<PathBuf>) -> anyhow::Result<()> {
    let catalog = load_catalog(catalog)?;
    let entries = catalog.entries();

    println!("\n{:<6} {:<4} {:<24} {:>8}", "Code", "", "Country", "Playable");
    println!("{}", "-".repeat(46));
    for entry in &entries {
        println!(
            "{:<6} {:<4} {:<24} {:>3}/{:<4}",
            entry.country_code,
            entry.flag.as_deref().unwrap_or(""),
            entry.country_name,
            entry.playable_tracks().count(),
            entry.tracks.len()
        );
    }
    println!("\nTotal: {} countries", entries.len());

    Ok(())
}
