mod commands;

use clap::{Parser, ValueEnum};
use commands::progress::spawn_progress;
use commands::summary::{print_error, print_summary};
use commands::utils::{get_api_key, init_logging, on_interrupt, API_KEY_VAR};
use discogs2music::{
    run_sync, CancellationState, DataFile, EventBroadcaster, FetchConfig, Granularity,
    MusicAppLibrary, ReconcileConfig, SyncOptions, UpdatePolicy,
};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    /// Only fill in ratings that are not set yet
    UnsetOnly,
    /// Replace ratings lower than the Discogs one
    GreaterThan,
}

impl From<PolicyArg> for UpdatePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::UnsetOnly => UpdatePolicy::UnsetOnly,
            PolicyArg::GreaterThan => UpdatePolicy::GreaterThan,
        }
    }
}

/// Update your Music app album or song ratings with your Discogs collection ratings
#[derive(Parser)]
#[command(name = "discogs2music", version, long_about = None)]
struct Cli {
    /// Discogs personal access token (defaults to $DISCOGS2MUSIC_API_KEY)
    #[arg(short = 'a', long)]
    apikey: Option<String>,

    /// Ratings data file
    #[arg(short = 'd', long)]
    datafile: Option<PathBuf>,

    /// Show debug output
    #[arg(long, conflicts_with = "quiet")]
    debug: bool,

    /// Use the cached ratings instead of fetching from Discogs
    #[arg(short = 'l', long)]
    local: bool,

    /// Overwrite ratings that are already set
    #[arg(short = 'o', long = "override")]
    override_existing: bool,

    /// Only print errors
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Rate songs instead of albums
    #[arg(short = 's', long)]
    songs: bool,

    /// When an existing rating may be replaced
    #[arg(long, value_enum, default_value = "unset-only")]
    policy: PolicyArg,
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_logging(args.debug, args.quiet);

    if !args.quiet {
        println!("🎵 Discogs to Music version {}", env!("CARGO_PKG_VERSION"));
    }

    let api_key = get_api_key(args.apikey.clone());
    if api_key.is_none() && !args.local {
        eprintln!("❌ No Discogs API key");
        eprintln!();
        eprintln!("Pass one with --apikey or set {API_KEY_VAR}.");
        eprintln!("You can create a token at https://www.discogs.com/settings/developers");
        std::process::exit(1);
    }

    let granularity = if args.songs {
        Granularity::Song
    } else {
        Granularity::Album
    };
    let mut options = SyncOptions::new(
        args.datafile
            .clone()
            .map(DataFile::new)
            .unwrap_or_default(),
    )
    .with_local_only(args.local)
    .with_fetch_config(FetchConfig::default())
    .with_reconcile_config(
        ReconcileConfig::default()
            .with_granularity(granularity)
            .with_policy(args.policy.into())
            .with_override(args.override_existing),
    );
    if let Some(api_key) = &api_key {
        options = options.with_api_key(api_key);
    }
    log::debug!("Data file: {}", options.data_file.path().display());

    let events = EventBroadcaster::new();
    let cancel = CancellationState::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        let mut interrupts = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupts += 1;
            if let Some(code) = on_interrupt(interrupts, &interrupt) {
                eprintln!("🛑 Interrupted again, quitting");
                std::process::exit(code);
            }
        }
    });

    let progress = (!args.quiet).then(|| spawn_progress(events.subscribe()));

    let result = run_sync(
        Box::new(http_client::native::NativeClient::new()),
        &MusicAppLibrary::new(),
        &options,
        &events,
        &cancel,
    )
    .await;

    drop(events);
    if let Some(progress) = progress {
        let _ = progress.await;
    }

    match result {
        Ok(outcome) => {
            if !args.quiet {
                print_summary(&outcome);
            }
        }
        Err(e) => {
            print_error(&e, args.debug);
            std::process::exit(1);
        }
    }
}
