use discogs2music::CancellationState;
use std::env;
use std::io::Write;

/// Environment variable consulted when `--apikey` is not given
pub const API_KEY_VAR: &str = "DISCOGS2MUSIC_API_KEY";

/// Resolve the Discogs API key from the command line or the environment.
pub fn get_api_key(from_args: Option<String>) -> Option<String> {
    from_args
        .or_else(|| env::var(API_KEY_VAR).ok())
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// Exit status after a second Ctrl-C
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// React to the `count`-th Ctrl-C of the run.
///
/// The first one cancels `cancel` so the run stops at the next checkpoint;
/// any later one returns the exit code the process should quit with.
pub fn on_interrupt(count: u32, cancel: &CancellationState) -> Option<i32> {
    if count > 1 {
        return Some(INTERRUPTED_EXIT_CODE);
    }
    log::warn!("Interrupted, stopping after the current request (Ctrl-C again to quit)");
    cancel.cancel();
    None
}

/// Set up `env_logger` with a `[LEVEL   ] message` format.
///
/// `RUST_LOG` wins over the verbosity flags when it is set.
pub fn init_logging(debug: bool, quiet: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else if quiet {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| writeln!(buf, "[{:<8}] {}", record.level(), record.args()))
        .init();
}
