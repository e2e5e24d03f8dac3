use discogs2music::{SyncEvent, SyncEventReceiver};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let pb = ProgressBar::new(len).with_style(style);
    pb.set_message(msg.to_string());
    pb
}

/// Render fetch and reconcile progress until the event channel closes.
pub fn spawn_progress(mut events: SyncEventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };

            match event {
                SyncEvent::FetchStarted { total_pages, .. } => {
                    bar = Some(create_progress_bar(u64::from(total_pages), "📥 Fetching"));
                }
                SyncEvent::PageFetched { page, .. } => {
                    if let Some(pb) = &bar {
                        pb.set_position(u64::from(page));
                    }
                }
                SyncEvent::RateLimited { delay_seconds, .. } => {
                    let message = format!("⏳ Rate limited, waiting {delay_seconds}s");
                    match &bar {
                        Some(pb) => pb.println(message),
                        None => println!("{message}"),
                    }
                }
                SyncEvent::ReconcileStarted { total_tracks } => {
                    if let Some(pb) = bar.take() {
                        pb.finish_and_clear();
                    }
                    bar = Some(create_progress_bar(total_tracks as u64, "🎵 Updating"));
                }
                SyncEvent::TrackProcessed { position, .. } => {
                    if let Some(pb) = &bar {
                        pb.set_position(position as u64);
                    }
                }
                SyncEvent::FetchCompleted { .. } | SyncEvent::ReconcileCompleted => {
                    if let Some(pb) = bar.take() {
                        pb.finish_and_clear();
                    }
                }
                _ => {}
            }
        }

        if let Some(pb) = bar {
            pb.abandon();
        }
    })
}
