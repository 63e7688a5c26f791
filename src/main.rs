use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use unitrader::config::BackendConfig;
use unitrader::countdown::{Clock, CountdownHandle, SystemClock, spawn_countdown};
use unitrader::net::{BackendClient, ListingSource};
use unitrader::notify::{NoticeLevel, Notifier};
use unitrader::session::{self, ProfileStore, SessionMirror};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BackendConfig::from_env().expect("backend config");
    let client = Arc::new(BackendClient::new(config).expect("HTTP client init failed"));

    let notifier = Notifier::new();
    let _notices = spawn_notice_logger(&notifier);

    let mirror = SessionMirror::start(ProfileStore::new(client.clone(), client.clone()));
    mirror.initialize().await;

    if let (Ok(email), Ok(password)) = (std::env::var("UNITRADER_EMAIL"), std::env::var("UNITRADER_PASSWORD")) {
        let _ = session::sign_in(client.as_ref(), &notifier, &email, &password).await;
    }

    let snapshot = mirror.store().snapshot();
    match (&snapshot.identity, &snapshot.profile) {
        (Some(identity), Some(profile)) => info!(user_id = %identity.id, name = %profile.name, "signed in"),
        (Some(identity), None) => info!(user_id = %identity.id, "signed in without a profile"),
        (None, _) => info!("browsing anonymously"),
    }

    let auctions = client.live_auctions(client.config().live_auction_limit).await.unwrap_or_else(|e| {
        warn!(error = %e, "could not load live auctions");
        Vec::new()
    });

    let tick = client.config().countdown_tick;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut watchers = JoinSet::new();
    let mut countdowns: Vec<Arc<CountdownHandle>> = Vec::new();
    for listing in auctions {
        let Some(end) = listing.auction_end() else {
            continue;
        };
        let handle = Arc::new(spawn_countdown(end, Arc::clone(&clock), tick));
        info!(title = %listing.title, remaining = %handle.current(), "live auction");

        let watched = Arc::clone(&handle);
        watchers.spawn(async move {
            if watched.wait_ended().await {
                info!(title = %listing.title, "auction ended");
            }
        });
        countdowns.push(handle);
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
        () = async { while watchers.join_next().await.is_some() {} } => info!("no live auctions left"),
    }

    for handle in &countdowns {
        handle.cancel();
    }
    mirror.teardown();
}

fn spawn_notice_logger(notifier: &Notifier) -> tokio::task::JoinHandle<()> {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(notice) if notice.level == NoticeLevel::Error => warn!(message = %notice.message, "notice"),
                Ok(notice) => info!(message = %notice.message, "notice"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notices dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
