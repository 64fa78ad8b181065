use std::{net::IpAddr, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket},
        WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use clap::Parser;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use serde_json::json;
use tokio::{net::TcpListener, time::timeout};
use tracing::{debug, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    cors::CorsLayer,
    events::{LiveEvent, LiveStatus},
    lanyard::{FetchError, LanyardClient},
    loader::InitialSnapshotLoader,
    page::PageContext,
    relay::{ContactRelay, ContactSubmission, RelayError},
    snapshot::StatusSnapshot,
    sync::{Synchronizer, POLL_INTERVAL},
};

mod config;
mod cors;
mod events;
mod lanyard;
mod loader;
mod page;
mod present;
mod relay;
mod snapshot;
mod sync;
#[cfg(test)]
mod test_support;

/// A live view resends its current snapshot when nothing changed for this
/// long, so idle connections are not dropped by proxies.
const KEEPALIVE: Duration = Duration::from_secs(20);

/// Timing of every live view's synchronizer and keepalive.
#[derive(Debug, Clone, Copy)]
struct LiveViewSettings {
    poll_interval: Duration,
    keepalive: Duration,
}

impl Default for LiveViewSettings {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            keepalive: KEEPALIVE,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded_config = config::Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    info!(
        "Starting homepage backend on {}",
        loaded_config.listen_addr
    );

    let lanyard = LanyardClient::new(
        &loaded_config.lanyard_url,
        loaded_config.upstream_timeout(),
        loaded_config.default_location.clone(),
    )
    .context("Failed to create Lanyard client")?;
    info!("Reading presence from {}", lanyard.base_url());
    let loader = Arc::new(InitialSnapshotLoader::new(
        Arc::new(lanyard),
        loaded_config.discord_id.clone(),
    ));

    let relay = Arc::new(
        ContactRelay::new(
            loaded_config.discord_webhook.clone(),
            loaded_config.turnstile_url.clone(),
            loaded_config.turnstile_secret_key.clone(),
            loaded_config.upstream_timeout(),
        )
        .context("Failed to create contact relay")?,
    );

    let listener = TcpListener::bind(&loaded_config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", loaded_config.listen_addr))?;

    let app = make_app(
        Arc::new(loaded_config),
        loader,
        relay,
        LiveViewSettings::default(),
    );
    axum::serve(listener, app).await?;

    Ok(())
}

fn make_app(
    config: Arc<config::Args>,
    loader: Arc<InitialSnapshotLoader>,
    relay: Arc<ContactRelay>,
    live: LiveViewSettings,
) -> Router {
    Router::new()
        .route("/", get(handle_page))
        .route("/api/status", get(handle_status))
        .route("/api/contact", post(handle_contact))
        .route("/ws", get(ws_handler))
        .fallback(fallback)
        .layer(Extension(config))
        .layer(Extension(loader))
        .layer(Extension(relay))
        .layer(Extension(live))
        .layer(CorsLayer)
}

/// The status service could not produce a snapshot for this request.
struct UpstreamUnavailable(FetchError);

impl From<FetchError> for UpstreamUnavailable {
    fn from(err: FetchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for UpstreamUnavailable {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_GATEWAY,
            format!("Status service unavailable: {}", self.0),
        )
            .into_response()
    }
}

async fn handle_page(
    config: Extension<Arc<config::Args>>,
    loader: Extension<Arc<InitialSnapshotLoader>>,
) -> Result<Html<String>, UpstreamUnavailable> {
    let snapshot = loader.load().await?;

    let ctx = PageContext {
        now: Utc::now(),
        turnstile_site_key: &config.turnstile_site_key,
    };

    Ok(Html(page::render(&snapshot, &ctx)))
}

async fn handle_status(
    loader: Extension<Arc<InitialSnapshotLoader>>,
) -> Result<Response, UpstreamUnavailable> {
    let snapshot = loader.load().await?;
    Ok(Json(LiveStatus::new(&snapshot, Utc::now())).into_response())
}

fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
}

async fn handle_contact(
    headers: HeaderMap,
    relay: Extension<Arc<ContactRelay>>,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Result<Json<serde_json::Value>, RelayError> {
    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            debug!("Unreadable contact submission: {}", rejection.body_text());
            return Err(RelayError::Invalid("body"));
        }
    };

    if let Err(err) = relay.relay(&submission, client_ip(&headers)).await {
        warn!("Contact submission not relayed: {}", err);
        return Err(err);
    }

    Ok(Json(json!({ "success": true })))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    loader: Extension<Arc<InitialSnapshotLoader>>,
    live: Extension<LiveViewSettings>,
) -> Response {
    let seed = loader.load().await;
    match seed {
        Ok(seed) => ws.on_upgrade(move |socket| handle_socket(socket, loader.0, seed, live.0)),
        Err(err) => UpstreamUnavailable(err).into_response(),
    }
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: LiveEvent<'_>,
) -> Result<(), axum::Error> {
    let serialized = serde_json::to_string(&event).map_err(axum::Error::new)?;
    sender.send(Message::Text(serialized.into())).await
}

/// One open page. The synchronizer lives exactly as long as the socket.
async fn handle_socket(
    socket: WebSocket,
    loader: Arc<InitialSnapshotLoader>,
    seed: Arc<StatusSnapshot>,
    live: LiveViewSettings,
) {
    let mut sync = Synchronizer::spawn(
        loader.source(),
        loader.id(),
        seed.clone(),
        live.poll_interval,
    );
    let mut updates = sync.subscribe();
    let (mut sender, mut receiver) = socket.split();

    let ready = LiveEvent::Ready(LiveStatus::new(&seed, Utc::now()));
    if let Err(err) = send_event(&mut sender, ready).await {
        debug!("live view disconnected before ready: {}", err);
        return;
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    debug!("live view socket error: {}", err);
                    break;
                }
                Some(Ok(_)) => {}
            },

            changed = timeout(live.keepalive, updates.changed()) => {
                let snapshot = match changed {
                    // nothing new, resend as keepalive
                    Err(_) => sync.current(),
                    Ok(Err(err)) => {
                        warn!("failed watching for latest snapshot: {}", err);
                        break;
                    }
                    Ok(Ok(())) => updates.borrow_and_update().clone(),
                };

                let event = LiveEvent::StatusUpdate(LiveStatus::new(&snapshot, Utc::now()));
                if let Err(err) = send_event(&mut sender, event).await {
                    debug!("live view disconnected: {}", err);
                    break;
                }
            }
        }
    }

    sync.shutdown();
    sync.stopped().await;
    debug!("live view closed");
}

async fn fallback(uri: Uri) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("No route for {}", uri))
}
