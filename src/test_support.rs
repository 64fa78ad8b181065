//! Helpers shared by the unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;

use crate::lanyard::{FetchError, StatusSource};
use crate::snapshot::{Identity, Presence, StatusSnapshot};

/// Serve `router` on an ephemeral local port, returning its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn snapshot(presence: Presence, username: &str) -> StatusSnapshot {
    StatusSnapshot {
        presence,
        identity: Identity {
            id: "121672207800860677".to_string(),
            username: username.to_string(),
        },
        playback: None,
        location: "Canterbury, UK".to_string(),
    }
}

pub enum Scripted {
    Ok(StatusSnapshot),
    Fail,
    /// Succeed after sleeping, to force completions out of order.
    Delayed(Duration, StatusSnapshot),
}

/// A [`StatusSource`] answering from a queue of scripted replies. Once the
/// queue is empty every fetch fails.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    replies: Arc<Mutex<VecDeque<Scripted>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(replies: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch(&self, _id: &str) -> Result<StatusSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Ok(snapshot)) => Ok(snapshot),
            Some(Scripted::Delayed(delay, snapshot)) => {
                tokio::time::sleep(delay).await;
                Ok(snapshot)
            }
            Some(Scripted::Fail) | None => Err(FetchError::Status(503)),
        }
    }
}
