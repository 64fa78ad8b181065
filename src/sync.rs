use std::sync::Arc;
use std::time::Duration;

use tokio::{
    sync::watch,
    task::{JoinHandle, JoinSet},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::lanyard::{FetchError, StatusSource};
use crate::snapshot::StatusSnapshot;

/// Time between two refetches of a live view.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

pub type SnapshotReceiver = watch::Receiver<Arc<StatusSnapshot>>;

/// Keeps one displayed snapshot fresh by refetching it on a fixed interval.
///
/// Each fetch is numbered when it starts; a completion is published only if
/// no later-started fetch has been published already. Failed fetches leave
/// the current snapshot untouched.
pub struct Synchronizer {
    source: Arc<dyn StatusSource>,
    id: String,
    interval: Duration,
    publish: watch::Sender<Arc<StatusSnapshot>>,
    cancel: CancellationToken,
    next_seq: u64,
    published_seq: u64,
}

impl Synchronizer {
    pub fn spawn(
        source: Arc<dyn StatusSource>,
        id: impl Into<String>,
        seed: Arc<StatusSnapshot>,
        interval: Duration,
    ) -> SyncHandle {
        let (publish, receiver) = watch::channel(seed);
        let cancel = CancellationToken::new();

        let synchronizer = Synchronizer {
            source,
            id: id.into(),
            interval,
            publish,
            cancel: cancel.clone(),
            next_seq: 0,
            published_seq: 0,
        };

        SyncHandle {
            receiver,
            cancel,
            task: Some(tokio::spawn(synchronizer.run())),
        }
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The seed is fresh, skip the immediate first tick.
        ticker.tick().await;

        let mut in_flight: JoinSet<(u64, Result<StatusSnapshot, FetchError>)> = JoinSet::new();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(joined) = in_flight.join_next() => match joined {
                    Ok((seq, result)) => self.complete(seq, result),
                    Err(err) => warn!("poll task for {} did not finish: {}", self.id, err),
                },

                _ = ticker.tick() => self.start_fetch(&mut in_flight),
            }
        }

        in_flight.abort_all();
        debug!("synchronizer for {} stopped after {} polls", self.id, self.next_seq);
    }

    fn start_fetch(&mut self, in_flight: &mut JoinSet<(u64, Result<StatusSnapshot, FetchError>)>) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let source = self.source.clone();
        let id = self.id.clone();

        in_flight.spawn(async move { (seq, source.fetch(&id).await) });
    }

    fn complete(&mut self, seq: u64, result: Result<StatusSnapshot, FetchError>) {
        match result {
            Ok(snapshot) if seq > self.published_seq => {
                self.published_seq = seq;
                self.publish.send_replace(Arc::new(snapshot));
            }
            Ok(_) => {
                debug!(
                    "discarding poll #{} for {}, #{} already published",
                    seq, self.id, self.published_seq
                );
            }
            Err(err) => {
                debug!("poll #{} for {} failed, keeping snapshot: {}", seq, self.id, err);
            }
        }
    }
}

/// Owner side of a running [`Synchronizer`]. Dropping it stops polling.
pub struct SyncHandle {
    receiver: SnapshotReceiver,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.receiver.clone()
    }

    pub fn current(&self) -> Arc<StatusSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Stop polling and abort any fetch still in flight. Safe to call more
    /// than once.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
        }
    }

    /// Wait for the polling task to exit. Only meaningful after [`shutdown`](Self::shutdown).
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("synchronizer task ended abnormally: {}", err);
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
