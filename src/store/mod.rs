//! Record store.
//!
//! One actor task per record kind owns the collection. Every change to it, whether a
//! fetch, a local merge or a price tick, arrives through the same command channel and is
//! applied in arrival order, so there is exactly one writer.

mod api;

pub use api::RecordApi;

use crate::model::{MutationOp, MutationOutcome, NewRecord, Record, RecordKind, StoreEvent};
use crate::ticker::PriceTicker;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Transport and backend failures are reported the same way: a name and a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name} {message}")]
pub struct StoreError {
    pub name: String,
    pub message: String,
}

impl StoreError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Message shown to the user when a mutation fails.
    pub fn alert_text(&self) -> String {
        format!("Error occurred. Details: {self}")
    }

    fn closed() -> Self {
        Self::new("StoreClosed", "record store is no longer running")
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        let name = if e.is_timeout() {
            "TimeoutError"
        } else if e.is_decode() {
            "DecodeError"
        } else {
            "TransportError"
        };
        StoreError::new(name, e.to_string())
    }
}

/// A change to apply to the local collection without a round-trip to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalEdit {
    /// Replace the record with the same id, or append it.
    Upsert(Record),
    Remove(u64),
}

/// Mutations always answer their caller; the outcome is not broadcast.
#[derive(Debug)]
pub enum StoreCommand {
    Fetch {
        reply: Option<oneshot::Sender<Result<Arc<Vec<Record>>, StoreError>>>,
    },
    Create {
        record: NewRecord,
        reply: oneshot::Sender<MutationOutcome>,
    },
    Update {
        record: Record,
        reply: oneshot::Sender<MutationOutcome>,
    },
    Delete {
        id: u64,
        reply: oneshot::Sender<MutationOutcome>,
    },
    Merge(LocalEdit),
    Tick,
}

pub struct RecordStore {
    api: RecordApi,
    records: Arc<Vec<Record>>,
    ticker: PriceTicker,
    rng: StdRng,
    /// Set while a `Tick` sits in the queue, so a busy store never accumulates a burst.
    tick_pending: Arc<AtomicBool>,
}

impl RecordStore {
    pub fn new(api: RecordApi, ticker: PriceTicker, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            api,
            records: Arc::new(Vec::new()),
            ticker,
            rng,
            tick_pending: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.api.kind
    }

    /// Spawn the actor and return a handle to its intake.
    pub fn spawn(self, event_tx: mpsc::UnboundedSender<StoreEvent>) -> StoreHandle {
        let kind = self.kind();
        let tick_pending = self.tick_pending.clone();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<StoreCommand>();
        tokio::spawn(self.run(cmd_rx, event_tx));
        StoreHandle {
            kind,
            cmd_tx,
            tick_pending,
        }
    }

    /// Process commands one at a time until every handle is dropped.
    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<StoreCommand>,
        event_tx: mpsc::UnboundedSender<StoreEvent>,
    ) {
        let kind = self.kind();
        info!(?kind, url = %self.api.collection_url(), "record store started");
        while let Some(cmd) = cmd_rx.recv().await {
            self.handle(cmd, &event_tx).await;
        }
        debug!(?kind, "record store stopped");
    }

    async fn handle(&mut self, cmd: StoreCommand, event_tx: &mpsc::UnboundedSender<StoreEvent>) {
        let kind = self.kind();
        match cmd {
            StoreCommand::Fetch { reply } => {
                debug!(?kind, "fetching records");
                let res = match self.api.fetch_all().await {
                    Ok(records) => {
                        info!(?kind, count = records.len(), "records loaded");
                        self.records = Arc::new(records);
                        self.emit_changed(event_tx);
                        Ok(self.records.clone())
                    }
                    Err(error) => {
                        // Stale data stays visible.
                        warn!(?kind, %error, "fetch failed");
                        let _ = event_tx.send(StoreEvent::FetchFailed {
                            kind,
                            error: error.clone(),
                        });
                        Err(error)
                    }
                };
                if let Some(tx) = reply {
                    let _ = tx.send(res);
                }
            }
            StoreCommand::Create { record, reply } => {
                let result = self.api.create(&record).await;
                self.finish_mutation(MutationOp::Create, result, reply);
            }
            StoreCommand::Update { record, reply } => {
                // The sent record is what we know was accepted; prefer the echo when present.
                let result = self
                    .api
                    .update(&record)
                    .await
                    .map(|echo| Some(echo.unwrap_or(record)));
                self.finish_mutation(MutationOp::Update, result, reply);
            }
            StoreCommand::Delete { id, reply } => {
                let result = self.api.delete(id).await.map(|()| None);
                self.finish_mutation(MutationOp::Delete { id }, result, reply);
            }
            StoreCommand::Merge(edit) => {
                apply_edit(Arc::make_mut(&mut self.records), edit);
                self.emit_changed(event_tx);
            }
            StoreCommand::Tick => {
                self.tick_pending.store(false, Ordering::Release);
                if self.records.is_empty() {
                    return;
                }
                let records = Arc::make_mut(&mut self.records);
                let changed = self.ticker.apply(records, &mut self.rng);
                debug!(?kind, changed, "prices ticked");
                self.emit_changed(event_tx);
            }
        }
    }

    fn finish_mutation(
        &self,
        op: MutationOp,
        result: Result<Option<Record>, StoreError>,
        reply: oneshot::Sender<MutationOutcome>,
    ) {
        let kind = self.kind();
        match &result {
            Ok(_) => info!(?kind, ?op, "mutation accepted"),
            Err(e) => error!(?kind, ?op, error = %e, "mutation failed"),
        }
        if reply.send(MutationOutcome { kind, op, result }).is_err() {
            debug!(?kind, ?op, "mutation caller went away");
        }
    }

    fn emit_changed(&self, event_tx: &mpsc::UnboundedSender<StoreEvent>) {
        let _ = event_tx.send(StoreEvent::Changed {
            kind: self.kind(),
            records: self.records.clone(),
        });
    }
}

pub fn apply_edit(records: &mut Vec<Record>, edit: LocalEdit) {
    match edit {
        LocalEdit::Upsert(record) => match records.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record,
            None => records.push(record),
        },
        LocalEdit::Remove(id) => records.retain(|r| r.id != id),
    }
}

/// Cloneable intake for one store.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    pub kind: RecordKind,
    cmd_tx: mpsc::UnboundedSender<StoreCommand>,
    tick_pending: Arc<AtomicBool>,
}

impl StoreHandle {
    pub fn send(&self, cmd: StoreCommand) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }

    pub fn request_fetch(&self) -> bool {
        self.send(StoreCommand::Fetch { reply: None })
    }

    /// Queue a price tick unless one is already waiting. Returns whether a tick was queued.
    pub fn tick(&self) -> bool {
        if self.tick_pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        if self.send(StoreCommand::Tick) {
            true
        } else {
            self.tick_pending.store(false, Ordering::Release);
            false
        }
    }

    pub async fn fetch_all(&self) -> Result<Arc<Vec<Record>>, StoreError> {
        let (tx, rx) = oneshot::channel();
        if !self.send(StoreCommand::Fetch { reply: Some(tx) }) {
            return Err(StoreError::closed());
        }
        rx.await.map_err(|_| StoreError::closed())?
    }

    // The mutation helpers queue their command before returning, so intake order
    // follows call order even when the returned future is awaited elsewhere.

    pub fn create(&self, record: NewRecord) -> impl Future<Output = MutationOutcome> + Send + 'static {
        self.mutate(MutationOp::Create, |reply| StoreCommand::Create { record, reply })
    }

    pub fn update(&self, record: Record) -> impl Future<Output = MutationOutcome> + Send + 'static {
        self.mutate(MutationOp::Update, |reply| StoreCommand::Update { record, reply })
    }

    pub fn delete(&self, id: u64) -> impl Future<Output = MutationOutcome> + Send + 'static {
        self.mutate(MutationOp::Delete { id }, move |reply| StoreCommand::Delete { id, reply })
    }

    fn mutate(
        &self,
        op: MutationOp,
        build: impl FnOnce(oneshot::Sender<MutationOutcome>) -> StoreCommand,
    ) -> impl Future<Output = MutationOutcome> + Send + 'static {
        let kind = self.kind;
        let (tx, rx) = oneshot::channel();
        let sent = self.send(build(tx));
        async move {
            let closed = MutationOutcome {
                kind,
                op,
                result: Err(StoreError::closed()),
            };
            if !sent {
                return closed;
            }
            rx.await.unwrap_or(closed)
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
