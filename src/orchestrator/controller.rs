//! Desk controller.
//!
//! Routes UI commands to the store of the active record kind and turns store events into
//! UI events.

use super::sync::{follow_up, SyncPolicy};
use crate::dialog::DialogAction;
use crate::model::{DeskConfig, DeskEvent, MutationOutcome, RecordKind, StoreEvent};
use crate::store::{RecordApi, RecordStore, StoreCommand, StoreHandle};
use crate::ticker::PriceTicker;
use anyhow::Result;
use futures::FutureExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    SelectKind(RecordKind),
    Reload,
    Apply(DialogAction),
    Quit,
}

/// One store per record kind.
#[derive(Debug, Clone)]
pub(crate) struct Stores {
    stocks: StoreHandle,
    brokers: StoreHandle,
}

impl Stores {
    pub fn get(&self, kind: RecordKind) -> &StoreHandle {
        match kind {
            RecordKind::Stocks => &self.stocks,
            RecordKind::Brokers => &self.brokers,
        }
    }
}

pub(crate) fn spawn_stores(
    cfg: &DeskConfig,
    event_tx: UnboundedSender<StoreEvent>,
) -> Result<Stores> {
    let ticker = PriceTicker::new(cfg.price_jitter);
    let spawn = |kind: RecordKind, seed: Option<u64>| -> Result<StoreHandle> {
        let api = RecordApi::new(
            kind,
            cfg.base_url(kind),
            &cfg.user_agent,
            cfg.request_timeout,
        )?;
        Ok(RecordStore::new(api, ticker, seed).spawn(event_tx.clone()))
    };
    Ok(Stores {
        stocks: spawn(RecordKind::Stocks, cfg.seed)?,
        brokers: spawn(RecordKind::Brokers, cfg.seed.map(|s| s.wrapping_add(1)))?,
    })
}

fn tick_interval(cfg: &DeskConfig) -> Option<Interval> {
    let period = cfg.refresh_interval.filter(|d| !d.is_zero())?;
    let mut iv = tokio::time::interval_at(Instant::now() + period, period);
    iv.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(iv)
}

/// Run until the UI quits or drops its command sender.
pub(crate) async fn run_controller(
    cfg: &DeskConfig,
    desk_tx: UnboundedSender<DeskEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let (store_tx, mut store_rx) = mpsc::unbounded_channel::<StoreEvent>();
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<MutationOutcome>();
    let stores = spawn_stores(cfg, store_tx)?;
    let policy = SyncPolicy {
        merge_locally: cfg.merge_locally,
        reload_delay: cfg.reload_delay,
    };

    let mut active = cfg.initial_kind;
    stores.get(active).request_fetch();
    let mut ticker = tick_interval(cfg);
    info!(?active, ticking = ticker.is_some(), "controller started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::SelectKind(kind)) => {
                        active = kind;
                        stores.get(kind).request_fetch();
                    }
                    Some(UiCommand::Reload) => {
                        stores.get(active).request_fetch();
                        let _ = desk_tx.send(DeskEvent::Info("Reloading…".into()));
                    }
                    Some(UiCommand::Apply(action)) => {
                        debug!(?active, ?action, "applying dialog action");
                        let store = stores.get(active);
                        // Queued now; the outcome comes back on `outcome_rx` without stalling this loop.
                        let pending = match action {
                            DialogAction::Create(record) => store.create(record).boxed(),
                            DialogAction::Update(record) => store.update(record).boxed(),
                            DialogAction::Delete(id) => store.delete(id).boxed(),
                        };
                        let outcome_tx = outcome_tx.clone();
                        tokio::spawn(async move {
                            let _ = outcome_tx.send(pending.await);
                        });
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            Some(ev) = store_rx.recv() => {
                handle_store_event(ev, &desk_tx);
            }
            Some(outcome) = outcome_rx.recv() => {
                handle_outcome(outcome, &stores, policy, &desk_tx);
            }
            _ = async {
                match ticker.as_mut() {
                    Some(t) => {
                        t.tick().await;
                    }
                    None => futures::future::pending::<()>().await,
                }
            } => {
                if !stores.get(active).tick() {
                    debug!(?active, "previous tick still queued, skipping");
                }
            }
        }
    }

    info!("controller stopped");
    Ok(())
}

fn handle_store_event(ev: StoreEvent, desk_tx: &UnboundedSender<DeskEvent>) {
    match ev {
        StoreEvent::Changed { kind, records } => {
            let _ = desk_tx.send(DeskEvent::Records { kind, records });
        }
        StoreEvent::FetchFailed { kind, error } => {
            let _ = desk_tx.send(DeskEvent::Info(format!(
                "Loading {} failed: {error}",
                kind.title().to_lowercase()
            )));
        }
    }
}

fn handle_outcome(
    outcome: MutationOutcome,
    stores: &Stores,
    policy: SyncPolicy,
    desk_tx: &UnboundedSender<DeskEvent>,
) {
    let store = stores.get(outcome.kind);
    match &outcome.result {
        Err(e) => {
            let _ = desk_tx.send(DeskEvent::Alert(e.alert_text()));
        }
        Ok(_) => {
            let _ = desk_tx.send(DeskEvent::Info(format!(
                "{} {}",
                outcome.op.verb(),
                outcome.kind.singular()
            )));
        }
    }

    let next = follow_up(&outcome, policy);
    if let Some(edit) = next.merge {
        store.send(StoreCommand::Merge(edit));
    }
    match next.reload_after {
        Some(delay) if delay.is_zero() => {
            store.request_fetch();
        }
        Some(delay) => {
            // The fetch still goes through the store's intake, after whatever is queued by then.
            let store = store.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                store.request_fetch();
            });
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;
    use crate::test_support::{spawn_backend, Backend};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn rec(id: u64, name: &str) -> Record {
        Record {
            id,
            name: name.into(),
            price: "10.0000".into(),
            amount: "1".into(),
        }
    }

    async fn config(refresh_interval: Option<Duration>) -> (DeskConfig, Backend) {
        let stocks = Backend::seeded(vec![rec(1, "A"), rec(2, "B")]);
        let brokers = Backend::seeded(vec![rec(7, "Broker")]);
        let cfg = DeskConfig {
            stocks_url: spawn_backend(stocks.clone(), "/stocks/").await,
            brokers_url: spawn_backend(brokers, "/api/brokers/").await,
            initial_kind: RecordKind::Stocks,
            user_agent: "tickerdesk-test".into(),
            request_timeout: Duration::from_secs(5),
            page_size: 10,
            refresh_interval,
            reload_delay: Some(Duration::ZERO),
            merge_locally: true,
            price_jitter: 5.0,
            seed: Some(11),
        };
        (cfg, stocks)
    }

    fn start(
        cfg: DeskConfig,
    ) -> (UnboundedSender<UiCommand>, UnboundedReceiver<DeskEvent>) {
        let (desk_tx, desk_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move { run_controller(&cfg, desk_tx, cmd_rx).await });
        (cmd_tx, desk_rx)
    }

    async fn next_event(rx: &mut UnboundedReceiver<DeskEvent>) -> DeskEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for desk event")
            .expect("controller closed")
    }

    async fn next_records(
        rx: &mut UnboundedReceiver<DeskEvent>,
    ) -> (RecordKind, Arc<Vec<Record>>) {
        loop {
            if let DeskEvent::Records { kind, records } = next_event(rx).await {
                return (kind, records);
            }
        }
    }

    #[tokio::test]
    async fn loads_initial_kind_on_start() {
        let (cfg, _) = config(None).await;
        let (_cmd, mut events) = start(cfg);
        let (kind, records) = next_records(&mut events).await;
        assert_eq!(kind, RecordKind::Stocks);
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn delete_merges_then_reloads() {
        let (cfg, backend) = config(None).await;
        let (cmd, mut events) = start(cfg);
        next_records(&mut events).await;

        cmd.send(UiCommand::Apply(DialogAction::Delete(2))).unwrap();
        match next_event(&mut events).await {
            DeskEvent::Info(msg) => assert_eq!(msg, "Deleted stock"),
            other => panic!("unexpected event: {other:?}"),
        }
        let (_, merged) = next_records(&mut events).await;
        assert_eq!(merged.len(), 1);
        let (_, reloaded) = next_records(&mut events).await;
        assert_eq!(reloaded.as_slice(), backend.records.lock().unwrap().as_slice());
    }

    #[tokio::test]
    async fn failed_mutation_raises_alert() {
        let (cfg, backend) = config(None).await;
        let (cmd, mut events) = start(cfg);
        next_records(&mut events).await;

        backend.fail.store(true, std::sync::atomic::Ordering::Relaxed);
        cmd.send(UiCommand::Apply(DialogAction::Update(rec(1, "Z")))).unwrap();
        match next_event(&mut events).await {
            DeskEvent::Alert(msg) => assert!(msg.starts_with("Error occurred. Details:")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn switching_kind_fetches_that_collection() {
        let (cfg, _) = config(None).await;
        let (cmd, mut events) = start(cfg);
        next_records(&mut events).await;

        cmd.send(UiCommand::SelectKind(RecordKind::Brokers)).unwrap();
        let (kind, records) = next_records(&mut events).await;
        assert_eq!(kind, RecordKind::Brokers);
        assert_eq!(records[0].name, "Broker");
    }

    #[tokio::test]
    async fn ticks_move_prices_of_active_kind() {
        let (cfg, _) = config(Some(Duration::from_millis(20))).await;
        let (_cmd, mut events) = start(cfg);
        let (_, loaded) = next_records(&mut events).await;
        assert!(loaded.iter().all(|r| r.price == "10.0000"));

        let (kind, ticked) = next_records(&mut events).await;
        assert_eq!(kind, RecordKind::Stocks);
        assert!(ticked.iter().any(|r| r.price != "10.0000"));
    }

    #[tokio::test]
    async fn delayed_reload_follows_the_merge() {
        let (mut cfg, backend) = config(None).await;
        cfg.reload_delay = Some(Duration::from_millis(50));
        let (cmd, mut events) = start(cfg);
        next_records(&mut events).await;

        let sent = tokio::time::Instant::now();
        cmd.send(UiCommand::Apply(DialogAction::Delete(1))).unwrap();
        let (_, merged) = next_records(&mut events).await;
        assert_eq!(merged.len(), 1);

        let (_, reloaded) = next_records(&mut events).await;
        assert!(sent.elapsed() >= Duration::from_millis(50));
        assert_eq!(reloaded.as_slice(), backend.records.lock().unwrap().as_slice());
    }

    #[tokio::test]
    async fn without_merge_only_the_reload_updates_rows() {
        let (mut cfg, _) = config(None).await;
        cfg.merge_locally = false;
        cfg.reload_delay = Some(Duration::from_millis(50));
        let (cmd, mut events) = start(cfg);
        next_records(&mut events).await;

        let sent = tokio::time::Instant::now();
        cmd.send(UiCommand::Apply(DialogAction::Delete(2))).unwrap();
        match next_event(&mut events).await {
            DeskEvent::Info(msg) => assert_eq!(msg, "Deleted stock"),
            other => panic!("unexpected event: {other:?}"),
        }
        let (_, rows) = next_records(&mut events).await;
        assert!(sent.elapsed() >= Duration::from_millis(50));
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn no_merge_no_reload_leaves_rows_alone() {
        let (mut cfg, _) = config(None).await;
        cfg.merge_locally = false;
        cfg.reload_delay = None;
        let (cmd, mut events) = start(cfg);
        next_records(&mut events).await;

        cmd.send(UiCommand::Apply(DialogAction::Delete(2))).unwrap();
        assert!(matches!(next_event(&mut events).await, DeskEvent::Info(_)));
        let quiet = timeout(Duration::from_millis(150), events.recv()).await;
        assert!(quiet.is_err(), "unexpected event: {quiet:?}");
    }
}
