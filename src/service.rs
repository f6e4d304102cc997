//! Single owner of persisted state.
//!
//! The `StateStore` lives on one blocking task; every other context talks to
//! it through a `StoreHandle` (mpsc request, oneshot reply). Mutations are
//! applied one at a time, so a read-modify-write of the log can never
//! interleave with another. Each applied mutation is broadcast as a
//! `StoreChange` to subscribers.

use anyhow::Result;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::TrackerError;
use crate::logging::{self, v_str, Domain};
use crate::nav::{NavSettings, NavigationMode};
use crate::puzzle::{PuzzleLog, PuzzleRecord};
use crate::storage::StateStore;

type Reply<T> = oneshot::Sender<Result<T>>;

#[derive(Debug)]
pub enum StoreRequest {
    GetLog { reply: Reply<PuzzleLog> },
    Upsert { date: String, time: Option<String>, reply: Reply<PuzzleLog> },
    /// Upsert many records in order; the last record per date wins.
    Merge { records: Vec<PuzzleRecord>, reply: Reply<usize> },
    /// Append records whose date is absent. Replies with how many were added.
    InsertMissing { records: Vec<PuzzleRecord>, reply: Reply<usize> },
    Clear { reply: Reply<()> },
    Settings { reply: Reply<NavSettings> },
    SetMode { mode: NavigationMode, reply: Reply<()> },
    SetAutoNav { active: bool, reply: Reply<()> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Puzzles { len: usize },
    Mode(NavigationMode),
    AutoNav(bool),
}

#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreRequest>,
    changes: broadcast::Sender<StoreChange>,
}

/// Start the owning task. Must be called inside a tokio runtime.
pub fn spawn(store: StateStore) -> StoreHandle {
    let (tx, rx) = mpsc::channel(64);
    let (changes, _) = broadcast::channel(64);
    let actor = StoreActor {
        store,
        changes: changes.clone(),
    };
    tokio::task::spawn_blocking(move || actor.run(rx));
    StoreHandle { tx, changes }
}

impl StoreHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> StoreRequest) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| TrackerError::StoreClosed)?;
        rx.await.map_err(|_| TrackerError::StoreClosed)?
    }

    pub async fn log(&self) -> Result<PuzzleLog> {
        self.request(|reply| StoreRequest::GetLog { reply }).await
    }

    /// Record `time` for `date` and return the log as stored afterwards.
    pub async fn upsert(&self, date: impl Into<String>, time: Option<String>) -> Result<PuzzleLog> {
        let date = date.into();
        self.request(|reply| StoreRequest::Upsert { date, time, reply }).await
    }

    pub async fn merge(&self, records: Vec<PuzzleRecord>) -> Result<usize> {
        self.request(|reply| StoreRequest::Merge { records, reply }).await
    }

    pub async fn insert_missing(&self, records: Vec<PuzzleRecord>) -> Result<usize> {
        self.request(|reply| StoreRequest::InsertMissing { records, reply }).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.request(|reply| StoreRequest::Clear { reply }).await
    }

    pub async fn settings(&self) -> Result<NavSettings> {
        self.request(|reply| StoreRequest::Settings { reply }).await
    }

    pub async fn set_mode(&self, mode: NavigationMode) -> Result<()> {
        self.request(|reply| StoreRequest::SetMode { mode, reply }).await
    }

    pub async fn set_auto_nav(&self, active: bool) -> Result<()> {
        self.request(|reply| StoreRequest::SetAutoNav { active, reply }).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

struct StoreActor {
    store: StateStore,
    changes: broadcast::Sender<StoreChange>,
}

impl StoreActor {
    fn run(mut self, mut rx: mpsc::Receiver<StoreRequest>) {
        while let Some(req) = rx.blocking_recv() {
            self.handle(req);
        }
        logging::debug(Domain::Store, "service_stopped", &[]);
    }

    fn handle(&mut self, req: StoreRequest) {
        // A dropped reply receiver only means the caller stopped waiting.
        match req {
            StoreRequest::GetLog { reply } => {
                let _ = reply.send(self.store.load_log());
            }
            StoreRequest::Upsert { date, time, reply } => {
                let res = self.mutate_log(|log| {
                    log.upsert(date.clone(), time.clone());
                    Ok(log.clone())
                });
                if res.is_ok() {
                    logging::log_solve_recorded(&date, time.as_deref(), "upsert");
                }
                let _ = reply.send(res);
            }
            StoreRequest::Merge { records, reply } => {
                let n = records.len();
                let _ = reply.send(self.mutate_log(|log| {
                    for r in records {
                        log.upsert(r.date, r.time);
                    }
                    Ok(n)
                }));
            }
            StoreRequest::InsertMissing { records, reply } => {
                let _ = reply.send(self.mutate_log(|log| {
                    Ok(records
                        .into_iter()
                        .filter(|r| log.insert_missing(r.date.clone(), r.time.clone()))
                        .count())
                }));
            }
            StoreRequest::Clear { reply } => {
                let _ = reply.send(self.mutate_log(|log| {
                    log.clear();
                    Ok(())
                }));
            }
            StoreRequest::Settings { reply } => {
                let res = self.store.mode().and_then(|mode| {
                    Ok(NavSettings {
                        mode,
                        auto_nav_active: self.store.auto_nav_active()?,
                    })
                });
                let _ = reply.send(res);
            }
            StoreRequest::SetMode { mode, reply } => {
                let res = self.store.set_mode(mode);
                if res.is_ok() {
                    logging::info(Domain::Store, "mode_set", &[("mode", Value::from(u8::from(mode)))]);
                    let _ = self.changes.send(StoreChange::Mode(mode));
                }
                let _ = reply.send(res);
            }
            StoreRequest::SetAutoNav { active, reply } => {
                let res = self.store.set_auto_nav_active(active);
                if res.is_ok() {
                    let _ = self.changes.send(StoreChange::AutoNav(active));
                }
                let _ = reply.send(res);
            }
        }
    }

    /// Load the whole log, apply `f`, save the whole log, notify.
    fn mutate_log<T>(&mut self, f: impl FnOnce(&mut PuzzleLog) -> Result<T>) -> Result<T> {
        let mut log = self.store.load_log()?;
        let out = f(&mut log)?;
        if let Err(err) = self.store.save_log(&log) {
            logging::warn(Domain::Store, "save_failed", &[("error", v_str(&format!("{:#}", err)))]);
            return Err(err);
        }
        let _ = self.changes.send(StoreChange::Puzzles { len: log.len() });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> StoreHandle {
        let mut store = StateStore::in_memory().unwrap();
        store.init().unwrap();
        spawn(store)
    }

    #[tokio::test]
    async fn upsert_returns_updated_log() {
        let h = handle();
        let log = h.upsert("6/1/2024", Some("0:45".into())).await.unwrap();
        assert!(log.is_solved("6/1/2024"));
        let log = h.upsert("6/1/2024", Some("1:10".into())).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(h.log().await.unwrap().get("6/1/2024").unwrap().time.as_deref(), Some("1:10"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_upserts_are_not_lost() {
        let h = handle();
        let mut tasks = Vec::new();
        for day in 1..=28u32 {
            let h = h.clone();
            tasks.push(tokio::spawn(async move {
                h.upsert(format!("2/{}/2024", day), Some("0:30".into())).await.unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(h.log().await.unwrap().len(), 28);
    }

    #[tokio::test]
    async fn insert_missing_keeps_existing_times() {
        let h = handle();
        h.upsert("6/1/2024", Some("0:45".into())).await.unwrap();
        let added = h
            .insert_missing(vec![
                PuzzleRecord::new("6/1/2024", None),
                PuzzleRecord::new("6/2/2024", None),
            ])
            .await
            .unwrap();
        assert_eq!(added, 1);
        let log = h.log().await.unwrap();
        assert!(log.is_solved("6/1/2024"));
        assert!(!log.is_solved("6/2/2024"));
    }

    #[tokio::test]
    async fn settings_and_notifications() {
        let h = handle();
        let mut rx = h.subscribe();
        h.set_mode(NavigationMode::Scrape).await.unwrap();
        h.set_auto_nav(true).await.unwrap();
        h.upsert("6/1/2024", None).await.unwrap();
        h.clear().await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), StoreChange::Mode(NavigationMode::Scrape));
        assert_eq!(rx.recv().await.unwrap(), StoreChange::AutoNav(true));
        assert_eq!(rx.recv().await.unwrap(), StoreChange::Puzzles { len: 1 });
        assert_eq!(rx.recv().await.unwrap(), StoreChange::Puzzles { len: 0 });

        let s = h.settings().await.unwrap();
        assert_eq!(s.mode, NavigationMode::Scrape);
        assert!(s.auto_nav_active);
    }
}
