use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use super::selection::Selection;
use super::{RowId, RowSource, TableRow};
use crate::error::{DashboardError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    /// A later load started before this one finished; its rows were dropped
    Superseded,
}

/// Point-in-time copy of a table.
#[derive(Debug, Clone)]
pub struct TableSnapshot<R> {
    pub rows: Vec<R>,
    pub loading: bool,
    pub error: Option<DashboardError>,
    pub selection: Selection,
    pub favorites: BTreeSet<RowId>,
}

/// Secondary per-row lookup run after a load.
#[async_trait]
pub trait Enricher<R>: Send + Sync {
    type Output: Send;

    async fn enrich(&self, row: &R) -> Result<Self::Output>;
}

/// One row's enrichment result, delivered as soon as it resolves.
#[derive(Debug, Clone)]
pub struct EnrichmentUpdate<T> {
    pub index: usize,
    pub id: RowId,
    pub result: Result<T>,
}

struct TableState<R> {
    rows: Vec<R>,
    loading: bool,
    error: Option<DashboardError>,
    selection: Selection,
    favorites: BTreeSet<RowId>,
    subscribers: Vec<mpsc::UnboundedSender<Selection>>,
}

impl<R: TableRow> TableState<R> {
    fn has_row(&self, id: &str) -> bool {
        self.rows.iter().any(|row| row.id() == id)
    }

    /// Send the current selection to every live subscriber. Called with the
    /// state lock held so notifications keep mutation order.
    fn notify(&mut self) {
        let snapshot = self.selection.clone();
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}

/// Clears the enrichment flag when the run ends, however it ends.
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Fetch-merge-select cycle of one table instance.
///
/// Rows are owned by the instance and replaced wholesale on every successful
/// load. Selection changes are pushed to subscribers once per change.
pub struct TableReconciler<R: TableRow> {
    source: Arc<dyn RowSource<Row = R>>,
    state: RwLock<TableState<R>>,
    generation: AtomicU64,
    enriching: AtomicBool,
}

impl<R: TableRow> TableReconciler<R> {
    pub fn new(source: Arc<dyn RowSource<Row = R>>) -> Self {
        Self {
            source,
            state: RwLock::new(TableState {
                rows: Vec::new(),
                loading: false,
                error: None,
                selection: Selection::new(),
                favorites: BTreeSet::new(),
                subscribers: Vec::new(),
            }),
            generation: AtomicU64::new(0),
            enriching: AtomicBool::new(false),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Fetch the collection and replace all rows.
    ///
    /// Loading is cleared on both outcomes. If a newer load started in the
    /// meantime this result is discarded and the newer load owns the flag.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().await.loading = true;

        let fetched = self.source.fetch().await;

        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(source = self.source.name(), "Discarding stale table load");
            return Ok(LoadOutcome::Superseded);
        }
        state.loading = false;

        let fetched = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                warn!(source = self.source.name(), error = %e, "Table load failed");
                state.error = Some(e.clone());
                return Err(e);
            }
        };

        let mut seen = BTreeSet::new();
        let mut rows = Vec::with_capacity(fetched.len());
        for row in fetched {
            if seen.insert(row.id().to_string()) {
                rows.push(row);
            } else {
                warn!(source = self.source.name(), id = row.id(), "Dropping duplicate row id");
            }
        }
        state.rows = rows;
        state.error = None;

        let existing: BTreeSet<&str> = seen.iter().map(String::as_str).collect();
        let before = state.selection.clone();
        state.selection.retain_existing(&existing);
        state.favorites.retain(|id| existing.contains(id.as_str()));
        if state.selection != before {
            state.notify();
        }

        let count = state.rows.len();
        info!(source = self.source.name(), count, "Table loaded");
        Ok(LoadOutcome::Loaded { count })
    }

    pub async fn rows(&self) -> Vec<R> {
        self.state.read().await.rows.clone()
    }

    pub async fn loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn last_error(&self) -> Option<DashboardError> {
        self.state.read().await.error.clone()
    }

    pub async fn selection(&self) -> Selection {
        self.state.read().await.selection.clone()
    }

    pub async fn snapshot(&self) -> TableSnapshot<R> {
        let state = self.state.read().await;
        TableSnapshot {
            rows: state.rows.clone(),
            loading: state.loading,
            error: state.error.clone(),
            selection: state.selection.clone(),
            favorites: state.favorites.clone(),
        }
    }

    /// Receive every selection change from now on.
    pub async fn subscribe_selection(&self) -> mpsc::UnboundedReceiver<Selection> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.write().await.subscribers.push(tx);
        rx
    }

    /// Flip one row's checkbox. Returns whether it is selected afterwards.
    pub async fn toggle(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.has_row(id) {
            return Err(DashboardError::NotFound(format!("row {id}")));
        }
        let selected = state.selection.toggle(id);
        state.notify();
        Ok(selected)
    }

    pub async fn toggle_all(&self) -> Selection {
        let mut state = self.state.write().await;
        let TableState {
            rows, selection, ..
        } = &mut *state;
        selection.toggle_all(rows.iter().map(|row| row.id()));
        state.notify();
        state.selection.clone()
    }

    /// Returns whether the row is a favourite afterwards.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.has_row(id) {
            return Err(DashboardError::NotFound(format!("row {id}")));
        }
        if state.favorites.remove(id) {
            Ok(false)
        } else {
            state.favorites.insert(id.to_string());
            Ok(true)
        }
    }

    pub fn is_enriching(&self) -> bool {
        self.enriching.load(Ordering::SeqCst)
    }

    /// Enrich the current rows strictly one at a time, in index order.
    ///
    /// Each result is sent on `updates` as soon as it resolves. A failed row
    /// is reported in its update and does not stop the run. Rejects a second
    /// run while one is in flight. Returns the number of updates delivered.
    pub async fn enrich<E>(
        &self,
        enricher: &E,
        updates: mpsc::UnboundedSender<EnrichmentUpdate<E::Output>>,
    ) -> Result<usize>
    where
        E: Enricher<R> + ?Sized,
    {
        if self
            .enriching
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DashboardError::InProgress("enrichment"));
        }
        let _running = RunningFlag(&self.enriching);

        let rows = self.rows().await;
        let mut delivered = 0;
        for (index, row) in rows.iter().enumerate() {
            let result = enricher.enrich(row).await;
            if let Err(e) = &result {
                warn!(id = row.id(), error = %e, "Row enrichment failed");
            }
            let update = EnrichmentUpdate {
                index,
                id: row.id().to_string(),
                result,
            };
            if updates.send(update).is_err() {
                debug!("Enrichment listener gone, stopping");
                break;
            }
            delivered += 1;
        }
        Ok(delivered)
    }
}
