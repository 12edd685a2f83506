//! Background flush worker.
//!
//! Adapts any [`StoreClient`] onto a dedicated thread: the kernel-side
//! handle forwards each write over a channel as a move and returns
//! immediately, so the matching path never waits on store acknowledgement.
//! Within one table, rows arrive at the store in the engine's event order;
//! no ordering holds across tables.

use crate::store::client::{StoreClient, StoreError};
use crate::store::rows::{OrderRow, PositionRow, PriceRow, SymbolRow};
use crossbeam::channel::{unbounded, Sender};
use std::thread::JoinHandle;
use tracing::{error, info};

enum StoreJob {
    Symbol(SymbolRow),
    Price(PriceRow),
    Orders(Vec<OrderRow>),
    Transactions(Vec<OrderRow>),
    Positions(Vec<PositionRow>),
}

/// A [`StoreClient`] whose writes run on a background thread.
///
/// Dropping the worker closes the channel, drains outstanding jobs and joins
/// the thread.
pub struct StoreWorker {
    sender: Option<Sender<StoreJob>>,
    join: Option<JoinHandle<()>>,
}

impl StoreWorker {
    /// Spawns the worker thread around the real client.
    pub fn spawn<S: StoreClient + 'static>(mut store: S) -> Self {
        let (sender, receiver) = unbounded::<StoreJob>();
        let join = std::thread::spawn(move || {
            info!("store worker started");
            while let Ok(job) = receiver.recv() {
                let result = match job {
                    StoreJob::Symbol(row) => store.insert_symbol(row),
                    StoreJob::Price(row) => store.insert_price(row),
                    StoreJob::Orders(rows) => store.insert_orders(rows),
                    StoreJob::Transactions(rows) => store.insert_transactions(rows),
                    StoreJob::Positions(rows) => store.upsert_positions(rows),
                };
                if let Err(err) = result {
                    error!("store write failed on worker: {err}");
                }
            }
            info!("store worker stopped");
        });
        Self {
            sender: Some(sender),
            join: Some(join),
        }
    }

    fn submit(&mut self, job: StoreJob) -> Result<(), StoreError> {
        self.sender
            .as_ref()
            .ok_or(StoreError::WorkerUnavailable)?
            .send(job)
            .map_err(|_| StoreError::WorkerUnavailable)
    }
}

impl StoreClient for StoreWorker {
    fn insert_symbol(&mut self, row: SymbolRow) -> Result<(), StoreError> {
        self.submit(StoreJob::Symbol(row))
    }

    fn insert_price(&mut self, row: PriceRow) -> Result<(), StoreError> {
        self.submit(StoreJob::Price(row))
    }

    fn insert_orders(&mut self, rows: Vec<OrderRow>) -> Result<(), StoreError> {
        self.submit(StoreJob::Orders(rows))
    }

    fn insert_transactions(&mut self, rows: Vec<OrderRow>) -> Result<(), StoreError> {
        self.submit(StoreJob::Transactions(rows))
    }

    fn upsert_positions(&mut self, rows: Vec<PositionRow>) -> Result<(), StoreError> {
        self.submit(StoreJob::Positions(rows))
    }
}

impl Drop for StoreWorker {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.sender.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}
