// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Serialized Access Gate
//!
//! Owns a piece of mutable state and runs queued units of work against it,
//! one at a time, on a dedicated tokio task.
//!
//! Two kinds of unit:
//!
//! - **priority** units are synchronous closures for quick mutations (e.g.
//!   setting credentials). They run as soon as the current unit finishes,
//!   ahead of any queued async units.
//! - **async** units may perform I/O. They keep exclusive access until their
//!   future completes, and run in FIFO order.
//!
//! Because the state lives inside the worker task and is lent to one unit at
//! a time as `&mut S`, no lock is held across an `.await` and no two units
//! ever observe the state concurrently.
//!
//! A unit that panics is contained: its result channel is dropped (callers
//! see a closed gate) and the worker moves on to the next unit.

use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, trace};

type PriorityUnit<S> = Box<dyn FnOnce(&mut S) + Send>;
type AsyncUnit<S> = Box<dyn for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send>;

fn boxed_async_unit<S, F>(unit: F) -> AsyncUnit<S>
where
    F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, ()> + Send + 'static,
{
    Box::new(unit)
}

/// Handle to a gate. Dropping every handle lets the worker drain its queue
/// and exit.
pub struct SerialGate<S> {
    priority_tx: mpsc::UnboundedSender<PriorityUnit<S>>,
    async_tx: mpsc::UnboundedSender<AsyncUnit<S>>,
}

impl<S: Send + 'static> SerialGate<S> {
    /// Move `state` into a new worker task.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(state: S) -> Self {
        let (priority_tx, priority_rx) = mpsc::unbounded_channel();
        let (async_tx, async_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(state, priority_rx, async_rx));
        Self {
            priority_tx,
            async_tx,
        }
    }

    /// Queue a quick synchronous mutation ahead of pending async units.
    ///
    /// Returns `false` if the worker is gone.
    pub fn priority_access<F>(&self, unit: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.priority_tx.send(Box::new(unit)).is_ok()
    }

    /// Queue an async unit and return a receiver for its result.
    ///
    /// The unit is queued immediately, so queue order follows call order.
    /// The receiver reports an error if the unit panicked or the worker is
    /// gone.
    pub fn access_async<R, F>(&self, unit: F) -> oneshot::Receiver<R>
    where
        R: Send + 'static,
        F: for<'a> FnOnce(&'a mut S) -> BoxFuture<'a, R> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job = boxed_async_unit::<S, _>(move |state| {
            async move {
                let out = unit(state).await;
                // The caller may have stopped waiting; the unit still ran.
                let _ = tx.send(out);
            }
            .boxed()
        });
        // On failure the job, and with it `tx`, is dropped: `rx` sees a
        // closed channel.
        let _ = self.async_tx.send(job);
        rx
    }
}

async fn run_worker<S>(
    mut state: S,
    mut priority_rx: mpsc::UnboundedReceiver<PriorityUnit<S>>,
    mut async_rx: mpsc::UnboundedReceiver<AsyncUnit<S>>,
) {
    trace!("Serial gate worker started");
    loop {
        tokio::select! {
            biased;
            Some(unit) = priority_rx.recv() => {
                if std::panic::catch_unwind(AssertUnwindSafe(|| unit(&mut state))).is_err() {
                    error!("Priority unit panicked; continuing with next unit");
                }
            }
            Some(unit) = async_rx.recv() => {
                if AssertUnwindSafe(unit(&mut state)).catch_unwind().await.is_err() {
                    error!("Async unit panicked; continuing with next unit");
                }
            }
            else => break,
        }
    }
    trace!("Serial gate worker stopped");
}
