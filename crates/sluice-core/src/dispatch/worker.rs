use std::any::Any;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::Dispatcher;
use crate::domain::Operation;

/// Worker group handle.
/// - dropping or signalling `shutdown_tx` stops every worker
/// - `shutdown_and_join()` waits for all of them
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `config.workers` workers.
    pub fn spawn(dispatcher: &Dispatcher) -> Self {
        Self::spawn_n(dispatcher, dispatcher.config().workers)
    }

    pub fn spawn_n(dispatcher: &Dispatcher, n: usize) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let d = dispatcher.clone();
            let mut rx = shutdown_rx.clone();
            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, d, &mut rx).await;
            }));
        }
        info!(workers = n, "worker group started");

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Stop taking new work. An operation already running is finished and
    /// recorded first.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
        info!("worker group stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    dispatcher: Dispatcher,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let job = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            job = dispatcher.next_ready() => job,
        };

        debug!(worker_id, task_id = %job.task_id, "running task");
        let outcome = run(job.operation, job.args).await;
        dispatcher.complete(job.task_id, outcome).await;
    }
    debug!(worker_id, "worker exiting");
}

/// Run one operation in its own task so a panic becomes a failed outcome
/// instead of taking the worker down.
async fn run(operation: Arc<dyn Operation>, args: Vec<Value>) -> Result<Value, String> {
    let name = operation.name().to_string();
    match tokio::spawn(async move { operation.invoke(args).await }).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join) if join.is_panic() => Err(format!(
            "operation '{name}' panicked: {}",
            panic_message(join.into_panic())
        )),
        Err(join) => Err(format!("operation '{name}' did not finish: {join}")),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
