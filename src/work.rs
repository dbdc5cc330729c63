use std::{
    sync::{Arc, OnceLock},
    time::Instant,
};

use anyhow::{anyhow, Result};
use futures::future::join_all;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    config::RunConfig,
    invoker::CallInvoker,
    report::{self, Reporter},
    request::RequestFactory,
    sample::ResultSample,
    worker::Worker,
};

/// Coordination state of exactly one run.
struct RunState {
    results_tx: mpsc::Sender<ResultSample>,
    results_rx: mpsc::Receiver<ResultSample>,
    stop: StopHandle,
}

impl RunState {
    fn new(config: &RunConfig) -> Self {
        let (results_tx, results_rx) = mpsc::channel(config.queue_capacity());
        let (stop_tx, _) = watch::channel(false);

        Self {
            results_tx,
            results_rx,
            stop: StopHandle(Arc::new(stop_tx)),
        }
    }
}

/// Broadcasts a cooperative stop request to every worker of a run.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    /// Asks all workers to stop issuing new calls.
    ///
    /// Returns immediately. Calls already in flight complete normally. Safe to
    /// call any number of times.
    pub fn request_stop(&self) {
        if !self.0.send_replace(true) {
            tracing::info!("stop requested");
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.0.subscribe()
    }
}

/// Drives a single run: spawns the workers and the reporter, waits for all of
/// them and returns the reporter's output.
///
/// A `Work` is consumed by [`Work::run`], so its state can never be reused
/// for a second run.
pub struct Work<I, R> {
    config: RunConfig,
    invoker: Arc<I>,
    reporter: R,
    state: OnceLock<RunState>,
}

impl<I, R> Work<I, R>
where
    I: CallInvoker,
    R: Reporter,
{
    pub fn new(config: RunConfig, invoker: I, reporter: R) -> Self {
        Self {
            config,
            invoker: Arc::new(invoker),
            reporter,
            state: OnceLock::new(),
        }
    }

    /// Allocates the run state. Calling it more than once does nothing.
    pub fn init(&self) {
        self.state();
    }

    fn state(&self) -> &RunState {
        self.state.get_or_init(|| RunState::new(&self.config))
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.state().stop.clone()
    }

    /// See [`StopHandle::request_stop`].
    pub fn request_stop(&self) {
        self.state().stop.request_stop();
    }

    /// Makes all calls and finalizes the reporter. Blocks until all work is
    /// done, including the reporter.
    pub async fn run(self) -> Result<R::Output> {
        self.init();

        let Work {
            config,
            invoker,
            reporter,
            state,
        } = self;
        let state = match state.into_inner() {
            Some(state) => state,
            None => RunState::new(&config),
        };
        let RunState {
            results_tx,
            results_rx,
            stop,
        } = state;

        let start = Instant::now();

        // The reporter polls the result queue until it is closed.
        let reporter = tokio::spawn(report::collect(reporter, results_rx));

        let issued = run_workers(&config, invoker, &results_tx, &stop, start).await;
        tracing::debug!(issued, "all workers finished");

        finish(results_tx, reporter, start).await
    }
}

async fn run_workers<I: CallInvoker>(
    config: &RunConfig,
    invoker: Arc<I>,
    results: &mpsc::Sender<ResultSample>,
    stop: &StopHandle,
    start: Instant,
) -> usize {
    let n = config.calls_per_worker();
    if config.dropped_calls() > 0 {
        tracing::warn!(
            dropped = config.dropped_calls(),
            "requests are not a multiple of concurrency, the remainder is not issued"
        );
    }
    tracing::info!(
        workers = config.concurrency(),
        calls_per_worker = n,
        qps = config.qps(),
        "starting workers"
    );

    let factory = RequestFactory::new(config.names().to_vec());
    let period = config.tick_period();

    let handles: Vec<JoinHandle<usize>> = (0..config.concurrency())
        .map(|_| {
            let worker = Worker::new(
                invoker.clone(),
                factory.clone(),
                results.clone(),
                stop.subscribe(),
                config.timeout(),
                start,
            );
            tokio::spawn(async move { worker.with_throttle(period).run(n).await })
        })
        .collect();

    let mut issued = 0;
    for res in join_all(handles).await {
        match res {
            Ok(n) => issued += n,
            Err(err) => tracing::error!("worker failed: {err}"),
        }
    }

    issued
}

/// Closes the result queue, waits for the reporter to drain it and hands it
/// the total elapsed time.
///
/// Must only be called once every worker has terminated: the sender passed
/// in is the last one alive.
async fn finish<R: Reporter>(
    results: mpsc::Sender<ResultSample>,
    reporter: JoinHandle<R>,
    start: Instant,
) -> Result<R::Output> {
    drop(results);
    let total = start.elapsed();

    let reporter = reporter
        .await
        .map_err(|err| anyhow!("reporter failed: {err}"))?;

    Ok(reporter.finalize(total))
}
