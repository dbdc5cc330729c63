use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    sync::{mpsc, watch},
    time::{self, Interval, MissedTickBehavior},
};

use crate::{
    invoker::CallInvoker,
    request::RequestFactory,
    sample::ResultSample,
};

/// One unit of concurrency, issuing its share of calls sequentially.
pub struct Worker<I> {
    invoker: Arc<I>,
    factory: RequestFactory,
    results: mpsc::Sender<ResultSample>,
    stop: watch::Receiver<bool>,
    throttle: Option<Interval>,
    timeout: Duration,
    start: Instant,
}

impl<I: CallInvoker> Worker<I> {
    pub fn new(
        invoker: Arc<I>,
        factory: RequestFactory,
        results: mpsc::Sender<ResultSample>,
        stop: watch::Receiver<bool>,
        timeout: Duration,
        start: Instant,
    ) -> Self {
        Worker {
            invoker,
            factory,
            results,
            stop,
            throttle: None,
            timeout,
            start,
        }
    }

    /// Limits this worker to one call per `period`.
    ///
    /// Each worker owns its ticker, so the aggregate rate of a run is the
    /// per-worker rate times the concurrency level.
    pub fn with_throttle(mut self, period: Option<Duration>) -> Self {
        self.throttle = period.map(|period| {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        self
    }

    /// Issues up to `n` calls, returning how many were actually issued.
    ///
    /// Stops early when a stop has been requested or the result receiver is
    /// gone. A call in flight is never interrupted, a pending tick is.
    pub async fn run(mut self, n: usize) -> usize {
        let mut issued = 0;

        for _ in 0..n {
            if *self.stop.borrow() {
                tracing::debug!(issued, "stop requested, worker exits");
                break;
            }
            if let Some(throttle) = &mut self.throttle {
                tokio::select! {
                    _ = throttle.tick() => {}
                    Ok(_) = self.stop.wait_for(|stop| *stop) => {
                        tracing::debug!(issued, "stop requested while throttled, worker exits");
                        break;
                    }
                }
            }

            let sample = self.call().await;
            issued += 1;

            if self.results.send(sample).await.is_err() {
                tracing::warn!("result receiver dropped, worker exits");
                break;
            }
        }

        issued
    }

    async fn call(&mut self) -> ResultSample {
        let request = self.factory.make();

        let now = Instant::now();
        let offset = now.duration_since(self.start);
        let outcome = self.invoker.invoke(request, self.timeout).await;
        let duration = now.elapsed();

        let outcome_label = if outcome.err.is_none() { "ok" } else { "error" };
        metrics::counter!("rpcwrk_calls_total", "outcome" => outcome_label).increment(1);
        metrics::histogram!("rpcwrk_call_duration_seconds").record(duration.as_secs_f64());

        if let Some(err) = &outcome.err {
            tracing::trace!("call failed: {err}");
        }

        ResultSample::new(outcome, offset, duration)
    }
}
