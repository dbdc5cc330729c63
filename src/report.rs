use std::time::Duration;

use tokio::sync::mpsc;

use crate::sample::ResultSample;

/// Maximum number of samples drained from the queue at once.
const BATCH_SIZE: usize = 256;

/// Consumer of the result stream of a run.
///
/// The driver records every sample in the order calls complete, which is not
/// necessarily the order they were issued in. Once the stream is closed and
/// drained, [`Reporter::finalize`] is called exactly once with the total
/// elapsed time of the run.
pub trait Reporter: Send + 'static {
    type Output: Send + 'static;

    fn record(&mut self, sample: &ResultSample);

    fn finalize(self, total: Duration) -> Self::Output;
}

/// Feeds the reporter until every sender is gone and the queue is drained.
pub async fn collect<R: Reporter>(mut reporter: R, mut rx: mpsc::Receiver<ResultSample>) -> R {
    let mut batch = Vec::with_capacity(BATCH_SIZE);

    loop {
        match rx.recv().await {
            Some(sample) => batch.push(sample),
            None => break,
        }

        while batch.len() < BATCH_SIZE {
            match rx.try_recv() {
                Ok(sample) => batch.push(sample),
                Err(..) => break,
            }
        }

        for sample in batch.drain(..) {
            reporter.record(&sample);
        }
    }

    reporter
}
