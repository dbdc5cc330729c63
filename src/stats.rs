use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    io::{self, Write},
    time::Duration,
};

use hdrhistogram::{CreationError, Histogram};

use crate::{
    report::Reporter,
    sample::{ResultSample, Timings},
};

const PERCENTILES: [f64; 7] = [10.0, 25.0, 50.0, 75.0, 90.0, 95.0, 99.0];

#[derive(Debug, Default)]
struct Counters {
    requests: u64,
    success: u64,
    errors: u64,
    bytes: u64,
    latency_min: Option<Duration>,
    latency_max: Duration,
    latency_sum: Duration,
}

/// Built-in reporter that summarizes a run and prints the summary.
///
/// Latencies and phase timings are only accounted for successful calls.
/// Failed calls are grouped by their error message.
pub struct Statistics {
    counters: Counters,
    histogram: Histogram<u64>,
    phases: Timings,
    status_dist: BTreeMap<u16, u64>,
    error_dist: BTreeMap<String, u64>,
    out: Box<dyn Write + Send>,
}

impl Statistics {
    pub fn new(out: impl Write + Send + 'static) -> Result<Self, CreationError> {
        Ok(Statistics {
            counters: Counters::default(),
            histogram: Histogram::<u64>::new(3)?,
            phases: Timings::default(),
            status_dist: BTreeMap::new(),
            error_dist: BTreeMap::new(),
            out: Box::new(out),
        })
    }

    pub fn stdout() -> Result<Self, CreationError> {
        Self::new(io::stdout())
    }

    fn summary(&self, total: Duration) -> Summary {
        let counters = &self.counters;
        let secs = total.as_secs_f64();

        let average = match counters.success {
            0 => Duration::ZERO,
            n => mean(counters.latency_sum, n),
        };
        let percentiles = if counters.success > 0 {
            PERCENTILES
                .iter()
                .map(|&p| {
                    let micros = self.histogram.value_at_percentile(p);
                    (p, Duration::from_micros(micros))
                })
                .collect()
        } else {
            Vec::new()
        };
        let phases = match counters.success {
            0 => Timings::default(),
            n => Timings {
                conn: mean(self.phases.conn, n),
                dns: mean(self.phases.dns, n),
                req: mean(self.phases.req, n),
                delay: mean(self.phases.delay, n),
                res: mean(self.phases.res, n),
            },
        };

        Summary {
            total,
            requests: counters.requests,
            success: counters.success,
            errors: counters.errors,
            bytes: counters.bytes,
            rps: if secs > 0.0 { counters.requests as f64 / secs } else { 0.0 },
            fastest: counters.latency_min.unwrap_or_default(),
            slowest: counters.latency_max,
            average,
            percentiles,
            phases,
            status_dist: self.status_dist.clone(),
            error_dist: self.error_dist.clone(),
        }
    }
}

/// Average of `n` durations summing up to `sum`. `n` may exceed `u32::MAX`.
fn mean(sum: Duration, n: u64) -> Duration {
    let nanos = sum.as_nanos() / u128::from(n.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

impl Reporter for Statistics {
    type Output = Summary;

    fn record(&mut self, sample: &ResultSample) {
        self.counters.requests += 1;

        if let Some(err) = &sample.err {
            self.counters.errors += 1;
            *self.error_dist.entry(err.to_string()).or_default() += 1;
            return;
        }

        let latency = sample.duration;
        self.counters.success += 1;
        self.counters.bytes += sample.content_length;
        self.counters.latency_sum += latency;
        self.counters.latency_max = self.counters.latency_max.max(latency);
        self.counters.latency_min = Some(match self.counters.latency_min {
            Some(min) => min.min(latency),
            None => latency,
        });
        let micros = latency.as_micros() as u64;
        self.histogram.record(micros).unwrap_or_default();

        self.phases.conn += sample.timings.conn;
        self.phases.dns += sample.timings.dns;
        self.phases.req += sample.timings.req;
        self.phases.delay += sample.timings.delay;
        self.phases.res += sample.timings.res;

        *self.status_dist.entry(sample.status_code).or_default() += 1;
    }

    fn finalize(mut self, total: Duration) -> Summary {
        let summary = self.summary(total);
        if let Err(err) = write!(self.out, "{summary}").and_then(|()| self.out.flush()) {
            tracing::error!("failed to write summary: {err}");
        }
        summary
    }
}

/// Final statistics of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: Duration,
    pub requests: u64,
    pub success: u64,
    pub errors: u64,
    /// Response bytes of successful calls.
    pub bytes: u64,
    pub rps: f64,
    pub fastest: Duration,
    pub slowest: Duration,
    pub average: Duration,
    pub percentiles: Vec<(f64, Duration)>,
    /// Average phase timings of successful calls.
    pub phases: Timings,
    pub status_dist: BTreeMap<u16, u64>,
    pub error_dist: BTreeMap<String, u64>,
}

impl Summary {
    pub fn success_rate(&self) -> f64 {
        if self.requests > 0 {
            (self.success as f64 / self.requests as f64) * 100.0
        } else {
            0.0
        }
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "\nSummary:")?;
        writeln!(f, "  Total:\t{:.4} secs", self.total.as_secs_f64())?;
        if self.success > 0 {
            writeln!(f, "  Slowest:\t{:.4} secs", self.slowest.as_secs_f64())?;
            writeln!(f, "  Fastest:\t{:.4} secs", self.fastest.as_secs_f64())?;
            writeln!(f, "  Average:\t{:.4} secs", self.average.as_secs_f64())?;
        }
        writeln!(f, "  Requests/sec:\t{:.4}", self.rps)?;
        if self.success > 0 {
            writeln!(f, "  Total data:\t{} bytes", self.bytes)?;
            writeln!(f, "  Size/request:\t{} bytes", self.bytes / self.success)?;
        }
        writeln!(
            f,
            "  Success:\t{:.2}% ({}/{})",
            self.success_rate(),
            self.success,
            self.requests
        )?;

        if !self.percentiles.is_empty() {
            writeln!(f, "\nLatency distribution:")?;
            for (p, latency) in &self.percentiles {
                writeln!(f, "  {p}% in {:.4} secs", latency.as_secs_f64())?;
            }

            let phases = &self.phases;
            writeln!(f, "\nDetails (average):")?;
            writeln!(f, "  DNS+dialup:\t{:.4} secs", phases.conn.as_secs_f64())?;
            writeln!(f, "  DNS-lookup:\t{:.4} secs", phases.dns.as_secs_f64())?;
            writeln!(f, "  req write:\t{:.4} secs", phases.req.as_secs_f64())?;
            writeln!(f, "  resp wait:\t{:.4} secs", phases.delay.as_secs_f64())?;
            writeln!(f, "  resp read:\t{:.4} secs", phases.res.as_secs_f64())?;
        }

        if !self.status_dist.is_empty() {
            writeln!(f, "\nStatus code distribution:")?;
            for (code, num) in &self.status_dist {
                writeln!(f, "  [{code}]\t{num} responses")?;
            }
        }

        if !self.error_dist.is_empty() {
            writeln!(f, "\nError distribution:")?;
            for (err, num) in &self.error_dist {
                writeln!(f, "  [{num}]\t{err}")?;
            }
        }

        Ok(())
    }
}
