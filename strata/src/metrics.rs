use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Metrics collector, if active, it provides Counters and Timers
#[derive(Clone)]
pub struct Metrics {
    metrics: Option<Arc<ActiveMetrics>>,
}

/// Metrics that can be collected during execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Counter of objects handed out by the pools
    Allocs,
    /// Counter of allocation requests that failed
    AllocFailures,
    /// Counter of free-list refills
    PoolGrowths,
    /// Counter of objects returned to their pool synchronously
    ImmediateFrees,
    /// Counter of objects whose return was deferred past a grace period
    DeferredFrees,
    /// Timer used to record average time spent waiting for grace periods
    BarrierWaitTime,
}

struct ActiveMetrics {
    allocs: AtomicU64,
    alloc_failures: AtomicU64,
    pool_growths: AtomicU64,
    immediate_frees: AtomicU64,
    deferred_frees: AtomicU64,
    barrier_wait_time: Timer,
}

impl Metrics {
    /// Returns the Metrics object, active or not based on the specified input
    pub fn new(active: bool) -> Self {
        Self {
            metrics: if active {
                Some(Arc::new(ActiveMetrics {
                    allocs: AtomicU64::new(0),
                    alloc_failures: AtomicU64::new(0),
                    pool_growths: AtomicU64::new(0),
                    immediate_frees: AtomicU64::new(0),
                    deferred_frees: AtomicU64::new(0),
                    barrier_wait_time: Timer::new(),
                }))
            } else {
                None
            },
        }
    }

    fn counter(metrics: &ActiveMetrics, metric: Metric) -> &AtomicU64 {
        match metric {
            Metric::Allocs => &metrics.allocs,
            Metric::AllocFailures => &metrics.alloc_failures,
            Metric::PoolGrowths => &metrics.pool_growths,
            Metric::ImmediateFrees => &metrics.immediate_frees,
            Metric::DeferredFrees => &metrics.deferred_frees,
            _ => panic!("Specified metric is not a Counter"),
        }
    }

    /// Increase the Counter specified by the input
    ///
    /// panics if the specified [`Metric`] is not a Counter
    pub fn count(&self, metric: Metric) {
        if let Some(ref metrics) = self.metrics {
            Self::counter(metrics, metric).fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Read the current value of a Counter. Inactive metrics always read zero.
    ///
    /// panics if the specified [`Metric`] is not a Counter
    pub fn get(&self, metric: Metric) -> u64 {
        match self.metrics {
            Some(ref metrics) => Self::counter(metrics, metric).load(Ordering::Relaxed),
            None => 0,
        }
    }

    /// Returns a guard that, when dropped, will record the time passed since creation
    ///
    /// panics if the specified [`Metric`] is not a Timer
    pub fn record<'a>(&'a self, metric: Metric) -> Option<impl Drop + 'a> {
        self.metrics.as_ref().map(|metrics| {
            let timer = match metric {
                Metric::BarrierWaitTime => &metrics.barrier_wait_time,
                _ => panic!("Specified metric is not a Timer"),
            };

            timer.record()
        })
    }

    /// Print collected metrics to stdout
    pub fn print(&self) {
        if let Some(ref metrics) = self.metrics {
            println!("metrics");

            let allocs = metrics.allocs.load(Ordering::Relaxed);
            println!("  allocs                {}", allocs);

            let failures = metrics.alloc_failures.load(Ordering::Relaxed);
            println!("  alloc failures        {}", failures);

            let growths = metrics.pool_growths.load(Ordering::Relaxed);
            println!("  pool growths          {}", growths);

            let immediate = metrics.immediate_frees.load(Ordering::Relaxed);
            let deferred = metrics.deferred_frees.load(Ordering::Relaxed);
            let total_frees = immediate + deferred;
            println!("  frees                 {}", total_frees);

            if total_frees != 0 {
                let percentage_deferred = (deferred as f64 / total_frees as f64) * 100.0;
                println!(
                    "  deferred frees        {} - {:.2}% of frees",
                    deferred, percentage_deferred
                );
            }

            if let Some(mean) = metrics.barrier_wait_time.mean() {
                println!("  barrier wait mean     {}", pretty_display_ns(mean));
            }
        } else {
            println!("Metrics collection was not activated")
        }
    }
}

fn pretty_display_ns(ns: u64) -> String {
    // keep at least 3 significant figures.
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "s"), (1_000_000, "ms"), (1_000, "us")];
    UNITS
        .iter()
        .find(|(scale, _)| ns > 100 * scale)
        .map(|(scale, unit)| format!("{} {}", ns / scale, unit))
        .unwrap_or_else(|| format!("{} ns", ns))
}

/// Accumulates durations to report their mean.
struct Timer {
    samples: AtomicU64,
    total_ns: AtomicU64,
}

impl Timer {
    fn new() -> Self {
        Timer {
            samples: AtomicU64::new(0),
            total_ns: AtomicU64::new(0),
        }
    }

    fn mean(&self) -> Option<u64> {
        let samples = self.samples.load(Ordering::Relaxed);
        self.total_ns.load(Ordering::Relaxed).checked_div(samples)
    }

    fn record<'a>(&'a self) -> impl Drop + 'a {
        struct Span<'a> {
            start: Instant,
            timer: &'a Timer,
        }

        impl Drop for Span<'_> {
            fn drop(&mut self) {
                let elapsed = self.start.elapsed().as_nanos() as u64;
                self.timer.samples.fetch_add(1, Ordering::Relaxed);
                self.timer.total_ns.fetch_add(elapsed, Ordering::Relaxed);
            }
        }

        Span {
            start: Instant::now(),
            timer: self,
        }
    }
}
