//! Pipeline - Pinned producer and consumer threads around one SPSC ring.
//!
//! ```text
//! [OrderSource] --produce--> [RingBuffer<Order>] --consume--> [MatchingCore]
//!   lob-producer thread                             lob-consumer thread
//! ```
//!
//! Neither loop blocks on a kernel primitive: both retry through the
//! configured [`IdleStrategy`] and re-check the [`ShutdownToken`] on every
//! round, so shutdown latency is bounded by one idle round (or one source
//! poll).

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info};

use crate::book::MatchingCore;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::idle::IdleStrategy;
use crate::order::{Order, OrderId};
use crate::report::RunReport;
use crate::ring::{Consumer, Producer, RingBuffer};
use crate::shutdown::ShutdownToken;
use crate::source::{OrderSource, SourcePoll};

pub const PRODUCER_THREAD: &str = "lob-producer";
pub const CONSUMER_THREAD: &str = "lob-consumer";

/// Counters kept locally by the producer loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Orders pushed into the ring
    pub produced: u64,
    /// Push attempts refused because the ring was full
    pub backpressure_retries: u64,
    /// Orders built but dropped because shutdown arrived mid-retry
    pub abandoned: u64,
}

/// Counters kept locally by the consumer loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Orders popped and applied to the book
    pub processed: u64,
    /// Time spent inside the loop
    pub elapsed: Duration,
}

/// Producer loop: poll the source, stamp ids, push with spin-retry.
///
/// Ids start at 1 and increase by one for every order offered. Returns when
/// the token is cancelled or the source is exhausted.
pub fn produce<S>(
    source: &mut S,
    ring: &mut Producer<Order>,
    shutdown: &ShutdownToken,
    idle: IdleStrategy,
    interval: Option<Duration>,
) -> ProducerStats
where
    S: OrderSource + ?Sized,
{
    let mut stats = ProducerStats::default();
    let mut next_id: OrderId = 0;
    let mut rounds = 0u32;

    'produce: while !shutdown.is_cancelled() {
        let new_order = match source.poll_next() {
            SourcePoll::Ready(order) => order,
            SourcePoll::Idle => {
                idle.idle(&mut rounds);
                continue;
            }
            SourcePoll::Exhausted => {
                debug!(produced = stats.produced, "source exhausted");
                break;
            }
        };

        next_id += 1;
        let order = new_order.with_id(next_id);

        // Backpressure: spin until there is room or we are told to stop
        while !ring.push(order) {
            if shutdown.is_cancelled() {
                stats.abandoned += 1;
                break 'produce;
            }
            stats.backpressure_retries += 1;
            idle.idle(&mut rounds);
        }
        rounds = 0;
        stats.produced += 1;

        if let Some(pause) = interval {
            thread::sleep(pause);
        }
    }

    stats
}

/// Consumer loop: pop and apply each order to the book.
///
/// Without `drain`, items still queued when the token is cancelled are left
/// behind. With `drain`, popping continues until the producer handle has
/// been dropped and the ring is empty.
pub fn consume(
    ring: &mut Consumer<Order>,
    core: &mut MatchingCore,
    shutdown: &ShutdownToken,
    idle: IdleStrategy,
    drain: bool,
) -> ConsumerStats {
    let start = Instant::now();
    let mut processed = 0u64;
    let mut rounds = 0u32;

    while !shutdown.is_cancelled() {
        match ring.pop() {
            Some(order) => {
                core.process(&order);
                processed += 1;
                rounds = 0;
            }
            None => idle.idle(&mut rounds),
        }
    }

    if drain {
        loop {
            match ring.pop() {
                Some(order) => {
                    core.process(&order);
                    processed += 1;
                }
                // Abandonment must be observed before emptiness so that the
                // producer's last push is visible
                None if ring.is_abandoned() && ring.buffer().is_empty() => break,
                None => idle.idle(&mut rounds),
            }
        }
    }

    ConsumerStats {
        processed,
        elapsed: start.elapsed(),
    }
}

/// Owns the configuration and starts pipeline instances.
#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Allocate the ring and spawn both workers.
    pub fn start<S>(&self, source: S) -> Result<RunningPipeline>
    where
        S: OrderSource + 'static,
    {
        spawn_workers(self.config, source)
    }

    /// Run for a fixed window, then shut down and report.
    pub fn run_for<S>(&self, source: S, duration: Duration) -> Result<RunReport>
    where
        S: OrderSource + 'static,
    {
        let running = self.start(source)?;
        info!(?duration, "pipeline running");
        thread::sleep(duration);
        running.shutdown()
    }

    /// Run until a finite source is exhausted and every produced order has
    /// been processed. Never returns for an endless source.
    pub fn run_to_completion<S>(&self, source: S) -> Result<RunReport>
    where
        S: OrderSource + 'static,
    {
        let config = PipelineConfig {
            drain_on_shutdown: true,
            ..self.config
        };
        spawn_workers(config, source)?.finish()
    }
}

fn spawn_workers<S>(config: PipelineConfig, mut source: S) -> Result<RunningPipeline>
where
    S: OrderSource + 'static,
{
    let (mut producer, mut consumer) = RingBuffer::<Order>::with_capacity(config.capacity);
    let shutdown = ShutdownToken::new();
    let started_at = Utc::now();

    // Consumer first so it is already polling when the first order lands
    let consumer_handle = thread::Builder::new()
        .name(CONSUMER_THREAD.to_string())
        .spawn({
            let shutdown = shutdown.clone();
            move || {
                config.consumer_core.apply();
                let mut core = MatchingCore::new();
                let stats = consume(
                    &mut consumer,
                    &mut core,
                    &shutdown,
                    config.idle,
                    config.drain_on_shutdown,
                );
                debug!(processed = stats.processed, "consumer stopped");
                (core, stats)
            }
        })
        .map_err(|err| PipelineError::Spawn {
            name: CONSUMER_THREAD,
            source: err,
        })?;

    let producer_handle = thread::Builder::new()
        .name(PRODUCER_THREAD.to_string())
        .spawn({
            let shutdown = shutdown.clone();
            move || {
                config.producer_core.apply();
                let stats = produce(
                    &mut source,
                    &mut producer,
                    &shutdown,
                    config.idle,
                    config.produce_interval,
                );
                debug!(produced = stats.produced, "producer stopped");
                stats
            }
        });

    let producer_handle = match producer_handle {
        Ok(handle) => handle,
        Err(err) => {
            shutdown.cancel();
            let _ = consumer_handle.join();
            return Err(PipelineError::Spawn {
                name: PRODUCER_THREAD,
                source: err,
            });
        }
    };

    info!(
        capacity = config.capacity,
        producer_core = ?config.producer_core,
        consumer_core = ?config.consumer_core,
        idle = ?config.idle,
        "pipeline started"
    );

    Ok(RunningPipeline {
        shutdown,
        producer: Some(producer_handle),
        consumer: Some(consumer_handle),
        started_at,
        report_depth: config.report_depth,
    })
}

/// Handle to a started pipeline.
///
/// Dropping it without calling [`shutdown`](Self::shutdown) or
/// [`finish`](Self::finish) cancels the workers and detaches them.
pub struct RunningPipeline {
    shutdown: ShutdownToken,
    producer: Option<JoinHandle<ProducerStats>>,
    consumer: Option<JoinHandle<(MatchingCore, ConsumerStats)>>,
    started_at: chrono::DateTime<Utc>,
    report_depth: usize,
}

impl RunningPipeline {
    /// A clone of the token, for cancelling from elsewhere (e.g. a signal handler)
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    /// True once the producer loop has returned (source exhausted or cancelled)
    pub fn is_producer_finished(&self) -> bool {
        self.producer.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Cancel both loops, join them and build the report.
    pub fn shutdown(mut self) -> Result<RunReport> {
        self.shutdown.cancel();
        let producer = join(self.producer.take(), PRODUCER_THREAD);
        let consumer = join(self.consumer.take(), CONSUMER_THREAD);
        self.report(producer?, consumer?)
    }

    /// Wait for the producer to exhaust its source, then cancel and join
    /// the consumer.
    pub fn finish(mut self) -> Result<RunReport> {
        let producer = join(self.producer.take(), PRODUCER_THREAD);
        self.shutdown.cancel();
        let consumer = join(self.consumer.take(), CONSUMER_THREAD);
        self.report(producer?, consumer?)
    }

    fn report(
        &self,
        producer: ProducerStats,
        (core, consumer): (MatchingCore, ConsumerStats),
    ) -> Result<RunReport> {
        let report = RunReport {
            started_at: self.started_at,
            elapsed: consumer.elapsed,
            produced: producer.produced,
            processed: consumer.processed,
            backpressure_retries: producer.backpressure_retries,
            abandoned: producer.abandoned,
            match_stats: core.stats(),
            book: core.snapshot(self.report_depth),
        };

        info!(
            produced = report.produced,
            processed = report.processed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            throughput = report.throughput() as u64,
            "pipeline stopped"
        );
        Ok(report)
    }
}

impl Drop for RunningPipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn join<T>(handle: Option<JoinHandle<T>>, name: &'static str) -> Result<T> {
    handle
        .ok_or(PipelineError::WorkerPanicked(name))?
        .join()
        .map_err(|_| PipelineError::WorkerPanicked(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{NewOrder, Side};
    use crate::source::IterSource;

    /// A source that never runs dry and counts how often it was asked
    struct Endless {
        polls: u64,
    }

    impl OrderSource for Endless {
        fn poll_next(&mut self) -> SourcePoll {
            self.polls += 1;
            SourcePoll::Ready(NewOrder::new(Side::Buy, 100, 1))
        }
    }

    /// A source that only ever reports idle
    struct Silent;

    impl OrderSource for Silent {
        fn poll_next(&mut self) -> SourcePoll {
            SourcePoll::Idle
        }
    }

    #[test]
    fn test_produce_stamps_monotonic_ids() {
        let (mut producer, mut consumer) = RingBuffer::with_capacity(16);
        let mut source = IterSource::new(vec![NewOrder::new(Side::Buy, 100, 1); 5]);

        let stats = produce(
            &mut source,
            &mut producer,
            &ShutdownToken::new(),
            IdleStrategy::BusySpin,
            None,
        );
        assert_eq!(stats.produced, 5);

        let ids: Vec<_> = std::iter::from_fn(|| consumer.pop()).map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_produce_abandons_on_full_ring_after_cancel() {
        let (mut producer, _consumer) = RingBuffer::with_capacity(4);
        let shutdown = ShutdownToken::new();

        // Nobody consumes: three pushes fill the ring and the fourth spins
        let canceller = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                shutdown.cancel();
            })
        };

        let mut source = Endless { polls: 0 };
        let stats = produce(
            &mut source,
            &mut producer,
            &shutdown,
            IdleStrategy::Yield,
            None,
        );
        canceller.join().unwrap();

        assert_eq!(stats.produced, 3);
        assert_eq!(stats.abandoned, 1);
        assert!(stats.backpressure_retries > 0);
        assert_eq!(source.polls, 4);
    }

    #[test]
    fn test_produce_returns_when_already_cancelled() {
        let (mut producer, _consumer) = RingBuffer::with_capacity(4);
        let shutdown = ShutdownToken::new();
        shutdown.cancel();

        let mut source = Endless { polls: 0 };
        let stats = produce(
            &mut source,
            &mut producer,
            &shutdown,
            IdleStrategy::BusySpin,
            None,
        );
        assert_eq!(stats, ProducerStats::default());
        assert_eq!(source.polls, 0);
    }

    #[test]
    fn test_consume_leaves_queue_without_drain() {
        let (mut producer, mut consumer) = RingBuffer::with_capacity(8);
        for id in 1..=3 {
            assert!(producer.push(Order::new(id, Side::Buy, 100, 1)));
        }
        let shutdown = ShutdownToken::new();
        shutdown.cancel();

        let mut core = MatchingCore::new();
        let stats = consume(
            &mut consumer,
            &mut core,
            &shutdown,
            IdleStrategy::BusySpin,
            false,
        );
        assert_eq!(stats.processed, 0);
        assert_eq!(consumer.buffer().len(), 3);
    }

    #[test]
    fn test_consume_drains_after_producer_drop() {
        let (mut producer, mut consumer) = RingBuffer::with_capacity(8);
        assert!(producer.push(Order::new(1, Side::Sell, 101, 10)));
        assert!(producer.push(Order::new(2, Side::Buy, 102, 5)));
        drop(producer);

        let shutdown = ShutdownToken::new();
        shutdown.cancel();

        let mut core = MatchingCore::new();
        let stats = consume(
            &mut consumer,
            &mut core,
            &shutdown,
            IdleStrategy::BusySpin,
            true,
        );
        assert_eq!(stats.processed, 2);
        assert!(core.is_empty());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PipelineConfig {
            capacity: 0,
            ..PipelineConfig::unpinned()
        };
        assert!(matches!(
            Pipeline::new(config),
            Err(PipelineError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_idle_source_shuts_down_promptly() {
        let pipeline = Pipeline::new(PipelineConfig::unpinned()).unwrap();
        let running = pipeline.start(Silent).unwrap();

        thread::sleep(Duration::from_millis(10));
        assert!(!running.is_producer_finished());

        let report = running.shutdown().unwrap();
        assert_eq!(report.produced, 0);
        assert_eq!(report.processed, 0);
    }

    #[test]
    fn test_shutdown_token_cancels_workers() {
        let pipeline = Pipeline::new(PipelineConfig::unpinned()).unwrap();
        let running = pipeline.start(Endless { polls: 0 }).unwrap();

        running.shutdown_token().cancel();
        let start = Instant::now();
        while !running.is_producer_finished() {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "producer ignored cancellation"
            );
            thread::sleep(Duration::from_millis(1));
        }

        let report = running.shutdown().unwrap();
        assert!(report.processed <= report.produced);
    }
}
