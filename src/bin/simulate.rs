use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use lob_pipeline::source::{FixSource, ReplaySource, SyntheticConfig, SyntheticSource, UdpSource};
use lob_pipeline::{CorePin, IdleStrategy, Pipeline, PipelineConfig, RunReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simulate", about = "Run the pinned producer/consumer order pipeline")]
struct Args {
    /// Run window in seconds (endless sources only)
    #[arg(long, default_value_t = 3)]
    duration_secs: u64,

    /// Ring buffer slot count
    #[arg(long, default_value_t = lob_pipeline::config::DEFAULT_CAPACITY)]
    capacity: usize,

    /// Core for the producer thread
    #[arg(long, default_value_t = 0)]
    producer_core: usize,

    /// Core for the consumer thread
    #[arg(long, default_value_t = 1)]
    consumer_core: usize,

    /// Leave both threads to the OS scheduler
    #[arg(long)]
    no_pin: bool,

    /// Wait policy while the ring is full or empty
    #[arg(long, value_enum, default_value_t = Idle::Spin)]
    idle: Idle,

    /// Pause after each produced order, in microseconds (0 = none)
    #[arg(long, default_value_t = 1)]
    interval_us: u64,

    /// Process everything still queued at shutdown
    #[arg(long)]
    drain: bool,

    #[command(subcommand)]
    source: Source,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Idle {
    Spin,
    Yield,
    Backoff,
}

#[derive(Subcommand, Debug)]
enum Source {
    /// Seeded random order flow
    Synthetic {
        #[arg(long, default_value_t = 0xDEAD_BEEF)]
        seed: u64,
        /// Lowest price, in ticks
        #[arg(long, default_value_t = 10_000)]
        base_price: i64,
        /// Number of distinct prices
        #[arg(long, default_value_t = 5)]
        levels: u32,
        #[arg(long, default_value_t = 10)]
        qty: u32,
        /// Stop after this many orders and process all of them
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Replay a `side,price,qty` CSV file to completion
    Replay {
        path: PathBuf,
        /// Ticks per price unit
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(i64).range(1..))]
        price_scale: i64,
    },
    /// Replay a file of FIX new order messages, one per line
    Fix {
        path: PathBuf,
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(i64).range(1..))]
        price_scale: i64,
    },
    /// Listen for binary order packets
    Udp {
        #[arg(long, default_value = "0.0.0.0:8888")]
        bind: SocketAddr,
        /// Longest wait for one datagram before re-checking shutdown
        #[arg(long, default_value_t = 10)]
        poll_ms: u64,
    },
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let (producer_core, consumer_core) = if self.no_pin {
            (CorePin::Unpinned, CorePin::Unpinned)
        } else {
            (
                CorePin::Core(self.producer_core),
                CorePin::Core(self.consumer_core),
            )
        };

        let idle = match self.idle {
            Idle::Spin => IdleStrategy::BusySpin,
            Idle::Yield => IdleStrategy::Yield,
            Idle::Backoff => IdleStrategy::Backoff {
                spins: 1_000,
                sleep: Duration::from_micros(50),
            },
        };

        PipelineConfig {
            capacity: self.capacity,
            producer_core,
            consumer_core,
            idle,
            produce_interval: (self.interval_us > 0)
                .then(|| Duration::from_micros(self.interval_us)),
            drain_on_shutdown: self.drain,
            ..PipelineConfig::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let pipeline = Pipeline::new(args.pipeline_config())?;
    let window = Duration::from_secs(args.duration_secs);

    println!("============================================");
    println!("   LOB PIPELINE SIMULATOR                   ");
    println!("   [Lock-Free] [Pinned] [SPSC]              ");
    println!("============================================");

    let report: RunReport = match args.source {
        Source::Synthetic { seed, base_price, levels, qty, limit } => {
            let source = SyntheticSource::new(SyntheticConfig {
                base_price,
                price_levels: levels,
                quantity: qty,
                seed,
                limit,
            });
            if limit.is_some() {
                pipeline.run_to_completion(source)?
            } else {
                println!(
                    ">>> Trading Engine RUNNING for {} seconds...",
                    args.duration_secs
                );
                pipeline.run_for(source, window)?
            }
        }
        Source::Replay { path, price_scale } => {
            pipeline.run_to_completion(ReplaySource::from_path(path, price_scale)?)?
        }
        Source::Fix { path, price_scale } => {
            let reader = BufReader::new(File::open(path)?);
            pipeline.run_to_completion(FixSource::new(reader, price_scale))?
        }
        Source::Udp { bind, poll_ms } => {
            let source = UdpSource::bind(bind, Duration::from_millis(poll_ms))?;
            println!(
                ">>> Listening on {} for {} seconds...",
                bind,
                args.duration_secs
            );
            pipeline.run_for(source, window)?
        }
    };

    println!("\n{}", report);
    Ok(())
}
