use hdrhistogram::Histogram;
use lob_pipeline::source::{SyntheticConfig, SyntheticSource};
use lob_pipeline::{MatchingCore, OrderSource, SourcePoll};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Preparing Latency Benchmark...");

    const ITERATIONS: u64 = 1_000_000;

    // Pre-generate the flow so only matching is timed
    let mut source = SyntheticSource::new(SyntheticConfig {
        price_levels: 100,
        limit: Some(ITERATIONS),
        ..SyntheticConfig::default()
    });
    let mut orders = Vec::with_capacity(ITERATIONS as usize);
    while let SourcePoll::Ready(order) = source.poll_next() {
        orders.push(order.with_id(orders.len() as u64 + 1));
    }

    let mut core = MatchingCore::new();
    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3)?;

    println!("Running {} iterations...", ITERATIONS);

    let mut total_duration = std::time::Duration::new(0, 0);

    for order in &orders {
        // Critical measurement section
        let start = Instant::now();
        std::hint::black_box(core.process(order));
        let elapsed = start.elapsed();

        // Outliers above the histogram bound are dropped rather than panicking
        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", ITERATIONS);
    println!(
        "Throughput: {:.2} ops/sec",
        ITERATIONS as f64 / total_duration.as_secs_f64()
    );
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    let stats = core.stats();
    println!(
        "Book:   {} levels consumed, {} rested, {} bid / {} ask levels left",
        stats.levels_consumed,
        stats.orders_rested,
        core.bid_level_count(),
        core.ask_level_count()
    );

    println!("\nDistribution:");
    for v in histogram.iter_log(100, 2.0) {
        let count = v.count_since_last_iteration();
        if count > 0 {
            println!("<= {:6} ns: {:10} count", v.value_iterated_to(), count);
        }
    }

    Ok(())
}
