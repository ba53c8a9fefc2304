//! Resumable Monte Carlo Estimate
//!
//! Estimates the probability that, for two uniform points in the unit
//! square, the perpendicular bisector of the pair crosses the side of the
//! square nearest to the first point. Progress survives interruption: run
//! it, hit Ctrl-C, and run it again to pick up from the last checkpoint.
//!
//! Run with: cargo run --example resumable_estimate
//! Verbose:  RUST_LOG=trial_tracker=debug cargo run --example resumable_estimate

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing_subscriber::EnvFilter;
use trial_tracker::producer::{Backend, BatchDriver};
use trial_tracker::{Tracker, TrackerConfig};

const TOTAL_TRIALS: u64 = 20_000_000;
const BATCH_SIZE: u64 = 10_000;

/// One trial with the nearest side rotated onto `v = 0`.
fn beside_the_point<R: Rng>(rng: &mut R) -> bool {
    let (bx, by): (f64, f64) = (rng.gen(), rng.gen());
    let (rx, ry): (f64, f64) = (rng.gen(), rng.gen());

    let nearest = by.min(1.0 - by).min(1.0 - bx).min(bx);
    #[allow(clippy::float_cmp)]
    let (bu, bv, ru, rv) = if by == nearest {
        (bx, by, rx, ry)
    } else if 1.0 - by == nearest {
        (bx, 1.0 - by, rx, 1.0 - ry)
    } else if 1.0 - bx == nearest {
        (by, 1.0 - bx, ry, 1.0 - rx)
    } else {
        (by, bx, ry, rx)
    };

    let du = ru - bu;
    if du == 0.0 {
        return false;
    }
    // Point on v = 0 equidistant from both points.
    let u = (ru.mul_add(ru, rv * rv) - bu.mul_add(bu, bv * bv)) / (2.0 * du);
    (0.0..=1.0).contains(&u)
}

fn run_batch(trials: u64) -> u64 {
    let mut rng = rand::thread_rng();
    (0..trials).map(|_| u64::from(beside_the_point(&mut rng))).sum()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let workers = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
    let config = TrackerConfig::builder(format!("Multithread{workers}"), TOTAL_TRIALS)
        .log_interval(Duration::from_secs(5))
        .save_interval(Duration::from_secs(10))
        .build()?;

    println!("=== Beside the Point ===\n");
    println!("   Checkpoint: {}", config.checkpoint_path().display());
    println!("   Metrics:    {}", config.metrics_path().display());

    let tracker = Arc::new(Tracker::new(config)?);
    let (solutions, trials) = tracker.current_progress();
    if trials > 0 {
        println!("   Resuming at {trials} trials ({solutions} solutions)");
    }
    tracker.start();

    let driver = BatchDriver::new(Backend::ThreadPool { workers }, BATCH_SIZE)?;
    let producer = Arc::clone(&tracker);
    let producing = tokio::task::spawn_blocking(move || {
        driver.run(producer.as_ref(), &run_batch)
    });

    let interrupted = tokio::select! {
        submitted = producing => {
            let submitted = submitted??;
            println!("\n   Ran {submitted} new trials");
            false
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\n   Interrupted; saving progress");
            true
        }
    };

    tracker.stop().await;

    let state = tracker.snapshot();
    println!("   Trials run:  {}", state.trials_run);
    println!("   Solutions:   {}", state.solutions_count);
    println!("   Probability: {:.10}", tracker.final_probability());

    // The blocking producer never yields, so waiting on runtime shutdown
    // would run it to completion.
    if interrupted {
        std::process::exit(0);
    }
    Ok(())
}
