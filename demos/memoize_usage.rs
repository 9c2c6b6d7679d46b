//! Memoize an expensive parse-and-square function shared by several threads.
//!
//! Run with `cargo run --example memoize_usage`.

use memo_rs::{CacheMetrics, CancelToken, Error, MemoConfig, Memoizer};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn main() {
    let invocations = AtomicUsize::new(0);
    let memo = Memoizer::with_config(
        |key: &String| -> Result<u64, String> {
            invocations.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            key.parse::<u64>()
                .map(|n| n * n)
                .map_err(|_| "parse error".to_string())
        },
        MemoConfig::new()
            .with_max_entries(NonZeroUsize::new(128).unwrap())
            .with_expiration(Duration::from_secs(30)),
    );

    thread::scope(|s| {
        for i in 0..8 {
            let memo = &memo;
            s.spawn(move || {
                let key = if i % 2 == 0 { "17" } else { "bad" };
                match memo.compute(&key.to_string()) {
                    Ok(value) => println!("thread {i}: {key} -> {value}"),
                    Err(Error::Computation(cause)) => println!("thread {i}: {key} failed: {cause}"),
                    Err(other) => println!("thread {i}: {key} unavailable: {other:?}"),
                }
            });
        }
    });

    // A caller that gives up before the computation starts
    let token = CancelToken::new();
    token.cancel();
    let abandoned = memo.compute_with(&"99".to_string(), &token);
    println!("abandoned call: {abandoned:?}");

    println!(
        "invocations: {} for 8 callers over 2 keys",
        invocations.load(Ordering::SeqCst)
    );
    for (name, value) in memo.metrics() {
        println!("  {name:<24} {value}");
    }
}
