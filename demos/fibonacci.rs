//! Persistent and auto-clear memos over recursive Fibonacci.
//!
//! Run with `RUST_LOG=debug` to see every hit and miss.

use memoizo::{Call, Memo, MemoOptions, MemoRegistry};
use std::convert::Infallible;
use tracing_subscriber::EnvFilter;

type Fib = Memo<u32, u128, Infallible>;
type Fib2 = Memo<Call<u64>, u64, Infallible>;

fn fibonacci(memo: &Fib, n: u32) -> Result<u128, Infallible> {
    if n < 2 {
        return Ok(n as u128);
    }
    Ok(memo.call(n - 2)? + memo.call(n - 1)?)
}

/// `n` is shifted by `addn`, then scaled by `multn`, before recursing.
fn fibonacci2(memo: &Fib2, call: Call<u64>) -> Result<u64, Infallible> {
    let n = (call.args + call.kw_or("addn", 0u64)) * call.kw_or("multn", 1u64);
    if n < 2 {
        return Ok(n);
    }
    Ok(memo.call(Call::new(n - 2))? + memo.call(Call::new(n - 1))?)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let registry = MemoRegistry::global();

    let fib = Memo::new(registry, fibonacci, MemoOptions::persistent()).unwrap();
    println!("fibonacci(162) = {}", fib.call(162).unwrap());
    println!("fibonacci(180) = {}", fib.call(180).unwrap());
    tracing::info!(memo = fib.name(), entries = fib.len(), "persistent table filled");

    let fib2 = Memo::new(registry, fibonacci2, MemoOptions::clean()).unwrap();
    println!(
        "fibonacci2(10, multn = 3) = {}",
        fib2.call(Call::new(10).kw("multn", 3u64)).unwrap()
    );
    println!(
        "fibonacci2(20, addn = 5, multn = 2) = {}",
        fib2.call(Call::new(20).kw("addn", 5u64).kw("multn", 2u64)).unwrap()
    );
    println!("fibonacci2 table after return: {} results", fib2.len());

    #[cfg(feature = "stats")]
    {
        let stats = fib.stats();
        println!(
            "fibonacci: {} hits, {} misses, hit rate {:.1}%",
            stats.hits(),
            stats.misses(),
            stats.hit_rate() * 100.0
        );
    }

    println!("cleared {} results from {:?}", memoizo::clear_all_memos(), registry.names());
}
