//! Memoized methods: one table shared by all receivers, entries kept apart by identity.

use memoizo::{BoundMethod, MemoOptions, MemoRegistry, MethodMemo};
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Debug, PartialEq)]
struct Triangle {
    row_offset: u64,
}

type Pascal<'a> = BoundMethod<'a, Triangle, (u64, u64), u64, Infallible>;

fn binomial(this: &Pascal<'_>, (n, k): (u64, u64)) -> Result<u64, Infallible> {
    if k == 0 || k == n {
        return Ok(1 + this.receiver().row_offset);
    }
    Ok(this.call((n - 1, k - 1))? + this.call((n - 1, k))?)
}

fn main() {
    tracing_subscriber::fmt().init();

    let registry = MemoRegistry::new();
    let method = MethodMemo::new(&registry, binomial, MemoOptions::default()).unwrap();

    let plain = Arc::new(Triangle { row_offset: 0 });
    let twin = Arc::new(Triangle { row_offset: 0 });

    println!("C(40, 20) = {}", method.bind(&plain).call((40, 20)).unwrap());
    let after_first = method.len();
    println!("{} entries after the first receiver", after_first);

    // Equal fields, different instance: computed again.
    method.bind(&twin).call((40, 20)).unwrap();
    println!("{} entries after its twin", method.len());
    assert_eq!(method.len(), after_first * 2);

    println!("cleared {:?} entries", registry.clear_one(method.name()));
}
