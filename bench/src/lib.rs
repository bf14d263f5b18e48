//! Shared fixtures for the Vow benches.

use vow::Promise;

/// A settled root followed by `depth` increments.
pub fn settled_chain(depth: usize) -> Promise<u64> {
    let mut node = Promise::new(|resolve, _| resolve(0u64));
    for _ in 0..depth {
        node = node.map(|x| x + 1);
    }
    node
}
