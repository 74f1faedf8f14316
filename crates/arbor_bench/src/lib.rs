//! Shared helpers for the Arbor benchmarks.

#![warn(missing_docs)]

use arbor_core::{Config, NodeStore, PropertyState};
use rand::Rng;

/// Random bytes of length `size`.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Configuration that skips fsync so benchmarks measure the store itself.
pub fn bench_config() -> Config {
    Config::default().sync_on_commit(false)
}

/// An in-memory store with `width` children under `/items`, each holding a
/// random string property.
pub fn populated_store(width: usize) -> NodeStore {
    let store = NodeStore::in_memory(bench_config()).unwrap();
    let mut rng = rand::thread_rng();
    store
        .edit(|root| {
            let items = root.child_or_create("items")?;
            for i in 0..width {
                let value: u64 = rng.gen();
                items
                    .child_or_create(&format!("item{i}"))?
                    .set_property("value", PropertyState::string(value.to_string()));
            }
            Ok(())
        })
        .unwrap();
    store
}

/// CND text declaring `count` types in the `bench` namespace, each with
/// `props` optional string properties.
pub fn generated_cnd(count: usize, props: usize) -> String {
    let mut text = String::from("<'bench'='http://example.com/bench'>\n");
    for t in 0..count {
        text.push_str(&format!("[bench:Type{t}] > nt:base\n"));
        for p in 0..props {
            text.push_str(&format!(" - bench:prop{p} (string)\n"));
        }
    }
    text
}
