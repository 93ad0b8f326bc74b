//! Hashing collections used throughout the crate. Fx hashing; none of these
//! maps are exposed to untrusted key distributions.

pub use std::collections::VecDeque;

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<T> = rustc_hash::FxHashSet<T>;
