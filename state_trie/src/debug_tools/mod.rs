//! Tools for inspecting the shape of a trie.

pub mod stats;
