//! A canonical hexary radix trie that commits a key/value state to a single
//! 32-byte digest.
//!
//! Keys are walked one nibble (4 bits) at a time. The trie is kept in a
//! canonical compressed form: runs of nibbles with no branching are folded
//! into [`Short`][trie::Node::Short] nodes, and branch points are
//! [`Full`][trie::Node::Full] nodes with one child slot per nibble. Since the
//! shape only depends on the stored entries, and not on the order of the
//! operations that produced them, two tries holding the same entries always
//! have the same [`hash`][trie::Trie::hash].
//!
//! The core of this library is the [`Trie`][trie::Trie] trait, implemented
//! by [`StandardTrie`][trie::StandardTrie] (recomputes the digest on demand)
//! and [`HashedTrie`][trie::HashedTrie] (caches the digest of every node).

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

pub mod nibbles;
pub mod trie;
pub mod trie_hashing;
pub mod trie_ops;
pub mod utils;

#[cfg(feature = "trie_debug")]
pub mod debug_tools;

#[cfg(test)]
pub(crate) mod testing_utils;
