//! Digest computation for tries.

use std::fmt::{self, Debug};

use ethereum_types::H256;
use ledger_common::EMPTY_DIGEST;
use tiny_keccak::{Hasher, Keccak};

use crate::trie::{Node, Trie, TrieNodeIntern};

/// A resettable Keccak-256 hasher used to compute node digests bottom-up.
///
/// The same engine is threaded through an entire hashing pass. It is reset
/// before every node, so no state leaks from one node's digest into the next.
#[derive(Clone)]
pub struct DigestEngine {
    keccak: Keccak,
}

impl Debug for DigestEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestEngine").finish_non_exhaustive()
    }
}

impl Default for DigestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestEngine {
    /// Creates a fresh engine with no absorbed input.
    pub fn new() -> Self {
        Self {
            keccak: Keccak::v256(),
        }
    }

    /// Drops any absorbed input.
    pub fn reset(&mut self) {
        self.keccak = Keccak::v256();
    }

    /// Absorbs more input.
    pub fn update(&mut self, bytes: &[u8]) {
        self.keccak.update(bytes);
    }

    /// Returns the digest of everything absorbed since the last reset and
    /// leaves the engine reset.
    pub fn finalize(&mut self) -> H256 {
        let mut out = [0; 32];
        std::mem::replace(&mut self.keccak, Keccak::v256()).finalize(&mut out);

        H256(out)
    }

    /// One-shot digest of `bytes`.
    pub fn digest(&mut self, bytes: &[u8]) -> H256 {
        self.reset();
        self.update(bytes);
        self.finalize()
    }
}

/// Calculates the digest of a trie.
///
/// Nodes are visited in post-order with an explicit stack, so deep tries do
/// not grow the call stack. Subtrees whose digest is already cached by `N`
/// (see [`TrieNodeIntern`]) are not visited again.
pub(crate) fn hash_trie<N: Trie>(trie: &N) -> H256 {
    let mut engine = DigestEngine::new();

    // `true` once the children of the node have been pushed to `digests`.
    let mut pending: Vec<(&N, bool)> = vec![(trie, false)];
    let mut digests: Vec<H256> = Vec::new();

    while let Some((n, children_hashed)) = pending.pop() {
        if let Some(h) = n.cached_hash() {
            digests.push(h);
            continue;
        }

        let h = match (&**n, children_hashed) {
            // Identical to hashing the empty byte string.
            (Node::Empty, _) => EMPTY_DIGEST,
            (Node::Value(value), _) => engine.digest(value),
            (Node::Short { child, .. }, false) => {
                pending.push((n, true));
                pending.push((&**child, false));
                continue;
            }
            (Node::Full { children, .. }, false) => {
                pending.push((n, true));
                // Reversed so that child 0 is hashed (and pushed) first.
                pending.extend(children.iter().rev().map(|c| (&**c, false)));
                continue;
            }
            (Node::Short { nibbles, .. }, true) => {
                let child_hash = digests.pop().unwrap_or(EMPTY_DIGEST);

                engine.reset();
                engine.update(nibbles.as_slice());
                engine.update(child_hash.as_bytes());
                engine.finalize()
            }
            (Node::Full { value, .. }, true) => {
                let child_hashes = digests.split_off(digests.len().saturating_sub(16));
                let value_hash = value.as_ref().map(|v| engine.digest(v));

                engine.reset();
                for h in child_hashes.iter() {
                    engine.update(h.as_bytes());
                }

                // Absent values contribute nothing, so a Full node without a value hashes
                // exactly its 16 children.
                if let Some(h) = value_hash {
                    engine.update(h.as_bytes());
                }

                engine.finalize()
            }
        };

        n.cache_hash(h);
        digests.push(h);
    }

    debug_assert_eq!(digests.len(), 1);
    digests.pop().unwrap_or(EMPTY_DIGEST)
}

#[cfg(test)]
mod tests {
    use std::iter::once;

    use ethereum_types::H256;
    use keccak_hash::keccak;
    use ledger_common::EMPTY_DIGEST;

    use super::DigestEngine;
    use crate::{
        nibbles::Nibbles,
        testing_utils::{
            common_setup, generate_n_random_variable_trie_value_entries, shuffled,
            TestInsertValEntry,
        },
        trie::{HashedTrie, Node, StandardTrie, Trie},
        trie_ops::TrieOpResult,
        utils::TryFromIterator,
    };

    const NUM_RANDOM_ENTRIES: usize = 2000;

    fn concat_hashes<'a>(hashes: impl Iterator<Item = &'a H256>) -> Vec<u8> {
        hashes.flat_map(|h| h.as_bytes().to_vec()).collect()
    }

    #[test]
    fn digest_engine_matches_one_shot_keccak() {
        let mut engine = DigestEngine::new();

        assert_eq!(engine.digest(b"state"), keccak(b"state"));
        assert_eq!(engine.digest(&[]), keccak([]));
    }

    #[test]
    fn digest_engine_resets_after_finalize() {
        let mut engine = DigestEngine::new();
        engine.update(b"some garbage");
        let _ = engine.finalize();

        engine.update(b"abc");
        assert_eq!(engine.finalize(), keccak(b"abc"));
    }

    #[test]
    fn digest_engine_reset_drops_input() {
        let mut engine = DigestEngine::new();
        engine.update(b"some garbage");
        engine.reset();

        assert_eq!(engine.finalize(), EMPTY_DIGEST);
    }

    #[test]
    fn empty_hash_is_digest_of_empty_string() {
        common_setup();

        let trie = StandardTrie::default();
        assert_eq!(trie.hash(), keccak([]));
        assert_eq!(trie.hash(), trie.hash());
    }

    #[test]
    fn value_at_root_hashes_to_digest_of_value() -> TrieOpResult<()> {
        common_setup();

        let mut trie = StandardTrie::default();
        trie.put(b"", b"x".to_vec())?;

        assert_eq!(trie.hash(), keccak(b"x"));

        Ok(())
    }

    #[test]
    fn short_node_hash_is_segment_then_child_digest() -> TrieOpResult<()> {
        common_setup();

        let mut trie = StandardTrie::default();
        trie.put(b"a", b"1".to_vec())?;

        let mut preimage = vec![0x6, 0x1];
        preimage.extend_from_slice(keccak(b"1").as_bytes());

        assert_eq!(trie.hash(), keccak(preimage));

        Ok(())
    }

    #[test]
    fn full_node_hash_is_children_in_index_order() -> TrieOpResult<()> {
        common_setup();

        // Two keys diverging on the very first nibble force a Full root.
        let mut trie = StandardTrie::default();
        trie.put(&[0x10_u8], b"1".to_vec())?;
        trie.put(&[0x20_u8], b"2".to_vec())?;

        let short_hash = |nib: u8, v: &[u8]| {
            let mut preimage = vec![nib];
            preimage.extend_from_slice(keccak(v).as_bytes());
            keccak(preimage)
        };

        let mut children = [EMPTY_DIGEST; 16];
        children[1] = short_hash(0, b"1");
        children[2] = short_hash(0, b"2");

        assert!(trie.is_full());
        assert_eq!(trie.hash(), keccak(concat_hashes(children.iter())));

        Ok(())
    }

    #[test]
    fn full_node_value_is_hashed_after_children() -> TrieOpResult<()> {
        common_setup();

        let mut trie = StandardTrie::default();
        trie.put(b"", b"root".to_vec())?;
        trie.put(&[0x30_u8], b"3".to_vec())?;

        let mut child_preimage = vec![0];
        child_preimage.extend_from_slice(keccak(b"3").as_bytes());

        let mut children = [EMPTY_DIGEST; 16];
        children[3] = keccak(child_preimage);

        let value_hash = keccak(b"root");
        let expected = keccak(concat_hashes(children.iter().chain(once(&value_hash))));

        assert_eq!(trie.hash(), expected);

        Ok(())
    }

    #[test]
    fn hash_does_not_depend_on_insertion_order() -> TrieOpResult<()> {
        common_setup();

        let entries: Vec<TestInsertValEntry> =
            generate_n_random_variable_trie_value_entries(NUM_RANDOM_ENTRIES, 42).collect();
        let trie = StandardTrie::try_from_iter(entries.iter().cloned())?;

        for seed in 0..4 {
            let reordered = StandardTrie::try_from_iter(shuffled(&entries, seed))?;

            assert_eq!(trie, reordered);
            assert_eq!(trie.hash(), reordered.hash());
        }

        Ok(())
    }

    #[test]
    fn hashed_trie_matches_standard_trie_after_each_mutation() -> TrieOpResult<()> {
        common_setup();

        let entries: Vec<TestInsertValEntry> =
            generate_n_random_variable_trie_value_entries(NUM_RANDOM_ENTRIES / 4, 7).collect();

        let mut standard = StandardTrie::default();
        let mut hashed = HashedTrie::default();

        for (k, v) in entries.iter() {
            standard.put(k, v.clone())?;
            hashed.put(k, v.clone())?;

            assert_eq!(standard.hash(), hashed.hash());
        }

        for (k, _) in entries.iter().step_by(2) {
            standard.del(k)?;
            hashed.del(k)?;

            assert_eq!(standard.hash(), hashed.hash());
        }

        Ok(())
    }

    #[test]
    fn hashed_trie_cache_is_reused_between_calls() -> TrieOpResult<()> {
        common_setup();

        let mut trie = HashedTrie::default();
        trie.put(b"cached", b"value".to_vec())?;

        assert!(trie.hash.read().is_none());
        let h = trie.hash();
        assert_eq!(*trie.hash.read(), Some(h));
        assert_eq!(trie.hash(), h);

        trie.must_put(b"cached", b"other".to_vec());
        assert!(trie.hash.read().is_none());
        assert_ne!(trie.hash(), h);

        Ok(())
    }

    #[test]
    fn empty_values_are_not_committed_to_the_digest() -> TrieOpResult<()> {
        common_setup();

        let without = StandardTrie::try_from_iter([
            (vec![0x10_u8], b"1".to_vec()),
            (vec![0x11_u8], b"2".to_vec()),
        ])?;

        let mut with = without.clone();
        with.put(vec![0x12_u8], Vec::new())?;

        // The tries differ, but a `Value("")` slot hashes exactly like an `Empty` one.
        assert_ne!(without, with);
        assert_eq!(with.get(vec![0x12_u8])?, b"");
        assert_eq!(without.hash(), with.hash());

        Ok(())
    }

    #[test]
    fn deep_trie_hash_matches_a_freshly_built_one() -> TrieOpResult<()> {
        common_setup();

        // A chain of Full nodes, one per byte, each with a value.
        let keys: Vec<Vec<u8>> = (0..2048).map(|i| vec![0xab_u8; i]).collect();
        let mut hashed = HashedTrie::default();
        for k in keys.iter() {
            hashed.put(k, k.len().to_string().into_bytes())?;
        }

        let h = hashed.hash();
        let entries = keys.iter().map(|k| (k, k.len().to_string().into_bytes()));
        let standard = StandardTrie::try_from_iter(entries)?;

        assert_eq!(standard.hash(), h);
        assert_eq!(hashed.hash(), h);

        Ok(())
    }

    #[test]
    fn manually_built_trie_hashes_like_inserted_trie() -> TrieOpResult<()> {
        common_setup();

        let mut trie = StandardTrie::default();
        trie.put(b"a", b"1".to_vec())?;

        let manual = StandardTrie::new(Node::Short {
            nibbles: Nibbles::from_bytes(b"a"),
            child: Box::new(StandardTrie::new(Node::Value(b"1".to_vec()))),
        });

        assert_eq!(trie.hash(), manual.hash());

        Ok(())
    }
}
