use std::collections::HashSet;

use log::info;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, RngCore, SeedableRng};

use crate::{
    nibbles::Nibbles,
    trie::{Node, Trie},
};

/// Variable keys are short enough that some of them end up being prefixes of
/// others, which is exactly the case we want covered.
const MAX_NIBBLES_FOR_VAR_KEY: usize = 40;

pub(crate) type TestInsertValEntry = (Nibbles, Vec<u8>);

pub(crate) fn common_setup() {
    // Try init since multiple tests calling `init` will cause an error.
    let _ = pretty_env_logger::try_init();
}

pub(crate) fn entry<K>(k: K) -> TestInsertValEntry
where
    K: Into<Nibbles>,
{
    (k.into(), vec![2])
}

pub(crate) fn entry_with_value<K>(k: K, v: u8) -> TestInsertValEntry
where
    K: Into<Nibbles>,
{
    (k.into(), vec![v])
}

pub(crate) fn generate_n_random_fixed_trie_value_entries(
    n: usize,
    seed: u64,
) -> impl Iterator<Item = TestInsertValEntry> {
    gen_n_random_trie_value_entries_common(n, seed, gen_fixed_nibbles, gen_rand_value_bytes)
}

pub(crate) fn generate_n_random_variable_trie_value_entries(
    n: usize,
    seed: u64,
) -> impl Iterator<Item = TestInsertValEntry> {
    gen_n_random_trie_value_entries_common(n, seed, gen_variable_nibbles, gen_rand_value_bytes)
}

/// Generated keys are always unique, so every entry can be inserted with a
/// non-forced put.
fn gen_n_random_trie_value_entries_common<
    K: Fn(&mut StdRng) -> Nibbles,
    V: Fn(&mut StdRng) -> Vec<u8>,
>(
    n: usize,
    seed: u64,
    key_gen_f: K,
    val_gen_f: V,
) -> impl Iterator<Item = TestInsertValEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::new();

    std::iter::from_fn(move || loop {
        let k = key_gen_f(&mut rng);
        if seen.insert(k.clone()) {
            return Some((k, val_gen_f(&mut rng)));
        }
    })
    .take(n)
}

/// Returns a copy of `entries` in a random (but reproducible) order.
pub(crate) fn shuffled(entries: &[TestInsertValEntry], seed: u64) -> Vec<TestInsertValEntry> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut entries = entries.to_vec();
    entries.shuffle(&mut rng);

    entries
}

fn gen_fixed_nibbles(rng: &mut StdRng) -> Nibbles {
    Nibbles::from_bytes(&rng.gen::<[u8; 32]>())
}

fn gen_variable_nibbles(rng: &mut StdRng) -> Nibbles {
    let n_nibbles = rng.gen_range(1..=MAX_NIBBLES_FOR_VAR_KEY);
    Nibbles::from_nibbles((0..n_nibbles).map(|_| rng.gen_range(0..16)))
}

fn gen_rand_value_bytes(rng: &mut StdRng) -> Vec<u8> {
    let num_bytes = rng.gen_range(1..=32);

    let mut buf = vec![0; num_bytes];
    rng.fill_bytes(&mut buf);

    buf
}

pub(crate) fn get_values_in_trie<N: Trie>(trie: &N) -> HashSet<TestInsertValEntry> {
    info!("Collecting all entries inserted into trie...");
    trie.items().collect()
}

/// Panics if any node of the trie breaks canonical form.
pub(crate) fn assert_trie_is_canonical<N: Trie>(trie: &N) {
    let mut pending: Vec<(&Node<N>, bool)> = vec![(&**trie, true)];

    while let Some((node, is_root)) = pending.pop() {
        match node {
            Node::Empty => assert!(is_root, "Empty node found below the root"),
            Node::Value(_) => (),
            Node::Short { nibbles, child } => {
                assert!(!nibbles.is_empty(), "Short node with an empty path");
                assert!(
                    child.is_value() || child.is_full(),
                    "Short node ({:x}) points at a {:?}",
                    nibbles,
                    **child
                );

                pending.push((&***child, false));
            }
            Node::Full { children, value } => {
                let non_empty = children.iter().filter(|c| !c.is_empty()).count();
                assert!(
                    non_empty >= 2 || (non_empty == 1 && value.is_some()),
                    "Full node with {} children and value {:?} should have been collapsed",
                    non_empty,
                    value
                );

                pending.extend(children.iter().filter(|c| !c.is_empty()).map(|c| (&***c, false)));
            }
        }
    }
}
