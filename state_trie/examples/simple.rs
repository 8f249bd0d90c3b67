//! Simple example showing off the basics of the library.

use std::str::FromStr;

use state_trie::debug_tools::stats::get_trie_stats;
use state_trie::utils::TryFromIterator;
use state_trie::{
    nibbles::Nibbles,
    trie::{HashedTrie, StandardTrie, Trie},
    trie_ops::{TrieOpError, TrieOpResult},
};

fn main() -> TrieOpResult<()> {
    // Construct an empty trie:
    let mut trie = StandardTrie::default();

    // Elements can be inserted into the trie by calling put directly:
    trie.put(b"hello", b"world!".to_vec())?;

    // Putting a key that already has a value is an error:
    assert_eq!(
        trie.put(b"hello", b"again".to_vec()),
        Err(TrieOpError::AlreadyExists(Nibbles::from_bytes(b"hello")))
    );

    // ...unless you really mean to overwrite it:
    trie.must_put(b"hello", b"there!".to_vec());

    // Or by initializing the trie with an iterator of key value pairs:
    let mut trie = StandardTrie::try_from_iter(vec![
        (b"some key".to_vec(), b"some data".to_vec()),
        (b"some".to_vec(), vec![1_u8, 2, 3]),
    ])?;

    // Tries can be queried. Note that keys may be prefixes of other keys:
    assert_eq!(trie.get(b"some key")?, b"some data");
    assert_eq!(trie.get(b"some")?, [1_u8, 2, 3]);
    assert!(!trie.contains(b"some other key"));

    // Trie hashes can be calculated:
    let hash = trie.hash();

    // `Trie` can produce iterators which iterate over the values it contains,
    // in key order:
    assert_eq!(
        trie.items().collect::<Vec<_>>(),
        vec![
            (Nibbles::from_bytes(b"some"), vec![1_u8, 2, 3]),
            (Nibbles::from_bytes(b"some key"), b"some data".to_vec()),
        ]
    );

    // Values can be deleted:
    let del_val = trie.del(b"some key")?;
    assert_eq!(del_val, b"some data".to_vec());
    assert!(trie.get(b"some key").is_err());
    assert_ne!(trie.hash(), hash);

    // The digest only depends on the entries, not on how they got there:
    let other = StandardTrie::try_from_iter([(b"some".to_vec(), vec![1_u8, 2, 3])])?;
    assert_eq!(trie.hash(), other.hash());

    // `HashedTrie` computes the exact same digests, but caches them on every
    // node so that only the nodes along a modified path are rehashed:
    let mut hashed = HashedTrie::try_from_iter([(b"some".to_vec(), vec![1_u8, 2, 3])])?;
    assert_eq!(hashed.hash(), other.hash());
    hashed.put(b"some key", b"some data".to_vec())?;
    assert_eq!(hashed.hash(), hash);

    // Keys are walked one nibble at a time, high nibble first. `Nibbles` can
    // also be written as hex strings, one character per nibble:
    assert_eq!(Nibbles::from_bytes(&[0x01, 0x23]), Nibbles::from_str("0x0123").unwrap());
    assert_eq!(format!("{:x}", Nibbles::from_str("abc").unwrap()), "0xabc");

    // And finally, you can get a rough picture of the trie's shape:
    println!("{}", get_trie_stats(&hashed));

    Ok(())
}
