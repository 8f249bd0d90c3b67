use ethereum_types::H256;

/// The digest of the empty byte string, which is also the digest of an empty
/// state trie.
/// 0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470
pub const EMPTY_DIGEST: H256 = H256([
    197, 210, 70, 1, 134, 247, 35, 60, 146, 126, 125, 178, 220, 199, 3, 192, 229, 0, 182, 83, 202,
    130, 39, 59, 123, 250, 216, 4, 93, 133, 164, 112,
]);

/// The all-zero hash. Used as the parent of a chain's root header.
pub const ZERO_HASH: H256 = H256([0; 32]);

/// Hashes an arbitrary byte string with the digest used throughout the ledger.
pub fn digest<B: AsRef<[u8]>>(bytes: B) -> H256 {
    keccak_hash::keccak(bytes)
}

#[test]
fn test_empty_digest() {
    assert_eq!(EMPTY_DIGEST, digest([]));
    assert_eq!(EMPTY_DIGEST, keccak_hash::KECCAK_EMPTY);
}

#[test]
fn test_zero_hash_is_zero() {
    assert!(ZERO_HASH.is_zero());
}
