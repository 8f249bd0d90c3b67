//! Define [`Nibbles`] and how to convert keys and hex strings into the nibble
//! paths the trie branches on.
use std::{
    fmt::{self, Debug, Display, LowerHex, UpperHex},
    str::FromStr,
};

use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

// Use a whole byte for a Nibble just for convenience
/// A Nibble has 4 bits and is stored as `u8`.
pub type Nibble = u8;

const SINGLE_NIBBLE_APPEND_ASSERT_ERR_MSG: &str =
    "Attempted to append a single nibble that was greater than 15!";

#[derive(Debug, Error)]
#[error(transparent)]
/// An error encountered when converting a string to a sequence of nibbles.
pub struct StrToNibblesError(#[from] hex::FromHexError);

/// Errors encountered when converting `Nibbles` back into key bytes.
#[derive(Clone, Debug, Eq, Error, PartialEq, Hash)]
pub enum NibblesToBytesError {
    #[error("Tried to convert an odd number of nibbles into bytes (count: {0})")]
    /// Only whole bytes can be rebuilt from a nibble path.
    OddCount(usize),
}

/// A value that does not fit in a nibble was found where a nibble was expected.
#[derive(Clone, Debug, Eq, Error, PartialEq, Hash)]
#[error("Nibble values must be at most 0xf (got {0:#x})")]
pub struct InvalidNibbleError(pub u8);

/// A sequence of nibbles which is used as the path type into a
/// [`Trie`][`crate::trie::Trie`].
///
/// Keys are opaque byte strings, and every byte is split into its high nibble
/// followed by its low nibble. The encoding is lossless, so a path built from
/// `n` bytes always has exactly `2 * n` nibbles, and two different keys never
/// share a path:
/// ```rust
/// # use state_trie::nibbles::Nibbles;
/// let n = Nibbles::from_bytes(&[0x12, 0xab]);
///
/// assert_eq!(n.len(), 4);
/// assert_eq!(format!("{:x}", n), "0x12ab");
/// ```
///
/// Leading `0` nibbles are part of a path. For example:
/// ```rust
/// # use state_trie::nibbles::Nibbles;
/// # use std::str::FromStr;
/// let n1 = Nibbles::from_str("0x123").unwrap();
/// let n2 = Nibbles::from_str("0x0123").unwrap();
///
/// assert_ne!(n1, n2); // These are different paths
/// ```
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Nibbles {
    nibbles: Vec<Nibble>,
}

impl Display for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // By default, just use lower hex.
        <Self as LowerHex>::fmt(self, f)
    }
}

// Every nibble read back from a dump is checked, since the trie indexes child
// slots with them.
impl<'de> Deserialize<'de> for Nibbles {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawNibbles {
            nibbles: Vec<Nibble>,
        }

        let raw = RawNibbles::deserialize(deserializer)?;
        Self::try_from_nibbles(raw.nibbles).map_err(de::Error::custom)
    }
}

// Manual impl in order to print the path nicely.
impl Debug for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nibbles")
            .field("count", &self.len())
            .field("packed", &format!("{self:x}"))
            .finish()
    }
}

impl LowerHex for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex_str(|bytes| hex::encode(bytes)))
    }
}

impl UpperHex for Nibbles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex_str(|bytes| hex::encode_upper(bytes)))
    }
}

impl FromStr for Nibbles {
    type Err = StrToNibblesError;

    /// Parses a hex string with or without a preceding "0x". Every character
    /// becomes exactly one nibble.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped_str = s.strip_prefix("0x").unwrap_or(s);

        // `hex` only decodes whole bytes, so pad odd strings and drop the padding
        // nibble afterwards.
        let is_odd = stripped_str.len() % 2 == 1;
        let bytes = match is_odd {
            false => hex::decode(stripped_str)?,
            true => hex::decode(format!("0{}", stripped_str))?,
        };

        let mut nibbles = Self::from_bytes(&bytes);
        if is_odd {
            nibbles.truncate_n_nibbles_front_mut(1);
        }

        Ok(nibbles)
    }
}

impl From<&[u8]> for Nibbles {
    fn from(key: &[u8]) -> Self {
        Self::from_bytes(key)
    }
}

impl<const N: usize> From<&[u8; N]> for Nibbles {
    fn from(key: &[u8; N]) -> Self {
        Self::from_bytes(key)
    }
}

impl From<Vec<u8>> for Nibbles {
    fn from(key: Vec<u8>) -> Self {
        Self::from_bytes(&key)
    }
}

impl From<&Vec<u8>> for Nibbles {
    fn from(key: &Vec<u8>) -> Self {
        Self::from_bytes(key)
    }
}

impl From<&Nibbles> for Nibbles {
    fn from(v: &Nibbles) -> Self {
        v.clone()
    }
}

impl Nibbles {
    /// Encodes a key into its nibble path. High nibble first for every byte.
    ///
    /// Total for any input, including the empty key (which encodes to the
    /// empty path).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let nibbles = bytes.iter().flat_map(|b| [b >> 4, b & 0xf]).collect();
        Self { nibbles }
    }

    /// Creates a new `Nibbles` from a single `Nibble`.
    ///
    /// # Panics
    /// Panics if the nibble is > `0xf`.
    pub fn from_nibble(n: Nibble) -> Self {
        assert!(n <= 0xf, "{}", SINGLE_NIBBLE_APPEND_ASSERT_ERR_MSG);
        Self { nibbles: vec![n] }
    }

    /// Creates a new `Nibbles` from an explicit sequence of nibbles.
    ///
    /// # Panics
    /// Panics if any nibble is > `0xf`.
    pub fn from_nibbles<I: IntoIterator<Item = Nibble>>(nibs: I) -> Self {
        let nibbles: Vec<_> = nibs.into_iter().collect();
        assert!(
            nibbles.iter().all(|n| *n <= 0xf),
            "{}",
            SINGLE_NIBBLE_APPEND_ASSERT_ERR_MSG
        );

        Self { nibbles }
    }

    /// Like [`Nibbles::from_nibbles`], but fails instead of panicking on a
    /// value > `0xf`.
    pub fn try_from_nibbles(nibbles: Vec<Nibble>) -> Result<Self, InvalidNibbleError> {
        match nibbles.iter().find(|n| **n > 0xf) {
            Some(n) => Err(InvalidNibbleError(*n)),
            None => Ok(Self { nibbles }),
        }
    }

    /// Rebuilds the key bytes this path was encoded from.
    ///
    /// Returns an error if the path has an odd number of nibbles, since such a
    /// path can not come from a whole key.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NibblesToBytesError> {
        if self.len() % 2 == 1 {
            return Err(NibblesToBytesError::OddCount(self.len()));
        }

        Ok(self
            .nibbles
            .chunks_exact(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect())
    }

    /// The number of nibbles in this sequence.
    pub fn len(&self) -> usize {
        self.nibbles.len()
    }

    /// Returns `true` if there are no nibbles left in the sequence.
    pub fn is_empty(&self) -> bool {
        self.nibbles.is_empty()
    }

    /// Returns the nibbles as a slice.
    pub fn as_slice(&self) -> &[Nibble] {
        &self.nibbles
    }

    /// Returns an iterator over the nibbles, front to back.
    pub fn iter(&self) -> impl Iterator<Item = Nibble> + '_ {
        self.nibbles.iter().copied()
    }

    /// Gets the nibble at the given index.
    ///
    /// # Panics
    /// Panics if the index is out of range.
    pub fn get_nibble(&self, idx: usize) -> Nibble {
        self.nibbles[idx]
    }

    /// Pops the nibble at the front (the next nibble to branch on).
    ///
    /// This shifts the remaining nibbles. Walking a whole path is better done
    /// over [`Nibbles::as_slice`].
    ///
    /// # Panics
    /// Panics if there are no nibbles left.
    pub fn pop_next_nibble_front(&mut self) -> Nibble {
        assert!(
            !self.is_empty(),
            "Attempted to pop a nibble from an empty sequence!"
        );
        self.nibbles.remove(0)
    }

    /// Appends a nibble to the back.
    ///
    /// # Panics
    /// Panics if the nibble is > `0xf`.
    pub fn push_nibble_back(&mut self, n: Nibble) {
        assert!(n <= 0xf, "{}", SINGLE_NIBBLE_APPEND_ASSERT_ERR_MSG);
        self.nibbles.push(n);
    }

    /// Drops `n` nibbles from the front, returning a new sequence.
    pub fn truncate_n_nibbles_front(&self, n: usize) -> Nibbles {
        let mut nibbles = self.clone();
        nibbles.truncate_n_nibbles_front_mut(n);
        nibbles
    }

    /// Drops `n` nibbles from the front in place.
    pub fn truncate_n_nibbles_front_mut(&mut self, n: usize) {
        let n = n.min(self.len());
        self.nibbles.drain(..n);
    }

    /// Drops `n` nibbles from the back in place.
    pub fn truncate_n_nibbles_back_mut(&mut self, n: usize) {
        let n = n.min(self.len());
        self.nibbles.truncate(self.len() - n);
    }

    /// Splits the nibbles at the given index, returning the prefix (before
    /// `idx`) and postfix (`idx` onwards).
    ///
    /// # Panics
    /// Panics if `idx` is greater than the number of nibbles.
    pub fn split_at_idx(&self, idx: usize) -> (Nibbles, Nibbles) {
        let (pre, post) = self.nibbles.split_at(idx);

        (
            Self {
                nibbles: pre.to_vec(),
            },
            Self {
                nibbles: post.to_vec(),
            },
        )
    }

    /// Returns a copy of `self` with `post` appended.
    pub fn merge_nibble(&self, post: Nibble) -> Nibbles {
        let mut nibbles = self.clone();
        nibbles.push_nibble_back(post);
        nibbles
    }

    /// Returns a copy of `self` with all of `post` appended.
    pub fn merge_nibbles(&self, post: &Nibbles) -> Nibbles {
        let mut nibbles = self.clone();
        nibbles.nibbles.extend_from_slice(&post.nibbles);
        nibbles
    }

    /// Finds the index of the first nibble that differs between two sequences
    /// of possibly different lengths. This is also the length of their common
    /// prefix.
    ///
    /// If one sequence is a prefix of the other, the length of the shorter one
    /// is returned.
    pub fn find_nibble_idx_that_differs(&self, other: &Nibbles) -> usize {
        Self::common_prefix_len(&self.nibbles, &other.nibbles)
    }

    /// Length of the common prefix of two nibble slices.
    pub(crate) fn common_prefix_len(a: &[Nibble], b: &[Nibble]) -> usize {
        a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
    }

    /// Returns `true` if `prefix` matches the start of `self` in full.
    pub fn starts_with(&self, prefix: &Nibbles) -> bool {
        self.nibbles.starts_with(&prefix.nibbles)
    }

    /// Packs the nibbles two per byte. An odd sequence gets a leading `0`
    /// nibble of padding, so this is only used for display.
    fn packed_bytes(&self) -> Vec<u8> {
        let mut padded = Vec::with_capacity(self.len() + 1);
        if self.len() % 2 == 1 {
            padded.push(0);
        }
        padded.extend_from_slice(&self.nibbles);

        padded
            .chunks_exact(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect()
    }

    fn as_hex_str<F>(&self, hex_encode_f: F) -> String
    where
        F: Fn(&[u8]) -> String,
    {
        let hex_str = hex_encode_f(&self.packed_bytes());

        // Strip the padding nibble again if we had to add one.
        match self.len() % 2 {
            0 => format!("0x{}", hex_str),
            _ => format!("0x{}", &hex_str[1..]),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{InvalidNibbleError, Nibbles, NibblesToBytesError};

    #[test]
    fn encoding_is_twice_the_key_length() {
        assert_eq!(Nibbles::from_bytes(&[]).len(), 0);
        assert_eq!(Nibbles::from_bytes(b"a").len(), 2);
        assert_eq!(Nibbles::from_bytes(b"hello").len(), 10);
    }

    #[test]
    fn encoding_is_high_nibble_first() {
        let n = Nibbles::from_bytes(&[0x61, 0x0f, 0xf0]);
        assert_eq!(n.as_slice(), &[0x6, 0x1, 0x0, 0xf, 0xf, 0x0]);
    }

    #[test]
    fn prefix_keys_produce_prefix_paths() {
        let a = Nibbles::from_bytes(b"a");
        let ab = Nibbles::from_bytes(b"ab");

        assert!(ab.starts_with(&a));
        assert!(!a.starts_with(&ab));
        assert_ne!(a, ab);
    }

    #[test]
    fn leading_zero_bytes_are_part_of_the_path() {
        assert_ne!(Nibbles::from_bytes(&[0, 1]), Nibbles::from_bytes(&[1]));
    }

    #[test]
    fn to_bytes_rebuilds_the_key() {
        let key = b"state".to_vec();
        assert_eq!(Nibbles::from_bytes(&key).to_bytes(), Ok(key));
    }

    #[test]
    fn to_bytes_rejects_odd_paths() {
        let n = Nibbles::from_nibbles([1, 2, 3]);
        assert_eq!(n.to_bytes(), Err(NibblesToBytesError::OddCount(3)));
    }

    #[test]
    fn from_str_works() {
        assert_eq!(
            Nibbles::from_str("0x123").unwrap(),
            Nibbles::from_nibbles([1, 2, 3])
        );
        assert_eq!(
            Nibbles::from_str("0123").unwrap(),
            Nibbles::from_nibbles([0, 1, 2, 3])
        );
        assert_eq!(Nibbles::from_str("0x").unwrap(), Nibbles::default());
        assert!(Nibbles::from_str("0xzz").is_err());
    }

    #[test]
    fn hex_formatting_works() {
        assert_eq!(format!("{:x}", Nibbles::from_nibbles([0xa, 0xb, 0xc])), "0xabc");
        assert_eq!(format!("{:X}", Nibbles::from_bytes(&[0xab, 0xcd])), "0xABCD");
        assert_eq!(format!("{}", Nibbles::default()), "0x");
    }

    #[test]
    fn find_nibble_idx_that_differs_works() {
        let n1 = Nibbles::from_nibbles([1, 2, 3, 4]);

        assert_eq!(
            n1.find_nibble_idx_that_differs(&Nibbles::from_nibbles([1, 2, 5])),
            2
        );
        assert_eq!(
            n1.find_nibble_idx_that_differs(&Nibbles::from_nibbles([1, 2])),
            2
        );
        assert_eq!(
            n1.find_nibble_idx_that_differs(&Nibbles::from_nibbles([7])),
            0
        );
        assert_eq!(n1.find_nibble_idx_that_differs(&n1), 4);
    }

    #[test]
    fn split_and_merge_are_inverse() {
        let n = Nibbles::from_nibbles([1, 2, 3, 4, 5]);
        let (pre, post) = n.split_at_idx(2);

        assert_eq!(pre, Nibbles::from_nibbles([1, 2]));
        assert_eq!(post, Nibbles::from_nibbles([3, 4, 5]));
        assert_eq!(pre.merge_nibbles(&post), n);
    }

    #[test]
    fn pop_and_truncate_work() {
        let mut n = Nibbles::from_nibbles([1, 2, 3, 4]);

        assert_eq!(n.pop_next_nibble_front(), 1);
        assert_eq!(n.truncate_n_nibbles_front(2), Nibbles::from_nibble(4));

        n.truncate_n_nibbles_back_mut(1);
        assert_eq!(n, Nibbles::from_nibbles([2, 3]));

        n.truncate_n_nibbles_front_mut(10);
        assert!(n.is_empty());
    }

    #[test]
    fn packed_bytes_pads_odd_paths() {
        assert_eq!(Nibbles::from_nibbles([1, 2, 3]).packed_bytes(), vec![0x01, 0x23]);
        assert_eq!(Nibbles::from_nibbles([1, 2]).packed_bytes(), vec![0x12]);
    }

    #[test]
    fn common_prefix_len_compares_slices() {
        assert_eq!(Nibbles::common_prefix_len(&[1, 2, 3], &[1, 2, 4, 5]), 2);
        assert_eq!(Nibbles::common_prefix_len(&[1, 2], &[1, 2, 4]), 2);
        assert_eq!(Nibbles::common_prefix_len(&[], &[1]), 0);
        assert_eq!(Nibbles::common_prefix_len(&[7, 7], &[7, 7]), 2);
    }

    #[test]
    fn try_from_nibbles_reports_the_bad_value() {
        assert_eq!(
            Nibbles::try_from_nibbles(vec![0xa, 0x1f, 0x2]),
            Err(InvalidNibbleError(0x1f))
        );
        assert_eq!(
            Nibbles::try_from_nibbles(vec![0xa, 0xf]),
            Ok(Nibbles::from_nibbles([0xa, 0xf]))
        );
    }

    #[test]
    fn deserializing_checks_every_nibble() {
        let n = Nibbles::from_nibbles([0x1, 0xf, 0x0]);
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(serde_json::from_str::<Nibbles>(&json).unwrap(), n);

        let res = serde_json::from_str::<Nibbles>(r#"{"nibbles":[1,16]}"#);
        assert!(res.unwrap_err().to_string().contains("0x10"));
    }

    #[test]
    #[should_panic]
    fn from_nibble_rejects_large_values() {
        Nibbles::from_nibble(16);
    }
}
