//! Various types and logic that don't fit well into any other module.

use std::fmt::{self, Display};

use crate::{
    trie::{Node, Trie, WrappedNode},
    trie_ops::TrieOpResult,
};

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
/// Simplified trie node type to make logging cleaner.
pub enum TrieNodeType {
    /// Empty node.
    Empty,

    /// Value node.
    Value,

    /// Short node.
    Short,

    /// Full node.
    Full,
}

impl<N: Trie> From<&WrappedNode<N>> for TrieNodeType {
    fn from(value: &WrappedNode<N>) -> Self {
        (&***value).into()
    }
}

impl<N: Trie> From<&Node<N>> for TrieNodeType {
    fn from(node: &Node<N>) -> Self {
        match node {
            Node::Empty => Self::Empty,
            Node::Value(_) => Self::Value,
            Node::Short { .. } => Self::Short,
            Node::Full { .. } => Self::Full,
        }
    }
}

impl Display for TrieNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrieNodeType::Empty => "Empty",
            TrieNodeType::Value => "Value",
            TrieNodeType::Short => "Short",
            TrieNodeType::Full => "Full",
        };

        write!(f, "{}", s)
    }
}

/// Conversion from an [`Iterator`] within which an error can occur.
///
/// Building a trie from entries fails if two entries share a key, so
/// [`FromIterator`] does not fit.
pub trait TryFromIterator<A>: Sized {
    /// Tries to build `Self` from every element of `iter`.
    fn try_from_iter<T: IntoIterator<Item = A>>(iter: T) -> TrieOpResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::TrieNodeType;
    use crate::{
        testing_utils::common_setup,
        trie::{StandardTrie, Trie},
        trie_ops::TrieOpResult,
    };

    #[test]
    fn node_types_are_reported_for_each_variant() -> TrieOpResult<()> {
        common_setup();

        let mut trie = StandardTrie::default();
        assert_eq!(TrieNodeType::from(&*trie), TrieNodeType::Empty);

        trie.put(b"", b"v".to_vec())?;
        assert_eq!(TrieNodeType::from(&*trie), TrieNodeType::Value);

        trie.del(b"")?;
        trie.put(b"a", b"v".to_vec())?;
        assert_eq!(TrieNodeType::from(&*trie), TrieNodeType::Short);

        trie.put(b"\x71", b"v".to_vec())?;
        assert_eq!(TrieNodeType::from(&*trie), TrieNodeType::Full);
        assert_eq!(TrieNodeType::Full.to_string(), "Full");

        Ok(())
    }
}
