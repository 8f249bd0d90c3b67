//! Definitions for the core types [`Trie`] and [`Node`].

use std::{
    fmt::Debug,
    ops::{Deref, DerefMut},
};

use enum_as_inner::EnumAsInner;
use ethereum_types::H256;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    nibbles::Nibbles,
    trie_hashing::hash_trie,
    trie_ops::{TrieIter, TrieOpResult},
    utils::TryFromIterator,
};

macro_rules! impl_from_for_trie_type {
    ($type:ty) => {
        impl From<Node<$type>> for $type {
            fn from(v: Node<$type>) -> Self {
                Self::new(v)
            }
        }
    };
}

/// Alias for a node that is a child of a short or full node. Every child is
/// exclusively owned by the slot holding it.
pub type WrappedNode<N> = Box<N>;

/// Wraps a node so it can be placed in a child slot.
pub(crate) fn wrap<N: Trie>(n: Node<N>) -> WrappedNode<N> {
    Box::new(N::new(n))
}

/// A trait for any types that are Tries.
pub trait Trie: Clone + Debug + Default + DerefMut<Target = Node<Self>> + Eq + TrieNodeIntern {
    /// Creates a new trie from a node.
    fn new(n: Node<Self>) -> Self;

    /// Unwraps the trie into its root node.
    fn into_node(self) -> Node<Self>;

    /// Stores `v` under `k`.
    ///
    /// Fails with [`TrieOpError::AlreadyExists`][crate::trie_ops::TrieOpError]
    /// if `k` already has a value, in which case the trie is left untouched.
    fn put<K, V>(&mut self, k: K, v: V) -> TrieOpResult<()>
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>;

    /// Stores `v` under `k`, overwriting any value already stored there.
    fn must_put<K, V>(&mut self, k: K, v: V)
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>;

    /// Puts every entry of the iterator, stopping at the first failure.
    fn extend<K, V, I>(&mut self, entries: I) -> TrieOpResult<()>
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>;

    /// Gets the value stored under `k`.
    fn get<K>(&self, k: K) -> TrieOpResult<&[u8]>
    where
        K: Into<Nibbles>;

    /// Deletes the value stored under `k` and returns it.
    ///
    /// The trie is compacted on the way back up, so afterwards it has the same
    /// shape (and hash) as a trie built directly from the remaining entries.
    /// Fails with [`TrieOpError::NotFound`][crate::trie_ops::TrieOpError] if
    /// there is no value under `k`, in which case the trie is left untouched.
    fn del<K>(&mut self, k: K) -> TrieOpResult<Vec<u8>>
    where
        K: Into<Nibbles>;

    /// Get the digest committing to the entire trie.
    ///
    /// A stored empty value hashes exactly like an unused slot, so two tries
    /// that only differ by entries with empty values have the same digest.
    fn hash(&self) -> H256;

    /// Returns an iterator over all key/value pairs, in key order.
    fn items(&self) -> TrieIter<'_, Self>;

    /// Returns an iterator over all keys, in key order.
    ///
    /// Keys that were put as bytes always have an even number of nibbles and
    /// convert back with [`Nibbles::to_bytes`]. Keys put as raw [`Nibbles`]
    /// come back exactly as given, odd lengths included.
    fn keys(&self) -> impl Iterator<Item = Nibbles> + '_ {
        self.items().map(|(k, _)| k)
    }

    /// Returns an iterator over all values, in key order.
    fn values(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.items().map(|(_, v)| v)
    }

    /// Returns `true` if the trie contains a value with the given key.
    fn contains<K>(&self, k: K) -> bool
    where
        K: Into<Nibbles>,
    {
        self.get(k).is_ok()
    }
}

/// Part of the trait that is not really part of the public interface but
/// implementor of other node types still need to implement.
pub trait TrieNodeIntern {
    /// Returns the digest of this node if it is already known.
    fn cached_hash(&self) -> Option<H256>;

    /// Remembers the digest of this node. Trie types without a cache ignore it.
    fn cache_hash(&self, hash: H256);
}

/// A node of the trie.
///
/// Every trie instance is a strict tree: each node is owned by exactly one
/// slot (the trie's root, or a child slot of a `Short` or `Full` node).
///
/// Outside of an operation in progress, the tree is always in canonical form:
/// - `Short` nodes have a non-empty path and a `Full` or `Value` child.
/// - `Full` nodes hold at least two children, or one child and a value.
/// - `Empty` only appears as the root of an empty trie or as an unused child
///   slot of a `Full` node.
#[derive(Clone, Debug, Default, Deserialize, EnumAsInner, Serialize)]
pub enum Node<T>
where
    T: Clone + Debug,
{
    /// Nothing is stored here.
    #[default]
    Empty,
    /// A stored value whose path ends at this node.
    Value(Vec<u8>),
    /// A run of nibbles with no branching, leading to a single child.
    Short {
        /// The path segment covered by this node. Never empty.
        nibbles: Nibbles,
        /// The node the segment leads to.
        child: WrappedNode<T>,
    },
    /// A branch point, with one child slot per possible nibble.
    Full {
        /// The 16 children of this node, indexed by nibble.
        children: [WrappedNode<T>; 16],
        /// The value of a key whose path ends exactly at this branch point.
        value: Option<Vec<u8>>,
    },
}

impl<N: Trie> Eq for Node<N> {}

/// Trie equality means all nodes through the trie are equivalent.
impl<N: Trie> PartialEq for Node<N> {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];

        while let Some(pair) = pending.pop() {
            match pair {
                (Node::Empty, Node::Empty) => (),
                (Node::Value(v1), Node::Value(v2)) if v1 == v2 => (),
                (
                    Node::Short {
                        nibbles: n1,
                        child: c1,
                    },
                    Node::Short {
                        nibbles: n2,
                        child: c2,
                    },
                ) if n1 == n2 => pending.push((&***c1, &***c2)),
                (
                    Node::Full {
                        children: c1,
                        value: v1,
                    },
                    Node::Full {
                        children: c2,
                        value: v2,
                    },
                ) if v1 == v2 => {
                    pending.extend(c1.iter().zip(c2.iter()).map(|(a, b)| (&***a, &***b)));
                }
                (_, _) => return false,
            }
        }

        true
    }
}

/// Takes a subtree apart one node at a time, so dropping a deep trie does not
/// recurse once per level.
fn drop_subtree<N: Trie>(root: &mut Node<N>) {
    if !matches!(root, Node::Short { .. } | Node::Full { .. }) {
        return;
    }

    let mut pending = vec![std::mem::take(root)];
    while let Some(node) = pending.pop() {
        match node {
            Node::Short { child, .. } => pending.push((*child).into_node()),
            Node::Full { children, .. } => pending.extend(
                children
                    .into_iter()
                    .filter(|c| !c.is_empty())
                    .map(|c| (*c).into_node()),
            ),
            Node::Empty | Node::Value(_) => (),
        }
    }
}

/// A simple trie with no hash caching.
/// Note that while you can *still* calculate the hashes for any given node, the
/// hashes are not cached and are recalculated each time.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StandardTrie(pub Node<StandardTrie>);

impl_from_for_trie_type!(StandardTrie);

impl Trie for StandardTrie {
    fn new(n: Node<Self>) -> Self {
        Self(n)
    }

    fn into_node(mut self) -> Node<Self> {
        std::mem::take(&mut self.0)
    }

    fn put<K, V>(&mut self, k: K, v: V) -> TrieOpResult<()>
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
    {
        self.0.trie_put(k, v, false)
    }

    fn must_put<K, V>(&mut self, k: K, v: V)
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
    {
        self.0.trie_must_put(k, v)
    }

    fn extend<K, V, I>(&mut self, entries: I) -> TrieOpResult<()>
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        self.0.trie_extend(entries)
    }

    fn get<K>(&self, k: K) -> TrieOpResult<&[u8]>
    where
        K: Into<Nibbles>,
    {
        self.0.trie_get(k)
    }

    fn del<K>(&mut self, k: K) -> TrieOpResult<Vec<u8>>
    where
        K: Into<Nibbles>,
    {
        self.0.trie_delete(k)
    }

    fn hash(&self) -> H256 {
        hash_trie(self)
    }

    fn items(&self) -> TrieIter<'_, Self> {
        self.0.trie_items()
    }
}

impl TrieNodeIntern for StandardTrie {
    fn cached_hash(&self) -> Option<H256> {
        None
    }

    fn cache_hash(&self, _hash: H256) {}
}

impl Drop for StandardTrie {
    fn drop(&mut self) {
        drop_subtree(&mut self.0);
    }
}

impl Deref for StandardTrie {
    type Target = Node<StandardTrie>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for StandardTrie {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<K, V> TryFromIterator<(K, V)> for StandardTrie
where
    K: Into<Nibbles>,
    V: Into<Vec<u8>>,
{
    fn try_from_iter<T: IntoIterator<Item = (K, V)>>(entries: T) -> TrieOpResult<Self> {
        from_iter_common(entries)
    }
}

/// A trie that lazily caches the digest of each node as needed.
///
/// A node's cached digest is dropped whenever the node is mutably accessed,
/// and every mutation rebuilds the nodes along the path it touches, so only
/// the touched path is rehashed on the next call to [`Trie::hash`]. If you
/// are doing frequent hashing, you probably want to use this `Trie` variant.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HashedTrie {
    pub(crate) node: Node<HashedTrie>,
    pub(crate) hash: RwLock<Option<H256>>,
}

impl_from_for_trie_type!(HashedTrie);

impl HashedTrie {
    pub(crate) fn set_hash(&self, v: Option<H256>) {
        *self.hash.write() = v;
    }
}

impl Clone for HashedTrie {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            hash: RwLock::new(*self.hash.read()),
        }
    }
}

impl Trie for HashedTrie {
    fn new(node: Node<Self>) -> Self {
        Self {
            node,
            hash: RwLock::new(None),
        }
    }

    fn into_node(mut self) -> Node<Self> {
        std::mem::take(&mut self.node)
    }

    fn put<K, V>(&mut self, k: K, v: V) -> TrieOpResult<()>
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
    {
        self.node.trie_put(k, v, false)?;
        self.set_hash(None);
        Ok(())
    }

    fn must_put<K, V>(&mut self, k: K, v: V)
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
    {
        self.node.trie_must_put(k, v);
        self.set_hash(None);
    }

    fn extend<K, V, I>(&mut self, entries: I) -> TrieOpResult<()>
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        // Entries put before a failure stay in the trie, so always invalidate.
        let res = self.node.trie_extend(entries);
        self.set_hash(None);

        res
    }

    fn get<K>(&self, k: K) -> TrieOpResult<&[u8]>
    where
        K: Into<Nibbles>,
    {
        self.node.trie_get(k)
    }

    fn del<K>(&mut self, k: K) -> TrieOpResult<Vec<u8>>
    where
        K: Into<Nibbles>,
    {
        let deleted = self.node.trie_delete(k)?;
        self.set_hash(None);

        Ok(deleted)
    }

    fn hash(&self) -> H256 {
        hash_trie(self)
    }

    fn items(&self) -> TrieIter<'_, Self> {
        self.node.trie_items()
    }
}

impl TrieNodeIntern for HashedTrie {
    fn cached_hash(&self) -> Option<H256> {
        *self.hash.read()
    }

    fn cache_hash(&self, hash: H256) {
        self.set_hash(Some(hash));
    }
}

impl Drop for HashedTrie {
    fn drop(&mut self) {
        drop_subtree(&mut self.node);
    }
}

impl Deref for HashedTrie {
    type Target = Node<HashedTrie>;

    fn deref(&self) -> &Self::Target {
        &self.node
    }
}

impl DerefMut for HashedTrie {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // Whoever asks for mutable access may change the node.
        *self.hash.get_mut() = None;
        &mut self.node
    }
}

impl Eq for HashedTrie {}
impl PartialEq for HashedTrie {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<K, V> TryFromIterator<(K, V)> for HashedTrie
where
    K: Into<Nibbles>,
    V: Into<Vec<u8>>,
{
    fn try_from_iter<T: IntoIterator<Item = (K, V)>>(entries: T) -> TrieOpResult<Self> {
        from_iter_common(entries)
    }
}

fn from_iter_common<N: Trie, T: IntoIterator<Item = (K, V)>, K, V>(entries: T) -> TrieOpResult<N>
where
    K: Into<Nibbles>,
    V: Into<Vec<u8>>,
{
    let mut root = N::new(Node::Empty);
    root.extend(entries)?;
    Ok(root)
}
