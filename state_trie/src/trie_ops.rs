//! Defines the put/get/delete operations and iteration for
//! [`Trie`].

use std::fmt::Display;

use log::{debug, trace};
use thiserror::Error;

use crate::{
    nibbles::{Nibble, Nibbles},
    trie::{wrap, Node, Trie, WrappedNode},
    utils::TrieNodeType,
};

/// Stores the result of trie operations. Returns a [TrieOpError] upon
/// failure.
pub type TrieOpResult<T> = Result<T, TrieOpError>;

/// An error type for trie operation.
///
/// Both variants are expected outcomes that callers branch on. Neither
/// leaves the trie modified.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum TrieOpError {
    /// A non-forced put hit a key that already has a value.
    #[error("A value already exists for key {0}")]
    AlreadyExists(Nibbles),

    /// A get or delete found no value for the key.
    #[error("No value found for key {0}")]
    NotFound(Nibbles),
}

/// A entry to be inserted into a `Trie`.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct InsertEntry {
    pub nibbles: Nibbles,
    pub v: Vec<u8>,
}

impl From<(Nibbles, Vec<u8>)> for InsertEntry {
    fn from((nibbles, v): (Nibbles, Vec<u8>)) -> Self {
        Self { nibbles, v }
    }
}

impl Display for InsertEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrieEntry: (k: {}, v: {})", &self.nibbles, hex::encode(&self.v))
    }
}

/// What an insert does with the node under its cursor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum InsertStep {
    /// The slot is empty, or holds the value of this exact key.
    Place,
    /// A `Value` node is in the way of a longer key and becomes a `Full` node.
    ValueToFull,
    /// The key ends at this `Full` node.
    SetFullValue,
    /// Follow the child slot of a `Full` node.
    DescendFull(Nibble),
    /// The key covers the whole segment (of this length) of a `Short` node.
    DescendShort(usize),
    /// The key leaves the segment of a `Short` node after this many nibbles.
    SplitShort(usize),
}

/// A node on the path of a delete, with the child the path continues through
/// taken out of it.
enum Ancestor<N> {
    Full {
        children: [WrappedNode<N>; 16],
        value: Option<Vec<u8>>,
        nibble: Nibble,
    },
    Short {
        nibbles: Nibbles,
    },
}

/// An iterator that ranges over all the stored values of the trie, in key
/// order. A key is always yielded before any key it is a prefix of.
#[derive(Debug)]
pub struct TrieIter<'a, N: Trie> {
    trie_stack: Vec<(Nibbles, &'a Node<N>)>,
}

impl<'a, N: Trie> Iterator for TrieIter<'a, N> {
    type Item = (Nibbles, Vec<u8>);

    fn next(&mut self) -> Option<(Nibbles, Vec<u8>)> {
        while let Some((curr_key, node)) = self.trie_stack.pop() {
            match node {
                Node::Empty => (),
                Node::Value(value) => return Some((curr_key, value.clone())),
                Node::Short { nibbles, child } => {
                    self.trie_stack
                        .push((curr_key.merge_nibbles(nibbles), &***child));
                }
                Node::Full { children, value } => {
                    // Pushed in reverse so that nibble `0` is visited first.
                    for (nib, child) in children.iter().enumerate().rev() {
                        if !node_is_empty(child) {
                            self.trie_stack
                                .push((curr_key.merge_nibble(nib as Nibble), &***child));
                        }
                    }

                    if let Some(v) = value {
                        return Some((curr_key, v.clone()));
                    }
                }
            }
        }

        None
    }
}

impl<T: Trie> Node<T> {
    pub(crate) fn trie_put<K, V>(&mut self, k: K, v: V, overwrite: bool) -> TrieOpResult<()>
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
    {
        let ins_entry: InsertEntry = (k.into(), v.into()).into();
        trace!("Inserting new node {}...", ins_entry);

        if !overwrite && self.trie_get_intern(ins_entry.nibbles.as_slice()).is_some() {
            trace!("Refusing to overwrite existing value at {}", ins_entry.nibbles);
            return Err(TrieOpError::AlreadyExists(ins_entry.nibbles));
        }

        insert_into_trie(self, ins_entry);

        Ok(())
    }

    pub(crate) fn trie_must_put<K, V>(&mut self, k: K, v: V)
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
    {
        let ins_entry: InsertEntry = (k.into(), v.into()).into();
        trace!("Inserting (or overwriting) node {}...", ins_entry);

        insert_into_trie(self, ins_entry);
    }

    pub(crate) fn trie_extend<K, V, I>(&mut self, entries: I) -> TrieOpResult<()>
    where
        K: Into<Nibbles>,
        V: Into<Vec<u8>>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in entries {
            self.trie_put(k, v, false)?;
        }
        Ok(())
    }

    pub(crate) fn trie_get<K>(&self, k: K) -> TrieOpResult<&[u8]>
    where
        K: Into<Nibbles>,
    {
        let k: Nibbles = k.into();
        self.trie_get_intern(k.as_slice())
            .ok_or(TrieOpError::NotFound(k))
    }

    fn trie_get_intern(&self, key: &[Nibble]) -> Option<&[u8]> {
        let mut curr_node = self;
        let mut pos = 0;

        loop {
            let rest = &key[pos..];

            match curr_node {
                Node::Empty => {
                    trace!("Get traversed Empty");
                    return None;
                }
                Node::Value(value) => {
                    trace!("Get traversed Value ({} nibbles left)", rest.len());
                    return rest.is_empty().then_some(value.as_slice());
                }
                Node::Full { children, value } => {
                    // Check against the value of the branch point itself.
                    let Some(&nib) = rest.first() else {
                        return value.as_deref();
                    };

                    trace!("Get traversed Full (nibble: {:x})", nib);
                    pos += 1;
                    curr_node = &**children[nib as usize];
                }
                Node::Short { nibbles, child } => {
                    trace!("Get traversed Short (nibbles: {:x})", nibbles);
                    if !rest.starts_with(nibbles.as_slice()) {
                        return None;
                    }

                    pos += nibbles.len();
                    curr_node = &***child;
                }
            }
        }
    }

    pub(crate) fn trie_delete<K>(&mut self, k: K) -> TrieOpResult<Vec<u8>>
    where
        K: Into<Nibbles>,
    {
        let k: Nibbles = k.into();
        trace!("Deleting the value with key {} if it exists", k);

        // Only rebuild the path once we know there is something to remove.
        if self.trie_get_intern(k.as_slice()).is_none() {
            return Err(TrieOpError::NotFound(k));
        }

        delete_intern(self, k.as_slice()).ok_or(TrieOpError::NotFound(k))
    }

    pub(crate) fn trie_items(&self) -> TrieIter<'_, T> {
        TrieIter {
            trie_stack: vec![(Nibbles::default(), self)],
        }
    }
}

/// Walks down from `root` with a mutable cursor and rewrites the slot where
/// the new entry belongs. Nodes are split in place where the key leaves an
/// existing path.
fn insert_into_trie<N: Trie>(root: &mut Node<N>, new_node: InsertEntry) {
    let InsertEntry { nibbles: key, v } = new_node;
    let mut pos = 0;
    let mut curr = root;

    loop {
        let rest = &key.as_slice()[pos..];

        let step = match &*curr {
            Node::Empty => InsertStep::Place,
            Node::Value(_) if rest.is_empty() => InsertStep::Place,
            Node::Value(_) => InsertStep::ValueToFull,
            Node::Full { .. } => match rest.first() {
                None => InsertStep::SetFullValue,
                Some(&nib) => InsertStep::DescendFull(nib),
            },
            Node::Short { nibbles, .. } => {
                match Nibbles::common_prefix_len(nibbles.as_slice(), rest) {
                    common if common == nibbles.len() => InsertStep::DescendShort(common),
                    common => InsertStep::SplitShort(common),
                }
            }
        };

        match step {
            InsertStep::Place => {
                trace!("Insert traversed {} and placed the value", TrieNodeType::from(&*curr));
                let remaining = Nibbles::from_nibbles(rest.iter().copied());
                *curr = create_node_from_insert_val(remaining, v);

                return;
            }
            InsertStep::ValueToFull => {
                // The key extends past this value, so the value moves into a branch point.
                trace!(
                    "Insert traversed Value with {} nibbles left, creating a Full node",
                    rest.len()
                );

                if let Node::Value(existing) = std::mem::take(curr) {
                    *curr = full(new_full_child_arr(), Some(existing));
                }
            }
            InsertStep::SetFullValue => {
                trace!("Insert traversed Full and placed value in node");
                if let Node::Full { value, .. } = curr {
                    *value = Some(v);
                }

                return;
            }
            InsertStep::DescendFull(nib) => {
                trace!("Insert traversed Full (nibble: {:x})", nib);
                pos += 1;
                curr = child_slot(curr, Some(nib));
            }
            InsertStep::DescendShort(len) => {
                trace!("Insert traversed Short ({} nibbles)", len);
                pos += len;
                curr = child_slot(curr, None);
            }
            // The next pass starts over at the same slot, which now leads to a
            // `Full` node with a free slot for the new key.
            InsertStep::SplitShort(common) => split_short_node(curr, common),
        }
    }
}

/// Moves a cursor from a `Full` node (`Some(nibble)`) or a `Short` node
/// (`None`) down to the child slot it leads to.
fn child_slot<N: Trie>(node: &mut Node<N>, nib: Option<Nibble>) -> &mut Node<N> {
    match (node, nib) {
        (Node::Full { children, .. }, Some(nib)) => &mut **children[nib as usize],
        (Node::Short { child, .. }, None) => &mut ***child,
        (node, _) => unreachable!(
            "Insert tried to descend below a {} node",
            TrieNodeType::from(&*node)
        ),
    }
}

/// Splits the `Short` node in `slot` after `common` nibbles of its segment.
///
/// The remainder of the segment hangs under a new `Full` node at its first
/// nibble. Any shared prefix is kept in a `Short` node above it.
fn split_short_node<N: Trie>(slot: &mut Node<N>, common: usize) {
    let Node::Short { nibbles, child } = std::mem::take(slot) else {
        unreachable!("Only Short nodes are split");
    };

    // The key left the segment before its end, so the postfix is never empty.
    let (common_prefix, existing_postfix) = nibbles.split_at_idx(common);
    trace!(
        "Splitting Short node (common prefix: {:x}, existing postfix: {:x})",
        common_prefix,
        existing_postfix
    );

    let existing_nib = existing_postfix.get_nibble(0);
    let existing_rest = existing_postfix.truncate_n_nibbles_front(1);
    let updated_existing_node = match existing_rest.is_empty() {
        true => child,
        false => wrap(short(existing_rest, child)),
    };

    let mut children = new_full_child_arr();
    children[existing_nib as usize] = updated_existing_node;
    let full_node = full(children, None);

    *slot = match common_prefix.is_empty() {
        true => full_node,
        false => short(common_prefix, wrap(full_node)),
    };
}

/// Removes the value under `key`, if any.
///
/// The path down to the value is taken apart onto an explicit stack of
/// ancestors. It is then rebuilt bottom-up, and when a value was removed every
/// ancestor is compacted on the way, so compaction propagates as far as needed.
fn delete_intern<N: Trie>(root: &mut Node<N>, key: &[Nibble]) -> Option<Vec<u8>> {
    let mut ancestors = Vec::new();
    let mut pos = 0;
    let mut curr = std::mem::take(root);

    let deleted = loop {
        let rest = &key[pos..];

        match curr {
            Node::Value(value) if rest.is_empty() => {
                trace!("Deleting Value");
                curr = Node::Empty;
                break Some(value);
            }
            Node::Full {
                children,
                value: Some(value),
            } if rest.is_empty() => {
                trace!("Deleting the value of a Full node");
                curr = collapse_full_node_if_needed(children, None);
                break Some(value);
            }
            Node::Full {
                mut children,
                value,
            } if !rest.is_empty() => {
                let nibble = rest[0];
                trace!("Delete traversed Full nibble {:x}", nibble);

                pos += 1;
                curr = take_child(&mut children[nibble as usize]);
                ancestors.push(Ancestor::Full {
                    children,
                    value,
                    nibble,
                });
            }
            Node::Short { nibbles, child } if rest.starts_with(nibbles.as_slice()) => {
                trace!("Delete traversed Short (nibbles: {:x})", nibbles);

                pos += nibbles.len();
                curr = (*child).into_node();
                ancestors.push(Ancestor::Short { nibbles });
            }
            other => {
                trace!("Delete found no value under {} node", TrieNodeType::from(&other));
                curr = other;
                break None;
            }
        }
    };

    let compact = deleted.is_some();
    while let Some(ancestor) = ancestors.pop() {
        curr = match ancestor {
            Ancestor::Full {
                mut children,
                value,
                nibble,
            } => {
                children[nibble as usize] = wrap(curr);
                match compact {
                    true => collapse_full_node_if_needed(children, value),
                    false => full(children, value),
                }
            }
            Ancestor::Short { nibbles } => match compact {
                true => collapse_short_node_if_needed(nibbles, curr),
                false => short(nibbles, wrap(curr)),
            },
        };
    }

    *root = curr;
    deleted
}

/// Restores canonical form for a `Full` node that may have lost an entry.
///
/// Its children are already canonical, so one check at this level is enough.
fn collapse_full_node_if_needed<N: Trie>(
    mut children: [WrappedNode<N>; 16],
    value: Option<Vec<u8>>,
) -> Node<N> {
    let non_empty: Vec<_> = children
        .iter()
        .enumerate()
        .filter(|(_, c)| !node_is_empty(c))
        .map(|(i, _)| i as Nibble)
        .collect();

    match (non_empty.as_slice(), value) {
        ([], None) => {
            debug!("Full node has no entries left and became Empty");
            Node::Empty
        }
        ([], Some(value)) => {
            debug!("Full node has only its value left and became a Value node");
            Node::Value(value)
        }
        (&[nibble], None) => {
            let child = take_child(&mut children[nibble as usize]);

            debug!(
                "Full node became a Short node over its single child in slot {:x} ({})",
                nibble,
                TrieNodeType::from(&child)
            );

            collapse_short_node_if_needed(Nibbles::from_nibble(nibble), child)
        }
        (_, value) => full(children, value),
    }
}

/// Builds a `Short` node over `child`, merging it with `child` if that is
/// also a `Short` node and dropping it if `child` is empty.
fn collapse_short_node_if_needed<N: Trie>(nibbles: Nibbles, child: Node<N>) -> Node<N> {
    trace!(
        "Collapsing Short node ({:x}) with child {}...",
        nibbles,
        TrieNodeType::from(&child)
    );

    match child {
        // Nothing is left under this run of nibbles.
        Node::Empty => Node::Empty,
        Node::Short {
            nibbles: other_nibbles,
            child: other_child,
        } => short(nibbles.merge_nibbles(&other_nibbles), other_child),
        child @ (Node::Value(_) | Node::Full { .. }) => short(nibbles, wrap(child)),
    }
}

fn new_full_child_arr<N: Trie>() -> [WrappedNode<N>; 16] {
    std::array::from_fn(|_| wrap(Node::Empty))
}

fn take_child<N: Trie>(slot: &mut WrappedNode<N>) -> Node<N> {
    std::mem::take(&mut ***slot)
}

fn node_is_empty<N: Trie>(node: &WrappedNode<N>) -> bool {
    matches!(***node, Node::Empty)
}

fn full<N: Trie>(children: [WrappedNode<N>; 16], value: Option<Vec<u8>>) -> Node<N> {
    Node::Full { children, value }
}

fn short<N: Trie>(nibbles: Nibbles, child: WrappedNode<N>) -> Node<N> {
    Node::Short { nibbles, child }
}

fn create_node_from_insert_val<N: Trie>(nibbles: Nibbles, value: Vec<u8>) -> Node<N> {
    match nibbles.is_empty() {
        true => Node::Value(value),
        false => short(nibbles, wrap(Node::Value(value))),
    }
}
