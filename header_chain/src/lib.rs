//! A repository of candidate block headers.
//!
//! Headers form a tree rooted at a known root header. Headers can arrive in
//! any order: a header whose parent is still unknown is parked until the
//! parent shows up, at which point it (and anything waiting on it) is
//! attached. [`Headers::path`] then picks the heaviest chain through the tree
//! by cumulative difficulty.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]
#![deny(missing_docs)]

use std::collections::{HashMap, VecDeque};

use ethereum_types::H256;
use ledger_common::ZERO_HASH;
use log::{debug, trace};
use thiserror::Error;

/// Stores the result of header repository operations. Returns a
/// [HeaderError] upon failure.
pub type HeaderResult<T> = Result<T, HeaderError>;

/// An error type for header repository operations.
#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum HeaderError {
    /// The header was added before.
    #[error("Header {0:x} is already known")]
    AlreadyExists(H256),

    /// No attached header has this hash.
    #[error("Header {0:x} not found")]
    NotFound(H256),
}

/// A block header, reduced to what is needed to order headers into a chain.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Header {
    /// The hash identifying this header.
    pub hash: H256,
    /// The hash of the header this one builds on.
    pub parent: H256,
    /// The difficulty this header contributes to any chain containing it.
    pub diff: u64,
}

impl Header {
    /// Creates a header with no parent.
    pub const fn root(hash: H256, diff: u64) -> Self {
        Self {
            hash,
            parent: ZERO_HASH,
            diff,
        }
    }
}

/// The tree of known headers, plus the headers still waiting on their parent.
#[derive(Clone, Debug)]
pub struct Headers {
    root: H256,
    headers: HashMap<H256, Header>,
    children: HashMap<H256, Vec<H256>>,
    pending: HashMap<H256, Vec<Header>>,
}

impl Headers {
    /// Creates a repository that only knows `root`.
    pub fn new(root: Header) -> Self {
        let root_hash = root.hash;

        Self {
            root: root_hash,
            headers: HashMap::from([(root_hash, root)]),
            children: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Adds a header to the tree.
    ///
    /// If its parent is unknown, the header is parked until the parent is
    /// added, and the call still succeeds. Adding a header attaches every
    /// parked header that descends from it.
    pub fn add(&mut self, header: Header) -> HeaderResult<()> {
        if self.headers.contains_key(&header.hash) {
            return Err(HeaderError::AlreadyExists(header.hash));
        }

        if !self.headers.contains_key(&header.parent) {
            debug!(
                "Parking header {:x} until its parent {:x} is known",
                header.hash, header.parent
            );

            self.pending.entry(header.parent).or_default().push(header);
            return Ok(());
        }

        let mut attached = vec![header.hash];
        self.attach(header);

        // Pull in everything that was waiting on the headers we just attached.
        while let Some(hash) = attached.pop() {
            let Some(waiting) = self.pending.remove(&hash) else {
                continue;
            };

            debug!("Adopting {} parked children of {:x}", waiting.len(), hash);

            for child in waiting {
                // The same header may have been parked more than once.
                if self.headers.contains_key(&child.hash) {
                    trace!("Dropping duplicate parked header {:x}", child.hash);
                    continue;
                }

                attached.push(child.hash);
                self.attach(child);
            }
        }

        Ok(())
    }

    fn attach(&mut self, header: Header) {
        trace!("Attaching header {:x} to {:x}", header.hash, header.parent);

        self.children
            .entry(header.parent)
            .or_default()
            .push(header.hash);
        self.headers.insert(header.hash, header);
    }

    /// Returns `true` if the header is attached to the tree. Parked headers
    /// do not count.
    pub fn has(&self, hash: &H256) -> bool {
        self.headers.contains_key(hash)
    }

    /// Gets an attached header.
    pub fn get(&self, hash: &H256) -> HeaderResult<&Header> {
        self.headers.get(hash).ok_or(HeaderError::NotFound(*hash))
    }

    /// The hash of the root header.
    pub const fn root(&self) -> H256 {
        self.root
    }

    /// Returns the heaviest path through the tree along with its cumulative
    /// difficulty.
    ///
    /// The path starts at the tip and ends at the root. The root's own
    /// difficulty counts towards the total. When several tips are equally
    /// heavy, the one closest to the root in breadth-first order wins.
    pub fn path(&self) -> (Vec<H256>, u64) {
        let mut distances: HashMap<H256, u64> = HashMap::with_capacity(self.headers.len());
        let mut best: Option<(H256, u64)> = None;

        let mut queue = VecDeque::from([self.root]);
        while let Some(hash) = queue.pop_front() {
            let Some(header) = self.headers.get(&hash) else {
                continue;
            };

            let parent_distance = match hash == self.root {
                true => 0,
                false => distances.get(&header.parent).copied().unwrap_or_default(),
            };
            let distance = parent_distance.saturating_add(header.diff);
            distances.insert(hash, distance);

            if best.map_or(true, |(_, best_distance)| distance > best_distance) {
                best = Some((hash, distance));
            }

            if let Some(children) = self.children.get(&hash) {
                queue.extend(children.iter().copied());
            }
        }

        let (tip, distance) = best.unwrap_or((self.root, 0));

        let mut path = vec![tip];
        let mut curr = tip;
        while curr != self.root {
            match self.headers.get(&curr) {
                Some(header) => {
                    curr = header.parent;
                    path.push(curr);
                }
                None => break,
            }
        }

        debug!(
            "Best path has {} headers with distance {} (tip: {:x})",
            path.len(),
            distance,
            tip
        );

        (path, distance)
    }
}
