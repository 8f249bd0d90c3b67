//! Simple tooling to extract stats from tries.
//!
//! This is particularly useful when checking how well the trie is compacted
//! for a given key distribution, or when comparing two tries.

use std::fmt::{self, Display};

use num_traits::ToPrimitive;

use crate::trie::{Node, Trie};

#[derive(Clone, Debug, Default)]
/// Statistics for a given trie, consisting of node count aggregated
/// by type and the depth spread of stored values.
pub struct TrieStats {
    name: Option<String>,
    counts: NodeCounts,
    depth_stats: DepthStats,
}

impl Display for TrieStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trie Stats:")?;

        match self.name.as_ref() {
            Some(name) => writeln!(f, " ({})", name)?,
            None => writeln!(f)?,
        }

        writeln!(f, "Counts:\n{}", self.counts)?;
        writeln!(f, "Depth stats:\n{}", self.depth_stats)
    }
}

impl TrieStats {
    /// Compares with the statistics of another trie.
    pub const fn compare(&self, other: &Self) -> TrieComparison {
        TrieComparison {
            node_comp: self.counts.compare(&other.counts),
            depth_comp: self.depth_stats.compare(&other.depth_stats),
        }
    }

    /// Number of values stored in the trie, including the ones held by
    /// `Full` nodes.
    pub const fn num_values(&self) -> usize {
        self.counts.values
    }
}

/// Total node counts for a trie.
#[derive(Clone, Debug, Default, Hash)]
struct NodeCounts {
    empty: usize,
    value: usize,
    short: usize,
    full: usize,

    /// Not a node type. `Value` nodes plus `Full` nodes holding a value.
    values: usize,
}

impl Display for NodeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tot_nodes = self.total_nodes();

        Self::write_node_count_stats(f, "Empty", self.empty, tot_nodes)?;
        Self::write_node_count_stats(f, "Value", self.value, tot_nodes)?;
        Self::write_node_count_stats(f, "Short", self.short, tot_nodes)?;
        Self::write_node_count_stats(f, "Full", self.full, tot_nodes)?;
        writeln!(f, "Stored values: {}", self.values)
    }
}

impl NodeCounts {
    fn write_node_count_stats(
        f: &mut fmt::Formatter<'_>,
        node_t_name: &str,
        count: usize,
        tot_count: usize,
    ) -> fmt::Result {
        let perc = (count as f32 / tot_count as f32) * 100.0;
        writeln!(f, "{}: {} ({:.2}%)", node_t_name, count, perc)
    }
}

impl NodeCounts {
    const fn total_nodes(&self) -> usize {
        self.empty + self.total_node_non_empty()
    }

    const fn total_node_non_empty(&self) -> usize {
        self.value + self.short + self.full
    }

    const fn compare(&self, other: &Self) -> NodeComparison {
        NodeComparison {
            tot_node_rat: RatioStat::new(self.total_nodes(), other.total_nodes()),
            non_empty_rat: RatioStat::new(
                self.total_node_non_empty(),
                other.total_node_non_empty(),
            ),
            empty_rat: RatioStat::new(self.empty, other.empty),
            value_rat: RatioStat::new(self.value, other.value),
            short_rat: RatioStat::new(self.short, other.short),
            full_rat: RatioStat::new(self.full, other.full),
            stored_values_rat: RatioStat::new(self.values, other.values),
        }
    }
}

/// Information on the comparison between two tries.
#[derive(Clone, Debug)]
pub struct TrieComparison {
    node_comp: NodeComparison,
    depth_comp: DepthComparison,
}

impl Display for TrieComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Node comparison: {}", self.node_comp)?;
        writeln!(f, "Depth comparison: {}", self.depth_comp)
    }
}

#[derive(Clone, Debug, Hash)]
struct NodeComparison {
    tot_node_rat: RatioStat<usize>,
    non_empty_rat: RatioStat<usize>,

    empty_rat: RatioStat<usize>,
    value_rat: RatioStat<usize>,
    short_rat: RatioStat<usize>,
    full_rat: RatioStat<usize>,
    stored_values_rat: RatioStat<usize>,
}

impl Display for NodeComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total nodes: {}", self.tot_node_rat)?;
        writeln!(f, "Non-empty: {}", self.non_empty_rat)?;

        writeln!(f, "Total empty: {}", self.empty_rat)?;
        writeln!(f, "Total value: {}", self.value_rat)?;
        writeln!(f, "Total short: {}", self.short_rat)?;
        writeln!(f, "Total full: {}", self.full_rat)?;
        writeln!(f, "Stored values: {}", self.stored_values_rat)
    }
}

#[derive(Clone, Debug)]
struct DepthComparison {
    shallowest_depth_rat: RatioStat<usize>,
    deepest_depth_rat: RatioStat<usize>,
    avg_value_depth_rat: RatioStat<f32>,
}

impl Display for DepthComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Shallowest depth: {}", self.shallowest_depth_rat)?;
        writeln!(f, "Deepest depth: {}", self.deepest_depth_rat)?;
        writeln!(f, "Avg value depth: {}", self.avg_value_depth_rat)
    }
}

/// Type to hold (and compare) a given variable from two different tries.
#[derive(Clone, Debug, Hash)]
struct RatioStat<T> {
    a: T,
    b: T,
}

impl<T: Display + ToPrimitive> Display for RatioStat<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3} / {:.3} ({:.3}%)",
            self.a,
            self.b,
            // `fmt::Error` can not carry anything more specific.
            self.get_a_over_b_perc().map_err(|_| fmt::Error)?
        )
    }
}

impl<T: ToPrimitive> RatioStat<T> {
    const fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    fn get_a_over_b_perc(&self) -> Result<f32, ()> {
        Ok((Self::try_to_f32(&self.a)? / Self::try_to_f32(&self.b)?) * 100.0)
    }

    fn try_to_f32(v: &T) -> Result<f32, ()> {
        v.to_f32().ok_or(())
    }
}

/// "Raw" state that is mutated as we traverse down the trie. Is processed into
/// a more useful format later on.
#[derive(Debug, Default)]
struct CurrTrackingState {
    counts: NodeCounts,

    // Accumulator that we process later to get the average depth.
    value_depth_sum: u64,
    shallowest_depth: Option<usize>,
    deepest_depth: usize,
}

impl CurrTrackingState {
    fn record_value(&mut self, curr_depth: usize) {
        self.counts.values += 1;
        self.value_depth_sum += curr_depth as u64;

        if self.shallowest_depth.map_or(true, |d| curr_depth < d) {
            self.shallowest_depth = Some(curr_depth);
        }

        if self.deepest_depth < curr_depth {
            self.deepest_depth = curr_depth;
        }
    }
}

/// Depth in terms of node depth (not key length).
#[derive(Clone, Debug, Default)]
struct DepthStats {
    shallowest_depth: usize,
    deepest_depth: usize,
    avg_value_depth: f32,
}

impl Display for DepthStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Shallowest value depth: {}", self.shallowest_depth)?;
        writeln!(f, "Deepest value depth: {}", self.deepest_depth)?;
        writeln!(f, "Average value depth: {:.3}", self.avg_value_depth)
    }
}

impl DepthStats {
    const fn compare(&self, other: &Self) -> DepthComparison {
        DepthComparison {
            shallowest_depth_rat: RatioStat::new(self.shallowest_depth, other.shallowest_depth),
            deepest_depth_rat: RatioStat::new(self.deepest_depth, other.deepest_depth),
            avg_value_depth_rat: RatioStat::new(self.avg_value_depth, other.avg_value_depth),
        }
    }
}

/// Returns trie statistics consisting of node type counts as well as depth
/// statistics.
pub fn get_trie_stats<T: Trie>(trie: &T) -> TrieStats {
    get_trie_stats_common(trie, None)
}

/// Returns trie statistics with a given name.
pub fn get_trie_stats_with_name<T: Trie>(trie: &T, name: String) -> TrieStats {
    get_trie_stats_common(trie, Some(name))
}

fn get_trie_stats_common<T: Trie>(trie: &T, name: Option<String>) -> TrieStats {
    let mut state = CurrTrackingState::default();

    collect_trie_stats::<T>(trie, &mut state);

    let avg_value_depth = match state.counts.values {
        0 => 0.0,
        n => state.value_depth_sum as f32 / n as f32,
    };

    let depth_stats = DepthStats {
        shallowest_depth: state.shallowest_depth.unwrap_or_default(),
        deepest_depth: state.deepest_depth,
        avg_value_depth,
    };

    TrieStats {
        name,
        counts: state.counts,
        depth_stats,
    }
}

fn collect_trie_stats<T: Trie>(root: &Node<T>, state: &mut CurrTrackingState) {
    let mut pending = vec![(root, 0)];

    while let Some((node, curr_depth)) = pending.pop() {
        match node {
            Node::Empty => {
                state.counts.empty += 1;
            }
            Node::Value(_) => {
                state.counts.value += 1;
                state.record_value(curr_depth);
            }
            Node::Full { children, value } => {
                state.counts.full += 1;

                if value.is_some() {
                    state.record_value(curr_depth);
                }

                pending.extend(children.iter().map(|c| (&***c, curr_depth + 1)));
            }
            Node::Short { nibbles: _, child } => {
                state.counts.short += 1;
                pending.push((&***child, curr_depth + 1));
            }
        }
    }
}
