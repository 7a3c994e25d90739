//! Blind trie insertion sort
//!
//! Suffixes are inserted one by one into a compacted trie whose nodes only store the
//! depth at which their children branch and the first symbol of each branch. A new
//! suffix descends by those branch symbols without checking the skipped ones, is
//! compared once against the leaf it reaches, and is then linked in at the depth of
//! that comparison. Leaves never hold symbols, only start positions.
//!
//! Children of a node at the depth bound are keyed by start position, which keeps
//! suffixes tied at the bound in ascending position order.

use crate::encseq::{EncodedSequence, ReadMode};
use crate::error::Result;

use super::{finish_tied, report_ties, SortContext, UnsortedRangeHandler};

const NIL: usize = usize::MAX;
const ROOT: usize = 0;

/// Order in which the suffixes are handed to the sorter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputOrder {
    /// Positions ascend
    #[default]
    Ascending,
    /// Positions descend; they are inserted back to front
    Descending,
    /// No known order
    NoOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Internal { depth: usize, first_child: usize },
    Leaf { start: usize },
}

#[derive(Debug, Clone, Copy)]
struct Node {
    kind: NodeKind,
    /// Branch symbol under the parent (or start position below the depth bound)
    key: u64,
    right_sibling: usize,
}

/// Reusable blind trie arena
#[derive(Debug, Default)]
pub struct BlindTrie {
    nodes: Vec<Node>,
    /// `(node, depth of its parent)` pairs of the enumeration
    stack: Vec<(usize, usize)>,
}
impl BlindTrie {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorts `suffixes`, which agree on their first `depth` symbols
    ///
    /// Writes LCP values into `lcps[1..]` and reports runs tied at `maxdepth` to
    /// `handler`, with `offset` as the suffix table position of `suffixes[0]`.
    #[allow(clippy::too_many_arguments)]
    pub fn sort<H: UnsortedRangeHandler>(
        &mut self,
        encseq: &EncodedSequence,
        mode: ReadMode,
        suffixes: &mut [usize],
        lcps: &mut [usize],
        offset: usize,
        depth: usize,
        maxdepth: usize,
        order: InputOrder,
        handler: &mut H,
    ) -> Result<()> {
        if suffixes.len() < 2 {
            return Ok(());
        }
        if depth >= maxdepth {
            finish_tied(suffixes, lcps, maxdepth);
            return report_ties(lcps, offset, maxdepth, handler);
        }
        let ctx = SortContext {
            encseq,
            mode,
            maxdepth,
        };
        self.reset(depth);
        match order {
            InputOrder::Descending => {
                for &start in suffixes.iter().rev() {
                    self.insert(&ctx, start);
                }
            }
            InputOrder::Ascending | InputOrder::NoOrder => {
                for &start in &*suffixes {
                    self.insert(&ctx, start);
                }
            }
        }
        self.enumerate(suffixes, lcps);
        report_ties(lcps, offset, maxdepth, handler)
    }

    fn reset(&mut self, depth: usize) {
        self.nodes.clear();
        self.stack.clear();
        self.nodes.push(Node {
            kind: NodeKind::Internal {
                depth,
                first_child: NIL,
            },
            key: 0,
            right_sibling: NIL,
        });
    }

    fn new_node(&mut self, kind: NodeKind, key: u64) -> usize {
        self.nodes.push(Node {
            kind,
            key,
            right_sibling: NIL,
        });
        self.nodes.len() - 1
    }

    /// Branch key of the suffix at `start` below a node of depth `depth`
    #[inline]
    fn branch_key(ctx: &SortContext<'_>, start: usize, depth: usize) -> u64 {
        if depth >= ctx.maxdepth {
            start as u64
        } else {
            ctx.encseq.symbol_key(start + depth, ctx.mode)
        }
    }

    /// Child of `node` with branch key `key`, with its left sibling
    fn find_child(&self, first_child: usize, key: u64) -> Option<(usize, usize)> {
        let mut prev = NIL;
        let mut child = first_child;
        while child != NIL {
            let node = &self.nodes[child];
            if node.key == key {
                return Some((prev, child));
            }
            if node.key > key {
                return None;
            }
            prev = child;
            child = node.right_sibling;
        }
        None
    }

    fn set_first_child(&mut self, node: usize, child: usize) {
        if let NodeKind::Internal { first_child, .. } = &mut self.nodes[node].kind {
            *first_child = child;
        }
    }

    /// Links `child` into the sorted child list of `parent`
    fn link_sorted(&mut self, parent: usize, child: usize) {
        let NodeKind::Internal { first_child, .. } = self.nodes[parent].kind else {
            return;
        };
        let key = self.nodes[child].key;
        let mut prev = NIL;
        let mut current = first_child;
        while current != NIL && self.nodes[current].key < key {
            prev = current;
            current = self.nodes[current].right_sibling;
        }
        self.nodes[child].right_sibling = current;
        if prev == NIL {
            self.set_first_child(parent, child);
        } else {
            self.nodes[prev].right_sibling = child;
        }
    }

    /// Descends by branch symbols to some leaf
    fn blind_descent(&self, ctx: &SortContext<'_>, start: usize) -> Option<usize> {
        let mut node = ROOT;
        loop {
            match self.nodes[node].kind {
                NodeKind::Leaf { start: leaf } => return Some(leaf),
                NodeKind::Internal { first_child, .. } if first_child == NIL => return None,
                NodeKind::Internal { depth, first_child } => {
                    let key = Self::branch_key(ctx, start, depth);
                    node = self
                        .find_child(first_child, key)
                        .map_or(first_child, |(_, child)| child);
                }
            }
        }
    }

    fn insert(&mut self, ctx: &SortContext<'_>, start: usize) {
        let NodeKind::Internal { depth: rootdepth, .. } = self.nodes[ROOT].kind else {
            return;
        };
        let Some(leaf) = self.blind_descent(ctx, start) else {
            let key = Self::branch_key(ctx, start, rootdepth);
            let child = self.new_node(NodeKind::Leaf { start }, key);
            self.set_first_child(ROOT, child);
            return;
        };
        let (_, lcp) = ctx.compare(start, leaf, rootdepth);

        let mut parent = ROOT;
        loop {
            let NodeKind::Internal { depth, first_child } = self.nodes[parent].kind else {
                return;
            };
            let key = Self::branch_key(ctx, start, depth);
            if depth == lcp {
                let child = self.new_node(NodeKind::Leaf { start }, key);
                self.link_sorted(parent, child);
                return;
            }
            let Some((prev, child)) = self.find_child(first_child, key) else {
                // unreachable while the trie is consistent
                let child = self.new_node(NodeKind::Leaf { start }, key);
                self.link_sorted(parent, child);
                return;
            };
            let childdepth = match self.nodes[child].kind {
                NodeKind::Internal { depth, .. } => depth,
                NodeKind::Leaf { .. } => usize::MAX,
            };
            if childdepth <= lcp {
                parent = child;
                continue;
            }
            // the edge into `child` is split at `lcp`
            let old = self.nodes[child];
            let branch = self.new_node(
                NodeKind::Internal {
                    depth: lcp,
                    first_child: NIL,
                },
                old.key,
            );
            self.nodes[branch].right_sibling = old.right_sibling;
            if prev == NIL {
                self.set_first_child(parent, branch);
            } else {
                self.nodes[prev].right_sibling = branch;
            }
            self.nodes[child].key = Self::branch_key(ctx, leaf, lcp);
            self.nodes[child].right_sibling = NIL;
            self.set_first_child(branch, child);
            let newleaf = self.new_node(
                NodeKind::Leaf { start },
                Self::branch_key(ctx, start, lcp),
            );
            self.link_sorted(branch, newleaf);
            return;
        }
    }

    /// Writes the leaves in order, with the depth of their lowest common ancestor
    fn enumerate(&mut self, suffixes: &mut [usize], lcps: &mut [usize]) {
        let NodeKind::Internal { depth, first_child } = self.nodes[ROOT].kind else {
            return;
        };
        self.stack.clear();
        if first_child != NIL {
            self.stack.push((first_child, depth));
        }
        let mut idx = 0;
        let mut pending: Option<usize> = None;
        while let Some((node, parentdepth)) = self.stack.pop() {
            if pending.is_none() {
                pending = Some(parentdepth);
            }
            let current = self.nodes[node];
            if current.right_sibling != NIL {
                self.stack.push((current.right_sibling, parentdepth));
            }
            match current.kind {
                NodeKind::Leaf { start } => {
                    suffixes[idx] = start;
                    if idx > 0 {
                        lcps[idx] = pending.unwrap_or(parentdepth);
                    }
                    idx += 1;
                    pending = None;
                }
                NodeKind::Internal { depth, first_child } => {
                    if first_child != NIL {
                        self.stack.push((first_child, depth));
                    }
                }
            }
        }
        debug_assert_eq!(idx, suffixes.len());
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::sort::testing::{naive_sort, random_dna, regular_positions};
    use crate::sort::{IgnoreUnsorted, UnsortedRange, UnsortedRanges};
    use crate::{Alphabet, EncseqBuilder};
    use anyhow::Result;

    fn sort_all(
        encseq: &EncodedSequence,
        mode: ReadMode,
        positions: &[usize],
        depth: usize,
        maxdepth: usize,
        order: InputOrder,
    ) -> Result<(Vec<usize>, Vec<usize>, Vec<UnsortedRange>)> {
        let mut trie = BlindTrie::new();
        let mut suffixes = positions.to_vec();
        let mut lcps = vec![0; suffixes.len()];
        let mut ranges = UnsortedRanges::default();
        trie.sort(
            encseq,
            mode,
            &mut suffixes,
            &mut lcps,
            0,
            depth,
            maxdepth,
            order,
            &mut ranges,
        )?;
        Ok((suffixes, lcps, ranges.ranges))
    }

    #[test]
    fn test_scenario_bucket() -> Result<()> {
        // ACGTNACGT$ACGT: the AC bucket
        let mut builder = EncseqBuilder::new(Alphabet::dna());
        builder.add_sequence(b"", b"ACGTNACGT")?;
        builder.add_sequence(b"", b"ACGT")?;
        let encseq = builder.build()?;
        let (sorted, lcps, ranges) = sort_all(
            &encseq,
            ReadMode::Forward,
            &[0, 5, 10],
            2,
            usize::MAX,
            InputOrder::Ascending,
        )?;
        let (expected, expected_lcps) =
            naive_sort(&encseq, ReadMode::Forward, &[0, 5, 10], usize::MAX);
        assert_eq!(sorted, expected);
        // ACGTN < ACGT$ < ACGT<end>: special symbols order by position
        assert_eq!(sorted, vec![0, 5, 10]);
        assert_eq!(lcps[1..], expected_lcps[1..]);
        assert_eq!(lcps[1..], [4, 4]);
        assert!(ranges.is_empty());
        Ok(())
    }

    #[test]
    fn test_matches_naive_all_modes() -> Result<()> {
        let encseq = random_dna(17, 900)?;
        for mode in ReadMode::ALL {
            let positions = regular_positions(&encseq, mode);
            for maxdepth in [1, 7, usize::MAX] {
                let (expected, expected_lcps) = naive_sort(&encseq, mode, &positions, maxdepth);
                let (sorted, lcps, _) =
                    sort_all(&encseq, mode, &positions, 0, maxdepth, InputOrder::Ascending)?;
                assert_eq!(sorted, expected, "{mode} {maxdepth}");
                assert_eq!(lcps[1..], expected_lcps[1..], "{mode} {maxdepth}");
            }
        }
        Ok(())
    }

    #[test]
    fn test_input_orders() -> Result<()> {
        let encseq = random_dna(23, 400)?;
        let positions = regular_positions(&encseq, ReadMode::Forward);
        let (expected, _) = naive_sort(&encseq, ReadMode::Forward, &positions, 9);
        let mut descending = positions.clone();
        descending.reverse();
        let (sorted, _, _) = sort_all(
            &encseq,
            ReadMode::Forward,
            &descending,
            0,
            9,
            InputOrder::Descending,
        )?;
        assert_eq!(sorted, expected);

        let mut shuffled = positions.clone();
        shuffled.sort_by_key(|&p| (p * 7919) % 1009);
        let (sorted, _, _) =
            sort_all(&encseq, ReadMode::Forward, &shuffled, 0, 9, InputOrder::NoOrder)?;
        assert_eq!(sorted, expected);
        Ok(())
    }

    #[test]
    fn test_protein_and_repeats() -> Result<()> {
        let mut builder = EncseqBuilder::new(Alphabet::protein());
        builder.add_sequence(b"", b"MKVLAAMKVLAAMKVLAAXWW")?;
        builder.add_sequence(b"", b"AAMKV")?;
        let encseq = builder.build()?;
        let positions = regular_positions(&encseq, ReadMode::Forward);
        for maxdepth in [2, 5, usize::MAX] {
            let (expected, expected_lcps) =
                naive_sort(&encseq, ReadMode::Forward, &positions, maxdepth);
            let (sorted, lcps, ranges) = sort_all(
                &encseq,
                ReadMode::Forward,
                &positions,
                0,
                maxdepth,
                InputOrder::Ascending,
            )?;
            assert_eq!(sorted, expected);
            assert_eq!(lcps[1..], expected_lcps[1..]);
            for range in ranges {
                assert_eq!(range.depth, maxdepth);
                let run = &sorted[range.left..range.left + range.width];
                assert!(run.windows(2).all(|w| w[0] < w[1]));
            }
        }
        Ok(())
    }

    #[test]
    fn test_tied_at_start() -> Result<()> {
        let encseq = random_dna(4, 100)?;
        let mut suffixes = vec![9, 3, 7];
        let mut lcps = vec![0; 3];
        let mut trie = BlindTrie::new();
        trie.sort(
            &encseq,
            ReadMode::Forward,
            &mut suffixes,
            &mut lcps,
            0,
            4,
            4,
            InputOrder::NoOrder,
            &mut IgnoreUnsorted,
        )?;
        assert_eq!(suffixes, vec![3, 7, 9]);
        assert_eq!(lcps, vec![0, 4, 4]);
        Ok(())
    }
}
