use std::collections::HashMap;
use std::ops::Range;

use bio::data_structures::interval_tree::IntervalTree;
use bio_types::genome::AbstractInterval;
use derive_getters::{Dissolve, Getters};

use crate::core::error::Result;
use crate::core::io::bed::BedRecord;

/// Maximal run of contiguous sub-threshold positions. `start` and `end` are both
/// inclusive; `samples` holds the depth at each position of the run.
#[derive(Clone, Debug, PartialEq, Eq, Getters, Dissolve)]
pub struct CoverageGap {
    contig: String,
    start: u64,
    end: u64,
    samples: Vec<u16>,
}

impl CoverageGap {
    pub fn new(contig: String, start: u64, samples: Vec<u16>) -> Self {
        debug_assert!(!samples.is_empty());
        let end = start + samples.len() as u64 - 1;
        CoverageGap { contig, start, end, samples }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn mean(&self) -> f64 {
        self.samples.iter().map(|&d| d as u64).sum::<u64>() as f64 / self.samples.len() as f64
    }

    pub fn median(&self) -> u16 {
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        sorted[(sorted.len() - 1) / 2]
    }
}

struct OpenGap {
    tid: u32,
    contig: String,
    start: u64,
    samples: Vec<u16>,
}

/// Online state machine over coordinate-ordered `(contig, pos, depth)` points.
/// At most one block is open at a time; blocks never cross contigs.
pub struct GapDetector {
    threshold: u16,
    open: Option<OpenGap>,
}

impl GapDetector {
    pub fn new(threshold: u16) -> Self {
        GapDetector { threshold, open: None }
    }

    pub fn push<S>(&mut self, tid: u32, contig: &str, pos: u64, depth: u16, sink: &mut S) -> Result<()>
    where
        S: FnMut(CoverageGap) -> Result<()>,
    {
        if depth < self.threshold {
            match &mut self.open {
                Some(gap) if gap.tid == tid && pos == gap.start + gap.samples.len() as u64 => {
                    gap.samples.push(depth);
                }
                Some(_) => {
                    self.close(sink)?;
                    self.open = Some(OpenGap { tid, contig: contig.to_owned(), start: pos, samples: vec![depth] });
                }
                None => {
                    self.open = Some(OpenGap { tid, contig: contig.to_owned(), start: pos, samples: vec![depth] });
                }
            }
        } else if self.open.is_some() {
            self.close(sink)?;
        }
        Ok(())
    }

    /// End-of-stream: close any pending block at its last observed position.
    pub fn finish<S>(&mut self, sink: &mut S) -> Result<()>
    where
        S: FnMut(CoverageGap) -> Result<()>,
    {
        self.close(sink)
    }

    fn close<S>(&mut self, sink: &mut S) -> Result<()>
    where
        S: FnMut(CoverageGap) -> Result<()>,
    {
        if let Some(gap) = self.open.take() {
            sink(CoverageGap::new(gap.contig, gap.start, gap.samples))?;
        }
        Ok(())
    }
}

/// Restricts gap reporting to a configured region set; a block straddling the set's
/// boundaries is split at each intersection and the pieces forwarded separately.
pub struct GapTargetFilter {
    trees: HashMap<String, IntervalTree<u64, ()>>,
}

impl GapTargetFilter {
    pub fn new(records: &[BedRecord]) -> Self {
        let mut trees: HashMap<String, IntervalTree<u64, ()>> = HashMap::new();
        for r in records {
            trees.entry(r.contig().to_owned()).or_insert_with(IntervalTree::new).insert(r.range(), ());
        }
        GapTargetFilter { trees }
    }

    pub fn apply(&self, gap: CoverageGap) -> Vec<CoverageGap> {
        let tree = match self.trees.get(gap.contig()) {
            Some(tree) => tree,
            None => return Vec::new(),
        };
        let query = *gap.start()..gap.end() + 1;
        let mut cuts: Vec<Range<u64>> = tree
            .find(query.clone())
            .map(|entry| {
                let hit = entry.interval();
                hit.start.max(query.start)..hit.end.min(query.end)
            })
            .collect();
        cuts.sort_by_key(|r| r.start);
        // overlapping gap targets would duplicate pieces, coalesce first
        let mut merged: Vec<Range<u64>> = Vec::with_capacity(cuts.len());
        for cut in cuts {
            match merged.last_mut() {
                Some(prev) if cut.start <= prev.end => prev.end = prev.end.max(cut.end),
                _ => merged.push(cut),
            }
        }

        merged
            .into_iter()
            .map(|piece| {
                let offset = (piece.start - gap.start()) as usize;
                let samples = gap.samples()[offset..offset + (piece.end - piece.start) as usize].to_vec();
                CoverageGap::new(gap.contig().clone(), piece.start, samples)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bio_types::genome::Interval;

    use super::*;

    fn collect(threshold: u16, points: &[(u32, &str, u64, u16)], finish: bool) -> Vec<CoverageGap> {
        let mut detector = GapDetector::new(threshold);
        let mut gaps = Vec::new();
        let mut sink = |gap: CoverageGap| -> Result<()> {
            gaps.push(gap);
            Ok(())
        };
        for &(tid, contig, pos, depth) in points {
            detector.push(tid, contig, pos, depth, &mut sink).unwrap();
        }
        if finish {
            detector.finish(&mut sink).unwrap();
        }
        gaps
    }

    #[test]
    fn basic_blocks() {
        let depths = [5, 5, 1, 1, 1, 5, 5, 2, 2, 5, 5];
        let points: Vec<(u32, &str, u64, u16)> =
            depths.iter().enumerate().map(|(i, &d)| (0, "c1", 10 + i as u64, d)).collect();
        let gaps = collect(3, &points, true);
        assert_eq!(
            gaps,
            vec![
                CoverageGap::new("c1".into(), 12, vec![1, 1, 1]),
                CoverageGap::new("c1".into(), 17, vec![2, 2]),
            ]
        );
    }

    #[test]
    fn open_block_closes_at_stream_end() {
        let gaps = collect(3, &[(0, "c1", 5, 0), (0, "c1", 6, 1)], true);
        assert_eq!(gaps, vec![CoverageGap::new("c1".into(), 5, vec![0, 1])]);
        assert_eq!(gaps[0].end(), &6);
    }

    #[test]
    fn position_jump_splits() {
        // disjoint target regions produce non-adjacent positions
        let gaps = collect(3, &[(0, "c1", 5, 1), (0, "c1", 9, 1)], true);
        assert_eq!(
            gaps,
            vec![CoverageGap::new("c1".into(), 5, vec![1]), CoverageGap::new("c1".into(), 9, vec![1])]
        );
    }

    #[test]
    fn contig_change_closes() {
        let gaps = collect(3, &[(0, "c1", 5, 1), (1, "c2", 5, 1), (1, "c2", 6, 9)], true);
        assert_eq!(
            gaps,
            vec![CoverageGap::new("c1".into(), 5, vec![1]), CoverageGap::new("c2".into(), 5, vec![1])]
        );
    }

    #[test]
    fn threshold_is_strict() {
        let gaps = collect(3, &[(0, "c1", 5, 3), (0, "c1", 6, 2)], true);
        assert_eq!(gaps, vec![CoverageGap::new("c1".into(), 6, vec![2])]);
    }

    #[test]
    fn block_statistics() {
        let gap = CoverageGap::new("c1".into(), 10, vec![4, 1, 3, 2]);
        assert_eq!(gap.size(), 4);
        assert!((gap.mean() - 2.5).abs() < 1e-9);
        assert_eq!(gap.median(), 2);
    }

    #[test]
    fn target_filter_splits_blocks() {
        let targets = vec![
            BedRecord { name: "".into(), interval: Interval::new("c1".into(), 0..12) },
            BedRecord { name: "".into(), interval: Interval::new("c1".into(), 14..16) },
        ];
        let filter = GapTargetFilter::new(&targets);

        let pieces = filter.apply(CoverageGap::new("c1".into(), 10, vec![1, 2, 3, 4, 5, 6, 7]));
        assert_eq!(
            pieces,
            vec![
                CoverageGap::new("c1".into(), 10, vec![1, 2]),
                CoverageGap::new("c1".into(), 14, vec![5, 6]),
            ]
        );

        // no overlap at all drops the block
        assert!(filter.apply(CoverageGap::new("c2".into(), 10, vec![1])).is_empty());
    }
}
