use std::ops::Range;

use bio_types::genome::AbstractInterval;
use derive_getters::Getters;
use itertools::Itertools;

use crate::core::error::{CovError, Result};
use crate::core::io::bed::BedRecord;
use crate::core::io::hts::ContigRoster;

/// One normalized target region: contig-resolved, 0-based half-open.
#[derive(Clone, Debug, Eq, PartialEq, Getters)]
pub struct TargetRegion {
    tid: u32,
    contig: String,
    range: Range<u64>,
    label: String,
}

impl TargetRegion {
    /// Region label for the interval summary: the declared name when present,
    /// `chr:from-to` otherwise.
    pub fn display_label(&self) -> String {
        if self.label.is_empty() {
            format!("{}:{}-{}", self.contig, self.range.start, self.range.end)
        } else {
            self.label.clone()
        }
    }
}

/// Ordered, merged, non-overlapping target set. Created once at startup and shared
/// by reference for the whole run.
#[derive(Clone, Debug, Default)]
pub struct TargetSet {
    regions: Vec<TargetRegion>,
    // (tid, subslice of `regions`) in reference index order
    contigs: Vec<(u32, Range<usize>)>,
}

impl TargetSet {
    /// Resolves contig names against the alignment header, sorts by reference index
    /// then start, and merges overlapping or adjacent intervals. A target contig
    /// absent from the header is an input mismatch and fails the run before the
    /// pipeline starts.
    pub fn new(records: Vec<BedRecord>, roster: &ContigRoster) -> Result<Self> {
        let mut resolved = Vec::with_capacity(records.len());
        for r in records.into_iter() {
            let tid = roster.tid(r.contig()).ok_or_else(|| {
                CovError::InputMismatch(format!("target contig {} is absent from the alignment header", r.contig()))
            })?;
            let (name, interval) = (r.name, r.interval);
            let (contig, range) = (interval.contig().to_owned(), interval.range());
            resolved.push(TargetRegion { tid, contig, range, label: name });
        }
        resolved.sort_by_key(|r| (r.tid, r.range.start, r.range.end));

        let mut regions: Vec<TargetRegion> = Vec::with_capacity(resolved.len());
        for r in resolved.into_iter() {
            match regions.last_mut() {
                Some(prev) if prev.tid == r.tid && r.range.start <= prev.range.end => {
                    prev.range.end = prev.range.end.max(r.range.end);
                    if prev.label.is_empty() {
                        prev.label = r.label;
                    }
                }
                _ => regions.push(r),
            }
        }
        debug_assert!(regions
            .iter()
            .tuple_windows()
            .all(|(a, b)| a.tid < b.tid || (a.tid == b.tid && a.range.end <= b.range.start)));

        let mut contigs: Vec<(u32, Range<usize>)> = Vec::new();
        for (idx, r) in regions.iter().enumerate() {
            match contigs.last_mut() {
                Some((tid, slice)) if *tid == r.tid => slice.end = idx + 1,
                _ => contigs.push((r.tid, idx..idx + 1)),
            }
        }

        Ok(TargetSet { regions, contigs })
    }

    #[inline]
    pub fn regions(&self) -> &[TargetRegion] {
        &self.regions
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Total number of targeted positions.
    pub fn size(&self) -> u64 {
        self.regions.iter().map(|r| r.range.end - r.range.start).sum()
    }

    /// Contigs with at least one target, in reference index order.
    pub fn contigs(&self) -> impl Iterator<Item = u32> + '_ {
        self.contigs.iter().map(|(tid, _)| *tid)
    }

    /// Sub-regions of one contig together with their global region indices.
    pub fn on_contig(&self, tid: u32) -> impl Iterator<Item = (usize, &TargetRegion)> {
        let slice = self
            .contigs
            .iter()
            .find(|(t, _)| *t == tid)
            .map(|(_, slice)| slice.clone())
            .unwrap_or(0..0);
        slice.clone().zip(self.regions[slice].iter())
    }
}
