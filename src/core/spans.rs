use std::str::FromStr;

use derive_getters::{Dissolve, Getters};
use itertools::Itertools;
use rust_htslib::bam::Record;

use crate::core::error::{CovError, Result};
use crate::core::filtering::ReadsFilter;
use crate::core::io::hts::{Contig, HtsReader};
use crate::core::kmer::KmerProfile;
use crate::core::read::AlignedRead;

/// Pre-allocation for contigs whose index carries no aligned-record count. Pages are
/// reserved but untouched until used, so the fallback only costs address space.
const SPAN_FALLBACK_CAPACITY: usize = 200_000_000;

/// Half-open reference interval covered by one retained, clipped primary alignment.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReadSpan {
    pub start: u64,
    pub end: u64,
    /// Index into the kmer-factor table; meaningful only when a profile is loaded.
    pub kmer: u32,
}

/// Policy for bases covered by both mates of a pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OverlapMode {
    /// Clip the first-of-pair read at the mate start; an exact start tie rejects the
    /// first-of-pair record whole and keeps its mate intact.
    None,
    /// Legacy partial clip: only the first-of-pair side is clipped, one base short,
    /// and R2-first pairs are not clipped at all. Preserved for compatibility.
    Half,
}

impl FromStr for OverlapMode {
    type Err = CovError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(OverlapMode::None),
            "half" => Ok(OverlapMode::Half),
            _ => Err(CovError::Config(format!("overlap mode must be one of {{none, half}}, got {:?}", value))),
        }
    }
}

/// One contig's retained spans, non-decreasing by start. Lives for exactly one
/// contig's processing and is handed to the depth stage as a single message.
#[derive(Clone, Debug, Default, Getters, Dissolve)]
pub struct SpanSet {
    spans: Vec<ReadSpan>,
}

impl SpanSet {
    pub fn new(spans: Vec<ReadSpan>) -> Self {
        debug_assert!(spans.iter().tuple_windows().all(|(a, b)| a.start <= b.start));
        SpanSet { spans }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spans.len()
    }
}

/// Turns filtered alignment records into spans, applying the configured
/// mate-overlap clipping.
pub struct SpanExtractor<F> {
    filter: F,
    mode: OverlapMode,
    profile: Option<KmerProfile>,
}

impl<F> SpanExtractor<F> {
    pub fn new(filter: F, mode: OverlapMode, profile: Option<KmerProfile>) -> Self {
        SpanExtractor { filter, mode, profile }
    }

    #[inline]
    pub fn profile(&self) -> Option<&KmerProfile> {
        self.profile.as_ref()
    }

    /// The span contributed by `record` on the contig `tid`, or None when the record
    /// is filtered out or clipped away entirely.
    pub fn span_of<R: AlignedRead>(&self, record: &R, tid: u32) -> Option<ReadSpan>
    where
        F: ReadsFilter<R>,
    {
        if !self.filter.is_read_ok(record) {
            return None;
        }

        let start = record.start();
        let mut end = record.end();

        // Overlap handling applies only to pairs with a mapped mate on this contig.
        if record.is_paired() && !record.is_mate_unmapped() && record.mate_contig_id() == tid as i32 {
            let mate = record.mate_start();
            match self.mode {
                OverlapMode::None => {
                    if record.is_first_of_pair() && mate == start {
                        return None;
                    }
                    if start < mate && mate <= end {
                        end = mate;
                    }
                }
                OverlapMode::Half => {
                    if record.is_first_of_pair() && start <= mate && mate <= end {
                        end = mate - 1;
                    }
                }
            }
        }

        if end <= start {
            return None;
        }
        let kmer = self.profile.as_ref().map(|p| p.index_of(record)).unwrap_or(0);
        Some(ReadSpan { start: start as u64, end: end as u64, kmer })
    }
}

/// Drains one contig from the provider into a span array sized from the
/// index-derived aligned-record estimate.
pub fn read_contig<F>(hts: &mut HtsReader, contig: &Contig, extractor: &SpanExtractor<F>) -> Result<SpanSet>
where
    F: ReadsFilter<Record>,
{
    let capacity = match hts.aligned_estimate(*contig.tid()) {
        Some(aligned) => aligned as usize,
        None => SPAN_FALLBACK_CAPACITY,
    };
    let mut spans = Vec::with_capacity(capacity);

    hts.fetch_contig(contig.name())?;
    let mut record = Record::new();
    while let Some(r) = hts.read(&mut record) {
        r?;
        if let Some(span) = extractor.span_of(&record, *contig.tid()) {
            debug_assert!(spans.last().map(|prev: &ReadSpan| prev.start <= span.start).unwrap_or(true));
            spans.push(span);
        }
    }

    spans.shrink_to_fit();
    Ok(SpanSet::new(spans))
}

#[cfg(test)]
mod tests {
    use crate::core::filtering::ByQuality;
    use crate::core::read::MockRead;

    use super::*;

    fn paired_on(mate_tid: i32, start: i64, end: i64, mate: i64, first: bool) -> MockRead {
        let mut mock = MockRead::new();
        mock.expect_is_unmapped().return_const(false);
        mock.expect_is_secondary_or_supplementary().return_const(false);
        mock.expect_mapq().return_const(60u8);
        mock.expect_is_duplicate().return_const(false);
        mock.expect_is_paired().return_const(true);
        mock.expect_is_mate_unmapped().return_const(false);
        mock.expect_mate_contig_id().return_const(mate_tid);
        mock.expect_start().return_const(start);
        mock.expect_end().return_const(end);
        mock.expect_mate_start().return_const(mate);
        mock.expect_is_first_of_pair().return_const(first);
        mock
    }

    fn paired(start: i64, end: i64, mate: i64, first: bool) -> MockRead {
        paired_on(0, start, end, mate, first)
    }

    fn extractor(mode: OverlapMode) -> SpanExtractor<ByQuality> {
        SpanExtractor::new(ByQuality::new(1, false), mode, None)
    }

    fn span(start: u64, end: u64) -> ReadSpan {
        ReadSpan { start, end, kmer: 0 }
    }

    #[test]
    fn none_mode_clips_first_at_mate_start() {
        let x = extractor(OverlapMode::None);
        assert_eq!(x.span_of(&paired(100, 180, 150, true), 0), Some(span(100, 150)));
        // the mate itself is kept whole
        assert_eq!(x.span_of(&paired(150, 200, 100, false), 0), Some(span(150, 200)));
    }

    #[test]
    fn none_mode_rejects_first_on_start_tie() {
        let x = extractor(OverlapMode::None);
        assert_eq!(x.span_of(&paired(100, 150, 100, true), 0), None);
        assert_eq!(x.span_of(&paired(100, 150, 100, false), 0), Some(span(100, 150)));
    }

    #[test]
    fn none_mode_ignores_disjoint_and_cross_contig_mates() {
        let x = extractor(OverlapMode::None);
        assert_eq!(x.span_of(&paired(100, 150, 200, true), 0), Some(span(100, 150)));
        // mate on another contig is never clipped against
        assert_eq!(x.span_of(&paired_on(5, 100, 180, 150, true), 0), Some(span(100, 180)));
    }

    #[test]
    fn none_mode_unpaired_untouched() {
        let x = extractor(OverlapMode::None);
        let mut r = MockRead::new();
        r.expect_is_unmapped().return_const(false);
        r.expect_is_secondary_or_supplementary().return_const(false);
        r.expect_mapq().return_const(60u8);
        r.expect_is_duplicate().return_const(false);
        r.expect_is_paired().return_const(false);
        r.expect_start().return_const(10i64);
        r.expect_end().return_const(20i64);
        assert_eq!(x.span_of(&r, 0), Some(span(10, 20)));
    }

    #[test]
    fn half_mode_clips_one_short() {
        let x = extractor(OverlapMode::Half);
        assert_eq!(x.span_of(&paired(100, 180, 150, true), 0), Some(span(100, 149)));
        // second-of-pair is never clipped in half mode
        assert_eq!(x.span_of(&paired(100, 180, 150, false), 0), Some(span(100, 180)));
    }

    #[test]
    fn half_mode_drops_degenerate_clip() {
        let x = extractor(OverlapMode::Half);
        assert_eq!(x.span_of(&paired(100, 150, 100, true), 0), None);
        assert_eq!(x.span_of(&paired(100, 150, 101, true), 0), Some(span(100, 101)));
    }

    #[test]
    fn filtered_reads_contribute_nothing() {
        let x = extractor(OverlapMode::None);
        let mut r = MockRead::new();
        r.expect_is_unmapped().return_const(true);
        assert_eq!(x.span_of(&r, 0), None);
    }
}
