use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use rust_htslib::bam::Record;

use crate::core::depth::{DepthComputer, DepthVectors};
use crate::core::error::{CovError, Result};
use crate::core::filtering::ReadsFilter;
use crate::core::gaps::{CoverageGap, GapDetector, GapTargetFilter};
use crate::core::io::hts::{Contig, ContigRoster, HtsReader};
use crate::core::io::output::GapWriter;
use crate::core::refgene::RefGeneAnnotator;
use crate::core::regions::TargetSet;
use crate::core::spans::{self, SpanExtractor, SpanSet};
use crate::core::writer::{CoverageReport, RegionWriter};

/// Producers stalled at the hard limit resume once the consumer drains the queue
/// below the soft limit. This is the run's only flow-control mechanism.
pub const SOFT_LIMIT: usize = 20_000;
pub const HARD_LIMIT: usize = 100_000;

const DRAIN_POLL: Duration = Duration::from_millis(1);

/// Bounded hand-off queue between two stages.
pub struct Mailbox<T> {
    tx: Sender<T>,
}

impl<T> Mailbox<T> {
    pub fn send(&self, message: T) -> Result<()> {
        if self.tx.len() >= HARD_LIMIT {
            // hard watermark reached: stall until the consumer drains below the soft
            // one (a dropped receiver empties the queue, so this cannot hang)
            while self.tx.len() > SOFT_LIMIT {
                thread::sleep(DRAIN_POLL);
            }
        }
        self.tx.send(message).map_err(|_| CovError::Internal("downstream stage terminated early".into()))
    }
}

pub fn mailbox<T>() -> (Mailbox<T>, Receiver<T>) {
    let (tx, rx) = bounded(HARD_LIMIT);
    (Mailbox { tx }, rx)
}

enum SpanMsg {
    Contig(Contig, SpanSet),
    Done,
}

enum DepthMsg {
    Contig(Contig, DepthVectors),
    Done,
}

enum PointMsg {
    Contig(Contig),
    Point(u64, u16),
    Done,
}

enum BlockMsg {
    Block(CoverageGap),
    Done,
}

/// Gap-side stages: detection (with the optional gap-target intersector) and the
/// downstream annotator that writes the report.
pub struct GapStages {
    pub detector: GapDetector,
    pub filter: Option<GapTargetFilter>,
    pub annotator: RefGeneAnnotator,
    pub sink: GapWriter,
}

/// Runs the staged pipeline to completion: span reader -> depth computer -> region
/// writer -> gap detector -> gap annotator, one worker per stage, connected by
/// bounded mailboxes. Each stage drains its input, flushes state and propagates the
/// terminal message downstream, so on failure output files are closed as written.
pub fn run<F>(
    mut hts: HtsReader,
    roster: &ContigRoster,
    targets: &TargetSet,
    extractor: SpanExtractor<F>,
    computer: DepthComputer,
    mut writer: RegionWriter,
    gaps: Option<GapStages>,
) -> Result<CoverageReport>
where
    F: ReadsFilter<Record> + Send,
{
    let (span_tx, span_rx) = mailbox::<SpanMsg>();
    let (depth_tx, depth_rx) = mailbox::<DepthMsg>();
    let (point_tx, point_rx) = mailbox::<PointMsg>();
    let (block_tx, block_rx) = mailbox::<BlockMsg>();

    let gaps_enabled = gaps.is_some();
    let (detection, annotation) = match gaps {
        Some(stages) => (Some((stages.detector, stages.filter)), Some((stages.annotator, stages.sink))),
        None => (None, None),
    };

    thread::scope(|scope| {
        let reader = scope.spawn(move || -> Result<()> {
            let result = (|| -> Result<()> {
                for tid in targets.contigs() {
                    let contig = roster
                        .get(tid)
                        .ok_or_else(|| CovError::Internal(format!("no contig descriptor for tid {}", tid)))?;
                    let set = spans::read_contig(&mut hts, contig, &extractor)?;
                    span_tx.send(SpanMsg::Contig(contig.clone(), set))?;
                }
                Ok(())
            })();
            // stop propagates even on failure so downstream stages drain and flush
            let _ = span_tx.send(SpanMsg::Done);
            result
        });

        let depther = scope.spawn(move || -> Result<()> {
            let result = (|| -> Result<()> {
                loop {
                    match span_rx.recv() {
                        Ok(SpanMsg::Contig(contig, set)) => {
                            let vectors = computer.count_coverage(&set);
                            depth_tx.send(DepthMsg::Contig(contig, vectors))?;
                        }
                        Ok(SpanMsg::Done) | Err(_) => break,
                    }
                }
                Ok(())
            })();
            let _ = depth_tx.send(DepthMsg::Done);
            result
        });

        let writing = scope.spawn(move || -> Result<CoverageReport> {
            let result = (|| -> Result<()> {
                loop {
                    match depth_rx.recv() {
                        Ok(DepthMsg::Contig(contig, vectors)) => {
                            if gaps_enabled {
                                point_tx.send(PointMsg::Contig(contig.clone()))?;
                            }
                            writer.process(targets, &contig, &vectors, &mut |pos, depth| {
                                if gaps_enabled {
                                    point_tx.send(PointMsg::Point(pos, depth))
                                } else {
                                    Ok(())
                                }
                            })?;
                        }
                        Ok(DepthMsg::Done) | Err(_) => break,
                    }
                }
                Ok(())
            })();
            let _ = point_tx.send(PointMsg::Done);
            result?;
            writer.finish()
        });

        let detecting = detection.map(|(mut detector, filter)| {
            scope.spawn(move || -> Result<()> {
                let result = (|| -> Result<()> {
                    let mut emit = |gap: CoverageGap| -> Result<()> {
                        match &filter {
                            Some(filter) => {
                                for piece in filter.apply(gap) {
                                    block_tx.send(BlockMsg::Block(piece))?;
                                }
                                Ok(())
                            }
                            None => block_tx.send(BlockMsg::Block(gap)),
                        }
                    };
                    let mut current: Option<Contig> = None;
                    loop {
                        match point_rx.recv() {
                            Ok(PointMsg::Contig(contig)) => current = Some(contig),
                            Ok(PointMsg::Point(pos, depth)) => {
                                let contig = current
                                    .as_ref()
                                    .ok_or_else(|| CovError::Internal("depth point before contig marker".into()))?;
                                detector.push(*contig.tid(), contig.name(), pos, depth, &mut emit)?;
                            }
                            Ok(PointMsg::Done) | Err(_) => break,
                        }
                    }
                    detector.finish(&mut emit)
                })();
                let _ = block_tx.send(BlockMsg::Done);
                result
            })
        });

        let annotating = annotation.map(|(annotator, mut sink)| {
            scope.spawn(move || -> Result<()> {
                loop {
                    match block_rx.recv() {
                        Ok(BlockMsg::Block(gap)) => {
                            let annotation = annotator.annotate(&gap);
                            sink.write(&gap, &annotation)?;
                        }
                        Ok(BlockMsg::Done) | Err(_) => break,
                    }
                }
                sink.finish()
            })
        });

        let reader_result = reader.join().expect("span reader panicked");
        let depther_result = depther.join().expect("depth computer panicked");
        let writer_result = writing.join().expect("region writer panicked");
        let detector_result = detecting.map(|handle| handle.join().expect("gap detector panicked")).unwrap_or(Ok(()));
        let annotator_result =
            annotating.map(|handle| handle.join().expect("gap annotator panicked")).unwrap_or(Ok(()));

        // a failed stage makes its neighbors fail with disconnect errors, surface the
        // root cause instead
        let mut errors: Vec<CovError> = Vec::new();
        for result in vec![reader_result, depther_result, detector_result, annotator_result] {
            if let Err(error) = result {
                errors.push(error);
            }
        }
        let report = match writer_result {
            Ok(report) => Some(report),
            Err(error) => {
                errors.push(error);
                None
            }
        };
        if let Some(root) = errors.iter().position(|e| !matches!(e, CovError::Internal(_))) {
            return Err(errors.swap_remove(root));
        }
        if let Some(error) = errors.into_iter().next() {
            return Err(error);
        }
        report.ok_or_else(|| CovError::Internal("writer stage produced no report".into()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailbox_roundtrip() {
        let (tx, rx) = mailbox::<u32>();
        tx.send(7).unwrap();
        tx.send(8).unwrap();
        assert_eq!(rx.recv().unwrap(), 7);
        assert_eq!(rx.recv().unwrap(), 8);
    }

    #[test]
    fn mailbox_disconnect_is_internal() {
        let (tx, rx) = mailbox::<u32>();
        drop(rx);
        assert!(matches!(tx.send(1), Err(CovError::Internal(_))));
    }
}
