use derive_getters::Dissolve;

use crate::core::depth::DepthVectors;
use crate::core::error::Result;
use crate::core::io::hts::Contig;
use crate::core::io::output::{DownsampleSink, PerBaseSink};
use crate::core::regions::TargetSet;
use crate::core::stats::DepthHistogram;

/// Statistics owned by the writer for the whole run.
#[derive(Dissolve)]
pub struct CoverageReport {
    pub global: DepthHistogram,
    pub perregion: Option<Vec<DepthHistogram>>,
}

/// Windowed mean emitter. Positions are grouped into absolute windows of `factor`;
/// non-emitting positions feed the accumulator and the window's mean is written at
/// offset `factor / 2`. The accumulator is reset at every window boundary and after
/// every emission; a partial window at either region boundary flushes whatever it
/// accumulated at its last fed position, so no sample is silently dropped.
pub struct Downsampler {
    factor: u64,
    sink: DownsampleSink,
    window: Option<u64>,
    sum: f64,
    count: u64,
    lastpos: u64,
    emitted: bool,
}

impl Downsampler {
    pub fn new(factor: u64, sink: DownsampleSink) -> Self {
        assert!(factor > 0, "downsampling factor must be positive");
        Downsampler { factor, sink, window: None, sum: 0.0, count: 0, lastpos: 0, emitted: false }
    }

    fn feed(&mut self, contig: &str, pos: u64, depth: u16) -> Result<()> {
        let window = pos / self.factor;
        if self.window != Some(window) {
            // a region that begins past its first window's offset never reaches an
            // emission point inside that window, flush it like a trailing one
            self.flush(contig)?;
            self.window = Some(window);
        }
        if pos % self.factor == self.factor / 2 {
            let mean = if self.count == 0 { depth as f64 } else { self.sum / self.count as f64 };
            self.sink.write(contig, pos, mean)?;
            self.sum = 0.0;
            self.count = 0;
            self.emitted = true;
        } else {
            self.sum += depth as f64;
            self.count += 1;
            self.lastpos = pos;
        }
        Ok(())
    }

    fn flush(&mut self, contig: &str) -> Result<()> {
        if !self.emitted && self.count > 0 {
            let mean = self.sum / self.count as f64;
            self.sink.write(contig, self.lastpos, mean)?;
        }
        self.sum = 0.0;
        self.count = 0;
        self.emitted = false;
        Ok(())
    }

    fn flush_region(&mut self, contig: &str) -> Result<()> {
        self.flush(contig)?;
        self.window = None;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.sink.finish()
    }
}

/// Walks one contig's target sub-regions against its depth vector: per-base
/// emission, statistics, downsampling and the gap feed, positions strictly
/// ascending within the contig.
pub struct RegionWriter {
    basewise: Option<PerBaseSink>,
    kmerwise: Option<PerBaseSink>,
    downsampler: Option<Downsampler>,
    global: DepthHistogram,
    perregion: Option<Vec<DepthHistogram>>,
}

impl RegionWriter {
    pub fn new(
        basewise: Option<PerBaseSink>,
        kmerwise: Option<PerBaseSink>,
        downsampler: Option<Downsampler>,
        perregion: Option<usize>,
    ) -> Self {
        RegionWriter {
            basewise,
            kmerwise,
            downsampler,
            global: DepthHistogram::new(),
            perregion: perregion.map(|n| vec![DepthHistogram::new(); n]),
        }
    }

    pub fn process<G>(&mut self, targets: &TargetSet, contig: &Contig, depth: &DepthVectors, gap: &mut G) -> Result<()>
    where
        G: FnMut(u64, u16) -> Result<()>,
    {
        let name = contig.name();
        for (idx, region) in targets.on_contig(*contig.tid()) {
            for pos in region.range().clone() {
                let d = depth.raw.get(pos as usize).copied().unwrap_or(0);
                if let Some(sink) = &mut self.basewise {
                    sink.write(name, pos, d)?;
                }
                if let Some(sink) = &mut self.kmerwise {
                    let w = depth.weighted.as_ref().and_then(|v| v.get(pos as usize)).copied().unwrap_or(0);
                    sink.write(name, pos, w)?;
                }
                self.global.record(d);
                if let Some(perregion) = &mut self.perregion {
                    perregion[idx].record(d);
                }
                if let Some(downsampler) = &mut self.downsampler {
                    downsampler.feed(name, pos, d)?;
                }
                gap(pos, d)?;
            }
            if let Some(downsampler) = &mut self.downsampler {
                downsampler.flush_region(name)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<CoverageReport> {
        if let Some(sink) = &mut self.basewise {
            sink.finish()?;
        }
        if let Some(sink) = &mut self.kmerwise {
            sink.finish()?;
        }
        if let Some(downsampler) = &mut self.downsampler {
            downsampler.finish()?;
        }
        Ok(CoverageReport { global: self.global, perregion: self.perregion })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use bio_types::genome::Interval;

    use crate::core::io::bed::BedRecord;
    use crate::core::io::hts::{Contig, ContigRoster};

    use super::*;

    fn roster() -> ContigRoster {
        ContigRoster::new(vec![Contig::new("chr1".into(), 0, 1000)])
    }

    fn targets(ranges: &[(u64, u64)]) -> TargetSet {
        let records = ranges
            .iter()
            .map(|&(start, end)| BedRecord { name: "".into(), interval: Interval::new("chr1".into(), start..end) })
            .collect();
        TargetSet::new(records, &roster()).unwrap()
    }

    fn depth(values: &[u16]) -> DepthVectors {
        DepthVectors { raw: values.to_vec(), weighted: None }
    }

    fn nogap(_: u64, _: u16) -> Result<()> {
        Ok(())
    }

    #[test]
    fn per_base_emission_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.tsv");
        let mut writer = RegionWriter::new(Some(PerBaseSink::new(&path).unwrap()), None, None, Some(2));

        let targets = targets(&[(2, 5), (8, 10)]);
        let contig = Contig::new("chr1".into(), 0, 1000);
        writer.process(&targets, &contig, &depth(&[9, 9, 1, 2, 3]), &mut nogap).unwrap();
        let report = writer.finish().unwrap();

        // positions past the depth vector are implicitly zero
        assert_eq!(fs::read_to_string(&path).unwrap(), "chr1\t2\t1\nchr1\t3\t2\nchr1\t4\t3\nchr1\t8\t0\nchr1\t9\t0\n");
        assert_eq!(report.global.total(), 5);
        let perregion = report.perregion.unwrap();
        assert_eq!(perregion[0].total(), 3);
        assert!((perregion[0].mean() - 2.0).abs() < 1e-9);
        assert_eq!(perregion[1].total(), 2);
        assert!((perregion[1].mean() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn gap_feed_sees_every_position() {
        let mut writer = RegionWriter::new(None, None, None, None);
        let targets = targets(&[(0, 3)]);
        let contig = Contig::new("chr1".into(), 0, 1000);
        let mut fed = Vec::new();
        writer
            .process(&targets, &contig, &depth(&[7, 8, 9]), &mut |pos, d| {
                fed.push((pos, d));
                Ok(())
            })
            .unwrap();
        assert_eq!(fed, vec![(0, 7), (1, 8), (2, 9)]);
    }

    fn downsampled(factor: u64, ranges: &[(u64, u64)], values: &[u16]) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ds.tsv");
        let downsampler = Downsampler::new(factor, DownsampleSink::new(&path).unwrap());
        let mut writer = RegionWriter::new(None, None, Some(downsampler), None);
        writer.process(&targets(ranges), &Contig::new("chr1".into(), 0, 1000), &depth(values), &mut nogap).unwrap();
        writer.finish().unwrap();
        fs::read_to_string(&path).unwrap()
    }

    #[test]
    fn downsampling_emits_at_window_offset() {
        // depths 1..=10 at positions 0..10, factor 5: emission at offset 2 covers the
        // accumulated {1, 2}, emission at 7 covers {6, 7}, the tail never flushes
        let values: Vec<u16> = (1..=10).collect();
        assert_eq!(downsampled(5, &[(0, 10)], &values), "chr1\t2\t1.5\nchr1\t7\t6.5\n");
    }

    #[test]
    fn downsampling_flushes_partial_window() {
        assert_eq!(downsampled(5, &[(0, 2)], &[4, 8]), "chr1\t1\t6\n");
    }

    #[test]
    fn downsampling_flushes_leading_partial_window() {
        // the region starts past window 4's emission offset (pos 22): its leading
        // samples flush at the window boundary instead of being dropped
        let mut values = vec![0u16; 30];
        values[23..30].copy_from_slice(&[10, 20, 30, 40, 50, 60, 70]);
        assert_eq!(downsampled(5, &[(23, 30)], &values), "chr1\t24\t15\nchr1\t27\t35\n");
    }

    #[test]
    fn downsampling_factor_one_is_identity() {
        assert_eq!(downsampled(1, &[(0, 3)], &[5, 6, 7]), "chr1\t0\t5\nchr1\t1\t6\nchr1\t2\t7\n");
    }
}
