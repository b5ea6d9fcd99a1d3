use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use itertools::Itertools;
use rust_htslib::bgzf;
use serde_json::json;

use crate::core::error::Result;
use crate::core::gaps::CoverageGap;
use crate::core::refgene::GapAnnotation;
use crate::core::stats::DepthHistogram;

// bgzf handles are not Send-tagged upstream, but every sink is owned by exactly one stage
struct BgzfSink(bgzf::Writer);
unsafe impl Send for BgzfSink {}

impl Write for BgzfSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

/// Opens a writable stream with compression inferred from the file suffix
/// (`.gz` -> gzip, `.bgz` -> bgzf, anything else -> plain).
pub fn create(path: &Path) -> Result<Box<dyn Write + Send>> {
    let suffix = path.extension().and_then(OsStr::to_str).unwrap_or("");
    let sink: Box<dyn Write + Send> = match suffix {
        "gz" => Box::new(GzEncoder::new(BufWriter::new(File::create(path)?), Compression::default())),
        "bgz" => Box::new(BgzfSink(bgzf::Writer::from_path(path)?)),
        _ => Box::new(BufWriter::new(File::create(path)?)),
    };
    Ok(sink)
}

/// Per-base sink: one `chr\tpos\tdepth` line per targeted position, ascending.
pub struct PerBaseSink {
    out: Box<dyn Write + Send>,
}

impl PerBaseSink {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(PerBaseSink { out: create(path)? })
    }

    #[inline]
    pub fn write(&mut self, contig: &str, pos: u64, depth: u16) -> Result<()> {
        writeln!(self.out, "{}\t{}\t{}", contig, pos, depth)?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Downsampled sink: `chr\tpos\tmean`, mean in default float format.
pub struct DownsampleSink {
    out: Box<dyn Write + Send>,
}

impl DownsampleSink {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(DownsampleSink { out: create(path)? })
    }

    #[inline]
    pub fn write(&mut self, contig: &str, pos: u64, mean: f64) -> Result<()> {
        writeln!(self.out, "{}\t{}\t{}", contig, pos, mean)?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Gap report: the default gap columns followed by the annotator columns.
pub struct GapWriter {
    out: csv::Writer<Box<dyn Write + Send>>,
}

impl GapWriter {
    pub fn new(path: &Path) -> Result<Self> {
        let mut out = csv::Writer::from_writer(create(path)?);
        out.write_record(&["chrom", "start", "end", "size", "mean", "median", "gene", "feature"])?;
        Ok(GapWriter { out })
    }

    pub fn write(&mut self, gap: &CoverageGap, annotation: &GapAnnotation) -> Result<()> {
        self.out.write_record(&[
            gap.contig().clone(),
            gap.start().to_string(),
            gap.end().to_string(),
            gap.size().to_string(),
            format!("{:.2}", gap.mean()),
            gap.median().to_string(),
            annotation.gene.clone(),
            annotation.feature.clone(),
        ])?;
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

fn finite(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// Sample-wide summary table: a header row and a single data row.
pub fn sample_summary(path: &Path, histogram: &DepthHistogram) -> Result<()> {
    let mut out = create(path)?;
    writeln!(
        out,
        "Median Coverage\tMean Coverage\tperc_bases_above_1\tperc_bases_above_5\t\
         perc_bases_above_10\tperc_bases_above_20\tperc_bases_above_50"
    )?;
    let percs =
        [1u16, 5, 10, 20, 50].iter().map(|&k| format!("{:.2}", histogram.fraction_above(k) * 100.0)).join("\t");
    writeln!(out, "{}\t{:.2}\t{}", histogram.median(), finite(histogram.mean()), percs)?;
    out.flush()?;
    Ok(())
}

/// Coverage JS blob: a `covs = // NOJSON` prefix followed by pretty-printed JSON.
pub fn coverage_js(path: &Path, sample: &str, histogram: &DepthHistogram) -> Result<()> {
    let mut out = create(path)?;
    let blob = json!({
        "means": { sample: finite(histogram.mean()) },
        "medians": { sample: histogram.median() },
    });
    write!(out, "covs = // NOJSON\n{}", serde_json::to_string_pretty(&blob)?)?;
    out.flush()?;
    Ok(())
}

/// Two-row interval summary: region labels, then per-region mean coverage with NaN
/// coerced to 0 for regions that never emitted a base.
pub fn interval_summary(path: &Path, sample: &str, regions: &[(String, DepthHistogram)]) -> Result<()> {
    let mut out = create(path)?;
    writeln!(out, "sample\t{}", regions.iter().map(|(label, _)| label.as_str()).join("\t"))?;
    writeln!(
        out,
        "{}\t{}",
        sample,
        regions.iter().map(|(_, histogram)| format!("{:.2}", finite(histogram.mean()))).join("\t")
    )?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn histogram(depths: &[u16]) -> DepthHistogram {
        let mut h = DepthHistogram::new();
        for &d in depths {
            h.record(d);
        }
        h
    }

    #[test]
    fn per_base_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.tsv");
        let mut sink = PerBaseSink::new(&path).unwrap();
        sink.write("chr1", 10, 5).unwrap();
        sink.write("chr1", 11, 0).unwrap();
        sink.finish().unwrap();
        drop(sink);
        assert_eq!(fs::read_to_string(&path).unwrap(), "chr1\t10\t5\nchr1\t11\t0\n");
    }

    #[test]
    fn summary_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.tsv");
        sample_summary(&path, &histogram(&[0, 10, 10, 30])).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Median Coverage\tMean Coverage"));
        assert_eq!(lines.next().unwrap(), "10\t12.50\t75.00\t75.00\t75.00\t25.00\t0.00");
    }

    #[test]
    fn coverage_js_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("covs.js");
        coverage_js(&path, "s1", &histogram(&[4, 4])).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("covs = // NOJSON\n{"));
        assert!(text.contains("\"means\""));
        assert!(text.contains("\"s1\": 4"));
    }

    #[test]
    fn interval_summary_nan_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intervals.tsv");
        let regions = vec![("r1".to_owned(), histogram(&[2, 4])), ("r2".to_owned(), DepthHistogram::new())];
        interval_summary(&path, "s1", &regions).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "sample\tr1\tr2\ns1\t3.00\t0.00\n");
    }

    #[test]
    fn gzip_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("base.tsv.gz");
        let mut sink = PerBaseSink::new(&path).unwrap();
        sink.write("chr1", 1, 1).unwrap();
        sink.finish().unwrap();
        drop(sink);
        let raw = fs::read(&path).unwrap();
        // gzip magic
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    }
}
