use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ArgMatches;
use indicatif::ProgressBar;

use crate::core::error::Result;
use crate::core::filtering::ByQuality;
use crate::core::gaps::{GapDetector, GapTargetFilter};
use crate::core::io::bed;
use crate::core::io::hts::{ContigRoster, HtsReader};
use crate::core::io::output::{DownsampleSink, GapWriter, PerBaseSink};
use crate::core::kmer::KmerProfile;
use crate::core::pipeline::GapStages;
use crate::core::refgene::RefGeneAnnotator;
use crate::core::regions::TargetSet;
use crate::core::spans::OverlapMode;
use crate::core::writer::Downsampler;

use super::args;

pub fn input(pbar: ProgressBar, matches: &ArgMatches) -> PathBuf {
    pbar.set_message("Parsing path to the input alignment...");
    let result: PathBuf = matches.value_of(args::core::INPUT).unwrap().into();
    pbar.finish_with_message(format!("Input alignment: {}", result.display()));
    result
}

pub fn reference(pbar: ProgressBar, matches: &ArgMatches) -> Option<PathBuf> {
    pbar.set_message("Parsing path to the reference assembly...");
    let result: Option<PathBuf> = matches.value_of(args::core::REFERENCE).map(|x| x.into());
    match &result {
        Some(path) => pbar.finish_with_message(format!("Reference assembly: {}", path.display())),
        None => pbar.finish_with_message("Reference assembly is not provided"),
    }
    result
}

pub fn hts(pbar: ProgressBar, input: &Path, reference: Option<&Path>) -> Result<HtsReader> {
    pbar.set_message("Opening the alignment index...");
    let result = HtsReader::open(input, reference)?;
    pbar.finish_with_message(format!("Sample {}: alignment index is ready", result.sample_name()));
    Ok(result)
}

pub fn readfilter(pbar: ProgressBar, matches: &ArgMatches) -> ByQuality {
    pbar.set_message("Parsing read filtering options...");
    let minmq = matches.value_of(args::core::MIN_MAPQ).unwrap().parse().unwrap();
    let allowdups = matches.is_present(args::core::ALLOW_DUPLICATES);
    let result = ByQuality::new(minmq, allowdups);
    let msg = format!("Reads filter: mapq >= {}, unmapped/secondary/supplementary skipped. ", minmq);
    if allowdups {
        pbar.finish_with_message(msg + "Duplicates are counted.");
    } else {
        pbar.finish_with_message(msg + "Duplicates are skipped.");
    }
    result
}

pub fn overlap_mode(pbar: ProgressBar, matches: &ArgMatches) -> OverlapMode {
    pbar.set_message("Parsing the mate overlap mode...");
    let result = OverlapMode::from_str(matches.value_of(args::core::OVERLAP_MODE).unwrap()).unwrap();
    match result {
        OverlapMode::None => pbar.finish_with_message("Mate overlaps are clipped from the first-of-pair read"),
        OverlapMode::Half => pbar.finish_with_message("Mate overlaps use the legacy half clipping"),
    }
    result
}

pub fn targets(pbar: ProgressBar, matches: &ArgMatches, roster: &ContigRoster) -> Result<TargetSet> {
    pbar.set_message("Parsing target regions...");
    let records = bed::parse(matches.value_of(args::core::TARGETS).unwrap())?;
    let declared = records.len();
    let result = TargetSet::new(records, roster)?;
    pbar.finish_with_message(format!(
        "Target regions: {} declared, {} after merging, {} bp in total",
        declared,
        result.regions().len(),
        result.size()
    ));
    Ok(result)
}

pub fn kmer(pbar: ProgressBar, matches: &ArgMatches, sample: &str) -> Result<Option<KmerProfile>> {
    pbar.set_message("Parsing the kmer profile...");
    match matches.value_of(args::kmer::PROFILE) {
        Some(path) => {
            let profile = KmerProfile::load(path.as_ref(), sample)?;
            pbar.finish_with_message(format!(
                "Kmer profile: {} weights selected for sample {}",
                profile.factors().len() - 1,
                sample
            ));
            Ok(Some(profile))
        }
        None => {
            pbar.finish_with_message("Kmer weighting is disabled");
            Ok(None)
        }
    }
}

pub fn basewise(pbar: ProgressBar, matches: &ArgMatches) -> Result<Option<PerBaseSink>> {
    pbar.set_message("Opening the per-base output...");
    match matches.value_of(args::outputs::PER_BASE) {
        Some(path) => {
            let sink = PerBaseSink::new(path.as_ref())?;
            pbar.finish_with_message(format!("Per-base depth will be saved to {}", path));
            Ok(Some(sink))
        }
        None => {
            pbar.finish_with_message("Per-base output is disabled");
            Ok(None)
        }
    }
}

pub fn kmerwise(pbar: ProgressBar, matches: &ArgMatches) -> Result<Option<PerBaseSink>> {
    pbar.set_message("Opening the kmer-weighted output...");
    match matches.value_of(args::kmer::OUTPUT) {
        Some(path) => {
            let sink = PerBaseSink::new(path.as_ref())?;
            pbar.finish_with_message(format!("Kmer-weighted depth will be saved to {}", path));
            Ok(Some(sink))
        }
        None => {
            pbar.finish_with_message("Kmer-weighted output is disabled");
            Ok(None)
        }
    }
}

pub fn downsampler(pbar: ProgressBar, matches: &ArgMatches) -> Result<Option<Downsampler>> {
    pbar.set_message("Parsing downsampling options...");
    match matches.value_of(args::outputs::DOWNSAMPLE_OUTPUT) {
        Some(path) => {
            let factor: u64 = matches.value_of(args::outputs::DOWNSAMPLE_FACTOR).unwrap().parse().unwrap();
            let sink = DownsampleSink::new(path.as_ref())?;
            pbar.finish_with_message(format!("Downsampled depth (windows of {} bp) will be saved to {}", factor, path));
            Ok(Some(Downsampler::new(factor, sink)))
        }
        None => {
            pbar.finish_with_message("Downsampling is disabled");
            Ok(None)
        }
    }
}

pub fn gapstages(pbar: ProgressBar, matches: &ArgMatches) -> Result<Option<GapStages>> {
    pbar.set_message("Parsing gap detection options...");
    let path = match matches.value_of(args::gaps::OUTPUT) {
        Some(path) => path,
        None => {
            pbar.finish_with_message("Gap detection is disabled");
            return Ok(None);
        }
    };

    let threshold: u16 = matches.value_of(args::gaps::THRESHOLD).unwrap().parse().unwrap();
    let annotator = RefGeneAnnotator::from_refgene(matches.value_of(args::gaps::REFGENE).unwrap().as_ref())?;
    let filter = match matches.value_of(args::gaps::TARGET) {
        Some(target) => Some(GapTargetFilter::new(&bed::parse(target)?)),
        None => None,
    };
    let sink = GapWriter::new(path.as_ref())?;

    let msg = match matches.value_of(args::gaps::TARGET) {
        Some(target) => format!("Gaps (depth < {}) restricted to {} will be saved to {}", threshold, target, path),
        None => format!("Gaps (depth < {}) will be saved to {}", threshold, path),
    };
    pbar.finish_with_message(msg);

    Ok(Some(GapStages { detector: GapDetector::new(threshold), filter, annotator, sink }))
}
