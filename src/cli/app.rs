use std::ffi::OsStr;
use std::path::Path;

use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressFinish, ProgressStyle};

use crate::cli::{args, parse};
use crate::core::depth::DepthComputer;
use crate::core::error::{CovError, Result};
use crate::core::io::output;
use crate::core::pipeline;
use crate::core::spans::SpanExtractor;
use crate::core::writer::RegionWriter;

/// Flag combinations that cannot be expressed declaratively; checked before any
/// input is opened.
fn validate_usage(matches: &ArgMatches) -> Result<()> {
    let input = Path::new(matches.value_of(args::core::INPUT).unwrap());
    let cram = input.extension().and_then(OsStr::to_str).map(|x| x == "cram").unwrap_or(false);
    if cram && !matches.is_present(args::core::REFERENCE) {
        return Err(CovError::Usage("CRAM input requires --reference".into()));
    }
    if matches.is_present(args::gaps::OUTPUT) && !matches.is_present(args::gaps::REFGENE) {
        return Err(CovError::Usage("--gaps requires --refgene for gap annotation".into()));
    }
    if matches.is_present(args::gaps::TARGET) && !matches.is_present(args::gaps::OUTPUT) {
        return Err(CovError::Usage("--gaptarget is meaningless without --gaps".into()));
    }
    if matches.is_present(args::kmer::OUTPUT) && !matches.is_present(args::kmer::PROFILE) {
        return Err(CovError::Usage("--okmer requires a --kmer profile".into()));
    }
    Ok(())
}

pub fn run(matches: &ArgMatches) -> Result<()> {
    validate_usage(matches)?;

    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {spinner} {msg}")
        .on_finish(ProgressFinish::AndLeave);
    let pbar = || ProgressBar::new_spinner().with_style(style.clone());

    let input = parse::input(pbar(), matches);
    let reference = parse::reference(pbar(), matches);
    let hts = parse::hts(pbar(), &input, reference.as_deref())?;
    let sample = hts.sample_name();
    let roster = hts.roster();

    let targets = parse::targets(pbar(), matches, &roster)?;
    let readfilter = parse::readfilter(pbar(), matches);
    let mode = parse::overlap_mode(pbar(), matches);
    let profile = parse::kmer(pbar(), matches, &sample)?;

    let factors = profile.as_ref().map(|p| p.factors().to_vec());
    let extractor = SpanExtractor::new(readfilter, mode, profile);
    let computer = DepthComputer::new(factors);

    let perregion = if matches.is_present(args::outputs::INTERVAL_SUMMARY) { Some(targets.regions().len()) } else { None };
    let writer = RegionWriter::new(
        parse::basewise(pbar(), matches)?,
        parse::kmerwise(pbar(), matches)?,
        parse::downsampler(pbar(), matches)?,
        perregion,
    );
    let gapstages = parse::gapstages(pbar(), matches)?;

    let running = pbar();
    running.set_message("Streaming target contigs...");
    let report = pipeline::run(hts, &roster, &targets, extractor, computer, writer, gapstages)?;
    running.finish_with_message(format!(
        "Finished: {} positions over {} target regions",
        report.global.total(),
        targets.regions().len()
    ));

    if let Some(path) = matches.value_of(args::outputs::SAMPLE_SUMMARY) {
        output::sample_summary(path.as_ref(), &report.global)?;
    }
    if let Some(path) = matches.value_of(args::outputs::COVERAGE_JS) {
        output::coverage_js(path.as_ref(), &sample, &report.global)?;
    }
    if let Some(path) = matches.value_of(args::outputs::INTERVAL_SUMMARY) {
        let histograms = report.perregion.as_ref().expect("per-region statistics were not collected");
        let regions = targets
            .regions()
            .iter()
            .zip(histograms.iter())
            .map(|(region, histogram)| (region.display_label(), histogram.clone()))
            .collect::<Vec<_>>();
        output::interval_summary(path.as_ref(), &sample, &regions)?;
    }

    Ok(())
}
