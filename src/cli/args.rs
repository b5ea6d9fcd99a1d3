use clap::{Arg, ArgSettings};

use super::validate;

pub fn reqdefaults() -> Vec<ArgSettings> {
    vec![ArgSettings::Required, ArgSettings::TakesValue]
}

pub fn defaults() -> Vec<ArgSettings> {
    vec![ArgSettings::TakesValue]
}

pub mod core {
    use super::*;

    pub const INPUT: &str = "input";
    pub const TARGETS: &str = "targets";
    pub const REFERENCE: &str = "reference";
    pub const MIN_MAPQ: &str = "minMQ";
    pub const OVERLAP_MODE: &str = "om";
    pub const ALLOW_DUPLICATES: &str = "allowdups";

    pub const SECTION_NAME: &str = "Core";

    pub fn args<'a>() -> Vec<Arg<'a>> {
        let args = vec![
            Arg::new(INPUT)
                .settings(&reqdefaults())
                .validator(validate::path)
                .long_about("Path to the coordinate-sorted and indexed alignment file (BAM or CRAM). CRAM input additionally requires --reference."),
            Arg::new(TARGETS)
                .short('L')
                .long(TARGETS)
                .settings(&reqdefaults())
                .validator(validate::path)
                .long_about("Path to a BED-like file (chr, start, end, 0-based half-open) with the target regions. Overlapping and adjacent intervals are merged; extra columns are kept as an opaque region label."),
            Arg::new(REFERENCE)
                .long(REFERENCE)
                .settings(&defaults())
                .validator(validate::path)
                .long_about("Reference genome fasta. Required to decode CRAM input."),
            Arg::new(MIN_MAPQ)
                .long(MIN_MAPQ)
                .settings(&defaults())
                .validator(validate::numeric(0u8, 255u8))
                .default_value("1")
                .long_about("Count only reads with mapping quality >= threshold."),
            Arg::new(OVERLAP_MODE)
                .long(OVERLAP_MODE)
                .settings(&defaults())
                .validator(validate::overlap_mode)
                .possible_values(&["none", "half"])
                .default_value("none")
                .long_about("Mate overlap handling. \"none\" clips the first-of-pair read at its mate start so overlapping pair bases are counted once; \"half\" is the legacy partial clip kept for backward compatibility."),
            Arg::new(ALLOW_DUPLICATES)
                .short('a')
                .long(ALLOW_DUPLICATES)
                .settings(&defaults())
                .takes_value(false)
                .long_about("Count reads flagged as PCR/optical duplicates. By default duplicates are skipped."),
        ];
        args.into_iter().map(|x| x.help_heading(Some(SECTION_NAME))).collect()
    }
}

pub mod outputs {
    use super::*;

    pub const PER_BASE: &str = "output";
    pub const SAMPLE_SUMMARY: &str = "samplesummary";
    pub const COVERAGE_JS: &str = "covo";
    pub const INTERVAL_SUMMARY: &str = "intervalsummary";
    pub const DOWNSAMPLE_OUTPUT: &str = "do";
    pub const DOWNSAMPLE_FACTOR: &str = "df";

    pub const SECTION_NAME: &str = "Outputs";

    pub fn args<'a>() -> Vec<Arg<'a>> {
        let args = vec![
            Arg::new(PER_BASE)
                .short('o')
                .long(PER_BASE)
                .settings(&defaults())
                .validator(validate::writable)
                .long_about("Per-base depth output (chr, pos, depth), one line per targeted position in ascending order. Compression is inferred from the suffix (.gz, .bgz)."),
            Arg::new(SAMPLE_SUMMARY)
                .long(SAMPLE_SUMMARY)
                .settings(&defaults())
                .validator(validate::writable)
                .long_about("Sample-wide summary table: median and mean coverage plus the fraction of targeted bases at or above 1x/5x/10x/20x/50x."),
            Arg::new(COVERAGE_JS)
                .long(COVERAGE_JS)
                .settings(&defaults())
                .validator(validate::writable)
                .long_about("Coverage JS blob: sample mean and median coverage as pretty-printed JSON behind a \"covs = // NOJSON\" prefix."),
            Arg::new(INTERVAL_SUMMARY)
                .long(INTERVAL_SUMMARY)
                .settings(&defaults())
                .validator(validate::writable)
                .long_about("Two-row summary with the mean coverage of every target region."),
            Arg::new(DOWNSAMPLE_OUTPUT)
                .long(DOWNSAMPLE_OUTPUT)
                .settings(&defaults())
                .validator(validate::writable)
                .requires(DOWNSAMPLE_FACTOR)
                .long_about("Downsampled depth output (chr, pos, mean), one line per window of --df positions."),
            Arg::new(DOWNSAMPLE_FACTOR)
                .long(DOWNSAMPLE_FACTOR)
                .settings(&defaults())
                .validator(validate::numeric(1u64, 1_000_000u64))
                .requires(DOWNSAMPLE_OUTPUT)
                .long_about("Downsampling window size in base pairs."),
        ];
        args.into_iter().map(|x| x.help_heading(Some(SECTION_NAME))).collect()
    }
}

pub mod gaps {
    use super::*;

    pub const OUTPUT: &str = "gaps";
    pub const THRESHOLD: &str = "gt";
    pub const TARGET: &str = "gaptarget";
    pub const REFGENE: &str = "refgene";

    pub const SECTION_NAME: &str = "Gaps";

    pub fn args<'a>() -> Vec<Arg<'a>> {
        let args = vec![
            Arg::new(OUTPUT)
                .long(OUTPUT)
                .settings(&defaults())
                .validator(validate::writable)
                .long_about("Gap report (csv): maximal runs of targeted positions with depth strictly below --gt, annotated against --refgene."),
            Arg::new(THRESHOLD)
                .long(THRESHOLD)
                .settings(&defaults())
                .validator(validate::numeric(1u16, 1000u16))
                .default_value("10")
                .long_about("Gap depth threshold: a position belongs to a gap when its depth is strictly below this value."),
            Arg::new(TARGET)
                .long(TARGET)
                .settings(&defaults())
                .validator(validate::path)
                .long_about("BED file restricting gap reporting: only gap pieces overlapping these regions are reported, split at the region boundaries."),
            Arg::new(REFGENE)
                .long(REFGENE)
                .settings(&defaults())
                .validator(validate::path)
                .long_about("UCSC refGene table (plain or gzipped) used to annotate gaps with gene and exon/intron features."),
        ];
        args.into_iter().map(|x| x.help_heading(Some(SECTION_NAME))).collect()
    }
}

pub mod kmer {
    use super::*;

    pub const PROFILE: &str = "kmer";
    pub const OUTPUT: &str = "okmer";

    pub const SECTION_NAME: &str = "Kmer weighting";

    pub fn args<'a>() -> Vec<Arg<'a>> {
        let args = vec![
            Arg::new(PROFILE)
                .long(PROFILE)
                .settings(&defaults())
                .validator(validate::path)
                .long_about("Kmer profile matrix (tsv, samples as rows, kmers as columns). The row matching the sample name selects the per-kmer depth weights."),
            Arg::new(OUTPUT)
                .long(OUTPUT)
                .settings(&defaults())
                .validator(validate::writable)
                .long_about("Kmer-weighted per-base depth output (chr, pos, depth). Requires --kmer."),
        ];
        args.into_iter().map(|x| x.help_heading(Some(SECTION_NAME))).collect()
    }
}

pub fn all<'a>() -> Vec<Arg<'a>> {
    core::args()
        .into_iter()
        .chain(outputs::args().into_iter())
        .chain(gaps::args().into_iter())
        .chain(kmer::args().into_iter())
        .collect()
}
