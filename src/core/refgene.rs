use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use bio::data_structures::interval_tree::IntervalTree;
use flate2::bufread::GzDecoder;
use itertools::Itertools;

use crate::core::error::{CovError, Result};
use crate::core::gaps::CoverageGap;

/// One refGene transcript: its genomic extent and exon layout, in genomic order.
#[derive(Debug, Clone)]
struct Transcript {
    gene: String,
    exons: Vec<Range<u64>>,
}

/// Annotator columns attached to every reported gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapAnnotation {
    pub gene: String,
    pub feature: String,
}

/// Downstream gap consumer: enriches blocks with the genes and exon/intron features
/// they fall into, from a UCSC refGene table.
pub struct RefGeneAnnotator {
    transcripts: Vec<Transcript>,
    trees: HashMap<String, IntervalTree<u64, usize>>,
}

impl RefGeneAnnotator {
    pub fn from_refgene(path: &Path) -> Result<Self> {
        let file = BufReader::new(File::open(path)?);
        let gzipped = path.extension().and_then(OsStr::to_str).map(|x| x == "gz").unwrap_or(false);
        if gzipped {
            Self::parse(BufReader::new(GzDecoder::new(file)))
        } else {
            Self::parse(file)
        }
    }

    fn parse<T: BufRead>(mut reader: T) -> Result<Self> {
        let mut transcripts = Vec::new();
        let mut trees: HashMap<String, IntervalTree<u64, usize>> = HashMap::new();

        let mut buf = String::new();
        while reader.read_line(&mut buf)? != 0 {
            let line = buf.trim_end();
            if line.is_empty() || line.starts_with('#') {
                buf.clear();
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            // bin, name, chrom, strand, txStart, txEnd, cdsStart, cdsEnd, exonCount,
            // exonStarts, exonEnds, score, name2, ...
            if fields.len() < 13 {
                return Err(CovError::InputMismatch(format!("refgene row with {} column(s)", fields.len())));
            }
            let chrom = fields[2].to_owned();
            let txrange = Self::coordinate(fields[4])?..Self::coordinate(fields[5])?;
            let starts = Self::offsets(fields[9])?;
            let ends = Self::offsets(fields[10])?;
            if starts.len() != ends.len() {
                return Err(CovError::InputMismatch(format!("ragged exon lists for transcript {}", fields[1])));
            }
            let exons = starts.into_iter().zip(ends.into_iter()).map(|(s, e)| s..e).collect();

            trees.entry(chrom).or_insert_with(IntervalTree::new).insert(txrange, transcripts.len());
            transcripts.push(Transcript { gene: fields[12].to_owned(), exons });
            buf.clear();
        }
        Ok(RefGeneAnnotator { transcripts, trees })
    }

    fn coordinate(field: &str) -> Result<u64> {
        field.parse().map_err(|_| CovError::InputMismatch(format!("malformed refgene coordinate {:?}", field)))
    }

    fn offsets(field: &str) -> Result<Vec<u64>> {
        field.split(',').filter(|x| !x.is_empty()).map(Self::coordinate).collect()
    }

    pub fn annotate(&self, gap: &CoverageGap) -> GapAnnotation {
        let tree = match self.trees.get(gap.contig()) {
            Some(tree) => tree,
            None => return GapAnnotation { gene: ".".into(), feature: ".".into() },
        };
        let query = *gap.start()..gap.end() + 1;

        let mut genes = Vec::new();
        let mut features = Vec::new();
        for entry in tree.find(query.clone()) {
            let transcript = &self.transcripts[*entry.data()];
            genes.push(transcript.gene.clone());
            features.extend(Self::features(transcript, &query));
        }
        if genes.is_empty() {
            return GapAnnotation { gene: ".".into(), feature: ".".into() };
        }
        // interval tree iteration order is unspecified, sort for stable output
        GapAnnotation {
            gene: genes.into_iter().unique().sorted().join(";"),
            feature: features.into_iter().unique().sorted().join(";"),
        }
    }

    // exon/intron labels in genomic order, 1-based numbering
    fn features(transcript: &Transcript, query: &Range<u64>) -> Vec<String> {
        let mut labels = Vec::new();
        for (number, exon) in transcript.exons.iter().enumerate() {
            if exon.start < query.end && query.start < exon.end {
                labels.push(format!("exon {}", number + 1));
            }
        }
        for (number, (left, right)) in transcript.exons.iter().tuple_windows().enumerate() {
            if left.end < query.end && query.start < right.start {
                labels.push(format!("intron {}", number + 1));
            }
        }
        labels
    }
}
