use std::collections::HashMap;
use std::path::{Path, PathBuf};

use derive_getters::Getters;
use derive_more::Constructor;
use rust_htslib::bam;
use rust_htslib::bam::Read;

use crate::core::error::{CovError, Result};

/// Immutable contig descriptor from the alignment header.
#[derive(Clone, Debug, Eq, PartialEq, Getters, Constructor)]
pub struct Contig {
    name: String,
    tid: u32,
    length: u64,
}

/// Header contig list, in reference index order.
#[derive(Clone, Debug, Default)]
pub struct ContigRoster {
    contigs: Vec<Contig>,
    by_name: HashMap<String, u32>,
}

impl ContigRoster {
    pub fn new(contigs: Vec<Contig>) -> Self {
        let by_name = contigs.iter().map(|c| (c.name.clone(), c.tid)).collect();
        ContigRoster { contigs, by_name }
    }

    #[inline]
    pub fn tid(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn get(&self, tid: u32) -> Option<&Contig> {
        self.contigs.get(tid as usize)
    }

    #[inline]
    pub fn name(&self, tid: u32) -> &str {
        &self.contigs[tid as usize].name
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contig> {
        self.contigs.iter()
    }
}

/// Indexed alignment provider: yields one contig's records at a time, in reference
/// order, plus the index-derived aligned-record estimate used for span pre-sizing.
pub struct HtsReader {
    inner: bam::IndexedReader,
    path: PathBuf,
    // tid -> number of index-recorded mapped records; None when the index carries no counts
    aligned: Option<HashMap<u32, u64>>,
}

impl HtsReader {
    pub fn open(path: &Path, reference: Option<&Path>) -> Result<Self> {
        let mut inner = bam::IndexedReader::from_path(path)?;
        if let Some(reference) = reference {
            inner.set_reference(reference)?;
        }
        let aligned = inner
            .index_stats()
            .map(|stats| stats.into_iter().filter(|(tid, _, _, _)| *tid >= 0).map(|(tid, _, mapped, _)| (tid as u32, mapped)).collect())
            .ok();
        Ok(HtsReader { inner, path: path.to_owned(), aligned })
    }

    pub fn roster(&self) -> ContigRoster {
        let header = self.inner.header();
        let contigs = header
            .target_names()
            .iter()
            .enumerate()
            .map(|(tid, name)| {
                let name = String::from_utf8_lossy(name).into_owned();
                let length = header.target_len(tid as u32).unwrap_or(0);
                Contig::new(name, tid as u32, length)
            })
            .collect();
        ContigRoster::new(contigs)
    }

    /// Index-recorded aligned record count for the contig; None when unknown.
    pub fn aligned_estimate(&self, tid: u32) -> Option<u64> {
        self.aligned.as_ref().map(|x| x.get(&tid).copied().unwrap_or(0))
    }

    pub fn fetch_contig(&mut self, name: &str) -> Result<()> {
        self.inner.fetch(name).map_err(CovError::from)
    }

    #[inline]
    pub fn read(&mut self, record: &mut bam::Record) -> Option<Result<()>> {
        self.inner.read(record).map(|r| r.map_err(CovError::from))
    }

    /// Sample identity: the alignment file stem.
    pub fn sample_name(&self) -> String {
        self.path.file_stem().map(|x| x.to_string_lossy().into_owned()).unwrap_or_else(|| "sample".to_owned())
    }
}
