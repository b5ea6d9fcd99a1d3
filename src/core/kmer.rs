use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use crate::core::error::{CovError, Result};
use crate::core::read::AlignedRead;

/// Kmer-factor table for one sample plus the read-signature indexer.
///
/// The profile matrix has samples as rows and kmers as columns. Normalization:
/// each row by its sum, then each column by its sum, then inversion; zeros and
/// NaN both become 1.0. The last slot of `factors` is a sentinel weight of 1.0
/// for reads without a resolvable signature.
pub struct KmerProfile {
    k: usize,
    lookup: HashMap<u64, u32>,
    factors: Vec<f64>,
}

impl KmerProfile {
    pub fn load(path: &Path, sample: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').has_headers(true).from_reader(File::open(path)?);

        let headers = reader.headers()?.clone();
        let kmers: Vec<String> = headers.iter().skip(1).map(|x| x.to_owned()).collect();
        if kmers.is_empty() {
            return Err(CovError::InputMismatch(format!("kmer profile {} has no kmer columns", path.display())));
        }
        let k = kmers[0].len();

        let mut lookup = HashMap::with_capacity(kmers.len());
        for (column, kmer) in kmers.iter().enumerate() {
            if kmer.len() != k {
                return Err(CovError::InputMismatch(format!("kmer profile has mixed kmer lengths: {}", kmer)));
            }
            let code = encode(kmer.as_bytes())
                .ok_or_else(|| CovError::InputMismatch(format!("non-ACGT kmer column: {}", kmer)))?;
            lookup.insert(code, column as u32);
        }

        let mut names = Vec::new();
        let mut matrix: Vec<Vec<f64>> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let name = record.get(0).unwrap_or("").to_owned();
            let mut row = Vec::with_capacity(kmers.len());
            for value in record.iter().skip(1) {
                let value: f64 = value
                    .parse()
                    .map_err(|_| CovError::InputMismatch(format!("malformed kmer count {:?} for sample {}", value, name)))?;
                row.push(value);
            }
            if row.len() != kmers.len() {
                return Err(CovError::InputMismatch(format!("ragged kmer profile row for sample {}", name)));
            }
            names.push(name);
            matrix.push(row);
        }

        normalize(&mut matrix);

        let selected = names
            .iter()
            .position(|x| x == sample)
            .ok_or_else(|| CovError::InputMismatch(format!("sample {} is absent from the kmer profile", sample)))?;
        let mut factors: Vec<f64> =
            matrix.swap_remove(selected).into_iter().map(|x| if x == 0.0 || x.is_nan() { 1.0 } else { 1.0 / x }).collect();
        // sentinel weight for unresolvable signatures
        factors.push(1.0);

        Ok(KmerProfile { k, lookup, factors })
    }

    #[inline]
    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    #[inline]
    pub fn sentinel(&self) -> u32 {
        (self.factors.len() - 1) as u32
    }

    /// Kmer index of the fragment shearing end: the first k aligned-orientation bases
    /// for forward reads, the reverse complement of the last k for reverse reads.
    pub fn index_of<R: AlignedRead>(&self, record: &R) -> u32 {
        let seq = record.sequence();
        if seq.len() < self.k {
            return self.sentinel();
        }
        let code = if record.is_reverse() {
            encode_revcomp(&seq[seq.len() - self.k..])
        } else {
            encode(&seq[..self.k])
        };
        code.and_then(|c| self.lookup.get(&c).copied()).unwrap_or_else(|| self.sentinel())
    }
}

// row-wise then column-wise sum normalization, in place
fn normalize(matrix: &mut [Vec<f64>]) {
    for row in matrix.iter_mut() {
        let total: f64 = row.iter().sum();
        for x in row.iter_mut() {
            *x /= total;
        }
    }
    if matrix.is_empty() {
        return;
    }
    for column in 0..matrix[0].len() {
        let total: f64 = matrix.iter().map(|row| row[column]).sum();
        for row in matrix.iter_mut() {
            row[column] /= total;
        }
    }
}

#[inline]
fn base_code(base: u8) -> Option<u64> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

fn encode(window: &[u8]) -> Option<u64> {
    let mut code = 0u64;
    for &base in window {
        code = (code << 2) | base_code(base)?;
    }
    Some(code)
}

fn encode_revcomp(window: &[u8]) -> Option<u64> {
    let mut code = 0u64;
    for &base in window.iter().rev() {
        code = (code << 2) | (3 - base_code(base)?);
    }
    Some(code)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crate::core::read::MockRead;

    use super::*;

    fn profile() -> KmerProfile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "sample\tAA\tCC\ns1\t2\t0\ns2\t2\t2\n").unwrap();
        KmerProfile::load(file.path(), "s1").unwrap()
    }

    #[test]
    fn normalization() {
        // row norm: s1 [1, 0], s2 [0.5, 0.5]; column norm: AA [2/3, 1/3], CC [0, 1];
        // inversion with zero coercion: s1 [1.5, 1.0]
        let profile = profile();
        let factors = profile.factors();
        assert_eq!(factors.len(), 3);
        assert!((factors[0] - 1.5).abs() < 1e-12);
        assert_eq!(factors[1], 1.0);
        assert_eq!(factors[2], 1.0);
        assert_eq!(profile.sentinel(), 2);
    }

    #[test]
    fn missing_sample() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "sample\tAA\ns1\t2\n").unwrap();
        assert!(matches!(KmerProfile::load(file.path(), "nope"), Err(CovError::InputMismatch(_))));
    }

    fn read(seq: &[u8], reverse: bool) -> MockRead {
        let mut mock = MockRead::new();
        let seq = seq.to_vec();
        mock.expect_sequence().returning(move || seq.clone());
        mock.expect_is_reverse().return_const(reverse);
        mock
    }

    #[test]
    fn signatures() {
        let profile = profile();
        // forward: leading kmer
        assert_eq!(profile.index_of(&read(b"AAGT", false)), 0);
        // reverse: trailing kmer, reverse-complemented (GG -> CC)
        assert_eq!(profile.index_of(&read(b"TTGG", true)), 1);
        // unknown kmer, ambiguous base, short read -> sentinel
        assert_eq!(profile.index_of(&read(b"GTGT", false)), 2);
        assert_eq!(profile.index_of(&read(b"NAGT", false)), 2);
        assert_eq!(profile.index_of(&read(b"A", false)), 2);
    }
}
