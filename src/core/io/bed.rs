use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use bio_types::genome::{AbstractInterval, Interval, Position};
use derive_getters::Dissolve;
use flate2::bufread::GzDecoder;

use crate::core::error::{CovError, Result};

/// One target interval as declared in the input file: 0-based half-open coordinates,
/// any columns past the third kept opaque as the record name.
#[derive(Eq, PartialEq, Debug, Clone, Dissolve)]
pub struct BedRecord {
    pub name: String,
    pub interval: Interval,
}

impl AbstractInterval for BedRecord {
    fn contig(&self) -> &str {
        self.interval.contig()
    }

    fn range(&self) -> Range<Position> {
        self.interval.range()
    }
}

fn _parse<T: BufRead>(mut reader: T) -> Result<Vec<BedRecord>> {
    let mut records = Vec::new();

    let mut buf = String::new();
    while reader.read_line(&mut buf)? != 0 {
        let line = buf.trim_end();
        if line.is_empty() {
            buf.clear();
            continue;
        }
        let split: Vec<&str> = line.splitn(4, '\t').collect();
        if split.len() < 3 {
            return Err(CovError::InputMismatch(format!("expected at least 3 tab-separated columns, got: {}", line)));
        }

        let start: Position = split[1]
            .parse()
            .map_err(|_| CovError::InputMismatch(format!("malformed interval start in: {}", line)))?;
        let end: Position =
            split[2].parse().map_err(|_| CovError::InputMismatch(format!("malformed interval end in: {}", line)))?;
        if start >= end {
            return Err(CovError::InputMismatch(format!("empty or inverted interval in: {}", line)));
        }
        let interval = Interval::new(split[0].to_owned(), Range { start, end });

        let name = split.get(3).unwrap_or(&"").to_string();
        records.push(BedRecord { name, interval });
        buf.clear();
    }
    Ok(records)
}

pub fn parse(bed: impl AsRef<Path>) -> Result<Vec<BedRecord>> {
    let bed = bed.as_ref();
    let file = BufReader::new(File::open(bed)?);

    let gzipped = bed.extension().and_then(OsStr::to_str).map(|x| x == "gz").unwrap_or(false);
    if gzipped {
        _parse(BufReader::new(GzDecoder::new(file)))
    } else {
        _parse(file)
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use bio_types::genome::Position;

    use super::*;

    fn br(chr: &str, range: Range<Position>, name: &str) -> BedRecord {
        BedRecord { interval: Interval::new(chr.to_string(), range), name: name.to_string() }
    }

    #[test]
    fn empty() {
        assert!(_parse(BufReader::new("".as_bytes())).unwrap().is_empty());
    }

    #[test]
    fn correct() {
        let bed = "\
        chr1\t10\t20\tReg1\n\
        chr1\t50\t60\n\
        chrM\t30\t40\texon 2\textra\tcolumns\n";
        let records = vec![
            br("chr1", 10..20, "Reg1"),
            br("chr1", 50..60, ""),
            br("chrM", 30..40, "exon 2\textra\tcolumns"),
        ];
        assert_eq!(records, _parse(BufReader::new(bed.as_bytes())).unwrap());
    }

    #[test]
    fn empty_lines() {
        let bed = "\n\nchr2\t1000000\t2000000\tLorem\n\n\n1\t30\t301\t.\n\n";
        let records = vec![br("chr2", 1000000..2000000, "Lorem"), br("1", 30..301, ".")];
        assert_eq!(records, _parse(BufReader::new(bed.as_bytes())).unwrap());
    }

    #[test]
    fn malformed() {
        for bed in ["chr1\t10\n", "chr1\tx\t20\n", "chr1\t20\t10\n", "chr1\t20\t20\n"] {
            assert!(matches!(_parse(BufReader::new(bed.as_bytes())), Err(CovError::InputMismatch(_))));
        }
    }
}
