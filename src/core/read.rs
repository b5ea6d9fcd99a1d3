#[cfg(test)]
use mockall::mock;
use rust_htslib::bam::ext::BamRecordExtensions;
use rust_htslib::bam::Record;

/// Accessor seam between the span reader and the physical alignment decoder.
/// All coordinates are 0-based half-open, as normalized by rust-htslib.
pub trait AlignedRead {
    fn contig_id(&self) -> i32;
    fn start(&self) -> i64;
    /// CIGAR-derived alignment end (exclusive).
    fn end(&self) -> i64;
    fn mapq(&self) -> u8;

    fn is_unmapped(&self) -> bool;
    fn is_secondary_or_supplementary(&self) -> bool;
    fn is_duplicate(&self) -> bool;
    fn is_reverse(&self) -> bool;

    fn is_paired(&self) -> bool;
    fn is_first_of_pair(&self) -> bool;
    fn mate_contig_id(&self) -> i32;
    fn mate_start(&self) -> i64;
    fn is_mate_unmapped(&self) -> bool;

    fn sequence(&self) -> Vec<u8>;
}

#[cfg(test)]
mock! {
    pub Read {}
    impl AlignedRead for Read {
        fn contig_id(&self) -> i32;
        fn start(&self) -> i64;
        fn end(&self) -> i64;
        fn mapq(&self) -> u8;

        fn is_unmapped(&self) -> bool;
        fn is_secondary_or_supplementary(&self) -> bool;
        fn is_duplicate(&self) -> bool;
        fn is_reverse(&self) -> bool;

        fn is_paired(&self) -> bool;
        fn is_first_of_pair(&self) -> bool;
        fn mate_contig_id(&self) -> i32;
        fn mate_start(&self) -> i64;
        fn is_mate_unmapped(&self) -> bool;

        fn sequence(&self) -> Vec<u8>;
    }
}

impl AlignedRead for Record {
    #[inline]
    fn contig_id(&self) -> i32 {
        self.tid()
    }

    #[inline]
    fn start(&self) -> i64 {
        self.pos()
    }

    #[inline]
    fn end(&self) -> i64 {
        self.reference_end()
    }

    #[inline]
    fn mapq(&self) -> u8 {
        self.mapq()
    }

    #[inline]
    fn is_unmapped(&self) -> bool {
        self.is_unmapped()
    }

    #[inline]
    fn is_secondary_or_supplementary(&self) -> bool {
        self.is_secondary() || self.is_supplementary()
    }

    #[inline]
    fn is_duplicate(&self) -> bool {
        self.is_duplicate()
    }

    #[inline]
    fn is_reverse(&self) -> bool {
        self.is_reverse()
    }

    #[inline]
    fn is_paired(&self) -> bool {
        self.is_paired()
    }

    #[inline]
    fn is_first_of_pair(&self) -> bool {
        self.is_first_in_template()
    }

    #[inline]
    fn mate_contig_id(&self) -> i32 {
        self.mtid()
    }

    #[inline]
    fn mate_start(&self) -> i64 {
        self.mpos()
    }

    #[inline]
    fn is_mate_unmapped(&self) -> bool {
        self.is_mate_unmapped()
    }

    #[inline]
    fn sequence(&self) -> Vec<u8> {
        self.seq().as_bytes()
    }
}
