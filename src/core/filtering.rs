use derive_getters::Getters;
use derive_more::Constructor;

use crate::core::read::AlignedRead;

pub trait ReadsFilter<R: AlignedRead> {
    fn is_read_ok(&self, record: &R) -> bool;
}

/// Primary-alignment quality filter. Rejection is silent: filtered records simply
/// never contribute a span.
#[derive(Copy, Clone, Debug, Getters, Constructor)]
pub struct ByQuality {
    minmq: u8,
    allowdups: bool,
}

impl<R: AlignedRead> ReadsFilter<R> for ByQuality {
    #[inline]
    fn is_read_ok(&self, record: &R) -> bool {
        !record.is_unmapped()
            && !record.is_secondary_or_supplementary()
            && record.mapq() >= self.minmq
            && (self.allowdups || !record.is_duplicate())
    }
}
