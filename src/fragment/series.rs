//! Ordering tracker used to re-assemble logical messages from fragments.
//!
//! `FragmentSeries` keeps only the declared total and the next expected
//! index, so it can sit inside every partial message without extra
//! allocation.

use super::{FragmentError, FragmentHeader, FragmentStatus};

/// Track the expected ordering of fragments for a single logical message.
///
/// Fragments must arrive strictly in order. Reordering is never attempted:
/// a skipped or repeated index is an error and the caller discards the
/// message.
#[derive(Clone, Debug)]
pub struct FragmentSeries {
    total: u32,
    next_index: u32,
}

impl FragmentSeries {
    /// Start a series from its first fragment.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::InvalidHeader`] when the header is
    /// self-inconsistent and [`FragmentError::IndexMismatch`] when it is not
    /// the first fragment.
    pub fn start(first: FragmentHeader) -> Result<(Self, FragmentStatus), FragmentError> {
        let mut series = Self {
            total: first.total(),
            next_index: 0,
        };
        let status = series.accept(first)?;
        Ok((series, status))
    }

    /// Declared number of fragments.
    #[must_use]
    pub const fn total(&self) -> u32 { self.total }

    /// Number of fragments accepted so far.
    #[must_use]
    pub const fn received(&self) -> u32 { self.next_index }

    /// Return whether the series has consumed the final fragment.
    #[must_use]
    pub const fn is_complete(&self) -> bool { self.next_index == self.total }

    /// Accept the next fragment and advance the expected index.
    ///
    /// # Examples
    ///
    /// ```
    /// use mbimlink::fragment::{FragmentHeader, FragmentSeries, FragmentStatus};
    ///
    /// let (mut series, status) = FragmentSeries::start(FragmentHeader::new(0, 2)).expect("first");
    /// assert_eq!(status, FragmentStatus::Incomplete);
    /// assert_eq!(series.accept(FragmentHeader::new(1, 2)), Ok(FragmentStatus::Complete));
    /// assert!(series.is_complete());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::InvalidHeader`] for a self-inconsistent
    /// header, [`FragmentError::TotalMismatch`] when the declared total
    /// changes mid-message, [`FragmentError::SeriesComplete`] after the final
    /// fragment, and [`FragmentError::IndexMismatch`] for an out-of-order or
    /// duplicate index.
    pub fn accept(&mut self, fragment: FragmentHeader) -> Result<FragmentStatus, FragmentError> {
        if !fragment.is_valid() {
            return Err(FragmentError::InvalidHeader {
                current: fragment.current(),
                total: fragment.total(),
            });
        }

        if fragment.total() != self.total {
            return Err(FragmentError::TotalMismatch {
                expected: self.total,
                found: fragment.total(),
            });
        }

        if self.is_complete() {
            return Err(FragmentError::SeriesComplete);
        }

        if fragment.current() != self.next_index {
            return Err(FragmentError::IndexMismatch {
                expected: self.next_index,
                found: fragment.current(),
            });
        }

        self.next_index += 1;
        if self.is_complete() {
            Ok(FragmentStatus::Complete)
        } else {
            Ok(FragmentStatus::Incomplete)
        }
    }
}
