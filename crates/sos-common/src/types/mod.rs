//! Common types used across SOS crates

use serde::{Deserialize, Serialize};

/// Skip/take window over an ordered record sequence.
///
/// Sources and readers page through their records with this window; the
/// batch coordinator advances it one chunk at a time.
///
/// # Examples
///
/// ```
/// use sos_common::Page;
///
/// let page = Page::first(1000);
/// assert_eq!(page.skip, 0);
/// let next = page.next();
/// assert_eq!(next.skip, 1000);
/// assert_eq!(next.take, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Number of records to skip
    pub skip: usize,

    /// Maximum number of records to return
    pub take: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            take: 1000,
        }
    }
}

impl Page {
    pub fn new(skip: usize, take: usize) -> Self {
        Self { skip, take }
    }

    /// First page of the given size
    pub fn first(take: usize) -> Self {
        Self { skip: 0, take }
    }

    /// The page directly following this one
    pub fn next(self) -> Self {
        Self {
            skip: self.skip + self.take,
            take: self.take,
        }
    }

    /// Zero-based page number
    pub fn number(&self) -> usize {
        if self.take == 0 {
            0
        } else {
            self.skip / self.take
        }
    }

    /// Whether a returned batch of `len` records was the last one
    pub fn is_last(&self, len: usize) -> bool {
        len < self.take
    }
}
