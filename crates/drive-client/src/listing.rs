//! Partial-success results for paginated listings
//!
//! A paginated listing stops at the first failed page. `PartialResult` keeps
//! what arrived before the failure together with the error, and each call
//! site picks its policy explicitly: `into_result` for strict propagation,
//! `into_available` for partial success.

use crate::error::{Error, Result};

/// Items from the pages fetched before pagination ended.
#[derive(Debug)]
pub struct PartialResult<T> {
    pub items: Vec<T>,
    /// Pages fetched successfully
    pub pages: usize,
    /// Why pagination ended early, if it did
    pub error: Option<Error>,
}

impl<T> PartialResult<T> {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Strict: any page failure is an error.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.items),
        }
    }

    /// Partial: items fetched so far, an error only when no page arrived.
    pub fn into_available(self) -> Result<Vec<T>> {
        match self.error {
            Some(e) if self.pages == 0 => Err(e),
            _ => Ok(self.items),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PartialResult<U> {
        PartialResult {
            items: self.items.into_iter().map(f).collect(),
            pages: self.pages,
            error: self.error,
        }
    }
}
