// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Quote Error type

use thiserror::Error;

/// Quote parsing error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ParseError {
    #[error("quote truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("quote field `{field}` out of range: {value}")]
    FieldOutOfRange { field: &'static str, value: String },
}

impl ParseError {
    pub(crate) fn out_of_range(field: &'static str, value: impl ToString) -> Self {
        Self::FieldOutOfRange {
            field,
            value: value.to_string(),
        }
    }
}
