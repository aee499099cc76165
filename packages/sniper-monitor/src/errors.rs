//! Leaf error types for the HTTP-backed collaborators. None of these ever
//! propagate past the worker that raised them (spec.md §7): a verifier
//! failure becomes a `PriceCheckFailed` reason string, a dispatch failure is
//! logged and its siblings still run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("price lookup timed out")]
    Deadline,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("oracle reported failure: {0}")]
    OracleFailure(String),
    #[error("price response missing or zero withTax")]
    MissingPrice,
}

impl VerifierError {
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("order dispatch timed out")]
    Deadline,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("order endpoint rejected request: {0}")]
    Rejected(String),
}
