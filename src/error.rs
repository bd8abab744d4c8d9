use thiserror::Error;

use crate::models::SiteFailure;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReportError {
    #[error("could not obtain access token: {0}")]
    Credential(String),
    #[error("analytics request failed: {0}")]
    Transport(String),
    #[error("report returned no rows")]
    DataAbsent,
    #[error("unexpected report payload: {0}")]
    MalformedResponse(String),
    #[error("no site produced a report row ({} failed)", .0.len())]
    NoValidResults(Vec<SiteFailure>),
}

pub type ReportResult<T> = Result<T, ReportError>;
