use crate::data::{BatchId, CandidateSchedule, SubjectId};
use itertools::Itertools;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A structural problem in the supplied catalog records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogIssue {
    pub entity: &'static str,
    pub id: String,
    pub message: String,
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.entity, self.id, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingResource {
    UnknownSubject,
    NoEligibleFaculty,
    NoEligibleClassroom,
}

/// A (batch, subject) requirement that no catalog resource can serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnservableRequirement {
    pub batch_id: BatchId,
    pub subject_id: SubjectId,
    pub reason: MissingResource,
}

impl fmt::Display for UnservableRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            MissingResource::UnknownSubject => "subject is not in the catalog",
            MissingResource::NoEligibleFaculty => "no eligible faculty",
            MissingResource::NoEligibleClassroom => "no classroom fits the batch",
        };
        write!(f, "batch {} / subject {}: {}", self.batch_id, self.subject_id, reason)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().join("; ")
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Catalog is malformed: {}", join(.0))]
    InvalidCatalog(Vec<CatalogIssue>),

    #[error("Catalog cannot serve every requirement: {}", join(.0))]
    IncompleteCatalog(Vec<UnservableRequirement>),

    /// No schedule placing every required session was found. The best
    /// partial schedules are returned ranked, each listing what is unmet.
    #[error("No complete timetable found within the search budget ({} partial option(s))", .best_partial.len())]
    InfeasibleRequest { best_partial: Vec<CandidateSchedule> },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
