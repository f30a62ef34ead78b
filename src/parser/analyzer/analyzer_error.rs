use serde::Serialize;
use thiserror::Error;

/// Failure categories; every one of them aborts analysis of the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    AmbiguousReference,
    EntityNotFound,
    ColumnNotFound,
    InvalidLateralReference,
    RecursiveSelfReferenceNotReady,
    UndeterminedRowShape,
    EmptyWildcardTarget,
    QualifiedNameTooLong,
    DuplicateAlias,
    ColumnAliasMismatch,
    ColumnDefinitionList,
    FunctionNotFound,
    TypeNotFound,
    CrossDatabaseReference,
    DatatypeMismatch,
    SetOperationMismatch,
    ValuesShapeMismatch,
    UnsupportedReturnType,
    InvalidReference,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct AnalyzerError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
    /// Byte offset into the statement text, when the grammar recorded one.
    pub location: Option<usize>,
}

impl AnalyzerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), detail: None, hint: None, location: None }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn at(mut self, location: Option<usize>) -> Self {
        self.location = location;
        self
    }

    pub fn err<T>(self) -> Result<T, AnalyzerError> {
        Err(self)
    }

    /// Build and return the error in one step.
    pub fn fail<T>(kind: ErrorKind, message: impl Into<String>, location: Option<usize>) -> Result<T, AnalyzerError> {
        Self::new(kind, message).at(location).err()
    }
}
