/// Cursor behaviour of a tabular result.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CursorKind {
    /// Rows are read in increasing order; pages and rows are dropped once read.
    #[default]
    ForwardOnly,
    /// Rows may be read in any order and stay resident.
    Scrollable,
}

/// Acknowledgement of an UPDATE, INSERT or DELETE.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateResult {
    pub affected_row_count: i64,
    pub generated_key: Option<i64>,
}

/// Server side change of the auto-commit mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoCommitChange {
    pub auto_commit: bool,
}

/// Non-fatal notice collected by the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    pub code: String,
    pub message: String,
}

impl Warning {
    pub(crate) fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Named transaction savepoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    pub(crate) fn new(name: String) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
