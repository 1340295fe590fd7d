use thiserror::Error;

/// Errors raised while editing a schema model.
///
/// `LockedColumn`, `InvalidPrimaryKey` and `ColumnNotInTable` are detected
/// before any mutation happens, so the model is unchanged when they are
/// returned. `InconsistentMapping` signals a broken caller contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The column is a foreign-key column of a relationship and cannot be removed.
    #[error("column {column} is locked by relationship {relationship}")]
    LockedColumn {
        column: String,
        relationship: String,
    },
    /// A primary key would contain something other than a column of its table.
    #[error("invalid primary key: {0}")]
    InvalidPrimaryKey(String),
    /// A column mapping references a column outside its expected table.
    #[error("inconsistent mapping: {0}")]
    InconsistentMapping(String),
    /// An index entry or column operation refers to a column of another table.
    #[error("column {column} does not belong to table {table}")]
    ColumnNotInTable { column: String, table: String },
    /// A column is already owned by a different table.
    #[error("column {column} already belongs to table {table}")]
    ColumnInUse { column: String, table: String },
    /// A handle does not resolve to an attached object.
    #[error("unknown object: {0}")]
    UnknownObject(String),
    /// The request violates structural rules of the model.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
}

/// Convenience alias for results returned by schemagraph.
pub type Result<T> = std::result::Result<T, Error>;
