/// Errors reported by a query engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The statement text could not be parsed.
    Syntax(String),
    /// The statement references a table that does not exist.
    UnknownTable(String),
    /// The statement references a column that does not exist.
    UnknownColumn(String),
    /// `CREATE TABLE` without `IF NOT EXISTS` for an existing table.
    TableExists(String),
    /// A column type name is not supported.
    UnknownType(String),
    /// A value does not fit, or cannot be parsed as, its column type.
    InvalidValue(String),
    /// The statement is well-formed but not supported.
    Unsupported(String),
    /// The engine itself failed.
    Internal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(message) => write!(f, "syntax error: {message}"),
            Self::UnknownTable(name) => write!(f, "table {name} does not exist"),
            Self::UnknownColumn(name) => write!(f, "unknown column {name}"),
            Self::TableExists(name) => write!(f, "table {name} already exists"),
            Self::UnknownType(name) => write!(f, "unknown data type {name}"),
            Self::InvalidValue(message) => write!(f, "invalid value: {message}"),
            Self::Unsupported(message) => write!(f, "not supported: {message}"),
            Self::Internal(message) => write!(f, "internal engine error: {message}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<sqlparser::parser::ParserError> for EngineError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        Self::Syntax(err.to_string())
    }
}

impl From<sqlparser::tokenizer::TokenizerError> for EngineError {
    fn from(err: sqlparser::tokenizer::TokenizerError) -> Self {
        Self::Syntax(err.to_string())
    }
}
