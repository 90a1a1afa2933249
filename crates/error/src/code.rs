use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following MOSAIQ-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Source and connection errors
/// - **2000-2999**: Planning errors
/// - **3000-3999**: Execution errors
/// - **4000-4999**: Merge errors
/// - **5000-5999**: Configuration errors
/// - **9000-9999**: Internal/System errors
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Source Errors (1000-1999) ===
    /// MOSAIQ-1001: Source not found in the registry
    SourceNotFound = 1001,
    /// MOSAIQ-1002: Adapter connection failed
    ConnectionFailed = 1002,
    /// MOSAIQ-1003: Table already registered to another source
    TableConflict = 1003,
    /// MOSAIQ-1004: No adapter registered for a source
    AdapterMissing = 1004,
    /// MOSAIQ-1005: Source kind not supported
    UnsupportedSourceKind = 1005,
    /// MOSAIQ-1006: Capability name not recognized
    UnknownCapability = 1006,

    // === Planning Errors (2000-2999) ===
    /// MOSAIQ-2001: Dependency cycle among planned sub-queries
    CircularDependency = 2001,
    /// MOSAIQ-2002: No registered source satisfies the required capabilities
    NoCapableSource = 2002,
    /// MOSAIQ-2003: Table not present in the catalog
    UnresolvedTable = 2003,
    /// MOSAIQ-2004: Query shape cannot be planned
    UnsupportedQuery = 2004,

    // === Execution Errors (3000-3999) ===
    /// MOSAIQ-3001: Adapter query failed
    AdapterQueryFailed = 3001,
    /// MOSAIQ-3002: Adapter call exceeded its timeout
    AdapterTimeout = 3002,
    /// MOSAIQ-3003: Execution cancelled before completion
    ExecutionCancelled = 3003,
    /// MOSAIQ-3004: Concurrency budget exhausted
    BudgetExhausted = 3004,

    // === Merge Errors (4000-4999) ===
    /// MOSAIQ-4001: Merge strategy not supported for the given inputs
    UnsupportedStrategy = 4001,
    /// MOSAIQ-4002: Join strategy requires key columns
    MissingKeyColumns = 4002,
    /// MOSAIQ-4003: Aggregation function not recognized
    UnknownAggregation = 4003,

    // === Configuration Errors (5000-5999) ===
    /// MOSAIQ-5001: Configuration file could not be parsed
    InvalidConfig = 5001,
    /// MOSAIQ-5002: Configuration validation failed
    ConfigViolation = 5002,
    /// MOSAIQ-5003: Missing required configuration field
    MissingRequiredField = 5003,

    // === Internal Errors (9000-9999) ===
    /// MOSAIQ-9002: Serialization/deserialization failed
    SerializationFailed = 9002,
    /// MOSAIQ-9003: Unexpected internal state
    InternalPanic = 9003,

    /// MOSAIQ-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "MOSAIQ-2001")
    pub fn as_str(&self) -> String {
        format!("MOSAIQ-{:04}", self.as_u16())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Source,
            2000..=2999 => ErrorCategory::Planning,
            3000..=3999 => ErrorCategory::Execution,
            4000..=4999 => ErrorCategory::Merge,
            5000..=5999 => ErrorCategory::Config,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        // Parse "MOSAIQ-XXXX" format
        let num: u16 = s
            .strip_prefix("MOSAIQ-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::SourceNotFound),
            1002 => Ok(Self::ConnectionFailed),
            1003 => Ok(Self::TableConflict),
            1004 => Ok(Self::AdapterMissing),
            1005 => Ok(Self::UnsupportedSourceKind),
            1006 => Ok(Self::UnknownCapability),
            2001 => Ok(Self::CircularDependency),
            2002 => Ok(Self::NoCapableSource),
            2003 => Ok(Self::UnresolvedTable),
            2004 => Ok(Self::UnsupportedQuery),
            3001 => Ok(Self::AdapterQueryFailed),
            3002 => Ok(Self::AdapterTimeout),
            3003 => Ok(Self::ExecutionCancelled),
            3004 => Ok(Self::BudgetExhausted),
            4001 => Ok(Self::UnsupportedStrategy),
            4002 => Ok(Self::MissingKeyColumns),
            4003 => Ok(Self::UnknownAggregation),
            5001 => Ok(Self::InvalidConfig),
            5002 => Ok(Self::ConfigViolation),
            5003 => Ok(Self::MissingRequiredField),
            9002 => Ok(Self::SerializationFailed),
            9003 => Ok(Self::InternalPanic),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category for coarse API mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorCategory {
    Source,
    Planning,
    Execution,
    Merge,
    Config,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::SourceNotFound.as_str(), "MOSAIQ-1001");
        assert_eq!(ErrorCode::CircularDependency.as_str(), "MOSAIQ-2001");
        assert_eq!(ErrorCode::Unknown.as_str(), "MOSAIQ-9999");
    }

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            ErrorCode::try_from("MOSAIQ-1001".to_string()).unwrap(),
            ErrorCode::SourceNotFound
        );
        assert_eq!(
            ErrorCode::try_from("MOSAIQ-9999".to_string()).unwrap(),
            ErrorCode::Unknown
        );
    }

    #[test]
    fn test_error_code_parsing_errors() {
        assert!(ErrorCode::try_from("INVALID".to_string()).is_err());
        assert!(ErrorCode::try_from("MOSAIQ-0000".to_string()).is_err());
        assert!(ErrorCode::try_from("MOSAIQ-ABC".to_string()).is_err());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(ErrorCode::SourceNotFound.category(), ErrorCategory::Source);
        assert_eq!(
            ErrorCode::CircularDependency.category(),
            ErrorCategory::Planning
        );
        assert_eq!(
            ErrorCode::AdapterTimeout.category(),
            ErrorCategory::Execution
        );
        assert_eq!(
            ErrorCode::MissingKeyColumns.category(),
            ErrorCategory::Merge
        );
        assert_eq!(ErrorCode::InvalidConfig.category(), ErrorCategory::Config);
        assert_eq!(ErrorCode::Unknown.category(), ErrorCategory::Internal);
    }
}
