//! Context types for richer error messages.

use std::fmt;

/// The filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    Read,
    Write,
    Metadata,
    CreateDirectory,
    Backup,
    Restore,
    Walk,
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOperation::Read => write!(f, "read"),
            IoOperation::Write => write!(f, "write"),
            IoOperation::Metadata => write!(f, "stat"),
            IoOperation::CreateDirectory => write!(f, "create directory"),
            IoOperation::Backup => write!(f, "back up"),
            IoOperation::Restore => write!(f, "restore"),
            IoOperation::Walk => write!(f, "walk"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_operation_display() {
        assert_eq!(IoOperation::Read.to_string(), "read");
        assert_eq!(IoOperation::Metadata.to_string(), "stat");
        assert_eq!(IoOperation::CreateDirectory.to_string(), "create directory");
        assert_eq!(IoOperation::Backup.to_string(), "back up");
    }
}
