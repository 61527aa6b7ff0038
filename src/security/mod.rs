//! Security guards for doc-guardian
//!
//! - Path containment inside the documentation root
//! - Regex admission control against catastrophic patterns
//! - Size-limited, symlink-refusing reads and atomic writes

mod path_guard;
mod pattern_guard;
mod safe_io;

pub use path_guard::{
    DEFAULT_MAX_PATH_LENGTH, PathGuard, PathSecurityError, ValidatedPath, contain,
    validate_doc_root, validate_project_root,
};
pub use pattern_guard::{
    CompiledPattern, DEFAULT_MAX_PATTERN_LENGTH, DEFAULT_MAX_PATTERNS, PatternGuard,
    find_catastrophic_shape,
};
pub use safe_io::{PersistHook, SafeFileReader, SafeIoError, sanitize_error_message, write_atomic};
