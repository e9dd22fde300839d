//! Numeric status codes recorded in session results
//!
//! Non-zero codes produced by a backend (installer exit status, script exit
//! status) are recorded verbatim; the constants below cover the conditions
//! the engine detects itself.

/// Item completed successfully.
pub const SUCCESS: i32 = 0;

/// Copy or removal of a staged item failed.
pub const COPY_FAILED: i32 = -1;

/// A removal item declared the receipt method but listed no packages.
pub const NO_PACKAGES_DECLARED: i32 = -2;

/// The receipt database could not be brought up to date.
pub const RECEIPT_DB_UNAVAILABLE: i32 = -3;

/// At least one package identifier was not present in the receipt database.
pub const PACKAGE_NOT_IN_DATABASE: i32 = -4;

/// Generic failure for conditions with no better code (missing payload,
/// unsupported type, nothing installable).
pub const GENERIC_FAILURE: i32 = -99;

/// The operator cancelled the operation.
pub const CANCELLED: i32 = -128;
