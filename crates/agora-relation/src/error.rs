//! Error types for the relation layer.

/// Errors returned by [`RelationTable`](crate::RelationTable) and
/// [`BiMap`](crate::BiMap).
///
/// Every failing operation leaves the structure exactly as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RelationError {
    /// The element is already present (in any column, or on either side
    /// of a one-to-one map).
    #[error("element is already present")]
    DuplicateElement,

    /// The element was never added, or has been removed.
    #[error("element is not present")]
    UnknownElement,

    /// The column was not declared when the table was created.
    #[error("column does not exist")]
    UnknownColumn,

    /// Both elements live in the same column; associations only join
    /// different columns.
    #[error("cannot associate two elements of the same column")]
    SameColumn,
}
