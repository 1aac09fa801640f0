//! Relation structures used by the state engine and the agents.
//!
//! - [`RelationTable`]: a multi-column, undirected association graph.
//!   The state server keeps recipients, zones, and objects in one table
//!   and answers "who sees what" with [`RelationTable::path`].
//! - [`BiMap`]: a one-to-one map with reverse lookup. Agents use it to
//!   pair connection ids with the channels they allocated for them.
//!
//! Neither type does any locking; callers wrap them in whatever mutex
//! guards the rest of their state.

mod bimap;
mod error;
mod table;

pub use bimap::BiMap;
pub use error::RelationError;
pub use table::RelationTable;
