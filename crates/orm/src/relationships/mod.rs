//! Relationships
//!
//! Models declare [`Relation`]s; the resolver bound to a connection turns
//! them into fetches. Relational connections batch eager loads into one `IN`
//! query, MongoDB embeds them with `$lookup`, and stores without joins fall
//! back to one query per parent.

pub mod eager_loading;
pub mod metadata;
pub mod traits;

pub use metadata::{Relation, RelationshipType};
pub use traits::{EagerLoad, EagerStrategy, RelationshipResolver};
