//! Query Builder Module - Backend-agnostic, fluent query composition

pub mod builder;
pub mod execution;
pub mod expression;
pub mod ordering;
pub mod pagination;
pub mod types;
pub mod where_clause;
pub mod with;

pub use builder::QueryBuilder;
pub use expression::{QueryExpression, RawStatement};
pub use pagination::Page;
pub use types::{OrderDirection, QueryOperator, WhereCondition};
