//! Static model metadata

use std::sync::Arc;

use super::casts::Cast;
use super::query::ModelQuery;
use crate::database::DatabaseService;
use crate::relationships::Relation;

/// Describes one model type. Implementors are usually unit structs; the
/// records themselves live in [`super::Model`].
///
/// ```ignore
/// struct User;
///
/// impl ModelDefinition for User {
///     fn table() -> &'static str { "users" }
///     fn fillable() -> &'static [&'static str] { &["name", "email"] }
///     fn guarded() -> &'static [&'static str] { &["is_admin"] }
///     fn relation(name: &str) -> Option<Relation> {
///         match name {
///             "posts" => Some(Relation::has_many::<Post>("user_id")),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait ModelDefinition: Send + Sync + 'static {
    fn table() -> &'static str;

    /// Connection name; `None` uses the registry default
    fn connection() -> Option<&'static str> {
        None
    }

    fn primary_key() -> &'static str {
        "id"
    }

    /// Attributes `fill` may assign
    fn fillable() -> &'static [&'static str] {
        &[]
    }

    /// Attributes `fill` never assigns, even when fillable. `"*"` guards all.
    fn guarded() -> &'static [&'static str] {
        &[]
    }

    /// Attributes removed by `strip_sensitive_data`, alongside guarded ones
    fn hidden() -> &'static [&'static str] {
        &[]
    }

    fn casts() -> &'static [(&'static str, Cast)] {
        &[]
    }

    /// Maintain `created_at` / `updated_at`
    fn timestamps() -> bool {
        false
    }

    fn relation(_name: &str) -> Option<Relation> {
        None
    }

    fn query(db: &Arc<DatabaseService>) -> ModelQuery<Self>
    where
        Self: Sized,
    {
        ModelQuery::new(db)
    }

    fn is_guarded(attribute: &str) -> bool {
        Self::guarded()
            .iter()
            .any(|guarded| *guarded == "*" || *guarded == attribute)
    }

    fn is_fillable(attribute: &str) -> bool {
        !Self::is_guarded(attribute) && Self::fillable().contains(&attribute)
    }

    fn cast_for(attribute: &str) -> Option<Cast> {
        Self::casts()
            .iter()
            .find(|(name, _)| *name == attribute)
            .map(|(_, cast)| *cast)
    }
}
