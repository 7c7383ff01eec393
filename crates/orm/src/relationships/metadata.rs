//! Relationship Metadata - Descriptors for declared relationships

use crate::model::ModelDefinition;

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    /// One-to-one relationship (hasOne)
    HasOne,
    /// One-to-many relationship (hasMany)
    HasMany,
    /// Many-to-one relationship (belongsTo)
    BelongsTo,
}

impl RelationshipType {
    /// Returns true if this relationship returns a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }
}

/// Key assumed when a relation is used without a source model
const DEFAULT_KEY: &str = "id";

/// A declared relationship.
///
/// For `HasMany` / `HasOne` the related rows carry `foreign_key` pointing at
/// the source's `local_key`, which defaults to the source model's primary
/// key. For `BelongsTo` the source carries `foreign_key` and `local_key`
/// names the owner's key on the related side.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub relationship_type: RelationshipType,
    pub related_table: String,
    /// `None` means the source model's connection
    pub related_connection: Option<String>,
    pub foreign_key: String,
    /// `None` until the source model's primary key is known
    pub local_key: Option<String>,
}

impl Relation {
    pub fn has_many<R: ModelDefinition>(foreign_key: &str) -> Self {
        Self::to_related::<R>(RelationshipType::HasMany, foreign_key, None)
    }

    pub fn has_one<R: ModelDefinition>(foreign_key: &str) -> Self {
        Self::to_related::<R>(RelationshipType::HasOne, foreign_key, None)
    }

    pub fn belongs_to<R: ModelDefinition>(foreign_key: &str) -> Self {
        Self::to_related::<R>(RelationshipType::BelongsTo, foreign_key, Some(R::primary_key()))
    }

    fn to_related<R: ModelDefinition>(
        relationship_type: RelationshipType,
        foreign_key: &str,
        local_key: Option<&str>,
    ) -> Self {
        Self {
            relationship_type,
            related_table: R::table().to_string(),
            related_connection: R::connection().map(str::to_string),
            foreign_key: foreign_key.to_string(),
            local_key: local_key.map(str::to_string),
        }
    }

    /// Override the key the foreign key points at
    pub fn local_key(mut self, key: &str) -> Self {
        self.local_key = Some(key.to_string());
        self
    }

    /// Fill in the source model's primary key unless a key was given
    pub fn for_source<S: ModelDefinition>(mut self) -> Self {
        if self.local_key.is_none() {
            self.local_key = Some(S::primary_key().to_string());
        }
        self
    }

    fn key(&self) -> &str {
        self.local_key.as_deref().unwrap_or(DEFAULT_KEY)
    }

    pub fn is_collection(&self) -> bool {
        self.relationship_type.is_collection()
    }

    /// Attribute read from the source record
    pub fn source_key(&self) -> &str {
        match self.relationship_type {
            RelationshipType::HasMany | RelationshipType::HasOne => self.key(),
            RelationshipType::BelongsTo => &self.foreign_key,
        }
    }

    /// Attribute matched on the related records
    pub fn related_key(&self) -> &str {
        match self.relationship_type {
            RelationshipType::HasMany | RelationshipType::HasOne => &self.foreign_key,
            RelationshipType::BelongsTo => self.key(),
        }
    }

    /// Connection the related records live on
    pub fn connection_from<'a>(&'a self, source_connection: &'a str) -> &'a str {
        self.related_connection.as_deref().unwrap_or(source_connection)
    }

    /// Whether both sides live on `source_connection`
    pub fn is_local_to(&self, source_connection: &str) -> bool {
        self.connection_from(source_connection) == source_connection
    }
}
