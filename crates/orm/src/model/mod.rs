//! Model layer
//!
//! A [`Model<D>`] is one record of the type described by `D:`
//! [`ModelDefinition`]: its attributes, the attributes as last persisted,
//! the dirty set between the two, and the relations loaded so far. Models
//! hold the registry handle and a connection name and re-resolve the
//! adapter on every operation.

pub mod casts;
pub mod definition;
pub mod lifecycle;
pub mod persistence;
pub mod query;
pub mod relations;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backends::Document;
use crate::database::DatabaseService;
use crate::error::{OrmError, OrmResult};

pub use casts::{Cast, Encrypter};
pub use definition::ModelDefinition;
pub use query::ModelQuery;

pub struct Model<D: ModelDefinition> {
    db: Arc<DatabaseService>,
    attributes: Document,
    original: Document,
    dirty: BTreeSet<String>,
    exists: bool,
    relations: HashMap<String, Value>,
    _definition: PhantomData<fn() -> D>,
}

impl<D: ModelDefinition> Model<D> {
    /// A new, unsaved record
    pub fn new(db: &Arc<DatabaseService>) -> Self {
        Self {
            db: Arc::clone(db),
            attributes: Document::new(),
            original: Document::new(),
            dirty: BTreeSet::new(),
            exists: false,
            relations: HashMap::new(),
            _definition: PhantomData,
        }
    }

    /// A new record with mass-assigned attributes
    pub fn make(db: &Arc<DatabaseService>, attributes: Document) -> Self {
        let mut model = Self::new(db);
        model.fill(attributes);
        model
    }

    /// Mass-assign, then save
    pub async fn create(db: &Arc<DatabaseService>, attributes: Document) -> OrmResult<Self> {
        let mut model = Self::make(db, attributes);
        model.save().await?;
        Ok(model)
    }

    pub async fn find<T: Into<Value>>(db: &Arc<DatabaseService>, id: T) -> OrmResult<Option<Self>> {
        D::query(db).find(id).await
    }

    pub async fn find_or_fail<T: Into<Value>>(db: &Arc<DatabaseService>, id: T) -> OrmResult<Self> {
        D::query(db).find_or_fail(id).await
    }

    /// Build a persisted record from a stored document, applying casts
    pub fn hydrate(db: &Arc<DatabaseService>, document: Document) -> OrmResult<Self> {
        let mut model = Self::new(db);
        model.attributes = model.cast_from_storage(document)?;
        if model.id().map_or(true, Value::is_null) {
            return Err(OrmError::UnidentifiableDocument {
                table: D::table().to_string(),
                reason: format!("missing primary key '{}'", D::primary_key()),
            });
        }
        model.original = model.attributes.clone();
        model.exists = true;
        Ok(model)
    }

    fn cast_from_storage(&self, document: Document) -> OrmResult<Document> {
        let encrypter = self.db.encrypter().map(|e| e.as_ref());
        let mut attributes = Document::new();
        for (key, value) in document {
            let value = match D::cast_for(&key) {
                Some(cast) => cast.from_storage(&key, value, encrypter)?,
                None => value,
            };
            attributes.insert(key, value);
        }
        Ok(attributes)
    }

    pub(crate) fn cast_to_storage<'a>(
        &self,
        attributes: impl Iterator<Item = (&'a String, &'a Value)>,
    ) -> OrmResult<Document> {
        let encrypter = self.db.encrypter().map(|e| e.as_ref());
        let mut stored = Document::new();
        for (key, value) in attributes {
            let value = match D::cast_for(key) {
                Some(cast) => cast.to_storage(key, value, encrypter)?,
                None => value.clone(),
            };
            stored.insert(key.clone(), value);
        }
        Ok(stored)
    }

    /// Assign fillable, unguarded attributes; everything else is ignored
    pub fn fill(&mut self, attributes: Document) -> &mut Self {
        for (key, value) in attributes {
            if D::is_fillable(&key) {
                self.set_attribute(&key, value);
            }
        }
        self
    }

    pub fn set<T: Into<Value>>(&mut self, key: &str, value: T) -> &mut Self {
        self.set_attribute(key, value.into());
        self
    }

    /// Assign one attribute regardless of the fillable policy
    pub fn set_attribute(&mut self, key: &str, value: Value) {
        if self.original.get(key) == Some(&value) {
            self.dirty.remove(key);
        } else {
            self.dirty.insert(key.to_string());
        }
        self.attributes.insert(key.to_string(), value);
    }

    pub fn get_attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Typed read of one attribute; `None` when absent or null
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> OrmResult<Option<T>> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                OrmError::Serialization(format!("attribute '{}': {}", key, e))
            }),
        }
    }

    pub fn id(&self) -> Option<&Value> {
        self.attributes.get(D::primary_key())
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn attributes(&self) -> &Document {
        &self.attributes
    }

    pub fn original(&self) -> &Document {
        &self.original
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn is_dirty_attribute(&self, key: &str) -> bool {
        self.dirty.contains(key)
    }

    pub fn dirty_attributes(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    /// Changed attributes and their current values
    pub fn get_dirty(&self) -> Document {
        self.dirty
            .iter()
            .filter_map(|key| self.attributes.get(key).map(|v| (key.clone(), v.clone())))
            .collect()
    }

    pub fn database(&self) -> &Arc<DatabaseService> {
        &self.db
    }

    pub fn connection_name(&self) -> &str {
        D::connection().unwrap_or_else(|| self.db.default_connection())
    }

    /// Attributes plus every loaded relation
    pub fn to_document(&self) -> Document {
        let mut document = self.attributes.clone();
        for (name, value) in &self.relations {
            document.insert(name.clone(), value.clone());
        }
        document
    }

    /// [`Model::to_document`] without guarded and hidden attributes
    pub fn strip_sensitive_data(&self) -> Document {
        let mut document = self.to_document();
        for key in D::guarded().iter().chain(D::hidden()) {
            document.remove(*key);
        }
        document
    }

    fn sync_original(&mut self) {
        self.original = self.attributes.clone();
        self.dirty.clear();
    }
}

impl<D: ModelDefinition> Clone for Model<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            attributes: self.attributes.clone(),
            original: self.original.clone(),
            dirty: self.dirty.clone(),
            exists: self.exists,
            relations: self.relations.clone(),
            _definition: PhantomData,
        }
    }
}

impl<D: ModelDefinition> fmt::Debug for Model<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("table", &D::table())
            .field("attributes", &self.attributes)
            .field("dirty", &self.dirty)
            .field("exists", &self.exists)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, DatabaseConfig};
    use serde_json::json;

    struct User;

    impl ModelDefinition for User {
        fn table() -> &'static str {
            "users"
        }

        fn fillable() -> &'static [&'static str] {
            &["name", "email", "is_admin"]
        }

        fn guarded() -> &'static [&'static str] {
            &["is_admin"]
        }

        fn hidden() -> &'static [&'static str] {
            &["password"]
        }

        fn casts() -> &'static [(&'static str, Cast)] {
            &[("age", Cast::Integer), ("tags", Cast::Array)]
        }
    }

    fn db() -> Arc<DatabaseService> {
        DatabaseService::register(DatabaseConfig::new("default", ConnectionConfig::memory()))
            .unwrap()
            .into_shared()
    }

    fn document(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fill_respects_guarded() {
        let user = Model::<User>::make(
            &db(),
            document(json!({"name": "John", "is_admin": true, "unknown": 1})),
        );
        assert_eq!(user.get_attribute("name"), Some(&json!("John")));
        assert!(user.get_attribute("is_admin").is_none());
        assert!(user.get_attribute("unknown").is_none());
    }

    #[test]
    fn test_direct_setter_bypasses_policy() {
        let mut user = Model::<User>::new(&db());
        user.set("is_admin", true);
        assert_eq!(user.get::<bool>("is_admin").unwrap(), Some(true));
    }

    #[test]
    fn test_hydrate_applies_casts_and_tracks_dirty() {
        let mut user = Model::<User>::hydrate(
            &db(),
            document(json!({"id": "u1", "name": "Jane", "age": "31", "tags": "[\"a\"]"})),
        )
        .unwrap();
        assert_eq!(user.get_attribute("age"), Some(&json!(31)));
        assert_eq!(user.get_attribute("tags"), Some(&json!(["a"])));
        assert!(!user.is_dirty());

        user.set("name", "Janet");
        assert_eq!(user.get_dirty(), document(json!({"name": "Janet"})));

        user.set("name", "Jane");
        assert!(!user.is_dirty());
    }

    #[test]
    fn test_hydrate_without_primary_key_fails() {
        let error = Model::<User>::hydrate(&db(), document(json!({"name": "Ghost"}))).unwrap_err();
        assert!(matches!(error, OrmError::UnidentifiableDocument { .. }));
    }

    #[test]
    fn test_strip_sensitive_data() {
        let user = Model::<User>::hydrate(
            &db(),
            document(json!({"id": "u1", "name": "Jane", "password": "x", "is_admin": false})),
        )
        .unwrap();
        let public = user.strip_sensitive_data();
        assert!(public.contains_key("name"));
        assert!(!public.contains_key("password"));
        assert!(!public.contains_key("is_admin"));
    }
}
