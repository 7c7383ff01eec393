//! Typed queries returning hydrated models

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use super::{Model, ModelDefinition};
use crate::backends::Document;
use crate::database::DatabaseService;
use crate::error::{OrmError, OrmResult};
use crate::query::{Page, QueryBuilder};

/// A [`QueryBuilder`] bound to a model's table and connection
pub struct ModelQuery<D: ModelDefinition> {
    builder: QueryBuilder,
    unknown_relation: Option<String>,
    _definition: PhantomData<fn() -> D>,
}

impl<D: ModelDefinition> ModelQuery<D> {
    pub fn new(db: &Arc<DatabaseService>) -> Self {
        Self {
            builder: QueryBuilder::new(
                Arc::clone(db),
                D::connection().map(str::to_string),
                D::table(),
            )
            .primary_key(D::primary_key()),
            unknown_relation: None,
            _definition: PhantomData,
        }
    }

    /// Apply arbitrary builder calls
    pub fn scope(mut self, f: impl FnOnce(QueryBuilder) -> QueryBuilder) -> Self {
        self.builder = f(self.builder);
        self
    }

    pub fn where_eq<T: Into<Value>>(self, column: &str, value: T) -> Self {
        self.scope(|b| b.where_eq(column, value))
    }

    pub fn where_op<T: Into<Value>>(self, column: &str, operator: &str, value: T) -> Self {
        self.scope(|b| b.where_op(column, operator, value))
    }

    pub fn where_in<T: Into<Value>>(self, column: &str, values: Vec<T>) -> Self {
        self.scope(|b| b.where_in(column, values))
    }

    pub fn where_null(self, column: &str) -> Self {
        self.scope(|b| b.where_null(column))
    }

    pub fn order_by(self, column: &str) -> Self {
        self.scope(|b| b.order_by(column))
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.scope(|b| b.order_by_desc(column))
    }

    pub fn limit(self, count: u64) -> Self {
        self.scope(|b| b.limit(count))
    }

    /// Eagerly load a declared relationship
    pub fn with(mut self, name: &str) -> Self {
        match D::relation(name) {
            Some(relation) => self.scope(|b| b.with_relation(name, relation.for_source::<D>())),
            None => {
                self.unknown_relation.get_or_insert_with(|| name.to_string());
                self
            }
        }
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn into_builder(self) -> QueryBuilder {
        self.builder
    }

    fn check(&self) -> OrmResult<()> {
        match &self.unknown_relation {
            Some(name) => Err(OrmError::Relationship(format!(
                "'{}' has no relationship named '{}'",
                D::table(),
                name
            ))),
            None => Ok(()),
        }
    }

    /// Hydrate one record, moving eager-loaded relations into the model's
    /// relation cache
    fn hydrate(db: &Arc<DatabaseService>, eager: &[String], mut document: Document) -> OrmResult<Model<D>> {
        let loaded: Vec<(String, Value)> = eager
            .iter()
            .map(|name| {
                let value = document.remove(name).unwrap_or(Value::Null);
                (name.clone(), value)
            })
            .collect();
        let mut model = Model::<D>::hydrate(db, document)?;
        for (name, value) in loaded {
            model.set_relation(&name, value);
        }
        Ok(model)
    }

    pub async fn get(self) -> OrmResult<Vec<Model<D>>> {
        self.check()?;
        let db = Arc::clone(self.builder.database());
        let eager: Vec<String> = self.builder.eager_loads().into_iter().map(str::to_string).collect();
        self.builder
            .get()
            .await?
            .into_iter()
            .map(|document| Self::hydrate(&db, &eager, document))
            .collect()
    }

    pub async fn first(self) -> OrmResult<Option<Model<D>>> {
        Ok(self.limit(1).get().await?.into_iter().next())
    }

    pub async fn find<T: Into<Value>>(self, id: T) -> OrmResult<Option<Model<D>>> {
        self.where_eq(D::primary_key(), id).first().await
    }

    pub async fn find_or_fail<T: Into<Value>>(self, id: T) -> OrmResult<Model<D>> {
        let id = id.into();
        let label = match &id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        self.find(id)
            .await?
            .ok_or_else(|| OrmError::not_found(D::table(), Some(label)))
    }

    pub async fn count(self) -> OrmResult<u64> {
        self.builder.count().await
    }

    pub async fn exists(self) -> OrmResult<bool> {
        self.builder.exists().await
    }

    pub async fn paginate(self, per_page: u64, page: u64) -> OrmResult<Page<Model<D>>> {
        self.check()?;
        let db = Arc::clone(self.builder.database());
        let eager: Vec<String> = self.builder.eager_loads().into_iter().map(str::to_string).collect();
        let page = self.builder.paginate(per_page, page).await?;
        let mut hydrated = Vec::with_capacity(page.items.len());
        for document in page.items {
            hydrated.push(Self::hydrate(&db, &eager, document)?);
        }
        Ok(Page {
            items: hydrated,
            total: page.total,
            per_page: page.per_page,
            current_page: page.current_page,
            last_page: page.last_page,
        })
    }
}

impl<D: ModelDefinition> Clone for ModelQuery<D> {
    fn clone(&self) -> Self {
        Self {
            builder: self.builder.clone(),
            unknown_relation: self.unknown_relation.clone(),
            _definition: PhantomData,
        }
    }
}
