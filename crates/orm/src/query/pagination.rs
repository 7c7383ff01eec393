//! Query Builder pagination operations

use serde::Serialize;

use super::builder::QueryBuilder;
use crate::backends::Document;
use crate::error::OrmResult;

/// One page of results with the totals needed to render navigation
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
        }
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}

impl QueryBuilder {
    /// Add LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        self.expr.limit = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: u64) -> Self {
        self.expr.offset = Some(count);
        self
    }

    /// LIMIT + OFFSET for a 1-based page number
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        let page = page.max(1);
        self.limit(per_page).offset((page - 1).saturating_mul(per_page))
    }

    /// Fetch one page. The builder is forked: one copy counts the matching
    /// records, the other fetches the page.
    pub async fn paginate(self, per_page: u64, page: u64) -> OrmResult<Page<Document>> {
        let per_page = per_page.max(1);
        let current_page = page.max(1);

        let total = self.clone().count().await?;
        let items = self.for_page(current_page, per_page).get().await?;
        let last_page = total.div_ceil(per_page).max(1);

        Ok(Page {
            items,
            total,
            per_page,
            current_page,
            last_page,
        })
    }
}
