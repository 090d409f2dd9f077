//! Listing queries: SQL compilation and a fluent builder.

use crate::store::TaskStore;
use crate::types::{SortKey, SortOrder, StatusFilter, Task, TaskQuery};
use eyre::Result;
use rusqlite::types::Value;

/// Columns the search term is matched against.
const SEARCH_COLUMNS: [&str; 3] = ["title", "description", "category"];

/// A `TaskQuery` turned into SQL fragments plus positional parameters.
///
/// Only fixed column names are ever spliced into the SQL text; every
/// client-supplied value travels as a parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    conditions: Vec<String>,
    params: Vec<Value>,
    order: String,
}

impl CompiledQuery {
    pub fn compile(query: &TaskQuery) -> Self {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(term) = query.search_term() {
            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
            let any_column = SEARCH_COLUMNS
                .iter()
                .map(|column| format!("casefold({}) LIKE ? ESCAPE '\\'", column))
                .collect::<Vec<_>>()
                .join(" OR ");
            conditions.push(format!("({})", any_column));
            params.extend(SEARCH_COLUMNS.iter().map(|_| Value::Text(pattern.clone())));
        }

        if let Some(completed) = query.status.completed() {
            conditions.push("completed = ?".to_string());
            params.push(Value::Integer(i64::from(completed)));
        }

        if let Some(category) = query.category_filter() {
            conditions.push("category = ?".to_string());
            params.push(Value::Text(category.to_string()));
        }

        let direction = query.sort_order.keyword();
        // id breaks ties so equal sort values come back in a stable order
        let order = match query.sort_by {
            SortKey::Id => format!("id {}", direction),
            key => format!("{} {}, id {}", key.column(), direction, direction),
        };

        Self {
            conditions,
            params,
            order,
        }
    }

    /// ` WHERE ...` with a leading space, or empty when nothing is filtered.
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// Body of the ORDER BY clause.
    pub fn order_clause(&self) -> &str {
        &self.order
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Escape LIKE wildcards so the term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Query builder for fluent queries.
pub struct Query<'a> {
    store: &'a TaskStore,
    query: TaskQuery,
}

impl<'a> Query<'a> {
    /// Start an unfiltered query against `store`.
    pub(crate) fn new(store: &'a TaskStore) -> Self {
        Self {
            store,
            query: TaskQuery::new(),
        }
    }

    /// Case-insensitive substring across title, description and category.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.query = self.query.search(term);
        self
    }

    /// Filter by completion status.
    pub fn status(mut self, status: StatusFilter) -> Self {
        self.query = self.query.status(status);
        self
    }

    /// Filter by exact category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.query = self.query.category(category);
        self
    }

    /// Sort by this column.
    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.query = self.query.sort_by(key);
        self
    }

    /// Sort direction.
    pub fn sort_order(mut self, order: SortOrder) -> Self {
        self.query = self.query.sort_order(order);
        self
    }

    /// Execute the query and return matching tasks.
    pub fn execute(self) -> Result<Vec<Task>> {
        self.store.list_tasks(Some(&self.query))
    }

    /// Count matching tasks without fetching them.
    pub fn count(self) -> Result<usize> {
        self.store.count_tasks(&self.query)
    }
}

/// Extension trait to add query method to TaskStore.
pub trait StoreQueryExt {
    /// Start building a query.
    fn query(&self) -> Query<'_>;
}

impl StoreQueryExt for TaskStore {
    fn query(&self) -> Query<'_> {
        Query::new(self)
    }
}
