//! Queries over a collection.
//!
//! A [`Query`] carries two renderings of the same filter: a predicate the
//! local cache evaluates directly, and the backend query expression sent over
//! the wire. Translating host-language expressions into backend expressions
//! is left to the caller.

use crate::entity::Entity;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A shareable entity predicate.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// A filter over a collection with optional sort, skip and limit modifiers.
///
/// # Example
///
/// ```rust,ignore
/// let open = Query::filter(r#"{"done": false}"#, |t: &Task| !t.done)
///     .limit(20);
/// assert!(open.has_modifiers());
/// ```
pub struct Query<T> {
    predicate: Option<Predicate<T>>,
    expression: Option<String>,
    sort: Option<(String, Comparator<T>)>,
    skip: Option<usize>,
    limit: Option<usize>,
}

impl<T> Query<T> {
    /// A query matching every entity.
    pub fn all() -> Self {
        Self {
            predicate: None,
            expression: None,
            sort: None,
            skip: None,
            limit: None,
        }
    }

    /// A query with a backend expression and the equivalent local predicate.
    pub fn filter<F>(expression: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(predicate)),
            expression: Some(expression.into()),
            ..Self::all()
        }
    }

    /// Orders results. `expression` is the backend sort document.
    pub fn sort_by<F>(mut self, expression: impl Into<String>, compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some((expression.into(), Arc::new(compare)));
        self
    }

    /// Skips the first `n` results.
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = Some(n);
        self
    }

    /// Returns at most `n` results.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Returns the backend filter expression, if any.
    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    /// Returns the skip modifier.
    pub fn skip_count(&self) -> Option<usize> {
        self.skip
    }

    /// Returns the limit modifier.
    pub fn limit_count(&self) -> Option<usize> {
        self.limit
    }

    /// Returns true if a skip or limit modifier is present.
    ///
    /// Paged queries cannot be fetched incrementally.
    pub fn has_modifiers(&self) -> bool {
        self.skip.is_some() || self.limit.is_some()
    }

    /// Returns true if the entity satisfies the filter. Modifiers are ignored.
    pub fn matches(&self, entity: &T) -> bool {
        self.predicate.as_ref().map_or(true, |p| p(entity))
    }

    /// Applies filter, sort, skip and limit to a set of entities.
    pub fn apply(&self, entities: impl IntoIterator<Item = T>) -> Vec<T> {
        let mut matched: Vec<T> = entities.into_iter().filter(|e| self.matches(e)).collect();

        if let Some((_, compare)) = &self.sort {
            matched.sort_by(|a, b| compare(a, b));
        }

        matched
            .into_iter()
            .skip(self.skip.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Renders the backend query string.
    ///
    /// The expression is normalized so that formatting differences do not
    /// produce distinct strings. Empty for [`Query::all`].
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::new();

        if let Some(expr) = &self.expression {
            parts.push(format!("query={}", normalize_expression(expr)));
        }
        if let Some((expr, _)) = &self.sort {
            parts.push(format!("sort={}", normalize_expression(expr)));
        }
        if let Some(skip) = self.skip {
            parts.push(format!("skip={skip}"));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit={limit}"));
        }

        parts.join("&")
    }
}

impl<T: Entity> Query<T> {
    /// A query matching the given IDs (`{"_id": {"$in": [...]}}`).
    pub fn ids_in(ids: &[String]) -> Self {
        let expression = format!(
            r#"{{"_id":{{"$in":[{}]}}}}"#,
            ids.iter()
                .map(|id| format!("\"{}\"", escape_string(id)))
                .collect::<Vec<_>>()
                .join(",")
        );
        let wanted: HashSet<String> = ids.iter().cloned().collect();

        Self::filter(expression, move |entity: &T| {
            entity.id().is_some_and(|id| wanted.contains(id))
        })
    }
}

impl<T> Default for Query<T> {
    fn default() -> Self {
        Self::all()
    }
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            expression: self.expression.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("expression", &self.expression)
            .field("sort", &self.sort.as_ref().map(|(expr, _)| expr))
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .finish()
    }
}

/// Escapes `"` and `\` for use inside a string literal of an expression.
fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Removes insignificant whitespace from a JSON-like expression.
///
/// Whitespace inside string literals is preserved.
pub fn normalize_expression(expression: &str) -> String {
    let mut out = String::with_capacity(expression.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in expression.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if !c.is_whitespace() {
            out.push(c);
        }
    }

    out
}
