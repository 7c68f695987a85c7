//! Declarative allow-list definitions.
//!
//! A handler declares up front which filter names, comparison operators,
//! sort fields and pagination limits a client may use. Everything a request
//! supplies is checked against these definitions before any query runs.
//!
//! ```rust
//! use querytk::{Comparison, Definitions, FilterDef, PaginationDef, SortDef};
//!
//! let definitions = Definitions::new()
//!     .filter(FilterDef::new("status").comparisons([Comparison::Eq, Comparison::In]))
//!     .filter(FilterDef::new("vehicle_year").column("v.year"))
//!     .sort(SortDef::new("created_at"))
//!     .pagination(PaginationDef::new().max_entries(50));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Comparison operators a filter may use. This set is closed: the wire
/// grammar `filter[<name>][<comparison>]=<value>` only ever accepts these
/// nine tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Eq,
    Neq,
    Gt,
    Gteq,
    Lt,
    Lteq,
    In,
    Nin,
    Like,
}

impl Comparison {
    /// Every known comparison, in wire order.
    pub const ALL: [Comparison; 9] = [
        Comparison::Eq,
        Comparison::Neq,
        Comparison::Gt,
        Comparison::Gteq,
        Comparison::Lt,
        Comparison::Lteq,
        Comparison::In,
        Comparison::Nin,
        Comparison::Like,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Comparison::Eq => "eq",
            Comparison::Neq => "neq",
            Comparison::Gt => "gt",
            Comparison::Gteq => "gteq",
            Comparison::Lt => "lt",
            Comparison::Lteq => "lteq",
            Comparison::In => "in",
            Comparison::Nin => "nin",
            Comparison::Like => "like",
        }
    }

    /// Parses a wire token. Returns `None` for anything outside the closed
    /// set; callers decide whether that is a validation failure or a skip.
    #[must_use]
    pub fn parse(token: &str) -> Option<Comparison> {
        Comparison::ALL.into_iter().find(|c| c.as_str() == token)
    }

    /// True for `in`/`nin`, whose values are comma-separated lists.
    #[must_use]
    pub const fn is_multi_valued(self) -> bool {
        matches!(self, Comparison::In | Comparison::Nin)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort directions accepted by the `sort[<name>]=<direction>` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Asc, Direction::Desc];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }

    #[must_use]
    pub fn parse(token: &str) -> Option<Direction> {
        Direction::ALL.into_iter().find(|d| d.as_str() == token)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares one filter a client is allowed to use.
///
/// Immutable once built. By default every comparison is allowed, values are
/// unconstrained and the filter is applied to the query builder
/// automatically.
#[derive(Debug, Clone)]
pub struct FilterDef {
    name: String,
    allowed_comparisons: Vec<Comparison>,
    enum_values: Vec<String>,
    column: Option<String>,
    auto_apply: bool,
}

impl FilterDef {
    /// # Panics
    ///
    /// Panics if `name` is empty; an empty filter name is a programming
    /// error in the endpoint declaration, not a request-time condition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "filter definitions require a name");
        Self {
            name,
            allowed_comparisons: Comparison::ALL.to_vec(),
            enum_values: Vec::new(),
            column: None,
            auto_apply: true,
        }
    }

    /// Restricts which comparisons the client may use with this filter.
    #[must_use]
    pub fn comparisons(mut self, comparisons: impl IntoIterator<Item = Comparison>) -> Self {
        self.allowed_comparisons = comparisons.into_iter().collect();
        self
    }

    /// Restricts the filter to an enumerated set of allowed values. An empty
    /// set (the default) means unconstrained.
    #[must_use]
    pub fn enum_values<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>) -> Self {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the query-builder target for this filter. Use a dotted name
    /// (e.g. `"v.year"`) to address a joined or aliased table; by default the
    /// filter name is used as a column on the root table.
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// When set to `false` the filter is still declared (documented and
    /// validated) but never applied to the query builder automatically; the
    /// handler is expected to consume it manually, e.g. for a search that
    /// spans several columns.
    #[must_use]
    pub fn auto_apply(mut self, auto_apply: bool) -> Self {
        self.auto_apply = auto_apply;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn allowed_comparisons(&self) -> &[Comparison] {
        &self.allowed_comparisons
    }

    #[must_use]
    pub fn allowed_values(&self) -> &[String] {
        &self.enum_values
    }

    #[must_use]
    pub fn column_override(&self) -> Option<&str> {
        self.column.as_deref().filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn is_auto_apply(&self) -> bool {
        self.auto_apply
    }

    /// One-line summary used in validation error messages, e.g.
    /// `status (comparisons: eq, in // values: open, closed)`.
    pub(crate) fn describe(&self) -> String {
        let comparisons = self
            .allowed_comparisons
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut hints = vec![format!("comparisons: {comparisons}")];
        if !self.enum_values.is_empty() {
            hints.push(format!("values: {}", self.enum_values.join(", ")));
        }
        format!("{} ({})", self.name, hints.join(" // "))
    }
}

/// Declares one sort field a client is allowed to use.
#[derive(Debug, Clone)]
pub struct SortDef {
    name: String,
    allowed_directions: Vec<Direction>,
    column: Option<String>,
    auto_apply: bool,
}

impl SortDef {
    /// # Panics
    ///
    /// Panics if `name` is empty.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "sort definitions require a name");
        Self {
            name,
            allowed_directions: Direction::ALL.to_vec(),
            column: None,
            auto_apply: true,
        }
    }

    /// Restricts the allowed sort directions, e.g. descending only.
    #[must_use]
    pub fn directions(mut self, directions: impl IntoIterator<Item = Direction>) -> Self {
        self.allowed_directions = directions.into_iter().collect();
        self
    }

    /// Overrides the query-builder target, same semantics as
    /// [`FilterDef::column`].
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// Same semantics as [`FilterDef::auto_apply`].
    #[must_use]
    pub fn auto_apply(mut self, auto_apply: bool) -> Self {
        self.auto_apply = auto_apply;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn allowed_directions(&self) -> &[Direction] {
        &self.allowed_directions
    }

    #[must_use]
    pub fn column_override(&self) -> Option<&str> {
        self.column.as_deref().filter(|c| !c.is_empty())
    }

    #[must_use]
    pub fn is_auto_apply(&self) -> bool {
        self.auto_apply
    }

    pub(crate) fn describe(&self) -> String {
        let directions = self
            .allowed_directions
            .iter()
            .map(|d| d.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} ({directions})", self.name)
    }
}

/// Declares that an endpoint is paginatable via the `limit` parameter.
#[derive(Debug, Clone, Default)]
pub struct PaginationDef {
    max_entries: Option<u64>,
}

impl PaginationDef {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the page size used when the client does not send a `limit`
    /// parameter. Without a cap the endpoint is unbounded by default.
    #[must_use]
    pub fn max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    #[must_use]
    pub fn max(&self) -> Option<u64> {
        self.max_entries
    }
}

/// The full set of definitions attached to one endpoint, in declaration
/// order. This is what an attribute/metadata layer would resolve and hand to
/// [`crate::ApiService::register`].
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    pub(crate) filters: Vec<FilterDef>,
    pub(crate) sorts: Vec<SortDef>,
    pub(crate) pagination: Option<PaginationDef>,
}

impl Definitions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: FilterDef) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: SortDef) -> Self {
        self.sorts.push(sort);
        self
    }

    #[must_use]
    pub fn pagination(mut self, pagination: PaginationDef) -> Self {
        self.pagination = Some(pagination);
        self
    }
}
