//! The per-request orchestrator.
//!
//! [`ApiService`] owns everything request-scoped: the raw parameters, the
//! definitions the endpoint registered, the parsed field collections and
//! the pagination state. One instance per request, no sharing.
//!
//! Lifecycle: **unconfigured** (built from the request, usually via the
//! axum extractor) → **registered** ([`ApiService::register`], idempotent,
//! validates the request against the allow-list and fails fast) →
//! **fields parsed** (lazy, on first access, cached for the rest of the
//! request) → **applied** ([`ApiService::apply_to_query_builder`], filters
//! then sorts then pagination).
//!
//! ```rust,no_run
//! use axum::{Json, extract::State};
//! use querytk::{ApiError, ApiService, Comparison, Definitions, FilterDef, FindByRequest,
//!     PaginationDef, SortDef};
//! use sea_orm::DatabaseConnection;
//! # mod task { pub use sea_orm::entity::prelude::*;
//! # #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
//! # #[sea_orm(table_name = "task")]
//! # pub struct Model { #[sea_orm(primary_key)] pub id: i32 }
//! # #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)] pub enum Relation {}
//! # impl ActiveModelBehavior for ActiveModel {} }
//!
//! async fn list_tasks(
//!     mut api: ApiService,
//!     State(db): State<DatabaseConnection>,
//! ) -> Result<(axum::http::HeaderMap, Json<Vec<task::Model>>), ApiError> {
//!     api.register(
//!         Definitions::new()
//!             .filter(FilterDef::new("status").comparisons([Comparison::Eq, Comparison::In]))
//!             .sort(SortDef::new("created_at"))
//!             .pagination(PaginationDef::new().max_entries(50)),
//!     )?;
//!     let tasks = task::Entity::find_by_request(&db, &mut api).await?;
//!     Ok((api.pagination_headers(), Json(tasks)))
//! }
//! ```

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use sea_orm::DatabaseConnection;
use sea_orm::sea_query::SelectStatement;
use std::convert::Infallible;

use crate::definitions::{Comparison, Definitions, FilterDef, PaginationDef, SortDef};
use crate::errors::ApiError;
use crate::filter::{self, FilterField};
use crate::pagination::{self, PaginationState, total_header};
use crate::params::RequestParams;
use crate::sort::{self, SortField};

/// Per-request filter/sort/pagination coordinator.
#[derive(Debug, Default)]
pub struct ApiService {
    params: RequestParams,
    filters: Vec<FilterDef>,
    sorts: Vec<SortDef>,
    pagination: Option<PaginationDef>,
    registered: bool,
    // None = not yet parsed; Some(vec![]) = parsed, nothing requested.
    filter_fields: Option<Vec<FilterField>>,
    sort_fields: Option<Vec<SortField>>,
    pagination_state: Option<PaginationState>,
    filter_parse_runs: u32,
    sort_parse_runs: u32,
}

impl ApiService {
    #[must_use]
    pub fn new(params: RequestParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    /// Registers the endpoint's definitions and validates the request
    /// against them, before any data access. Duplicate calls (forwarded or
    /// sub-requests handled through the same service) are ignored.
    ///
    /// # Errors
    ///
    /// Filter, sort or pagination errors when the request falls outside the
    /// declared allow-list.
    pub fn register(&mut self, definitions: Definitions) -> Result<(), ApiError> {
        if self.registered {
            return Ok(());
        }
        self.registered = true;

        self.handle_allowed_filters(definitions.filters)?;
        self.handle_allowed_sorts(definitions.sorts)?;
        if let Some(pagination) = definitions.pagination {
            self.handle_is_paginatable(pagination);
        }
        // Fail fast on a limit parameter the endpoint does not support.
        self.ensure_pagination_parsed()?;
        Ok(())
    }

    /// Stores the allowed filters and checks every requested filter field
    /// against them.
    ///
    /// # Errors
    ///
    /// A filter error naming the offending field and the full allowed set.
    pub fn handle_allowed_filters(&mut self, filters: Vec<FilterDef>) -> Result<(), ApiError> {
        self.filters = filters;
        self.ensure_filters_parsed();
        let fields = self.filter_fields.as_deref().unwrap_or_default();
        filter::check_allowed(fields, &self.filters)
    }

    /// Stores the allowed sorts and checks every requested sort field
    /// against them.
    ///
    /// # Errors
    ///
    /// A sort error naming the offending field and the full allowed set.
    pub fn handle_allowed_sorts(&mut self, sorts: Vec<SortDef>) -> Result<(), ApiError> {
        self.sorts = sorts;
        self.ensure_sorts_parsed();
        let fields = self.sort_fields.as_deref().unwrap_or_default();
        sort::check_allowed(fields, &self.sorts)
    }

    /// Marks the endpoint as paginatable. Without this, a `limit`
    /// parameter in the request is an error.
    pub fn handle_is_paginatable(&mut self, pagination: PaginationDef) {
        self.pagination = Some(pagination);
        // Re-resolve on next access so max_entries from this definition is
        // picked up.
        self.pagination_state = None;
    }

    fn ensure_filters_parsed(&mut self) {
        if self.filter_fields.is_none() {
            self.filter_parse_runs += 1;
            self.filter_fields = Some(filter::parse_fields(&self.params, &self.filters));
        }
    }

    fn ensure_sorts_parsed(&mut self) {
        if self.sort_fields.is_none() {
            self.sort_parse_runs += 1;
            self.sort_fields = Some(sort::parse_fields(&self.params, &self.sorts));
        }
    }

    fn ensure_pagination_parsed(&mut self) -> Result<&mut PaginationState, ApiError> {
        if self.pagination_state.is_none() {
            self.pagination_state = Some(pagination::parse(
                self.params.limit(),
                self.pagination.as_ref(),
            )?);
        }
        // Just assigned above when it was None.
        Ok(self.pagination_state.get_or_insert_with(PaginationState::default))
    }

    /// All filter fields requested by the client, parsed on first access.
    pub fn filtered_fields(&mut self) -> &[FilterField] {
        self.ensure_filters_parsed();
        self.filter_fields.as_deref().unwrap_or_default()
    }

    /// True if a filter with this name was requested.
    pub fn has_filtered_field(&mut self, name: &str) -> bool {
        self.filtered_field(name).is_some()
    }

    /// The first requested filter field with this name.
    pub fn filtered_field(&mut self, name: &str) -> Option<&FilterField> {
        self.filtered_fields().iter().find(|f| f.name() == name)
    }

    /// The first requested filter field with this name and comparison.
    pub fn filtered_field_with(&mut self, name: &str, comparison: Comparison) -> Option<&FilterField> {
        self.filtered_fields()
            .iter()
            .find(|f| f.name() == name && f.comparison() == Some(comparison))
    }

    /// All sort fields requested by the client, parsed on first access.
    pub fn sorted_fields(&mut self) -> &[SortField] {
        self.ensure_sorts_parsed();
        self.sort_fields.as_deref().unwrap_or_default()
    }

    /// True if a sort with this name was requested.
    pub fn has_sorted_field(&mut self, name: &str) -> bool {
        self.sorted_field(name).is_some()
    }

    /// The requested sort field with this name.
    pub fn sorted_field(&mut self, name: &str) -> Option<&SortField> {
        self.sorted_fields().iter().find(|f| f.name() == name)
    }

    /// The resolved pagination offset (0 unless the client sent
    /// `limit=<offset>,<N>`).
    ///
    /// # Errors
    ///
    /// A pagination error when the `limit` parameter is malformed or not
    /// available on this endpoint.
    pub fn pagination_offset(&mut self) -> Result<u64, ApiError> {
        Ok(self.ensure_pagination_parsed()?.offset())
    }

    /// The resolved pagination limit; `None` means unbounded.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ApiService::pagination_offset`].
    pub fn pagination_limit(&mut self) -> Result<Option<u64>, ApiError> {
        Ok(self.ensure_pagination_parsed()?.limit())
    }

    /// The total row count, once pagination was applied (or a total was set
    /// manually).
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.pagination_state.as_ref().and_then(PaginationState::total)
    }

    /// Records the total row count. Only needed when
    /// [`ApiService::apply_to_query_builder`] is not used and the handler
    /// runs its own count query.
    pub fn set_total(&mut self, total: u64) {
        self.pagination_state
            .get_or_insert_with(PaginationState::default)
            .set_total(total);
    }

    /// Response headers for the client: the pagination total, when one was
    /// computed.
    #[must_use]
    pub fn pagination_headers(&self) -> HeaderMap {
        self.total().map(total_header).unwrap_or_default()
    }

    /// Applies all requested filter fields to the select.
    pub fn apply_filters_to(&mut self, query: &mut SelectStatement) {
        self.ensure_filters_parsed();
        for field in self.filter_fields.as_deref().unwrap_or_default() {
            field.apply_to_query_builder(query);
        }
    }

    /// Applies all requested sort fields to the select, in parse order.
    pub fn apply_sorts_to(&mut self, query: &mut SelectStatement) {
        self.ensure_sorts_parsed();
        for field in self.sort_fields.as_deref().unwrap_or_default() {
            field.apply_to_query_builder(query);
        }
    }

    /// Applies pagination to the select, computing the total on `db`.
    /// No-op unless the endpoint registered a [`PaginationDef`].
    ///
    /// # Errors
    ///
    /// A pagination error when the `limit` parameter is malformed.
    pub async fn apply_pagination_to(
        &mut self,
        db: &DatabaseConnection,
        query: &mut SelectStatement,
    ) -> Result<(), ApiError> {
        if self.pagination.is_none() {
            return Ok(());
        }
        let state = self.ensure_pagination_parsed()?;
        pagination::apply_to_query_builder(state, db, query).await;
        Ok(())
    }

    /// Applies everything to the select in the fixed order filters, then
    /// sorts, then pagination.
    ///
    /// # Errors
    ///
    /// A pagination error when the `limit` parameter is malformed.
    pub async fn apply_to_query_builder(
        &mut self,
        db: &DatabaseConnection,
        query: &mut SelectStatement,
    ) -> Result<(), ApiError> {
        self.apply_filters_to(query);
        self.apply_sorts_to(query);
        self.apply_pagination_to(db, query).await
    }
}

impl<S> FromRequestParts<S> for ApiService
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let params = RequestParams::from_request_parts(parts, state).await?;
        Ok(Self::new(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::Direction;
    use sea_orm::sea_query::{Alias, Query, SqliteQueryBuilder};

    fn base_query() -> SelectStatement {
        Query::select()
            .column(Alias::new("id"))
            .from(Alias::new("task"))
            .to_owned()
    }

    #[test]
    fn parsing_is_memoized_per_request() {
        let mut service = ApiService::new(RequestParams::from_query(
            "filter[status][eq]=open&sort[name]=asc",
        ));
        assert_eq!(service.filter_parse_runs, 0);
        assert_eq!(service.filtered_fields().len(), 1);
        assert_eq!(service.filtered_fields().len(), 1);
        assert!(service.has_filtered_field("status"));
        assert_eq!(service.filter_parse_runs, 1);

        assert_eq!(service.sorted_fields().len(), 1);
        assert!(service.has_sorted_field("name"));
        assert_eq!(service.sort_parse_runs, 1);
    }

    #[test]
    fn parsed_but_empty_differs_from_not_yet_parsed() {
        let mut service = ApiService::new(RequestParams::from_query(""));
        assert!(service.filter_fields.is_none());
        assert!(service.filtered_fields().is_empty());
        assert!(service.filter_fields.is_some());
    }

    #[test]
    fn register_is_idempotent() {
        let mut service = ApiService::new(RequestParams::from_query("filter[status][eq]=open"));
        service
            .register(Definitions::new().filter(FilterDef::new("status")))
            .unwrap();
        // A second registration (sub-request/forward) must not re-validate
        // with different definitions.
        service.register(Definitions::new()).unwrap();
        assert!(service.has_filtered_field("status"));
    }

    #[test]
    fn register_rejects_disallowed_filters_before_any_query() {
        let mut service = ApiService::new(RequestParams::from_query("filter[status][gt]=1"));
        let err = service
            .register(Definitions::new().filter(
                FilterDef::new("status").comparisons([Comparison::Eq, Comparison::In]),
            ))
            .unwrap_err();
        assert!(matches!(err, ApiError::Filter { .. }));
    }

    #[test]
    fn register_rejects_limit_without_pagination_definition() {
        let mut service = ApiService::new(RequestParams::from_query("limit=5"));
        let err = service.register(Definitions::new()).unwrap_err();
        assert!(matches!(err, ApiError::Pagination { .. }));
    }

    #[test]
    fn register_resolves_pagination_from_the_definition() {
        let mut service = ApiService::new(RequestParams::from_query(""));
        service
            .register(Definitions::new().pagination(PaginationDef::new().max_entries(50)))
            .unwrap();
        assert_eq!(service.pagination_limit().unwrap(), Some(50));
        assert_eq!(service.pagination_offset().unwrap(), 0);
    }

    #[test]
    fn filters_and_sorts_apply_in_fixed_order() {
        let mut service = ApiService::new(RequestParams::from_query(
            "filter[status][eq]=open&sort[created_at]=desc",
        ));
        service
            .register(
                Definitions::new()
                    .filter(FilterDef::new("status"))
                    .sort(SortDef::new("created_at").directions([Direction::Desc])),
            )
            .unwrap();

        let mut query = base_query();
        service.apply_filters_to(&mut query);
        service.apply_sorts_to(&mut query);
        let sql = query.to_string(SqliteQueryBuilder);
        assert!(sql.contains(r#""status" = 'open'"#), "got: {sql}");
        assert!(sql.contains(r#"ORDER BY "created_at" DESC"#), "got: {sql}");
    }

    #[test]
    fn filtered_field_with_distinguishes_comparisons() {
        let mut service = ApiService::new(RequestParams::from_query(
            "filter[size][gteq]=1&filter[size][lteq]=9",
        ));
        service
            .register(Definitions::new().filter(FilterDef::new("size")))
            .unwrap();
        assert_eq!(
            service
                .filtered_field_with("size", Comparison::Lteq)
                .map(FilterField::value),
            Some("9")
        );
        assert!(service.filtered_field_with("size", Comparison::Eq).is_none());
    }

    #[test]
    fn manual_total_flows_into_headers() {
        let mut service = ApiService::new(RequestParams::from_query(""));
        assert!(service.pagination_headers().is_empty());
        service.set_total(7);
        assert_eq!(service.total(), Some(7));
        assert_eq!(
            service
                .pagination_headers()
                .get(crate::pagination::PAGINATION_TOTAL_HEADER)
                .unwrap(),
            "7"
        );
    }

    #[test]
    fn path_params_become_eq_filters_when_declared() {
        let params = RequestParams::from_query("").with_path_param("id", "42");
        let mut service = ApiService::new(params);
        service
            .register(Definitions::new().filter(FilterDef::new("id")))
            .unwrap();
        let field = service.filtered_field("id").unwrap();
        assert_eq!(field.comparison(), Some(Comparison::Eq));
        assert_eq!(field.value(), "42");
    }
}
