//! Pagination: the `limit` parameter, total-count computation and the
//! response header carrying the total.
//!
//! The wire grammar accepts two forms: `limit=<N>` (offset 0) and
//! `limit=<offset>,<N>`. A `limit` parameter is only legal on endpoints
//! that declared a [`PaginationDef`]; when none was declared its presence
//! is an error. Without a client limit the definition's `max_entries` cap
//! applies, else the result is unbounded.

use axum::http::{HeaderMap, HeaderValue};
use sea_orm::sea_query::{Alias, Expr, Query, SelectStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};

use crate::definitions::PaginationDef;
use crate::errors::ApiError;

/// Response header carrying the total row count for paginated endpoints.
pub const PAGINATION_TOTAL_HEADER: &str = "x-querytk-pagination-total";

/// Resolved pagination for one request. `total` stays unset until the
/// count query ran (and stays unset if it failed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    offset: u64,
    limit: Option<u64>,
    total: Option<u64>,
}

impl PaginationState {
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub(crate) fn set_total(&mut self, total: u64) {
        self.total = Some(total);
    }
}

/// Parses the `limit` parameter against the registered definition.
///
/// # Errors
///
/// Returns a pagination error when `limit` is present without a
/// registered [`PaginationDef`], has more than two comma-separated parts,
/// or contains a non-integer part.
pub(crate) fn parse(
    parameter: Option<&str>,
    definition: Option<&PaginationDef>,
) -> Result<PaginationState, ApiError> {
    let Some(parameter) = parameter else {
        return Ok(PaginationState {
            offset: 0,
            limit: definition.and_then(PaginationDef::max),
            total: None,
        });
    };

    if definition.is_none() {
        return Err(ApiError::pagination(
            "Limit parameter not available in current request.",
        ));
    }

    let parse_part = |part: &str| {
        part.trim().parse::<u64>().map_err(|_| {
            ApiError::pagination(
                "Invalid limit parameter. Allowed formats: limit=[limit], limit=[offset],[limit]",
            )
        })
    };

    let parts: Vec<&str> = parameter.split(',').collect();
    match parts.as_slice() {
        [limit] => Ok(PaginationState {
            offset: 0,
            limit: Some(parse_part(limit)?),
            total: None,
        }),
        [offset, limit] => Ok(PaginationState {
            offset: parse_part(offset)?,
            limit: Some(parse_part(limit)?),
            total: None,
        }),
        _ => Err(ApiError::pagination(
            "Invalid limit parameter. Allowed formats: limit=[limit], limit=[offset],[limit]",
        )),
    }
}

/// Wraps the select in a `SELECT COUNT(*)` over it, for the total before
/// LIMIT/OFFSET are applied.
pub(crate) fn count_statement(query: &SelectStatement) -> SelectStatement {
    Query::select()
        .expr(Expr::cust("COUNT(*)"))
        .from_subquery(query.clone(), Alias::new("total"))
        .to_owned()
}

async fn fetch_total(db: &DatabaseConnection, query: &SelectStatement) -> Result<u64, DbErr> {
    let statement = db.get_database_backend().build(&count_statement(query));
    let row = db
        .query_one(statement)
        .await?
        .ok_or_else(|| DbErr::Custom("count query returned no rows".to_string()))?;
    let total: i64 = row.try_get_by_index(0)?;
    Ok(u64::try_from(total).unwrap_or(0))
}

/// Applies pagination to the select: marks it DISTINCT (joins must not
/// inflate the row count), computes the total eagerly, then adds
/// LIMIT/OFFSET.
///
/// A failing count query (e.g. the table does not exist yet) is the one
/// tolerated failure: the total stays unset and the main query still runs.
pub(crate) async fn apply_to_query_builder(
    state: &mut PaginationState,
    db: &DatabaseConnection,
    query: &mut SelectStatement,
) {
    query.distinct();

    match fetch_total(db, query).await {
        Ok(total) => state.set_total(total),
        Err(err) => {
            tracing::debug!(error = %err, "total count query failed, leaving total unset");
        }
    }

    if let Some(limit) = state.limit {
        query.limit(limit);
    }
    if state.offset > 0 {
        query.offset(state.offset);
    }
}

/// Builds the response headers for a computed total.
#[must_use]
pub fn total_header(total: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(PAGINATION_TOTAL_HEADER, HeaderValue::from(total));
    headers
}
