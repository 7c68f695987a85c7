//! # querytk
//!
//! Declarative query-string filtering, sorting and pagination for Axum
//! handlers backed by Sea-ORM.
//!
//! A handler declares which filter names (with allowed comparisons and
//! values), sort fields (with allowed directions) and pagination limits a
//! client may use. Incoming parameters are parsed, validated against that
//! allow-list (rejecting anything not explicitly allowed with a 400 before
//! any query runs), and applied to a sea-query select: filters, then
//! sorts, then pagination, with the total row count exposed for the
//! `x-querytk-pagination-total` response header.
//!
//! ## Wire grammar
//!
//! ```text
//! ?filter[<name>][<comparison>]=<value>   comparison: eq neq gt gteq lt
//!                                         lteq in nin like; in/nin values
//!                                         are comma-separated; \null under
//!                                         eq/neq selects SQL NULL
//! ?sort[<name>]=<direction>               asc | desc, repeatable
//! ?limit=<N> | ?limit=<offset>,<N>
//! ```
//!
//! Route placeholders whose name matches a declared filter become implicit
//! `eq` filters (`/users/{id}` filters on `id`).
//!
//! ## Example
//!
//! ```rust,no_run
//! use axum::{Json, extract::State};
//! use querytk::{ApiError, ApiService, Comparison, Definitions, FilterDef, FindByRequest,
//!     PaginationDef, SortDef};
//! use sea_orm::DatabaseConnection;
//! # mod user { pub use sea_orm::entity::prelude::*;
//! # #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
//! # #[sea_orm(table_name = "user")]
//! # pub struct Model { #[sea_orm(primary_key)] pub id: i32 }
//! # #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)] pub enum Relation {}
//! # impl ActiveModelBehavior for ActiveModel {} }
//!
//! async fn list_users(
//!     mut api: ApiService,
//!     State(db): State<DatabaseConnection>,
//! ) -> Result<(axum::http::HeaderMap, Json<Vec<user::Model>>), ApiError> {
//!     api.register(
//!         Definitions::new()
//!             .filter(FilterDef::new("username"))
//!             .filter(FilterDef::new("state").enum_values(["active", "blocked"]))
//!             .sort(SortDef::new("username"))
//!             .pagination(PaginationDef::new().max_entries(100)),
//!     )?;
//!     let users = user::Entity::find_by_request(&db, &mut api).await?;
//!     Ok((api.pagination_headers(), Json(users)))
//! }
//! ```

pub mod definitions;
pub mod errors;
pub mod filter;
pub mod pagination;
pub mod params;
pub mod repository;
pub mod service;
pub mod sort;

pub use definitions::{Comparison, Definitions, Direction, FilterDef, PaginationDef, SortDef};
pub use errors::ApiError;
pub use filter::FilterField;
pub use pagination::{PAGINATION_TOTAL_HEADER, PaginationState};
pub use params::{ListParams, RequestParams};
pub use repository::FindByRequest;
pub use service::ApiService;
pub use sort::SortField;
