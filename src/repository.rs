//! Data-access convenience: fetch an entity's rows straight from the
//! request's validated fields.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryTrait};

use crate::errors::ApiError;
use crate::service::ApiService;

/// Blanket extension for every Sea-ORM entity: build the entity's select,
/// run the registered request fields through it, execute.
#[async_trait]
pub trait FindByRequest: EntityTrait {
    /// Applies the request's filters, sorts and pagination to this entity's
    /// select and fetches the matching models. The total row count, when
    /// pagination is registered, becomes available via
    /// [`ApiService::total`] afterwards.
    ///
    /// # Errors
    ///
    /// A pagination error for a malformed `limit` parameter, or a database
    /// error from query execution.
    async fn find_by_request(
        db: &DatabaseConnection,
        api: &mut ApiService,
    ) -> Result<Vec<Self::Model>, ApiError>;
}

#[async_trait]
impl<E> FindByRequest for E
where
    E: EntityTrait,
{
    async fn find_by_request(
        db: &DatabaseConnection,
        api: &mut ApiService,
    ) -> Result<Vec<Self::Model>, ApiError> {
        let mut query = Self::find().into_query();
        api.apply_to_query_builder(db, &mut query).await?;

        let statement = db.get_database_backend().build(&query);
        Self::Model::find_by_statement(statement)
            .all(db)
            .await
            .map_err(ApiError::database)
    }
}
