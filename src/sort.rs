//! Sort field requests: parsing, allow-list validation and ORDER BY
//! application.
//!
//! One [`SortField`] per `sort[<name>]=<direction>` pair, applied in query
//! order so that the first sort parameter is the primary ordering.

use sea_orm::sea_query::{Alias, Order, SelectStatement};

use crate::definitions::{Direction, SortDef};
use crate::errors::ApiError;
use crate::params::RequestParams;

/// One sort instruction from the client. The direction is kept as the raw
/// wire token; unknown tokens fail validation.
#[derive(Debug, Clone)]
pub struct SortField {
    name: String,
    direction: String,
    definition: Option<SortDef>,
}

impl SortField {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        direction: impl Into<String>,
        definition: Option<SortDef>,
    ) -> Self {
        Self {
            name: name.into(),
            direction: direction.into(),
            definition,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The direction token exactly as supplied on the wire.
    #[must_use]
    pub fn raw_direction(&self) -> &str {
        &self.direction
    }

    /// The direction, if the token is `asc` or `desc`.
    #[must_use]
    pub fn direction(&self) -> Option<Direction> {
        Direction::parse(&self.direction)
    }

    #[must_use]
    pub fn definition(&self) -> Option<&SortDef> {
        self.definition.as_ref()
    }

    fn target(&self) -> String {
        self.definition
            .as_ref()
            .and_then(SortDef::column_override)
            .map_or_else(|| self.name.clone(), str::to_string)
    }

    /// Adds this sort's ORDER BY clause to the select. No-op when the
    /// matched definition declares `auto_apply = false` or the direction
    /// token is unknown.
    pub fn apply_to_query_builder(&self, query: &mut SelectStatement) {
        if let Some(definition) = &self.definition
            && !definition.is_auto_apply()
        {
            return;
        }
        let Some(direction) = self.direction() else {
            return;
        };

        let order = match direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        };
        let target = self.target();
        match target.split_once('.') {
            Some((table, column)) => {
                query.order_by((Alias::new(table), Alias::new(column)), order);
            }
            None => {
                query.order_by(Alias::new(target.as_str()), order);
            }
        }
    }
}

/// First definition declared under `name`, if any.
pub(crate) fn definition_by_name<'a>(
    definitions: &'a [SortDef],
    name: &str,
) -> Option<&'a SortDef> {
    definitions.iter().find(|def| def.name() == name)
}

/// Extracts all sort fields for the request, in query order. Never fails.
pub(crate) fn parse_fields(params: &RequestParams, definitions: &[SortDef]) -> Vec<SortField> {
    params
        .sort_entries()
        .into_iter()
        .map(|(name, direction)| {
            let definition = definition_by_name(definitions, &name).cloned();
            SortField::new(name, direction, definition)
        })
        .collect()
}

/// Rejects any sort field outside the allow-list.
///
/// # Errors
///
/// Returns a sort error naming the offending field and direction and every
/// available definition.
pub(crate) fn check_allowed(
    fields: &[SortField],
    definitions: &[SortDef],
) -> Result<(), ApiError> {
    for field in fields {
        if !is_allowed(field, definitions) {
            let available = definitions
                .iter()
                .map(SortDef::describe)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ApiError::sort(format!(
                "Sort \"{}\" with direction \"{}\" is not allowed in this request. Available sorts: {available}",
                field.name(),
                field.raw_direction(),
            )));
        }
    }
    Ok(())
}

fn is_allowed(field: &SortField, definitions: &[SortDef]) -> bool {
    for definition in definitions {
        if definition.name() != field.name() {
            continue;
        }
        // First name match decides.
        let Some(direction) = field.direction() else {
            return false;
        };
        return definition.allowed_directions().contains(&direction);
    }
    false
}
