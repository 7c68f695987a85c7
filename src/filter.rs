//! Filter field requests: parsing, allow-list validation and translation
//! into query-builder predicates.
//!
//! A [`FilterField`] is one filter instruction supplied by the client,
//! either from the query string (`filter[<name>][<comparison>]=<value>`) or
//! from a route placeholder whose name matches a declared filter (always an
//! exact match). Parsing is permissive; [`check_allowed`] is where invalid
//! input turns into an error, before any query runs.

use sea_orm::sea_query::{Alias, Condition, Expr, SelectStatement};

use crate::definitions::{Comparison, FilterDef};
use crate::errors::ApiError;
use crate::params::RequestParams;

/// Literal query-string value selecting SQL NULL under `eq`/`neq`.
const NULL_LITERAL: &str = "\\null";

/// One filter instruction from the client.
///
/// The comparison is kept as the raw wire token: an unknown token is not a
/// parse error, it simply fails validation (or is skipped at apply time if
/// validation was bypassed).
#[derive(Debug, Clone)]
pub struct FilterField {
    name: String,
    comparison: String,
    value: String,
    definition: Option<FilterDef>,
}

impl FilterField {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        comparison: impl Into<String>,
        value: impl Into<String>,
        definition: Option<FilterDef>,
    ) -> Self {
        Self {
            name: name.into(),
            comparison: comparison.into(),
            value: value.into(),
            definition,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The comparison token exactly as supplied on the wire.
    #[must_use]
    pub fn raw_comparison(&self) -> &str {
        &self.comparison
    }

    /// The comparison, if the token is one of the nine known operators.
    #[must_use]
    pub fn comparison(&self) -> Option<Comparison> {
        Comparison::parse(&self.comparison)
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The value list: for `in`/`nin` the raw value split on commas (no
    /// escaping), for every other comparison the single raw value.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        if self.comparison().is_some_and(Comparison::is_multi_valued) {
            self.value.split(',').map(str::to_string).collect()
        } else {
            vec![self.value.clone()]
        }
    }

    /// The definition this field was matched against, if any was declared
    /// under its name.
    #[must_use]
    pub fn definition(&self) -> Option<&FilterDef> {
        self.definition.as_ref()
    }

    fn is_null_literal(&self) -> bool {
        self.value.eq_ignore_ascii_case(NULL_LITERAL)
    }

    /// Resolved query-builder target: the definition's column override when
    /// set, otherwise the request field name on the root table.
    fn target(&self) -> String {
        self.definition
            .as_ref()
            .and_then(FilterDef::column_override)
            .map_or_else(|| self.name.clone(), str::to_string)
    }

    /// Adds this filter's predicate to the select.
    ///
    /// No-op when the matched definition declares `auto_apply = false` or
    /// when the comparison token is unknown; upstream validation is expected
    /// to have rejected the latter already.
    pub fn apply_to_query_builder(&self, query: &mut SelectStatement) {
        if let Some(definition) = &self.definition
            && !definition.is_auto_apply()
        {
            return;
        }
        let Some(comparison) = self.comparison() else {
            return;
        };

        let target = self.target();
        let column = || column_expr(&target);

        match comparison {
            Comparison::Eq => {
                if self.is_null_literal() {
                    query.and_where(column().is_null());
                } else {
                    query.and_where(column().eq(self.value.clone()));
                }
            }
            Comparison::Neq => {
                if self.is_null_literal() {
                    query.and_where(column().is_not_null());
                } else {
                    // Not-equal deliberately matches absent values too.
                    query.cond_where(
                        Condition::any()
                            .add(column().ne(self.value.clone()))
                            .add(column().is_null()),
                    );
                }
            }
            Comparison::In => {
                query.and_where(column().is_in(self.values()));
            }
            Comparison::Nin => {
                query.cond_where(
                    Condition::any()
                        .add(column().is_not_in(self.values()))
                        .add(column().is_null()),
                );
            }
            Comparison::Gt => {
                query.and_where(column().gt(self.value.clone()));
            }
            Comparison::Gteq => {
                query.and_where(column().gte(self.value.clone()));
            }
            Comparison::Lt => {
                query.and_where(column().lt(self.value.clone()));
            }
            Comparison::Lteq => {
                query.and_where(column().lte(self.value.clone()));
            }
            Comparison::Like => {
                query.and_where(column().like(self.value.as_str()));
            }
        }
    }

    /// Evaluates this filter against an in-memory value, for filters the
    /// handler consumes manually (`auto_apply = false`). Ordering
    /// comparisons are lexicographic on the raw strings.
    ///
    /// # Errors
    ///
    /// Returns a filter error for `like` and unknown comparison tokens,
    /// which have no in-memory equivalent.
    pub fn matches(&self, value: &str) -> Result<bool, ApiError> {
        match self.comparison() {
            Some(Comparison::Eq) => Ok(value == self.value),
            Some(Comparison::Neq) => Ok(value != self.value),
            Some(Comparison::In) => Ok(self.values().iter().any(|v| v == value)),
            Some(Comparison::Nin) => Ok(!self.values().iter().any(|v| v == value)),
            Some(Comparison::Gt) => Ok(value > self.value.as_str()),
            Some(Comparison::Gteq) => Ok(value >= self.value.as_str()),
            Some(Comparison::Lt) => Ok(value < self.value.as_str()),
            Some(Comparison::Lteq) => Ok(value <= self.value.as_str()),
            Some(Comparison::Like) | None => Err(ApiError::filter(format!(
                "Comparison \"{}\" cannot be evaluated in memory",
                self.comparison
            ))),
        }
    }
}

/// Builds a column expression from a resolved target name. A dotted target
/// addresses a joined/aliased table, anything else is a column on the root
/// table.
fn column_expr(target: &str) -> Expr {
    match target.split_once('.') {
        Some((table, column)) => Expr::col((Alias::new(table), Alias::new(column))),
        None => Expr::col(Alias::new(target)),
    }
}

/// First definition declared under `name`, if any. Later definitions with
/// the same name are never consulted.
pub(crate) fn definition_by_name<'a>(
    definitions: &'a [FilterDef],
    name: &str,
) -> Option<&'a FilterDef> {
    definitions.iter().find(|def| def.name() == name)
}

/// Extracts all filter fields for the request: query-string instructions
/// first, then one implicit `eq` field per path parameter matching a
/// declared filter. Never fails.
pub(crate) fn parse_fields(params: &RequestParams, definitions: &[FilterDef]) -> Vec<FilterField> {
    let mut fields = Vec::new();
    for (name, comparison, value) in params.filter_entries() {
        let definition = definition_by_name(definitions, &name).cloned();
        fields.push(FilterField::new(name, comparison, value, definition));
    }
    for (name, value) in params.path_params() {
        let Some(definition) = definition_by_name(definitions, name) else {
            continue;
        };
        fields.push(FilterField::new(
            name.clone(),
            Comparison::Eq.as_str(),
            value.clone(),
            Some(definition.clone()),
        ));
    }
    fields
}

/// Rejects any field outside the allow-list.
///
/// # Errors
///
/// Returns a filter error naming the offending field, the supplied
/// comparison and value, and every available definition.
pub(crate) fn check_allowed(
    fields: &[FilterField],
    definitions: &[FilterDef],
) -> Result<(), ApiError> {
    for field in fields {
        if !is_allowed(field, definitions) {
            let available = definitions
                .iter()
                .map(FilterDef::describe)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ApiError::filter(format!(
                "Filter \"{}\" with comparison \"{}\" and value \"{}\" is not allowed in this request. Available filters: {available}",
                field.name(),
                field.raw_comparison(),
                field.value(),
            )));
        }
    }
    Ok(())
}

fn is_allowed(field: &FilterField, definitions: &[FilterDef]) -> bool {
    for definition in definitions {
        if definition.name() != field.name() {
            continue;
        }
        // First name match decides; further same-name definitions are not
        // consulted.
        let Some(comparison) = field.comparison() else {
            return false;
        };
        if !definition.allowed_comparisons().contains(&comparison) {
            return false;
        }
        return check_enum(field, definition);
    }
    false
}

fn check_enum(field: &FilterField, definition: &FilterDef) -> bool {
    let allowed = definition.allowed_values();
    if allowed.is_empty() {
        return true;
    }
    field
        .values()
        .iter()
        .all(|value| allowed.iter().any(|candidate| candidate == value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{Query, SqliteQueryBuilder};

    fn base_query() -> SelectStatement {
        Query::select()
            .column(Alias::new("id"))
            .from(Alias::new("task"))
            .to_owned()
    }

    fn sql(field: &FilterField) -> String {
        let mut query = base_query();
        field.apply_to_query_builder(&mut query);
        query.to_string(SqliteQueryBuilder)
    }

    #[test]
    fn eq_binds_the_value() {
        let field = FilterField::new("status", "eq", "open", None);
        assert!(sql(&field).contains(r#""status" = 'open'"#));
    }

    #[test]
    fn eq_null_literal_emits_is_null_without_a_bind() {
        for literal in ["\\null", "\\NULL", "\\Null"] {
            let field = FilterField::new("status", "eq", literal, None);
            let sql = sql(&field);
            assert!(sql.contains(r#""status" IS NULL"#), "got: {sql}");
            assert!(!sql.contains("null'"), "value must not be bound: {sql}");
        }
    }

    #[test]
    fn neq_includes_null_rows() {
        let field = FilterField::new("status", "neq", "active", None);
        let sql = sql(&field);
        assert!(
            sql.contains(r#""status" <> 'active' OR "status" IS NULL"#),
            "got: {sql}"
        );
    }

    #[test]
    fn neq_null_literal_emits_is_not_null() {
        let field = FilterField::new("status", "neq", "\\null", None);
        assert!(sql(&field).contains(r#""status" IS NOT NULL"#));
    }

    #[test]
    fn in_splits_on_commas_without_null_handling() {
        let field = FilterField::new("status", "in", "open,\\null", None);
        let sql = sql(&field);
        assert!(sql.contains(r#""status" IN ('open', '\null')"#), "got: {sql}");
        assert!(!sql.contains("IS NULL"), "got: {sql}");
    }

    #[test]
    fn nin_includes_null_rows() {
        let field = FilterField::new("status", "nin", "done,failed", None);
        let sql = sql(&field);
        assert!(
            sql.contains(r#""status" NOT IN ('done', 'failed') OR "status" IS NULL"#),
            "got: {sql}"
        );
    }

    #[test]
    fn ordering_comparisons_bind_directly() {
        let cases = [
            ("gt", r#""size" > '3'"#),
            ("gteq", r#""size" >= '3'"#),
            ("lt", r#""size" < '3'"#),
            ("lteq", r#""size" <= '3'"#),
        ];
        for (comparison, expected) in cases {
            let field = FilterField::new("size", comparison, "3", None);
            let sql = sql(&field);
            assert!(sql.contains(expected), "{comparison}: {sql}");
        }
    }

    #[test]
    fn like_binds_the_pattern_verbatim() {
        let field = FilterField::new("name", "like", "%ana%", None);
        assert!(sql(&field).contains(r#""name" LIKE '%ana%'"#));
    }

    #[test]
    fn column_override_targets_the_joined_table() {
        let def = FilterDef::new("vehicle_year").column("v.year");
        let field = FilterField::new("vehicle_year", "eq", "2020", Some(def));
        assert!(sql(&field).contains(r#""v"."year" = '2020'"#));
    }

    #[test]
    fn auto_apply_false_leaves_the_query_untouched() {
        let def = FilterDef::new("search").auto_apply(false);
        let field = FilterField::new("search", "eq", "urgent", Some(def));
        let mut query = base_query();
        let before = query.to_string(SqliteQueryBuilder);
        field.apply_to_query_builder(&mut query);
        assert_eq!(query.to_string(SqliteQueryBuilder), before);
    }

    #[test]
    fn unknown_comparison_is_skipped_at_apply_time() {
        let field = FilterField::new("status", "between", "1,2", None);
        let mut query = base_query();
        let before = query.to_string(SqliteQueryBuilder);
        field.apply_to_query_builder(&mut query);
        assert_eq!(query.to_string(SqliteQueryBuilder), before);
    }

    #[test]
    fn two_filters_compose_with_and() {
        let mut query = base_query();
        FilterField::new("status", "neq", "done", None).apply_to_query_builder(&mut query);
        FilterField::new("size", "gt", "3", None).apply_to_query_builder(&mut query);
        let sql = query.to_string(SqliteQueryBuilder);
        assert!(sql.contains("AND"), "got: {sql}");
        assert!(sql.contains(r#""size" > '3'"#), "got: {sql}");
    }

    #[test]
    fn parse_reads_query_then_path_params() {
        let definitions = vec![FilterDef::new("status"), FilterDef::new("id")];
        let params = RequestParams::from_query("filter[status][eq]=open")
            .with_path_param("id", "42")
            .with_path_param("unrelated", "x");
        let fields = parse_fields(&params, &definitions);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name(), "status");
        assert_eq!(fields[1].name(), "id");
        assert_eq!(fields[1].comparison(), Some(Comparison::Eq));
        assert_eq!(fields[1].value(), "42");
    }

    #[test]
    fn parse_binds_the_first_matching_definition() {
        let definitions = vec![
            FilterDef::new("status").comparisons([Comparison::Eq]),
            FilterDef::new("status").comparisons([Comparison::Gt]),
        ];
        let params = RequestParams::from_query("filter[status][eq]=open");
        let fields = parse_fields(&params, &definitions);
        assert_eq!(
            fields[0].definition().unwrap().allowed_comparisons(),
            [Comparison::Eq]
        );
    }

    #[test]
    fn validation_accepts_allowed_comparison_and_value() {
        let definitions = vec![
            FilterDef::new("status")
                .comparisons([Comparison::Eq, Comparison::In])
                .enum_values(["open", "closed"]),
        ];
        let fields = vec![
            FilterField::new("status", "eq", "open", None),
            FilterField::new("status", "in", "open,closed", None),
        ];
        assert!(check_allowed(&fields, &definitions).is_ok());
    }

    #[test]
    fn validation_rejects_unknown_name() {
        let definitions = vec![FilterDef::new("status")];
        let fields = vec![FilterField::new("owner", "eq", "bob", None)];
        let err = check_allowed(&fields, &definitions).unwrap_err();
        assert!(err.to_string().contains("Filter \"owner\""));
    }

    #[test]
    fn validation_rejects_disallowed_comparison_with_full_diagnostics() {
        let definitions =
            vec![FilterDef::new("status").comparisons([Comparison::Eq, Comparison::In])];
        let fields = vec![FilterField::new("status", "gt", "1", None)];
        let err = check_allowed(&fields, &definitions).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Filter \"status\" with comparison \"gt\" and value \"1\""));
        assert!(message.contains("status (comparisons: eq, in)"));
    }

    #[test]
    fn validation_rejects_unknown_comparison_token() {
        let definitions = vec![FilterDef::new("status")];
        let fields = vec![FilterField::new("status", "between", "1,2", None)];
        assert!(check_allowed(&fields, &definitions).is_err());
    }

    #[test]
    fn validation_checks_every_element_of_a_multi_value_request() {
        let definitions = vec![FilterDef::new("status").enum_values(["open", "closed"])];
        let ok = vec![FilterField::new("status", "in", "open,closed", None)];
        assert!(check_allowed(&ok, &definitions).is_ok());
        let bad = vec![FilterField::new("status", "in", "open,deleted", None)];
        assert!(check_allowed(&bad, &definitions).is_err());
    }

    #[test]
    fn validation_uses_the_first_name_match_only() {
        // Two definitions share a name; the second would allow "gt", but
        // only the first match is consulted.
        let definitions = vec![
            FilterDef::new("status").comparisons([Comparison::Eq]),
            FilterDef::new("status").comparisons([Comparison::Gt]),
        ];
        let fields = vec![FilterField::new("status", "gt", "1", None)];
        assert!(check_allowed(&fields, &definitions).is_err());
    }

    #[test]
    fn matches_evaluates_in_memory() {
        let field = FilterField::new("status", "neq", "active", None);
        assert!(field.matches("paused").unwrap());
        assert!(!field.matches("active").unwrap());

        let field = FilterField::new("status", "in", "a,b", None);
        assert!(field.matches("b").unwrap());
        assert!(!field.matches("c").unwrap());

        let field = FilterField::new("name", "like", "%x%", None);
        assert!(field.matches("anything").is_err());
    }
}
