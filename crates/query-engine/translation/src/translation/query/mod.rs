//! Translate a find request into a query plan, and the plan into SQL.

pub mod entity_filter;
pub mod expressions;
pub mod filtering;
pub mod inheritance;
pub mod pruning;
pub mod sorting;
pub mod values;

#[cfg(test)]
mod fixtures;

use std::collections::BTreeSet;

use find_query_configuration::CompilerSettings;
use query_engine_sql::sql;

use crate::translation::error::Error;
use crate::translation::helpers::{Env, State};
use crate::translation::models::QueryRequest;

/// Knobs for a single translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Drop joins that nothing refers to.
    pub prune_joins: bool,
    /// Aliases whose joins survive pruning even if unused, i.e. because the caller adds its own
    /// conditions on them.
    pub keep_aliases: BTreeSet<sql::ast::TableAlias>,
    /// Finish the ordering on the primary key.
    pub default_order_by: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            prune_joins: true,
            keep_aliases: BTreeSet::new(),
            default_order_by: true,
        }
    }
}

impl Options {
    pub fn from_settings(settings: &CompilerSettings) -> Self {
        Options {
            prune_joins: settings.prune_joins,
            keep_aliases: BTreeSet::new(),
            default_order_by: settings.default_order_by,
        }
    }
}

/// Translate a find request into a query plan.
#[tracing::instrument(skip_all, fields(entity = %request.entity))]
pub fn translate(
    env: &Env,
    request: &QueryRequest,
    options: &Options,
) -> Result<sql::ast::FindQuery, Error> {
    let entity = env.lookup_entity(&request.entity)?;
    let mut state = State::new();

    let alias = state.make_table_alias(&entity.table_name);
    state
        .selects
        .push(sql::ast::SelectItem::Star(alias.clone()));

    filtering::add_table(
        env,
        &mut state,
        entity,
        alias.clone(),
        sql::ast::Join::Primary,
        &request.filter,
    )?;
    inheritance::add_sti_discriminator(env, &mut state, entity, &alias)?;

    if let Some(expression) = &request.expression {
        let expression = expressions::translate_expression(env, &state, expression)?;
        state.complex_conditions.push(expression);
    }

    if let Some(order_by) = &request.order_by {
        sorting::add_order_by(env, &mut state, entity, &alias, order_by)?;
    }

    let mut query = state.into_query();
    if options.prune_joins {
        pruning::prune_unused_joins(&mut query, &options.keep_aliases);
    }

    tracing::debug!(
        tables = query.tables.len(),
        bound_aliases = query.bound_aliases.len(),
        "translated find request"
    );
    Ok(query)
}

/// Translate a find request and render it, with optional LIMIT and OFFSET, as SQL.
#[tracing::instrument(skip_all)]
pub fn compile(
    env: &Env,
    request: &QueryRequest,
    options: &Options,
    limit: &sql::ast::Limit,
) -> Result<sql::string::SQL, Error> {
    let mut query = translate(env, request, options)?;
    if options.default_order_by {
        let entity = env.lookup_entity(&request.entity)?;
        sorting::add_default_order_by(&mut query, entity)?;
    }
    let sql = sql::convert::find_query_to_sql(&query, limit)?;
    tracing::trace!(sql = %sql.sql, params = sql.params.len(), "compiled find query");
    Ok(sql)
}
