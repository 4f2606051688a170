use std::fs;
use std::path::PathBuf;

use query_engine_sql::sql;
use query_engine_translation::translation;
use serde::Deserialize;

/// A find request, with the paging the caller would add to it.
#[derive(Deserialize)]
struct TestRequest {
    #[serde(flatten)]
    request: translation::models::QueryRequest,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    offset: Option<u32>,
}

/// Compile the request of a golden test against the shared configuration, and render the SQL
/// and its bindings for comparison against the snapshot.
pub async fn test_translation(testname: &str) -> anyhow::Result<String> {
    let goldenfiles = PathBuf::from("tests/goldenfiles");

    let parsed_configuration = find_query_configuration::parse_configuration(&goldenfiles).await?;
    let configuration = find_query_configuration::make_runtime_configuration(parsed_configuration)?;
    let env = translation::helpers::Env::from_configuration(&configuration);
    let options = translation::query::Options::from_settings(&configuration.settings);

    let test_request: TestRequest = serde_json::from_str(&fs::read_to_string(
        goldenfiles.join(testname).join("request.json"),
    )?)?;
    let limit = sql::ast::Limit {
        limit: test_request.limit,
        offset: test_request.offset,
    };

    let query = translation::query::compile(&env, &test_request.request, &options, &limit)?;

    Ok(format!(
        "{}\n\n{}",
        query.sql,
        serde_json::to_string(&query.params)?
    ))
}
