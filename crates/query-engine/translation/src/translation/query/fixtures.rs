//! The entity model the unit tests compile against, shared with the golden tests.

use find_query_configuration::{make_runtime_configuration, Configuration, ParsedConfiguration};

use crate::translation::models::QueryRequest;

pub fn configuration() -> Configuration {
    let parsed: ParsedConfiguration = serde_json::from_str(include_str!(
        "../../../tests/goldenfiles/configuration.json"
    ))
    .unwrap();
    make_runtime_configuration(parsed).unwrap()
}

pub fn request(request: serde_json::Value) -> QueryRequest {
    serde_json::from_value(request).unwrap()
}
