//! Metadata information regarding entities and the database tables backing them.

pub mod database;
pub mod entities;
pub mod inheritance;

// re-export without modules
pub use database::*;
pub use entities::*;
pub use inheritance::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Metadata information.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    pub entities: EntitiesInfo,
}

impl Metadata {
    pub fn empty() -> Self {
        Metadata {
            entities: EntitiesInfo::empty(),
        }
    }
}
