//! Resource model and the user/resource association.

use serde::{Deserialize, Serialize};

use crate::filters::FilterTarget;

/// Something a user can be granted access to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    pub resource_type: String,
    pub description: Option<String>,
}

impl FilterTarget for Resource {
    const TABLE: &'static str = "resources";

    fn column(field: &str) -> Option<&'static str> {
        match field {
            "id" => Some("id"),
            "name" => Some("name"),
            "resource_type" => Some("resource_type"),
            "description" => Some("description"),
            _ => None,
        }
    }
}

/// Request body for creating a resource.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResourceRequest {
    pub name: String,
    pub resource_type: String,
    #[serde(default)]
    pub description: Option<String>,
}
