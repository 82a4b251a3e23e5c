use serde::{Deserialize, Serialize};

use crate::link::{LinkTable, Resource};

/// The API entry point returned by `GET <base>/api`.
///
/// Its links are named `"<GroupName>Resources"`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RootEntity {
    /// Product name reported by the server.
    #[serde(default)]
    pub product: Option<String>,
    /// Server version.
    #[serde(default)]
    pub version: Option<String>,
    /// Friendly name of the server instance.
    #[serde(default)]
    pub instance_name: Option<String>,
    /// Links to the resource groups.
    #[serde(default)]
    pub links: LinkTable,
}

impl Resource for RootEntity {
    fn links(&self) -> &LinkTable {
        &self.links
    }
}

/// An intermediate resource grouping the operations on one kind of entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceGroup {
    /// Operation links such as `Item`, `Items`, `Template` or `Stream`.
    #[serde(default)]
    pub links: LinkTable,
}

impl Resource for ResourceGroup {
    fn links(&self) -> &LinkTable {
        &self.links
    }
}

/// Body of a non-success response, when the server sends one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable message.
    #[serde(default, rename = "Error", alias = "error")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_entity_reads_pascal_case() {
        let root: RootEntity = serde_json::from_str(
            r#"{"Product":"Seq","Version":"2026.1.100","InstanceName":null,
                "Links":{"EventsResources":"api/events/resources"}}"#,
        )
        .unwrap();

        assert_eq!(root.product.as_deref(), Some("Seq"));
        assert_eq!(root.instance_name, None);
        assert!(root.links().contains("eventsresources"));
    }

    #[test]
    fn error_payload_accepts_both_casings() {
        let upper: ErrorPayload = serde_json::from_str(r#"{"Error":"Nope"}"#).unwrap();
        let lower: ErrorPayload = serde_json::from_str(r#"{"error":"Nope"}"#).unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.error.as_deref(), Some("Nope"));

        let empty: ErrorPayload = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.error, None);
    }
}
