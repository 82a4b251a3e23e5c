use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::link::{LinkTable, Resource};

/// A log event as stored by the server.
///
/// `timestamp` stays a string: the core never reinterprets dates.
/// Property values are kept as raw JSON, so decimals keep every digit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventEntity {
    /// Server-assigned event id.
    #[serde(default)]
    pub id: Option<String>,
    /// ISO-8601 timestamp exactly as sent by the server.
    #[serde(default)]
    pub timestamp: String,
    /// Level name, e.g. `Information`.
    #[serde(default)]
    pub level: Option<String>,
    /// Message with properties substituted, when rendering was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_message: Option<String>,
    /// Tokens of the message template.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub message_template_tokens: Vec<MessageTemplateToken>,
    /// Exception text attached to the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Structured properties.
    #[serde(default)]
    pub properties: Vec<EventPropertyPart>,
    /// Navigation links (`Self`, `Group`, ...).
    #[serde(default)]
    pub links: LinkTable,
}

impl Resource for EventEntity {
    fn links(&self) -> &LinkTable {
        &self.links
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// A named event property.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventPropertyPart {
    /// Property name.
    pub name: String,
    /// Property value as sent on the wire.
    #[serde(default)]
    pub value: Value,
}

/// One token of a message template: literal text or a property hole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageTemplateToken {
    /// A `{Property}` hole.
    #[serde(rename_all = "PascalCase")]
    Property {
        /// Name of the property.
        property_name: String,
        /// Original text of the hole.
        #[serde(default)]
        raw_text: Option<String>,
        /// Rendered value, when requested.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        formatted_value: Option<String>,
    },
    /// Literal text.
    #[serde(rename_all = "PascalCase")]
    Text {
        /// The text.
        text: String,
    },
}
