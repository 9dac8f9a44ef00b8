//! Wire DTOs for the SmartCare API.
//!
//! # Design
//! Field names follow the server's PascalCase JSON. Every object keeps the
//! fields it does not model in a flattened `extra` map, so values survive a
//! deserialize/serialize pass unchanged. The mock server defines its own
//! copies; the end-to-end test catches drift between the two.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Body of both login rounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "AdditionalValuesVersion")]
    pub additional_values_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdditionalValue {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

/// Result of a successful handshake.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthToken {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "T3Token")]
    pub t3_token: String,
    #[serde(rename = "AdditionalValues", default)]
    pub additional_values: Vec<AdditionalValue>,
    #[serde(rename = "FirstName", default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "LastName", default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(rename = "Email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named server-defined behavior. Only `Name` is typed; confidence and
/// display fields stay in `extra` in whatever shape the server sent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Action {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            extra: Map::new(),
        }
    }

    /// `Confidence` as a number, accepting numeric strings.
    pub fn confidence(&self) -> Option<f64> {
        match self.extra.get("Confidence")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn display_text(&self) -> Option<&str> {
        self.extra.get("DisplayText").and_then(Value::as_str)
    }

    pub fn confirmation_text(&self) -> Option<&str> {
        self.extra.get("ConfirmationText").and_then(Value::as_str)
    }
}

/// An action reference inside a search result.
///
/// `Unresolved` is the bare name the server sent, `Resolved` the touchmap
/// entry it was rewritten to. Anything else (`null`, numbers, objects without
/// a string `Name`) is carried through untouched as `Other`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ActionRef {
    Resolved(Action),
    Unresolved(String),
    Other(Value),
}

impl ActionRef {
    pub fn name(&self) -> Option<&str> {
        match self {
            ActionRef::Resolved(action) => Some(&action.name),
            ActionRef::Unresolved(name) => Some(name),
            ActionRef::Other(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ActionRef::Resolved(_))
    }
}

/// A present `Action` key always yields `Some`, so an explicit `null`
/// survives as `Some(ActionRef::Other(Value::Null))`.
fn present_action<'de, D>(deserializer: D) -> Result<Option<ActionRef>, D::Error>
where
    D: Deserializer<'de>,
{
    ActionRef::deserialize(deserializer).map(Some)
}

/// Deserialize a list, skipping entries that do not fit `T`.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("skipping malformed touchmap entry: {e}");
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceItem {
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of the touchmap endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TouchmapResponse {
    #[serde(rename = "Actions", default, deserialize_with = "lenient_vec")]
    pub actions: Vec<Action>,
    #[serde(rename = "ServiceItems", default, deserialize_with = "lenient_vec")]
    pub service_items: Vec<ServiceItem>,
}

/// A service item whose action name matched an entry in the touchmap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    #[serde(rename = "Action")]
    pub action: Action,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    #[serde(rename = "Query")]
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResultEntry {
    #[serde(
        rename = "Action",
        default,
        deserialize_with = "present_action",
        skip_serializing_if = "Option::is_none"
    )]
    pub action: Option<ActionRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    #[serde(rename = "Results", default)]
    pub results: Vec<SearchResultEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
