//! Wire envelopes for the agent action protocol.
//!
//! The orchestration agent delivers an action invocation naming an API
//! path and carrying a flat positional list of named properties; the
//! gateway answers with a response envelope wrapping one serialized
//! payload string. Field names are dictated by the external runtime.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Fallback action group echoed when the invocation omits one.
const DEFAULT_ACTION_GROUP: &str = "DefaultActionGroup";

// ============================================================================
// Inbound Invocation
// ============================================================================

/// Inbound action invocation from the orchestration agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionInvocation {
    pub message_version: String,
    pub action_group: Option<String>,
    pub api_path: Option<String>,
    pub http_method: Option<String>,
    pub request_body: RequestBody,
    pub session_attributes: HashMap<String, String>,
    pub prompt_session_attributes: HashMap<String, String>,
}

/// Request body container keyed by content type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestBody {
    pub content: HashMap<String, ContentBody>,
}

/// One content-type entry carrying the property list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentBody {
    pub properties: Vec<Property>,
}

/// One named parameter. The list is positional and caller-ordered; the
/// gateway extracts values by name, never by position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

impl ActionInvocation {
    /// Build an invocation carrying the given properties (test/tool use).
    pub fn new(api_path: impl Into<String>, properties: &[(&str, &str)]) -> Self {
        let mut content = HashMap::new();
        content.insert(
            "application/json".to_string(),
            ContentBody {
                properties: properties
                    .iter()
                    .map(|(name, value)| Property {
                        name: (*name).to_string(),
                        value: (*value).to_string(),
                    })
                    .collect(),
            },
        );

        Self {
            message_version: "1.0".to_string(),
            api_path: Some(api_path.into()),
            request_body: RequestBody { content },
            ..Self::default()
        }
    }

    /// First property with the given name, if present.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.request_body
            .content
            .get("application/json")
            .into_iter()
            .flat_map(|content| content.properties.iter())
            .find(|prop| prop.name == name)
            .map(|prop| prop.value.as_str())
    }
}

// ============================================================================
// Outbound Response
// ============================================================================

/// Outbound response envelope.
///
/// Error responses carry no session attributes; success responses echo
/// both attribute maps from the invocation unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub message_version: String,
    pub response: ResponseDetail,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_attributes: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_session_attributes: Option<HashMap<String, String>>,
}

/// Routing echo plus status and payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDetail {
    pub action_group: String,
    pub api_path: String,
    pub http_method: String,
    pub http_status_code: u16,
    pub response_body: ResponseBody,
}

/// Response body container keyed by content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(rename = "application/json")]
    pub content: JsonBody,
}

/// The single serialized payload string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonBody {
    pub body: String,
}

impl ActionResponse {
    /// Success envelope (status 200) echoing the invocation's session
    /// attributes.
    pub fn success(body: String, invocation: &ActionInvocation) -> Self {
        Self {
            message_version: "1.0".to_string(),
            response: ResponseDetail::echo(invocation, 200, body),
            session_attributes: Some(invocation.session_attributes.clone()),
            prompt_session_attributes: Some(invocation.prompt_session_attributes.clone()),
        }
    }

    /// Error envelope (status 400) whose body is `{"error": <message>}`.
    pub fn error(message: &str, invocation: &ActionInvocation) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self {
            message_version: "1.0".to_string(),
            response: ResponseDetail::echo(invocation, 400, body),
            session_attributes: None,
            prompt_session_attributes: None,
        }
    }

    /// HTTP-style status carried in the envelope.
    pub fn status(&self) -> u16 {
        self.response.http_status_code
    }

    /// The serialized payload string.
    pub fn body(&self) -> &str {
        &self.response.response_body.content.body
    }
}

impl ResponseDetail {
    fn echo(invocation: &ActionInvocation, status: u16, body: String) -> Self {
        Self {
            action_group: invocation
                .action_group
                .clone()
                .unwrap_or_else(|| DEFAULT_ACTION_GROUP.to_string()),
            api_path: invocation
                .api_path
                .clone()
                .unwrap_or_else(|| "/unknown".to_string()),
            http_method: invocation
                .http_method
                .clone()
                .unwrap_or_else(|| "POST".to_string()),
            http_status_code: status,
            response_body: ResponseBody {
                content: JsonBody { body },
            },
        }
    }
}
