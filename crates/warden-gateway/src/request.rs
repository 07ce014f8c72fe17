// request.rs — Wire-level request and response objects.
//
// The transport adapter decodes one JSON object per request and encodes one
// per response; the gateway is agnostic to how the bytes arrive. Error
// responses always echo the request id and carry the stable code, a
// human-readable message, and a details object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded request: `{tool, args, id?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub id: Option<String>,
}

/// The error body of a failed response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// One encoded response: `{id, result?}` or `{id, error?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ToolResponse {
    pub fn ok(id: Option<String>, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Option<String>, body: ErrorBody) -> Self {
        Self {
            id,
            result: None,
            error: Some(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_with_and_without_id() {
        let with: ToolRequest =
            serde_json::from_str(r#"{"tool":"read_file","args":{"path":"a"},"id":"7"}"#).unwrap();
        assert_eq!(with.tool, "read_file");
        assert_eq!(with.id.as_deref(), Some("7"));

        let without: ToolRequest = serde_json::from_str(r#"{"tool":"list_plans"}"#).unwrap();
        assert!(without.id.is_none());
        assert!(without.args.is_null());
    }

    #[test]
    fn error_response_echoes_id() {
        let response = ToolResponse::err(
            Some("42".to_string()),
            ErrorBody {
                code: "PROMPT_GATE_LOCKED".to_string(),
                message: "fetch the prompt first".to_string(),
                details: None,
            },
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], json!("42"));
        assert_eq!(json["error"]["code"], json!("PROMPT_GATE_LOCKED"));
        assert!(json.get("result").is_none());
    }
}
