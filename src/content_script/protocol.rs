//! 侧边栏与页面之间的消息格式

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const NO_FORM_FOUND: &str = "No form found on page";
pub const UNKNOWN_ACTION: &str = "Unknown action";

/// 单个字段的赋值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAssignment {
    #[serde(rename = "fieldId")]
    pub field_id: String,
    pub value: String,
}

impl FieldAssignment {
    pub fn new(field_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            value: value.into(),
        }
    }
}

/// 请求：每条消息恰好一个
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum FillRequest {
    #[serde(rename = "getFormHTML")]
    ReadForm,
    #[serde(rename = "fillFields")]
    FillFields { fields: Vec<FieldAssignment> },
}

/// 解码后的请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRequest {
    pub request: FillRequest,
    /// 格式错误、无法解析的字段条目数，计为填充失败
    pub malformed: usize,
}

impl FillRequest {
    /// 解析原始消息
    ///
    /// 先按 action 分派，fillFields 的字段再逐条解析，单条格式错误只计数。
    /// action 无法识别或缺少 fields 数组时返回 None。
    pub fn from_message(message: &serde_json::Value) -> Option<DecodedRequest> {
        let action = message.get("action")?.as_str()?;
        match action {
            "getFormHTML" => Some(DecodedRequest {
                request: FillRequest::ReadForm,
                malformed: 0,
            }),
            "fillFields" => {
                let entries = message.get("fields")?.as_array()?;
                let mut fields = Vec::with_capacity(entries.len());
                let mut malformed = 0;
                for entry in entries {
                    match serde_json::from_value::<FieldAssignment>(entry.clone()) {
                        Ok(field) => fields.push(field),
                        Err(e) => {
                            warn!("无法解析字段条目 {}: {}", entry, e);
                            malformed += 1;
                        }
                    }
                }
                Some(DecodedRequest {
                    request: FillRequest::FillFields { fields },
                    malformed,
                })
            }
            _ => None,
        }
    }
}

/// 响应：每个请求恰好回复一次
///
/// 线上格式无标签，反序列化按变体顺序尝试，字段更多的变体必须排在前面。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillResponse {
    FillResult {
        success: bool,
        filled: usize,
        failed: usize,
    },
    FormNotFound {
        html: String,
        error: String,
    },
    FormMarkup {
        html: String,
    },
    ProtocolError {
        error: String,
    },
}

impl FillResponse {
    pub fn form_markup(html: impl Into<String>) -> Self {
        FillResponse::FormMarkup { html: html.into() }
    }

    pub fn form_not_found() -> Self {
        FillResponse::FormNotFound {
            html: String::new(),
            error: NO_FORM_FOUND.to_string(),
        }
    }

    pub fn fill_result(filled: usize, failed: usize) -> Self {
        FillResponse::FillResult {
            success: true,
            filled,
            failed,
        }
    }

    pub fn protocol_error(error: impl Into<String>) -> Self {
        FillResponse::ProtocolError { error: error.into() }
    }

    pub fn unknown_action() -> Self {
        Self::protocol_error(UNKNOWN_ACTION)
    }

    /// 错误信息（如果有）
    pub fn error(&self) -> Option<&str> {
        match self {
            FillResponse::FormNotFound { error, .. } | FillResponse::ProtocolError { error } => Some(error.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_known_actions() {
        assert_eq!(
            FillRequest::from_message(&json!({ "action": "getFormHTML" })).map(|d| d.request),
            Some(FillRequest::ReadForm)
        );
        let request = FillRequest::from_message(&json!({
            "action": "fillFields",
            "fields": [{ "fieldId": "lastName_input", "value": "Smith" }]
        }));
        assert_eq!(
            request,
            Some(DecodedRequest {
                request: FillRequest::FillFields {
                    fields: vec![FieldAssignment::new("lastName_input", "Smith")]
                },
                malformed: 0,
            })
        );
    }

    #[test]
    fn malformed_field_entries_are_counted_not_fatal() {
        let decoded = FillRequest::from_message(&json!({
            "action": "fillFields",
            "fields": [
                { "fieldId": "n", "value": "x" },
                { "fieldId": "age", "value": 30 },
                { "fieldId": "city" },
                "oops"
            ]
        }))
        .unwrap();
        assert_eq!(
            decoded.request,
            FillRequest::FillFields {
                fields: vec![FieldAssignment::new("n", "x")]
            }
        );
        assert_eq!(decoded.malformed, 3);
    }

    #[test]
    fn rejects_unknown_or_incomplete_messages() {
        assert!(FillRequest::from_message(&json!({ "action": "deleteEverything" })).is_none());
        assert!(FillRequest::from_message(&json!({ "action": "fillFields" })).is_none());
        assert!(FillRequest::from_message(&json!({ "action": "fillFields", "fields": "x" })).is_none());
        assert!(FillRequest::from_message(&json!("getFormHTML")).is_none());
    }

    #[test]
    fn responses_use_wire_shapes() {
        assert_eq!(
            serde_json::to_value(FillResponse::fill_result(2, 1)).unwrap(),
            json!({ "success": true, "filled": 2, "failed": 1 })
        );
        assert_eq!(
            serde_json::to_value(FillResponse::form_not_found()).unwrap(),
            json!({ "html": "", "error": "No form found on page" })
        );
        assert_eq!(
            serde_json::to_value(FillResponse::unknown_action()).unwrap(),
            json!({ "error": "Unknown action" })
        );
    }

    #[test]
    fn not_found_is_not_mistaken_for_markup() {
        let response: FillResponse =
            serde_json::from_value(json!({ "html": "", "error": "No form found on page" })).unwrap();
        assert_eq!(response, FillResponse::form_not_found());
        let response: FillResponse = serde_json::from_value(json!({ "html": "<form></form>" })).unwrap();
        assert_eq!(response, FillResponse::form_markup("<form></form>"));
    }
}
