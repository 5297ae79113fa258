//! Common types for the Tencent Cloud action envelope

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One API action of one product, e.g. `cvm` / `2017-03-12` / `DescribeInstances`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub service: String,
    pub version: String,
    pub action: String,
}

impl Action {
    pub fn new(
        service: impl Into<String>,
        version: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            action: action.into(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.service, self.action, self.version)
    }
}

/// Every response is wrapped as `{"Response": {...}}`
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(rename = "Response")]
    pub response: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// Fields present in every response body, success or not
#[derive(Debug, Deserialize)]
pub struct ResponseMeta {
    #[serde(rename = "Error")]
    pub error: Option<ApiErrorBody>,
    #[serde(rename = "RequestId", default)]
    pub request_id: String,
}

/// Status label that the API reports either as a string or as an integer
/// (`"RUNNING"`, `2`, `-2`); numbers are kept in decimal form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabel(pub String);

impl StatusLabel {
    pub fn into_string(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for StatusLabel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrNumber {
            String(String),
            Signed(i64),
            Unsigned(u64),
            Bool(bool),
        }

        Ok(StatusLabel(match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s,
            StringOrNumber::Signed(n) => n.to_string(),
            StringOrNumber::Unsigned(n) => n.to_string(),
            StringOrNumber::Bool(b) => b.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_label_accepts_strings_and_numbers() {
        for (value, expected) in [
            (json!("RUNNING"), "RUNNING"),
            (json!(2), "2"),
            (json!(-2), "-2"),
            (json!(0), "0"),
            (json!(true), "true"),
        ] {
            let label = StatusLabel::deserialize(value).unwrap();
            assert_eq!(label.into_string(), expected);
        }
    }

    #[test]
    fn status_label_rejects_objects() {
        assert!(StatusLabel::deserialize(json!({"Status": 1})).is_err());
    }

    #[test]
    fn response_meta_reads_error_block() {
        let body = json!({
            "Error": {"Code": "InvalidParameter", "Message": "bad"},
            "RequestId": "req-1"
        });
        let meta: ResponseMeta = serde_json::from_value(body).unwrap();
        assert_eq!(meta.error.unwrap().code, "InvalidParameter");
        assert_eq!(meta.request_id, "req-1");
    }

    #[test]
    fn action_display() {
        let action = Action::new("cvm", "2017-03-12", "DescribeInstances");
        assert_eq!(action.to_string(), "cvm:DescribeInstances(2017-03-12)");
    }
}
