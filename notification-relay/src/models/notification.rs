use serde::{Deserialize, Serialize};

/// Opaque notification payload, relayed verbatim.
pub type Notification = String;

pub const STATUS_SUCCESS: &str = "success";

/// Body of a successful `GET /notifications`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    pub status: String,
    pub data: Vec<Notification>,
}

impl HistoryResponse {
    pub fn success(data: Vec<Notification>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            data,
        }
    }
}

/// Body of every failed relay response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_shape() {
        let body = serde_json::to_value(HistoryResponse::success(vec!["b".into(), "a".into()]))
            .unwrap();
        assert_eq!(body, serde_json::json!({"status": "success", "data": ["b", "a"]}));
    }

    #[test]
    fn empty_success_body_keeps_data_array() {
        let body = serde_json::to_string(&HistoryResponse::success(Vec::new())).unwrap();
        assert_eq!(body, r#"{"status":"success","data":[]}"#);
    }
}
