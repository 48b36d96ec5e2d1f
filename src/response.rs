use serde::Serialize;

/// Uniform envelope returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            error: None,
        }
    }

    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_empty_fields() {
        let body = ApiResponse::message("User created successfully");
        let json = serde_json::to_value::<ApiResponse<()>>(body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "User created successfully");
        assert!(json.get("data").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn error_envelope_sets_success_false() {
        let body = ApiResponse::<()>::error("invalid file type: .jpg");
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "invalid file type: .jpg");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn data_envelope_carries_payload() {
        let body = ApiResponse::data(serde_json::json!({"token": "abc"}));
        let json = serde_json::to_value(body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["token"], "abc");
    }
}
