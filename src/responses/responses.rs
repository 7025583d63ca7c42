use serde::Serialize;

#[derive(Serialize, Clone)]
pub struct ResultResponse {
    pub(crate) status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<i32>,
    pub(crate) text: String,
}

impl ResultResponse {
    pub fn with_id(id: i32, text: String) -> Self {
        Self {
            status: "success".to_string(),
            id: Some(id),
            text,
        }
    }

    pub fn message(text: String) -> Self {
        Self {
            status: "success".to_string(),
            id: None,
            text,
        }
    }
}

#[derive(Serialize, Clone)]
pub struct ErrorResponse {
    pub(crate) message: String,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_response_with_id() {
        let json = serde_json::to_string(&ResultResponse::with_id(3, "verse".to_string())).unwrap();
        assert_eq!(json, r#"{"status":"success","id":3,"text":"verse"}"#);
    }

    #[test]
    fn result_response_omits_absent_id() {
        let json = serde_json::to_string(&ResultResponse::message("done".to_string())).unwrap();
        assert_eq!(json, r#"{"status":"success","text":"done"}"#);
    }
}
