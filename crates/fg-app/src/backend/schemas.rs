use serde::{Deserialize, Serialize};

/// Answer of `GET /check-api-key`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub is_set: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl KeyStatus {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn set() -> Self {
        Self {
            is_set: true,
            ..Default::default()
        }
    }

    pub fn invalid() -> Self {
        Self {
            is_set: false,
            message: Some("API key is invalid".to_string()),
            warning: None,
        }
    }

    pub fn unverified() -> Self {
        Self {
            is_set: true,
            message: None,
            warning: Some("API key is set but could not be verified".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}
