//! 공통 에러 타입
//!
//! Protector 엔진 전체에서 사용되는 에러 타입을 정의합니다.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Protector 공통 에러
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────────
    // Restriction Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("unrestricted access: call restrict() before any protected operation")]
    Unrestricted,

    // ─────────────────────────────────────────────────────────────────────────────
    // Rule Errors
    // ─────────────────────────────────────────────────────────────────────────────
    /// rule block 내부에서 발생한 에러 (메시지/소스 그대로 전달)
    #[error(transparent)]
    Rule(anyhow::Error),

    #[error("{}", access_denied_message(.field.as_deref()))]
    AccessDenied { field: Option<String> },

    // ─────────────────────────────────────────────────────────────────────────────
    // Config Errors
    // ─────────────────────────────────────────────────────────────────────────────
    #[error("config error: {message}")]
    Config { message: String },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// 거부 에러 생성 (필드 지정)
    pub fn access_denied(field: impl Into<String>) -> Self {
        Error::AccessDenied {
            field: Some(field.into()),
        }
    }

    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unrestricted => "UNRESTRICTED",
            Error::Rule(_) => "RULE_FAILED",
            Error::AccessDenied { .. } => "ACCESS_DENIED",
            Error::Config { .. } => "CONFIG_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
        }
    }
}

fn access_denied_message(field: Option<&str>) -> String {
    match field {
        Some(field) => format!("Access denied to '{}'", field),
        None => "Access denied".to_string(),
    }
}
