//! Store 에러 타입

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Store 에러
#[derive(Debug, Error)]
pub enum StoreError {
    /// 권한 엔진 에러 (거부, 미제한, rule 실패)
    #[error(transparent)]
    Core(#[from] protector_core::Error),

    #[error("record not found: {id}")]
    NotFound { id: u64 },
}

impl StoreError {
    /// 에러 코드 (클라이언트용)
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Core(e) => e.code(),
            StoreError::NotFound { .. } => "NOT_FOUND",
        }
    }

    /// 권한 거부 여부
    pub fn is_access_denied(&self) -> bool {
        matches!(
            self,
            StoreError::Core(protector_core::Error::AccessDenied { .. })
        )
    }
}
