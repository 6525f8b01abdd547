//! 액션과 필드 선택자 정의

use std::fmt;

use serde::{Deserialize, Serialize};

/// 권한 액션
///
/// 표준 CRUD 액션 외에 임의의 커스텀 액션을 지원합니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Read,
    Create,
    Update,
    Destroy,
    Custom(String),
}

impl Action {
    /// 문자열에서 파싱
    ///
    /// 기본 액션 이름만 대소문자를 무시하며, 커스텀 액션 이름은 그대로 유지합니다.
    /// deprecated alias `view`는 `read`로 처리됩니다.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "read" => Action::Read,
            "view" => {
                tracing::warn!("action `view` is deprecated, use `read` instead");
                Action::Read
            }
            "create" => Action::Create,
            "update" => Action::Update,
            "destroy" => Action::Destroy,
            _ => Action::Custom(s.to_string()),
        }
    }

    /// 문자열로 변환
    pub fn as_str(&self) -> &str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
            Action::Custom(name) => name,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Action::parse(s)
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::parse(&s)
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_string()
    }
}

/// `can` / `cannot`의 필드 선택자
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fields {
    /// 필드 지정 없음 (wildcard)
    All,

    /// 명시적 필드 목록
    Named(Vec<String>),
}

/// wildcard 선택자
pub const ALL: Fields = Fields::All;

impl Fields {
    /// 필드 목록 (비어 있으면 wildcard)
    pub fn named(fields: Vec<String>) -> Self {
        if fields.is_empty() {
            Fields::All
        } else {
            Fields::Named(fields)
        }
    }
}

impl From<&str> for Fields {
    fn from(field: &str) -> Self {
        Fields::Named(vec![field.to_string()])
    }
}

impl From<String> for Fields {
    fn from(field: String) -> Self {
        Fields::Named(vec![field])
    }
}

impl<const N: usize> From<[&str; N]> for Fields {
    fn from(fields: [&str; N]) -> Self {
        Fields::named(fields.iter().map(|f| f.to_string()).collect())
    }
}

impl From<&[&str]> for Fields {
    fn from(fields: &[&str]) -> Self {
        Fields::named(fields.iter().map(|f| f.to_string()).collect())
    }
}

impl From<Vec<String>> for Fields {
    fn from(fields: Vec<String>) -> Self {
        Fields::named(fields)
    }
}

impl From<Vec<&str>> for Fields {
    fn from(fields: Vec<&str>) -> Self {
        Fields::named(fields.into_iter().map(str::to_string).collect())
    }
}
