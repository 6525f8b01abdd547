//! Scope filter
//!
//! rule block의 `scope`에 기록되는 행 필터입니다.
//! relation 조회 시 테이블 행에 적용됩니다.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use protector_core::Attributes;

/// 행 필터
#[derive(Clone)]
pub struct Filter(Arc<dyn Fn(&Attributes) -> bool + Send + Sync>);

impl Filter {
    pub fn new(f: impl Fn(&Attributes) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// `field == value` 필터
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        Self::new(move |row| row.get(&field) == Some(&value))
    }

    /// 모든 행 제외
    pub fn none() -> Self {
        Self::new(|_| false)
    }

    pub fn matches(&self, row: &Attributes) -> bool {
        (self.0)(row)
    }

    /// 두 필터의 AND
    pub fn and(&self, other: &Filter) -> Self {
        let (a, b) = (self.clone(), other.clone());
        Self::new(move |row| a.matches(row) && b.matches(row))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}
