//! 보호되는 레코드
//!
//! 제한(restrict)된 레코드는 읽기 시 허용되지 않은 필드를 숨기고,
//! 저장 / 삭제 시 access decision으로 검증합니다.

use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use protector_core::{Attributes, Error, Protectable, Restrictable, Restriction};

use crate::error::Result;
use crate::filter::Filter;

/// 레코드 종류 (테이블 스키마)
pub trait Kind: Send + Sync + 'static {
    /// 권한 평가 주체
    type Subject: Clone + Send + Sync + 'static;

    /// 컬럼 이름
    fn fields() -> Vec<String>;
}

/// 하나의 행
pub struct Record<K: Kind> {
    id: Option<u64>,
    attributes: Attributes,
    original: Attributes,
    restriction: Restriction<Record<K>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Kind> Protectable for Record<K> {
    type Subject = K::Subject;
    type Scope = Filter;

    fn protector_fields() -> Vec<String> {
        K::fields()
    }
}

impl<K: Kind> Restrictable for Record<K> {
    fn restriction(&self) -> &Restriction<Self> {
        &self.restriction
    }

    fn restriction_mut(&mut self) -> &mut Restriction<Self> {
        &mut self.restriction
    }
}

impl<K: Kind> Record<K> {
    /// 저장되지 않은 새 레코드
    pub fn new(attributes: Attributes) -> Self {
        Self {
            id: None,
            attributes,
            original: Attributes::new(),
            restriction: Restriction::new(),
            _kind: PhantomData,
        }
    }

    pub(crate) fn persisted(id: u64, attributes: Attributes) -> Self {
        Self {
            id: Some(id),
            original: attributes.clone(),
            attributes,
            restriction: Restriction::new(),
            _kind: PhantomData,
        }
    }

    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// 필드 값 (읽기 권한이 없으면 `None`)
    ///
    /// 제한되지 않았거나 insecure 스코프 안이면 그대로 반환합니다.
    pub fn get(&self, field: &str) -> Result<Option<&Value>> {
        if self.has_protector_subject() && !self.access_decision()?.readable(field) {
            return Ok(None);
        }
        Ok(self.attributes.get(field))
    }

    /// 권한 체크 없이 필드 값 반환
    pub fn read_attribute(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    /// 저장 이후 값이 바뀐 필드 (새 레코드는 전체)
    pub fn changes(&self) -> Attributes {
        self.attributes
            .iter()
            .filter(|(name, value)| self.original.get(name.as_str()) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// 단일 레코드 가시성 (scope filter 기준)
    pub fn visible(&self) -> Result<bool> {
        let decision = self.access_decision()?;
        Ok(decision.visible(self, |filter, record| filter.matches(&record.attributes)))
    }

    /// 생성 / 수정 검증
    ///
    /// 거부 시 첫 번째 거부 필드를 담은 `AccessDenied`를 반환합니다.
    pub(crate) fn check_save(&self) -> Result<()> {
        if !self.has_protector_subject() {
            return Ok(());
        }

        let decision = self.access_decision()?;
        let changes = self.changes();

        let (offending, allowed) = if self.is_new() {
            (
                decision.first_uncreatable_field_for(&changes, Some(self)),
                decision.creatable_for(Some(&changes), Some(self)),
            )
        } else {
            (
                decision.first_unupdatable_field_for(&changes, Some(self)),
                decision.updatable_for(Some(&changes), Some(self)),
            )
        };

        if let Some(field) = offending {
            tracing::debug!(entity = std::any::type_name::<K>(), field = %field, "save rejected");
            return Err(Error::access_denied(field).into());
        }
        if !allowed {
            tracing::debug!(entity = std::any::type_name::<K>(), "save rejected");
            return Err(Error::AccessDenied { field: None }.into());
        }
        Ok(())
    }

    pub(crate) fn check_destroy(&self) -> Result<()> {
        if self.has_protector_subject() && !self.access_decision()?.destroyable() {
            tracing::debug!(entity = std::any::type_name::<K>(), id = ?self.id, "destroy rejected");
            return Err(Error::AccessDenied { field: None }.into());
        }
        Ok(())
    }

    pub(crate) fn mark_saved(&mut self, id: u64) {
        self.id = Some(id);
        self.original = self.attributes.clone();
    }

    pub(crate) fn mark_destroyed(&mut self) {
        self.id = None;
        self.original = Attributes::new();
    }
}

/// 복제본은 subject를 유지하고 decision은 다시 평가합니다.
impl<K: Kind> Clone for Record<K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            attributes: self.attributes.clone(),
            original: self.original.clone(),
            restriction: self.restriction.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: Kind> fmt::Debug for Record<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("kind", &std::any::type_name::<K>())
            .field("id", &self.id)
            .field("attributes", &self.attributes)
            .field("restriction", &self.restriction)
            .finish()
    }
}
