//! Subject 제한 (Restriction)
//!
//! entry에 subject를 연결하고, 그 subject 기준의 평가 결과를 entry 단위로 캐시합니다.
//! subject가 바뀌거나 해제되면 캐시도 함께 버려집니다.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::dsl::Protectable;
use crate::error::{Error, Result};
use crate::insecure;
use crate::permissions::{AccessDecision, Action, Attributes};

/// entry별 subject + 캐시된 평가 결과
pub struct Restriction<E: Protectable> {
    subject: Option<E::Subject>,
    decision: OnceLock<Arc<AccessDecision<E>>>,
}

impl<E: Protectable> Restriction<E> {
    pub fn new() -> Self {
        Self {
            subject: None,
            decision: OnceLock::new(),
        }
    }

    /// subject 지정 (이전 캐시 폐기)
    pub fn restrict(&mut self, subject: E::Subject) {
        self.subject = Some(subject);
        self.decision = OnceLock::new();
    }

    /// subject 해제 (캐시 폐기)
    pub fn unrestrict(&mut self) {
        self.subject = None;
        self.decision = OnceLock::new();
    }

    /// 현재 subject
    pub fn subject(&self) -> Result<&E::Subject> {
        self.subject.as_ref().ok_or(Error::Unrestricted)
    }

    /// subject가 있고 insecure 스코프 밖인지 여부
    pub fn is_restricted(&self) -> bool {
        self.subject.is_some() && !insecure::is_insecure()
    }

    /// 평가 결과가 캐시되어 있는지 여부
    pub fn is_cached(&self) -> bool {
        self.decision.get().is_some()
    }

    /// 캐시된 결과 반환 (없으면 `evaluate`로 생성)
    pub fn decision_with(
        &self,
        evaluate: impl FnOnce(&E::Subject) -> Result<AccessDecision<E>>,
    ) -> Result<Arc<AccessDecision<E>>> {
        if let Some(decision) = self.decision.get() {
            return Ok(Arc::clone(decision));
        }

        let subject = self.subject()?;
        let decision = Arc::new(evaluate(subject)?);
        Ok(Arc::clone(self.decision.get_or_init(|| decision)))
    }
}

impl<E: Protectable> Default for Restriction<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// 복제본은 subject만 이어받고 결과는 다시 평가합니다.
impl<E: Protectable> Clone for Restriction<E> {
    fn clone(&self) -> Self {
        Self {
            subject: self.subject.clone(),
            decision: OnceLock::new(),
        }
    }
}

impl<E: Protectable> fmt::Debug for Restriction<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Restriction")
            .field("restricted", &self.subject.is_some())
            .field("cached", &self.is_cached())
            .finish()
    }
}

/// subject로 제한 가능한 entry
pub trait Restrictable: Protectable {
    fn restriction(&self) -> &Restriction<Self>;

    fn restriction_mut(&mut self) -> &mut Restriction<Self>;

    /// subject 지정 후 자신을 반환
    fn restrict(mut self, subject: Self::Subject) -> Self {
        self.restrict_mut(subject);
        self
    }

    fn restrict_mut(&mut self, subject: Self::Subject) -> &mut Self {
        tracing::trace!(entity = std::any::type_name::<Self>(), "entry restricted");
        self.restriction_mut().restrict(subject);
        self
    }

    fn unrestrict(&mut self) -> &mut Self {
        self.restriction_mut().unrestrict();
        self
    }

    /// 현재 subject (없으면 [`Error::Unrestricted`])
    fn protector_subject(&self) -> Result<&Self::Subject> {
        self.restriction().subject()
    }

    /// 권한 체크가 적용되는 상태인지 여부
    ///
    /// insecure 스코프 안에서는 항상 `false`입니다.
    fn has_protector_subject(&self) -> bool {
        self.restriction().is_restricted()
    }

    /// subject + 자신 기준의 평가 결과 (entry당 한 번 평가)
    fn access_decision(&self) -> Result<Arc<AccessDecision<Self>>> {
        self.restriction()
            .decision_with(|subject| Self::protector_meta().evaluate(subject, Some(self)))
    }

    fn can(&self, action: impl Into<Action>) -> Result<bool> {
        Ok(self.access_decision()?.can(action))
    }

    fn can_field(&self, action: impl Into<Action>, field: &str) -> Result<bool> {
        Ok(self.access_decision()?.can_field(action, field))
    }

    fn creatable(&self, candidate: Option<&Attributes>) -> Result<bool> {
        Ok(self.access_decision()?.creatable_for(candidate, Some(self)))
    }

    fn updatable(&self, candidate: Option<&Attributes>) -> Result<bool> {
        Ok(self.access_decision()?.updatable_for(candidate, Some(self)))
    }

    fn destroyable(&self) -> Result<bool> {
        Ok(self.access_decision()?.destroyable())
    }
}
