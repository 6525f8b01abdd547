//! 권한 평가 결과 (Access Decision)
//!
//! [`Meta::evaluate`](super::Meta::evaluate)가 생성하는 불변 결과입니다.
//! 모든 질의 메서드는 결과 상태에 대한 순수 함수입니다.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use super::action::Action;
use super::constraint::resolve;
use super::rules::Access;
use crate::dsl::Protectable;
use crate::insecure::insecurely;

/// 후보 속성 (field → 제안된 값)
///
/// 순회 순서는 삽입 순서를 따릅니다.
pub type Attributes = IndexMap<String, Value>;

/// 권한 평가 결과
pub struct AccessDecision<E: Protectable> {
    access: Access<E>,
    destroyable: bool,
    relation: Option<E::Scope>,
    scoped: bool,
}

impl<E: Protectable> AccessDecision<E> {
    pub(crate) fn new(
        access: Access<E>,
        destroyable: bool,
        relation: Option<E::Scope>,
        scoped: bool,
    ) -> Self {
        Self {
            access,
            destroyable,
            relation,
            scoped,
        }
    }

    /// action → field → constraint 맵 (`destroy`는 포함되지 않음)
    pub fn access(&self) -> &Access<E> {
        &self.access
    }

    /// 마지막으로 기록된 scope 값
    pub fn relation(&self) -> Option<&E::Scope> {
        self.relation.as_ref()
    }

    /// scope가 기록되었거나 paranoid 모드인지 여부
    pub fn scoped(&self) -> bool {
        self.scoped
    }

    /// action 허용 여부 (필드 무관)
    pub fn can(&self, action: impl Into<Action>) -> bool {
        let action = action.into();
        if action == Action::Destroy {
            return self.destroyable;
        }
        self.access.contains_key(&action)
    }

    /// 특정 필드에 대한 action 허용 여부
    pub fn can_field(&self, action: impl Into<Action>, field: &str) -> bool {
        let action = action.into();
        if action == Action::Destroy {
            return self.destroyable;
        }
        self.access
            .get(&action)
            .is_some_and(|fields| fields.contains_key(field))
    }

    /// 필드 읽기 허용 여부
    pub fn readable(&self, field: &str) -> bool {
        self.can_field(Action::Read, field)
    }

    /// 생성 허용 여부
    ///
    /// `candidate`가 `None`이면 action이 하나라도 허용되는지만 확인합니다.
    pub fn creatable(&self, candidate: Option<&Attributes>) -> bool {
        self.modifiable(&Action::Create, candidate, None)
    }

    /// 생성 허용 여부 (entry predicate에 entry 전달)
    pub fn creatable_for(&self, candidate: Option<&Attributes>, entry: Option<&E>) -> bool {
        self.modifiable(&Action::Create, candidate, entry)
    }

    /// 수정 허용 여부
    ///
    /// 호출자는 변경된 필드만 `candidate`로 전달합니다.
    pub fn updatable(&self, candidate: Option<&Attributes>) -> bool {
        self.modifiable(&Action::Update, candidate, None)
    }

    /// 수정 허용 여부 (entry predicate에 entry 전달)
    pub fn updatable_for(&self, candidate: Option<&Attributes>, entry: Option<&E>) -> bool {
        self.modifiable(&Action::Update, candidate, entry)
    }

    /// 삭제 허용 여부
    pub fn destroyable(&self) -> bool {
        self.destroyable
    }

    /// 생성이 거부되는 첫 번째 필드
    pub fn first_uncreatable_field(&self, candidate: &Attributes) -> Option<String> {
        self.first_unmodifiable_field(&Action::Create, candidate, None)
    }

    /// 생성이 거부되는 첫 번째 필드 (entry 전달)
    pub fn first_uncreatable_field_for(
        &self,
        candidate: &Attributes,
        entry: Option<&E>,
    ) -> Option<String> {
        self.first_unmodifiable_field(&Action::Create, candidate, entry)
    }

    /// 수정이 거부되는 첫 번째 필드
    pub fn first_unupdatable_field(&self, candidate: &Attributes) -> Option<String> {
        self.first_unmodifiable_field(&Action::Update, candidate, None)
    }

    /// 수정이 거부되는 첫 번째 필드 (entry 전달)
    pub fn first_unupdatable_field_for(
        &self,
        candidate: &Attributes,
        entry: Option<&E>,
    ) -> Option<String> {
        self.first_unmodifiable_field(&Action::Update, candidate, entry)
    }

    /// 단일 entry의 가시성
    ///
    /// unscoped면 항상 보입니다. scope 값 없이 scoped(paranoid)면 보이지 않습니다.
    /// 그 외에는 `contains`(collaborator의 membership 체크)에 위임합니다.
    pub fn visible(&self, entry: &E, contains: impl FnOnce(&E::Scope, &E) -> bool) -> bool {
        if !self.scoped {
            return true;
        }

        match &self.relation {
            Some(scope) => insecurely(|| contains(scope, entry)),
            None => false,
        }
    }

    fn modifiable(&self, action: &Action, candidate: Option<&Attributes>, entry: Option<&E>) -> bool {
        if !self.access.contains_key(action) {
            return false;
        }

        match candidate {
            Some(candidate) => self
                .first_unmodifiable_field(action, candidate, entry)
                .is_none(),
            None => true,
        }
    }

    /// 후보 속성 순서대로 처음 거부되는 필드를 찾습니다.
    ///
    /// predicate는 insecure 스코프 안에서 실행되므로, predicate가 같은 entry의
    /// 제한 상태를 다시 조회해도 재귀 권한 체크가 일어나지 않습니다.
    fn first_unmodifiable_field(
        &self,
        action: &Action,
        candidate: &Attributes,
        entry: Option<&E>,
    ) -> Option<String> {
        let fields = self.access.get(action);

        insecurely(|| {
            candidate
                .iter()
                .find(|(name, value)| {
                    !resolve(fields.and_then(|f| f.get(name.as_str())), value, entry)
                })
                .map(|(name, _)| name.clone())
        })
    }
}

impl<E: Protectable> fmt::Debug for AccessDecision<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessDecision")
            .field("access", &self.access)
            .field("destroyable", &self.destroyable)
            .field("has_relation", &self.relation.is_some())
            .field("scoped", &self.scoped)
            .finish()
    }
}
