//! Rule block 평가 컨텍스트
//!
//! 각 rule block은 `&mut Rules`를 받아 `can` / `cannot` / `scope`를 호출합니다.
//! 평가가 끝나면 누적된 상태가 불변 [`AccessDecision`]으로 확정됩니다.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::action::{Action, Fields};
use super::constraint::Constraint;
use super::decision::AccessDecision;
use crate::dsl::Protectable;

/// action → (field → constraint) 맵
pub type Access<E> = IndexMap<Action, IndexMap<String, Constraint<E>>>;

/// 평가 중인 권한 상태
///
/// (action, field) 쌍에 대해서는 마지막으로 호출된 `can`/`cannot`이 이깁니다.
/// `scope`는 블록 경계와 무관하게 마지막 값이 유지됩니다.
pub struct Rules<E: Protectable> {
    fields: Arc<[String]>,
    access: Access<E>,
    destroyable: bool,
    scope: Option<E::Scope>,
    scope_called: bool,
}

impl<E: Protectable> Rules<E> {
    /// 빈 컨텍스트 생성
    pub fn new(fields: Arc<[String]>) -> Self {
        Self {
            fields,
            access: IndexMap::new(),
            destroyable: false,
            scope: None,
            scope_called: false,
        }
    }

    /// wildcard 확장에 사용되는 필드 목록
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// 필드 허용
    ///
    /// `ALL`이면 현재 필드 목록 전체를 제약 없이 허용합니다.
    /// `destroy`는 필드와 무관한 플래그로 기록됩니다.
    pub fn can(&mut self, action: impl Into<Action>, fields: impl Into<Fields>) -> &mut Self {
        let action = action.into();
        if action == Action::Destroy {
            self.destroyable = true;
            return self;
        }

        let names = match fields.into() {
            Fields::All => self.fields.to_vec(),
            Fields::Named(names) => names,
        };

        let entry = self.access.entry(action).or_default();
        for name in names {
            entry.insert(name, Constraint::Unconstrained);
        }
        self
    }

    /// 필드별 제약 조건과 함께 허용
    pub fn can_with<K, I>(&mut self, action: impl Into<Action>, constraints: I) -> &mut Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Constraint<E>)>,
    {
        let action = action.into();
        if action == Action::Destroy {
            self.destroyable = true;
            return self;
        }

        let entry = self.access.entry(action).or_default();
        for (name, constraint) in constraints {
            entry.insert(name.into(), constraint);
        }
        self
    }

    /// 필드 거부
    ///
    /// `ALL`이면 action 자체를 제거하고, 필드 맵이 비면 action도 제거합니다.
    pub fn cannot(&mut self, action: impl Into<Action>, fields: impl Into<Fields>) -> &mut Self {
        let action = action.into();
        if action == Action::Destroy {
            self.destroyable = false;
            return self;
        }

        let Some(entry) = self.access.get_mut(&action) else {
            return self;
        };

        match fields.into() {
            Fields::All => {
                self.access.shift_remove(&action);
            }
            Fields::Named(names) => {
                for name in &names {
                    entry.shift_remove(name);
                }
                if entry.is_empty() {
                    self.access.shift_remove(&action);
                }
            }
        }
        self
    }

    /// scope 값 기록 (마지막 호출만 유지)
    pub fn scope(&mut self, scope: E::Scope) -> &mut Self {
        self.scope = Some(scope);
        self.scope_called = true;
        self
    }

    /// 지금까지 기록된 scope 값
    pub fn current_scope(&self) -> Option<&E::Scope> {
        self.scope.as_ref()
    }

    /// 불변 결과로 확정
    pub fn into_decision(self, paranoid: bool) -> AccessDecision<E> {
        AccessDecision::new(
            self.access,
            self.destroyable,
            self.scope,
            self.scope_called || paranoid,
        )
    }

    /// 상위 타입 평가 결과를 하위 타입 컨텍스트로 변환
    pub fn upcast<C>(self) -> Rules<C>
    where
        C: Protectable<Subject = E::Subject, Scope = E::Scope> + AsRef<E>,
    {
        let access = self
            .access
            .into_iter()
            .map(|(action, fields)| {
                let fields = fields
                    .into_iter()
                    .map(|(name, constraint)| (name, constraint.upcast::<C>()))
                    .collect();
                (action, fields)
            })
            .collect();

        Rules {
            fields: self.fields,
            access,
            destroyable: self.destroyable,
            scope: self.scope,
            scope_called: self.scope_called,
        }
    }
}

impl<E: Protectable> fmt::Debug for Rules<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("access", &self.access)
            .field("destroyable", &self.destroyable)
            .field("scope_called", &self.scope_called)
            .finish()
    }
}
