//! DSL 진입점
//!
//! 보호 대상 타입은 [`Protectable`]을 구현하고 `protect`로 rule block을 등록합니다.
//! 타입별 [`Meta`]는 `TypeId`를 키로 하는 전역 레지스트리에 지연 생성됩니다.
//!
//! # 예시
//!
//! ```
//! use protector_core::{Action, Protectable, ALL};
//!
//! struct Post;
//!
//! impl Protectable for Post {
//!     type Subject = Option<String>;
//!     type Scope = String;
//!
//!     fn protector_fields() -> Vec<String> {
//!         vec!["title".to_string(), "body".to_string()]
//!     }
//! }
//!
//! Post::protect(|rules, user, _entry| {
//!     rules.can(Action::Read, ALL);
//!     if user.is_some() {
//!         rules.can(Action::Update, "body");
//!     }
//! });
//!
//! let decision = Post::protector_meta()
//!     .evaluate(&Some("alice".to_string()), None)
//!     .unwrap();
//! assert!(decision.can_field(Action::Update, "body"));
//! assert!(!decision.can_field(Action::Update, "title"));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::permissions::{Ancestor, Meta, RuleOutcome, Rules};

type Metas = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static REGISTRY: LazyLock<RwLock<Metas>> = LazyLock::new(|| RwLock::new(HashMap::new()));

/// 보호 대상 타입
pub trait Protectable: Sized + Send + Sync + 'static {
    /// 권한 평가 주체 (None을 허용하려면 `Option<_>` 사용)
    type Subject: Clone + Send + Sync + 'static;

    /// collaborator 쿼리 계층이 해석하는 scope 값
    type Scope: Clone + Send + Sync + 'static;

    /// 필드 이름 제공자 (최초 사용 시 한 번만 호출)
    fn protector_fields() -> Vec<String>;

    /// 상위 타입 (상속)
    ///
    /// 상위 타입이 있으면 [`inherit`]로 반환합니다.
    fn protector_parent() -> Option<Arc<dyn Ancestor<Self>>> {
        None
    }

    /// 타입별 Meta (최초 접근 시 생성)
    fn protector_meta() -> Arc<Meta<Self>> {
        meta::<Self>()
    }

    /// subject + entry rule block 등록
    fn protect<F, R>(f: F)
    where
        F: Fn(&mut Rules<Self>, &Self::Subject, Option<&Self>) -> R + Send + Sync + 'static,
        R: RuleOutcome,
    {
        Self::protector_meta().protect(f);
    }

    /// subject만 받는 rule block 등록
    fn protect_subject<F, R>(f: F)
    where
        F: Fn(&mut Rules<Self>, &Self::Subject) -> R + Send + Sync + 'static,
        R: RuleOutcome,
    {
        Self::protector_meta().protect_subject(f);
    }
}

/// 상위 타입 `P`의 rule block을 먼저 평가하도록 연결
///
/// 하위 타입은 `AsRef<P>`로 상위 타입 view를 제공해야 하며,
/// subject / scope 타입을 공유합니다.
pub fn inherit<P, E>() -> Option<Arc<dyn Ancestor<E>>>
where
    P: Protectable,
    E: Protectable<Subject = P::Subject, Scope = P::Scope> + AsRef<P>,
{
    let parent: Arc<dyn Ancestor<E>> = P::protector_meta();
    Some(parent)
}

/// 레지스트리에서 타입별 Meta 조회 (없으면 생성)
pub fn meta<T: Protectable>() -> Arc<Meta<T>> {
    let existing = lookup::<T>(&REGISTRY.read().unwrap_or_else(PoisonError::into_inner));
    if let Some(meta) = existing {
        return meta;
    }

    // 상위 타입 Meta 조회가 레지스트리를 다시 잠그므로 락 밖에서 생성
    let created = Arc::new(Meta::new(T::protector_fields).with_parent(T::protector_parent()));

    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(meta) = lookup::<T>(&registry) {
        return meta;
    }

    tracing::debug!(entity = std::any::type_name::<T>(), "protector meta created");
    registry.insert(TypeId::of::<T>(), Arc::clone(&created) as Arc<dyn Any + Send + Sync>);
    created
}

fn lookup<T: Protectable>(registry: &Metas) -> Option<Arc<Meta<T>>> {
    registry
        .get(&TypeId::of::<T>())
        .cloned()
        .and_then(|meta| meta.downcast::<Meta<T>>().ok())
}
