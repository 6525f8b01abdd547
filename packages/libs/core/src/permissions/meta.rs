//! Rule block 누적기 (Meta)
//!
//! 보호 대상 타입마다 하나씩 존재하며, 등록 순서대로 rule block을 보관합니다.
//! 상속 관계가 있으면 상위 타입의 block이 먼저 평가됩니다.

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::decision::AccessDecision;
use super::rules::Rules;
use crate::config;
use crate::dsl::Protectable;
use crate::error::{Error, Result};
use crate::insecure::insecurely;

type BareFn<E> = dyn Fn(&mut Rules<E>) -> anyhow::Result<()> + Send + Sync;
type SubjectFn<E> =
    dyn Fn(&mut Rules<E>, &<E as Protectable>::Subject) -> anyhow::Result<()> + Send + Sync;
type EntryFn<E> = dyn Fn(&mut Rules<E>, &<E as Protectable>::Subject, Option<&E>) -> anyhow::Result<()>
    + Send
    + Sync;

/// rule block 반환값
///
/// `()` 또는 `Result<(), impl Into<anyhow::Error>>`를 반환할 수 있습니다.
pub trait RuleOutcome {
    fn into_result(self) -> anyhow::Result<()>;
}

impl RuleOutcome for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<Err: Into<anyhow::Error>> RuleOutcome for std::result::Result<(), Err> {
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// 등록된 rule block
///
/// 인자 개수별로 구분됩니다. (없음 / subject / subject + entry)
pub enum RuleBlock<E: Protectable> {
    Bare(Arc<BareFn<E>>),
    Subject(Arc<SubjectFn<E>>),
    Entry(Arc<EntryFn<E>>),
}

impl<E: Protectable> RuleBlock<E> {
    /// 인자 없는 block (legacy)
    pub fn bare<F, R>(f: F) -> Self
    where
        F: Fn(&mut Rules<E>) -> R + Send + Sync + 'static,
        R: RuleOutcome,
    {
        RuleBlock::Bare(Arc::new(move |rules: &mut Rules<E>| f(rules).into_result()))
    }

    /// subject만 받는 block
    pub fn subject<F, R>(f: F) -> Self
    where
        F: Fn(&mut Rules<E>, &E::Subject) -> R + Send + Sync + 'static,
        R: RuleOutcome,
    {
        RuleBlock::Subject(Arc::new(move |rules: &mut Rules<E>, subject: &E::Subject| {
            f(rules, subject).into_result()
        }))
    }

    /// subject와 entry를 받는 block
    pub fn entry<F, R>(f: F) -> Self
    where
        F: Fn(&mut Rules<E>, &E::Subject, Option<&E>) -> R + Send + Sync + 'static,
        R: RuleOutcome,
    {
        RuleBlock::Entry(Arc::new(
            move |rules: &mut Rules<E>, subject: &E::Subject, entry: Option<&E>| {
                f(rules, subject, entry).into_result()
            },
        ))
    }

    fn run(&self, rules: &mut Rules<E>, subject: &E::Subject, entry: Option<&E>) -> anyhow::Result<()> {
        match self {
            RuleBlock::Bare(f) => f(rules),
            RuleBlock::Subject(f) => f(rules, subject),
            RuleBlock::Entry(f) => f(rules, subject, entry),
        }
    }
}

impl<E: Protectable> Clone for RuleBlock<E> {
    fn clone(&self) -> Self {
        match self {
            RuleBlock::Bare(f) => RuleBlock::Bare(Arc::clone(f)),
            RuleBlock::Subject(f) => RuleBlock::Subject(Arc::clone(f)),
            RuleBlock::Entry(f) => RuleBlock::Entry(Arc::clone(f)),
        }
    }
}

/// 상위 타입의 rule block 평가
///
/// 하위 타입의 필드 목록으로 상위 block을 먼저 접은 뒤 하위 타입 컨텍스트로 넘깁니다.
pub trait Ancestor<E: Protectable>: Send + Sync {
    fn fold(
        &self,
        fields: &Arc<[String]>,
        subject: &E::Subject,
        entry: Option<&E>,
    ) -> anyhow::Result<Rules<E>>;
}

impl<P, E> Ancestor<E> for Meta<P>
where
    P: Protectable,
    E: Protectable<Subject = P::Subject, Scope = P::Scope> + AsRef<P>,
{
    fn fold(
        &self,
        fields: &Arc<[String]>,
        subject: &E::Subject,
        entry: Option<&E>,
    ) -> anyhow::Result<Rules<E>> {
        let rules = self.fold_rules(fields, subject, entry.map(|e| e.as_ref()))?;
        Ok(rules.upcast())
    }
}

/// Rule block 누적기
pub struct Meta<E: Protectable> {
    parent: Option<Arc<dyn Ancestor<E>>>,
    blocks: RwLock<Vec<RuleBlock<E>>>,
    provider: Box<dyn Fn() -> Vec<String> + Send + Sync>,
    fields: OnceLock<Arc<[String]>>,
}

impl<E: Protectable> Meta<E> {
    /// 새 Meta 생성
    ///
    /// `provider`는 필드 목록이 처음 필요할 때 한 번만 호출됩니다.
    pub fn new(provider: impl Fn() -> Vec<String> + Send + Sync + 'static) -> Self {
        Self {
            parent: None,
            blocks: RwLock::new(Vec::new()),
            provider: Box::new(provider),
            fields: OnceLock::new(),
        }
    }

    /// 상위 타입 연결
    pub fn with_parent(mut self, parent: Option<Arc<dyn Ancestor<E>>>) -> Self {
        self.parent = parent;
        self
    }

    /// rule block 등록 (중복 제거 없음)
    pub fn register(&self, block: RuleBlock<E>) -> &Self {
        let mut blocks = self.blocks.write().unwrap_or_else(PoisonError::into_inner);
        blocks.push(block);
        tracing::debug!(
            entity = std::any::type_name::<E>(),
            blocks = blocks.len(),
            "rule block registered"
        );
        self
    }

    /// 인자 없는 block 등록
    pub fn protect_bare<F, R>(&self, f: F) -> &Self
    where
        F: Fn(&mut Rules<E>) -> R + Send + Sync + 'static,
        R: RuleOutcome,
    {
        self.register(RuleBlock::bare(f))
    }

    /// subject block 등록
    pub fn protect_subject<F, R>(&self, f: F) -> &Self
    where
        F: Fn(&mut Rules<E>, &E::Subject) -> R + Send + Sync + 'static,
        R: RuleOutcome,
    {
        self.register(RuleBlock::subject(f))
    }

    /// subject + entry block 등록
    pub fn protect<F, R>(&self, f: F) -> &Self
    where
        F: Fn(&mut Rules<E>, &E::Subject, Option<&E>) -> R + Send + Sync + 'static,
        R: RuleOutcome,
    {
        self.register(RuleBlock::entry(f))
    }

    /// 메모이즈된 필드 목록
    pub fn fields(&self) -> &[String] {
        self.field_set()
    }

    /// 직접 등록된 block 수 (상위 타입 제외)
    pub fn len(&self) -> usize {
        self.blocks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 모든 rule block을 평가하여 새 결과 생성
    ///
    /// 호출마다 block을 새로 실행하며 결과를 캐시하지 않습니다.
    /// block은 insecure 스코프 안에서 실행되고, block의 에러는 그대로 반환됩니다.
    pub fn evaluate(&self, subject: &E::Subject, entry: Option<&E>) -> Result<AccessDecision<E>> {
        let fields = Arc::clone(self.field_set());
        let rules = insecurely(|| self.fold_rules(&fields, subject, entry)).map_err(Error::Rule)?;
        let decision = rules.into_decision(config::is_paranoid());

        tracing::debug!(
            entity = std::any::type_name::<E>(),
            actions = decision.access().len(),
            destroyable = decision.destroyable(),
            scoped = decision.scoped(),
            "access evaluated"
        );

        Ok(decision)
    }

    /// 상위 타입 → 자신 순서로 block을 접습니다.
    pub fn fold_rules(
        &self,
        fields: &Arc<[String]>,
        subject: &E::Subject,
        entry: Option<&E>,
    ) -> anyhow::Result<Rules<E>> {
        let mut rules = match &self.parent {
            Some(parent) => parent.fold(fields, subject, entry)?,
            None => Rules::new(Arc::clone(fields)),
        };

        // block 실행 중 등록이 일어나도 교착되지 않도록 스냅샷 후 락 해제
        let blocks = self
            .blocks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, block) in blocks.iter().enumerate() {
            tracing::trace!(entity = std::any::type_name::<E>(), index, "running rule block");
            block.run(&mut rules, subject, entry)?;
        }

        Ok(rules)
    }

    fn field_set(&self) -> &Arc<[String]> {
        self.fields.get_or_init(|| (self.provider)().into())
    }
}

impl<E: Protectable> fmt::Debug for Meta<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta")
            .field("entity", &std::any::type_name::<E>())
            .field("inherits", &self.parent.is_some())
            .field("blocks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{with_config, Config};
    use crate::permissions::action::{Action, ALL};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Item;

    impl Protectable for Item {
        type Subject = Option<String>;
        type Scope = String;

        fn protector_fields() -> Vec<String> {
            vec!["field1".to_string(), "field2".to_string(), "field3".to_string()]
        }
    }

    fn meta() -> Meta<Item> {
        Meta::new(Item::protector_fields)
    }

    #[test]
    fn test_fields_provider_called_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let meta: Meta<Item> = Meta::new(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            vec!["a".to_string()]
        });
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
        assert_eq!(meta.fields(), ["a".to_string()]);
        meta.evaluate(&None, None).unwrap();
        meta.evaluate(&None, None).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_all_arities_run() {
        let m = meta();
        m.protect_bare(|r| {
            r.can(Action::Read, "field1");
        });
        m.protect_subject(|r, subject| {
            if subject.is_some() {
                r.can(Action::Read, "field2");
            }
        });
        m.protect(|r, _, entry| {
            if entry.is_none() {
                r.can(Action::Read, "field3");
            }
        });
        assert_eq!(m.len(), 3);

        let d = m.evaluate(&Some("user".to_string()), None).unwrap();
        assert_eq!(d.access()[&Action::Read].len(), 3);
    }

    #[test]
    fn test_duplicate_registration_runs_twice() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);
        let m = meta();
        let block = RuleBlock::bare(|_r: &mut Rules<Item>| {
            RUNS.fetch_add(1, Ordering::SeqCst);
        });
        m.register(block.clone());
        m.register(block);
        m.evaluate(&None, None).unwrap();
        assert_eq!(RUNS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rule_error_propagates() {
        let m = meta();
        m.protect_subject(|_r, subject| {
            if subject.as_deref() != Some("user") {
                anyhow::bail!("wrong user");
            }
            Ok(())
        });

        assert!(m.evaluate(&Some("user".to_string()), None).is_ok());
        let err = m.evaluate(&Some("other".to_string()), None).unwrap_err();
        assert!(matches!(err, Error::Rule(_)));
        assert_eq!(err.to_string(), "wrong user");
        assert!(!crate::insecure::is_insecure());
    }

    #[test]
    fn test_blocks_run_insecurely() {
        let m = meta();
        m.protect_bare(|r| {
            if crate::insecure::is_insecure() {
                r.can(Action::Read, ALL);
            }
        });
        assert!(m.evaluate(&None, None).unwrap().can(Action::Read));
    }

    #[test]
    fn test_scope_is_running_value() {
        let m = meta();
        m.protect_subject(|r, subject| {
            if subject.is_some() {
                r.scope("first".to_string());
            }
        });
        m.protect_bare(|_r| {});
        m.protect_subject(|r, subject| {
            if subject.as_deref() == Some("admin") {
                r.scope("second".to_string());
            }
        });

        let d = m.evaluate(&Some("user".to_string()), None).unwrap();
        assert_eq!(d.relation().map(String::as_str), Some("first"));

        let d = m.evaluate(&Some("admin".to_string()), None).unwrap();
        assert_eq!(d.relation().map(String::as_str), Some("second"));

        let d = with_config(Config { paranoid: false }, || m.evaluate(&None, None).unwrap());
        assert!(!d.scoped());
        assert!(d.relation().is_none());
    }

    #[test]
    fn test_block_can_register_during_evaluation() {
        let m = Arc::new(meta());
        let inner = Arc::clone(&m);
        m.protect_bare(move |_r| {
            if inner.len() < 3 {
                inner.protect_bare(|_r| {});
            }
        });
        m.evaluate(&None, None).unwrap();
        assert_eq!(m.len(), 2);
    }
}
