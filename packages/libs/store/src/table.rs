//! 인메모리 테이블과 제한된 relation
//!
//! # 조회 흐름
//!
//! 1. relation의 subject로 access decision 평가 (entry 없음)
//! 2. scoped이면 scope filter 적용 (filter가 없으면 빈 결과)
//! 3. 조회된 레코드에 같은 subject 전파

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use protector_core::{insecure, Attributes, Protectable, Restrictable};

use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::record::{Kind, Record};

/// 인메모리 테이블
pub struct Table<K: Kind> {
    rows: RwLock<BTreeMap<u64, Attributes>>,
    next_id: AtomicU64,
    _kind: std::marker::PhantomData<fn() -> K>,
}

impl<K: Kind> Table<K> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            _kind: std::marker::PhantomData,
        }
    }

    /// 제한 없는 relation
    pub fn all(&self) -> Relation<'_, K> {
        Relation {
            table: self,
            subject: None,
            filter: None,
        }
    }

    /// subject로 제한된 relation
    pub fn restrict(&self, subject: K::Subject) -> Relation<'_, K> {
        self.all().restrict(subject)
    }

    /// 레코드 저장 (새 레코드면 생성, 아니면 수정)
    pub fn save(&self, record: &mut Record<K>) -> Result<()> {
        record.check_save()?;

        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let id = match record.id() {
            Some(id) => {
                if !rows.contains_key(&id) {
                    return Err(StoreError::NotFound { id });
                }
                id
            }
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        rows.insert(id, record.attributes().clone());
        record.mark_saved(id);

        tracing::debug!(entity = std::any::type_name::<K>(), id, "record saved");
        Ok(())
    }

    /// 레코드 삭제
    pub fn destroy(&self, record: &mut Record<K>) -> Result<()> {
        record.check_destroy()?;

        let Some(id) = record.id() else {
            return Ok(());
        };
        self.rows
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .ok_or(StoreError::NotFound { id })?;
        record.mark_destroyed();

        tracing::debug!(entity = std::any::type_name::<K>(), id, "record destroyed");
        Ok(())
    }

    fn rows(&self) -> Vec<(u64, Attributes)> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, row)| (*id, row.clone()))
            .collect()
    }
}

impl<K: Kind> Default for Table<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// relation 조회에 적용되는 scope
enum Scope {
    /// 필터 없음
    Open,
    Filtered(Filter),
    /// scoped이지만 filter가 없음
    Empty,
}

/// 테이블 조회 view
///
/// 체인으로 만든 view는 subject와 filter를 이어받습니다.
pub struct Relation<'a, K: Kind> {
    table: &'a Table<K>,
    subject: Option<K::Subject>,
    filter: Option<Filter>,
}

impl<'a, K: Kind> Relation<'a, K> {
    /// subject 지정
    pub fn restrict(mut self, subject: K::Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// 추가 행 필터 (기존 필터와 AND)
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(&filter),
            None => filter,
        });
        self
    }

    pub fn subject(&self) -> Option<&K::Subject> {
        self.subject.as_ref()
    }

    /// 조회 결과
    pub fn to_vec(&self) -> Result<Vec<Record<K>>> {
        let scope = match self.scope()? {
            Scope::Open => None,
            Scope::Filtered(filter) => Some(filter),
            Scope::Empty => return Ok(Vec::new()),
        };

        let records = self
            .table
            .rows()
            .into_iter()
            .filter(|(_, row)| scope.as_ref().map_or(true, |s| s.matches(row)))
            .filter(|(_, row)| self.filter.as_ref().map_or(true, |f| f.matches(row)))
            .map(|(id, row)| self.attach(Record::persisted(id, row)))
            .collect();
        Ok(records)
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.to_vec()?.len())
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// relation subject 기준 생성 가능 여부 (entry 없이 평가)
    pub fn creatable(&self) -> Result<bool> {
        match &self.subject {
            Some(subject) => {
                let decision = Record::<K>::protector_meta().evaluate(subject, None)?;
                Ok(decision.creatable(None))
            }
            None => Ok(true),
        }
    }

    /// id로 조회 (보이지 않으면 [`StoreError::NotFound`])
    pub fn find(&self, id: u64) -> Result<Record<K>> {
        self.to_vec()?
            .into_iter()
            .find(|record| record.id() == Some(id))
            .ok_or(StoreError::NotFound { id })
    }

    /// relation의 subject로 제한된 새 레코드
    pub fn new_record(&self, attributes: Attributes) -> Record<K> {
        self.attach(Record::new(attributes))
    }

    /// 새 레코드 생성 후 저장
    pub fn create(&self, attributes: Attributes) -> Result<Record<K>> {
        let mut record = self.new_record(attributes);
        self.table.save(&mut record)?;
        Ok(record)
    }

    fn attach(&self, record: Record<K>) -> Record<K> {
        match &self.subject {
            Some(subject) => record.restrict(subject.clone()),
            None => record,
        }
    }

    /// 적용할 scope filter
    fn scope(&self) -> Result<Scope> {
        let Some(subject) = &self.subject else {
            return Ok(Scope::Open);
        };
        if insecure::is_insecure() {
            return Ok(Scope::Open);
        }

        let decision = Record::<K>::protector_meta().evaluate(subject, None)?;
        if !decision.scoped() {
            return Ok(Scope::Open);
        }

        match decision.relation() {
            Some(filter) => Ok(Scope::Filtered(filter.clone())),
            None => {
                tracing::debug!(
                    entity = std::any::type_name::<K>(),
                    "scoped without relation, returning empty result"
                );
                Ok(Scope::Empty)
            }
        }
    }
}

impl<K: Kind> Clone for Relation<'_, K> {
    fn clone(&self) -> Self {
        Self {
            table: self.table,
            subject: self.subject.clone(),
            filter: self.filter.clone(),
        }
    }
}
