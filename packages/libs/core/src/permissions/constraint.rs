//! 필드 단위 제약 조건 (Constraint Resolver)
//!
//! 하나의 (action, field) 쌍에 대해 허용되는 값을 판정합니다.
//!
//! | 종류 | 규칙 |
//! |---|---|
//! | unconstrained | 항상 허용 |
//! | literal | `value == literal` |
//! | range | 범위에 포함 (선언된 경계 그대로) |
//! | predicate | `predicate(value)` |
//! | entry predicate | `predicate(value, entry)` |
//! | 없음 (필드 미언급) | 거부 |

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use serde_json::{Number, Value};

/// 값 하나를 받는 predicate
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// 값과 entry를 받는 predicate
pub type EntryPredicate<E> = Arc<dyn Fn(&Value, Option<&E>) -> bool + Send + Sync>;

/// 필드 제약 조건
pub enum Constraint<E> {
    /// 제약 없음 (항상 허용)
    Unconstrained,

    /// 고정값
    Literal(Value),

    /// 범위
    Range(ValueRange),

    /// 값 predicate
    Predicate(Predicate),

    /// 값 + entry predicate
    EntryPredicate(EntryPredicate<E>),
}

impl<E> Constraint<E> {
    /// 고정값 제약 생성
    pub fn literal(value: impl Into<Value>) -> Self {
        Constraint::Literal(value.into())
    }

    /// 범위 제약 생성 (`0..=5`, `0..5`, `10..` 등)
    pub fn range<T, R>(range: R) -> Self
    where
        T: Clone + Into<Value>,
        R: RangeBounds<T>,
    {
        Constraint::Range(ValueRange::new(range))
    }

    /// 값 predicate 제약 생성
    pub fn predicate(f: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Constraint::Predicate(Arc::new(f))
    }

    /// entry predicate 제약 생성
    pub fn entry_predicate(f: impl Fn(&Value, Option<&E>) -> bool + Send + Sync + 'static) -> Self {
        Constraint::EntryPredicate(Arc::new(f))
    }

    /// 제약 없음 여부
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Constraint::Unconstrained)
    }

    /// 값이 제약을 만족하는지 확인
    pub fn permits(&self, value: &Value, entry: Option<&E>) -> bool {
        match self {
            Constraint::Unconstrained => true,
            Constraint::Literal(expected) => literal_eq(value, expected),
            Constraint::Range(range) => range.contains(value),
            Constraint::Predicate(f) => f(value),
            Constraint::EntryPredicate(f) => f(value, entry),
        }
    }

    /// 상위 타입의 제약을 하위 타입 entry용으로 변환
    ///
    /// entry predicate는 `AsRef`를 통해 상위 타입 view를 받습니다.
    pub fn upcast<C>(self) -> Constraint<C>
    where
        C: AsRef<E> + 'static,
        E: 'static,
    {
        match self {
            Constraint::Unconstrained => Constraint::Unconstrained,
            Constraint::Literal(value) => Constraint::Literal(value),
            Constraint::Range(range) => Constraint::Range(range),
            Constraint::Predicate(f) => Constraint::Predicate(f),
            Constraint::EntryPredicate(f) => Constraint::EntryPredicate(Arc::new(
                move |value: &Value, entry: Option<&C>| f(value, entry.map(|e| e.as_ref())),
            )),
        }
    }
}

/// 제약 판정 (필드가 언급되지 않았으면 거부)
pub fn resolve<E>(constraint: Option<&Constraint<E>>, value: &Value, entry: Option<&E>) -> bool {
    constraint.is_some_and(|c| c.permits(value, entry))
}

impl<E> Clone for Constraint<E> {
    fn clone(&self) -> Self {
        match self {
            Constraint::Unconstrained => Constraint::Unconstrained,
            Constraint::Literal(value) => Constraint::Literal(value.clone()),
            Constraint::Range(range) => Constraint::Range(range.clone()),
            Constraint::Predicate(f) => Constraint::Predicate(Arc::clone(f)),
            Constraint::EntryPredicate(f) => Constraint::EntryPredicate(Arc::clone(f)),
        }
    }
}

/// predicate는 동일 인스턴스(Arc)일 때만 같다고 봅니다.
impl<E> PartialEq for Constraint<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constraint::Unconstrained, Constraint::Unconstrained) => true,
            (Constraint::Literal(a), Constraint::Literal(b)) => a == b,
            (Constraint::Range(a), Constraint::Range(b)) => a == b,
            (Constraint::Predicate(a), Constraint::Predicate(b)) => Arc::ptr_eq(a, b),
            (Constraint::EntryPredicate(a), Constraint::EntryPredicate(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<E> fmt::Debug for Constraint<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Unconstrained => f.write_str("Unconstrained"),
            Constraint::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Constraint::Range(range) => f.debug_tuple("Range").field(range).finish(),
            Constraint::Predicate(_) => f.write_str("Predicate(..)"),
            Constraint::EntryPredicate(_) => f.write_str("EntryPredicate(..)"),
        }
    }
}

impl<E> From<Value> for Constraint<E> {
    fn from(value: Value) -> Self {
        Constraint::Literal(value)
    }
}

/// JSON 값 범위
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRange {
    pub start: Bound<Value>,
    pub end: Bound<Value>,
}

impl ValueRange {
    /// Rust 범위 표현식에서 생성
    pub fn new<T, R>(range: R) -> Self
    where
        T: Clone + Into<Value>,
        R: RangeBounds<T>,
    {
        Self {
            start: map_bound(range.start_bound()),
            end: map_bound(range.end_bound()),
        }
    }

    /// 값이 범위에 포함되는지 확인
    ///
    /// 숫자끼리, 문자열끼리만 비교 가능하며 종류가 다르면 포함되지 않습니다.
    pub fn contains(&self, value: &Value) -> bool {
        let above_start = match &self.start {
            Bound::Included(start) => {
                matches!(compare(value, start), Some(Ordering::Greater | Ordering::Equal))
            }
            Bound::Excluded(start) => matches!(compare(value, start), Some(Ordering::Greater)),
            Bound::Unbounded => comparable(value),
        };

        let below_end = match &self.end {
            Bound::Included(end) => {
                matches!(compare(value, end), Some(Ordering::Less | Ordering::Equal))
            }
            Bound::Excluded(end) => matches!(compare(value, end), Some(Ordering::Less)),
            Bound::Unbounded => comparable(value),
        };

        above_start && below_end
    }
}

fn map_bound<T: Clone + Into<Value>>(bound: Bound<&T>) -> Bound<Value> {
    match bound {
        Bound::Included(v) => Bound::Included(v.clone().into()),
        Bound::Excluded(v) => Bound::Excluded(v.clone().into()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn comparable(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// 숫자끼리는 수치 비교 (`1 == 1.0`), 그 외는 구조 비교
fn literal_eq(value: &Value, expected: &Value) -> bool {
    match (value, expected) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b) == Some(Ordering::Equal),
        _ => value == expected,
    }
}

/// 정수끼리는 정확히 비교하고, 한쪽이 실수일 때만 f64로 비교합니다.
fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (a.as_u64(), b.as_u64()) {
        return Some(a.cmp(&b));
    }
    if a.is_f64() || b.is_f64() {
        return a.as_f64()?.partial_cmp(&b.as_f64()?);
    }

    // 음수 i64 vs i64 범위를 넘는 u64
    Some(if a.is_i64() {
        Ordering::Less
    } else {
        Ordering::Greater
    })
}
