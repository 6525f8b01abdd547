//! 권한 규칙 및 평가
//!
//! # 모듈 구조
//!
//! - `action`: action 이름과 필드 지정자
//! - `constraint`: 필드 단위 제약 조건 판정
//! - `rules`: rule block 평가 컨텍스트 (`can` / `cannot` / `scope`)
//! - `decision`: 불변 평가 결과
//! - `meta`: 타입별 rule block 누적기

mod action;
mod constraint;
mod decision;
mod meta;
mod rules;

pub use action::{Action, Fields, ALL};
pub use constraint::{resolve, Constraint, EntryPredicate, Predicate, ValueRange};
pub use decision::{AccessDecision, Attributes};
pub use meta::{Ancestor, Meta, RuleBlock, RuleOutcome};
pub use rules::{Access, Rules};
