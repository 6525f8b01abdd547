//! protector-core: 선언적 entry 단위 권한 엔진
//!
//! 보호 대상 타입마다 rule block을 등록하고, subject(+ entry) 기준으로
//! action / field 단위 허용 여부를 평가합니다.
//!
//! # 모듈 구조
//!
//! - `permissions`: 제약 조건, rule 평가 컨텍스트, 평가 결과, Meta
//! - `dsl`: `Protectable` 트레이트, 타입별 Meta 레지스트리, 상속
//! - `restriction`: entry별 subject 연결 및 결과 캐시
//! - `insecure`: 중첩 가능한 권한 우회 스코프
//! - `config`: paranoid 모드 설정
//! - `error`: 공통 에러 타입

pub mod config;
pub mod dsl;
pub mod error;
pub mod insecure;
pub mod permissions;
pub mod restriction;

pub use config::Config;
pub use dsl::{inherit, Protectable};
pub use error::{Error, Result};
pub use insecure::{insecurely, insecurely_async, is_insecure};
pub use permissions::{
    AccessDecision, Action, Attributes, Constraint, Fields, Meta, RuleBlock, Rules, ALL,
};
pub use restriction::{Restrictable, Restriction};

#[cfg(test)]
mod tests;
