//! protector-store: protector-core 권한을 적용하는 인메모리 레코드 저장소
//!
//! # 모듈 구조
//!
//! - `record`: 보호되는 레코드 (필드 숨김, 저장 / 삭제 검증)
//! - `table`: 인메모리 테이블과 제한된 relation (scope 적용, subject 전파)
//! - `filter`: scope로 사용되는 행 필터
//! - `error`: Store 에러 타입

pub mod error;
pub mod filter;
pub mod record;
pub mod table;

pub use error::{Result, StoreError};
pub use filter::Filter;
pub use record::{Kind, Record};
pub use table::{Relation, Table};
