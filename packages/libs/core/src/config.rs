//! Protector 설정
//!
//! 프로세스 전역 설정과 스레드 단위 override를 제공합니다.

use std::cell::RefCell;
use std::env;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 전역 설정 (기본값: open mode)
static GLOBAL: RwLock<Config> = RwLock::new(Config { paranoid: false });

thread_local! {
    static OVERRIDE: RefCell<Option<Config>> = const { RefCell::new(None) };
}

/// Protector 설정
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Paranoid 모드
    ///
    /// 활성화 시 `scope`가 한 번도 호출되지 않은 평가 결과도 scoped로 취급합니다.
    /// (default-open → default-closed)
    #[serde(default)]
    pub paranoid: bool,
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        let paranoid = match env::var("PROTECTOR_PARANOID") {
            Ok(value) => parse_flag(&value).ok_or_else(|| Error::Config {
                message: format!("PROTECTOR_PARANOID must be a boolean, got '{}'", value),
            })?,
            Err(_) => false,
        };

        Ok(Self { paranoid })
    }

    /// YAML 문서에서 설정 로드
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

/// 전역 설정 교체
pub fn configure(config: Config) {
    *GLOBAL.write().unwrap_or_else(PoisonError::into_inner) = config;
    tracing::debug!(paranoid = config.paranoid, "protector configured");
}

/// 현재 유효한 설정 (스레드 override 우선)
pub fn current() -> Config {
    OVERRIDE
        .with(|cell| *cell.borrow())
        .unwrap_or_else(|| *GLOBAL.read().unwrap_or_else(PoisonError::into_inner))
}

/// Paranoid 모드 여부
pub fn is_paranoid() -> bool {
    current().paranoid
}

/// 현재 스레드에서 `f` 실행 동안만 설정 override
///
/// panic으로 빠져나가도 이전 override가 복원됩니다.
pub fn with_config<R>(config: Config, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<Config>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            OVERRIDE.with(|cell| *cell.borrow_mut() = previous);
        }
    }

    let previous = OVERRIDE.with(|cell| cell.borrow_mut().replace(config));
    let _restore = Restore(previous);
    f()
}
