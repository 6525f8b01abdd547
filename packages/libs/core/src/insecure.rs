//! Insecure override
//!
//! 권한 체크를 일시적으로 우회하는 중첩 가능한 스코프입니다.
//! 깊이는 실행 컨텍스트(스레드 / tokio task) 단위로 유지되며,
//! 다른 워커의 privileged 스코프가 새어 나가지 않습니다.

use std::cell::Cell;
use std::future::Future;
use std::marker::PhantomData;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

tokio::task_local! {
    static TASK_DEPTH: usize;
}

/// Insecure 스코프 guard
///
/// 생성 시 깊이를 1 증가시키고, drop 시(정상 종료/panic 모두) 1 감소시킵니다.
/// `!Send`이므로 `.await` 경계를 넘어 보유할 수 없습니다.
#[must_use = "the insecure scope ends when the guard is dropped"]
pub struct InsecureGuard {
    _not_send: PhantomData<*const ()>,
}

impl InsecureGuard {
    /// 스코프 진입
    pub fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }
}

impl Drop for InsecureGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// `f`를 insecure 스코프 안에서 실행
pub fn insecurely<R>(f: impl FnOnce() -> R) -> R {
    let _guard = InsecureGuard::enter();
    f()
}

/// future를 task-local insecure 스코프 안에서 실행
pub async fn insecurely_async<F: Future>(future: F) -> F::Output {
    let depth = TASK_DEPTH.try_with(|depth| *depth).unwrap_or(0);
    TASK_DEPTH.scope(depth + 1, future).await
}

/// 현재 스레드의 insecure 깊이
pub fn depth() -> usize {
    DEPTH.with(Cell::get)
}

/// 현재 실행 컨텍스트가 insecure 스코프 안인지 확인
pub fn is_insecure() -> bool {
    depth() > 0 || TASK_DEPTH.try_with(|depth| *depth > 0).unwrap_or(false)
}
