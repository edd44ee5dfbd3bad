//! 跨后端契约测试套件（TCK）——每个 `RuntimeProvider` 适配器 crate 共用的一组断言。
//!
//! # 设计背景（Why）
//! - 原始测试套件里的 `tests/include/mock_io.hpp` 被用来为"同一套契约测试"反复喂入不同
//!   的 I/O 后端；`spec.md` §8 的可测属性（尤其是不变式 6："sleep_for resumes no earlier
//!   than d ... with a cancel token ... resumption bounded by one run-loop tick"）必须对
//!   io_uring/IOCP/kqueue/mock 四个后端都成立。把断言写成这里的自由函数，每个适配器 crate
//!   的 `tests/tck.rs` 只需要构造自己的 provider 再调用 `run_full_suite`，这正是
//!   `spark-contract-tests` + `adapters/*/tests/tck.rs` 这对搭档在教师仓库里扮演的角色。
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub use webcraft_core::runtime::MockRuntimeProvider;
use webcraft_core::runtime::{RuntimeEvent, RuntimeProvider, StopSource, StopToken};
use webcraft_core::task::{Task, sync_wait};

/// §8 不变式：`yield_now` 最终会恢复等待者，不会永久挂起。
pub fn assert_yield_now_resumes(provider: Arc<dyn RuntimeProvider>) {
    let task: Task<()> = Task::spawn(async move {
        provider.yield_now().await;
        Ok(())
    });
    sync_wait(task).expect("yield_now must resume the awaiting task");
}

/// §8 不变式 6（前半）：`sleep_for(d)` 在单调时钟上至少等待 `d`。
pub fn assert_sleep_for_waits_minimum_duration(provider: Arc<dyn RuntimeProvider>) {
    let token = StopToken::none();
    let duration = Duration::from_millis(40);
    let start = Instant::now();
    let task: Task<RuntimeEvent> =
        Task::spawn(async move { Ok(provider.sleep_for(duration, &token).await) });
    let event = sync_wait(task).expect("sleep_for must not fail");
    assert!(!event.cancelled, "undisturbed sleep must not report cancelled");
    assert!(
        start.elapsed() >= duration,
        "sleep_for resumed before the requested duration elapsed"
    );
}

/// §8 不变式 6（后半）：取消令牌在到期前触发时，恢复发生在"一个运行循环节拍"内，
/// 而不是等到原定时长耗尽。
pub fn assert_sleep_for_cancellation_is_timely(provider: Arc<dyn RuntimeProvider>) {
    let source = StopSource::new();
    let token = source.token();
    let cancel_after = Duration::from_millis(30);
    let full_duration = Duration::from_secs(10);

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(cancel_after);
        source.request_stop();
    });

    let start = Instant::now();
    let task: Task<RuntimeEvent> =
        Task::spawn(async move { Ok(provider.sleep_for(full_duration, &token).await) });
    let event = sync_wait(task).expect("cancelled sleep_for must not fail");
    canceller.join().expect("canceller thread panicked");

    assert!(event.cancelled, "sleep_for did not report the cancelled flag");
    assert!(
        start.elapsed() < full_duration,
        "cancellation was not observed before the full duration elapsed"
    );
}

/// §4.3：零/负时长必须同步完成，不经过一次真正的等待。
pub fn assert_zero_duration_sleep_completes_immediately(provider: Arc<dyn RuntimeProvider>) {
    let token = StopToken::none();
    let start = Instant::now();
    let task: Task<RuntimeEvent> =
        Task::spawn(async move { Ok(provider.sleep_for(Duration::ZERO, &token).await) });
    let event = sync_wait(task).expect("zero-duration sleep_for must not fail");
    assert!(!event.cancelled);
    assert!(start.elapsed() < Duration::from_millis(50));
}

/// §4.3："an already-stopped token completes synchronously" without reporting a timing fault.
pub fn assert_already_stopped_token_completes_as_cancelled(provider: Arc<dyn RuntimeProvider>) {
    let source = StopSource::new();
    source.request_stop();
    let token = source.token();
    let task: Task<RuntimeEvent> =
        Task::spawn(async move { Ok(provider.sleep_for(Duration::from_secs(30), &token).await) });
    let event = sync_wait(task).expect("pre-cancelled sleep_for must not fail");
    assert!(event.cancelled);
}

/// 运行本 crate 提供的全部契约断言；每个后端适配器 crate 的集成测试应当调用它。
pub fn run_full_suite(provider: Arc<dyn RuntimeProvider>) {
    assert_yield_now_resumes(Arc::clone(&provider));
    assert_sleep_for_waits_minimum_duration(Arc::clone(&provider));
    assert_sleep_for_cancellation_is_timely(Arc::clone(&provider));
    assert_zero_duration_sleep_completes_immediately(Arc::clone(&provider));
    assert_already_stopped_token_completes_as_cancelled(provider);
}

/// 故障注入装饰器：包裹任意 [`RuntimeProvider`]，让适配器测试能在不依赖真实时序的情况下
/// 演练"取消回调先于/后于自然完成触发"这两条竞态路径。
///
/// 对应原始 mock I/O 工具箱里"强制下一次操作走取消分支"的惯用手法。
pub struct FaultInjectingProvider<P> {
    inner: P,
    force_cancelled: AtomicBool,
}

impl<P: RuntimeProvider> FaultInjectingProvider<P> {
    pub fn new(inner: P) -> Arc<Self> {
        Arc::new(Self {
            inner,
            force_cancelled: AtomicBool::new(false),
        })
    }

    /// 下一次（且仅下一次）`sleep_for` 调用会立即以取消结果完成。
    pub fn force_next_sleep_cancelled(&self) {
        self.force_cancelled.store(true, Ordering::Release);
    }
}

impl<P: RuntimeProvider> RuntimeProvider for FaultInjectingProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn yield_now(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        self.inner.yield_now()
    }

    fn sleep_for(
        &self,
        duration: Duration,
        token: &StopToken,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = RuntimeEvent> + Send + 'static>> {
        if self.force_cancelled.swap(false, Ordering::AcqRel) {
            return Box::pin(async { RuntimeEvent::CANCELLED });
        }
        self.inner.sleep_for(duration, token)
    }

    fn request_shutdown(&self) {
        self.inner.request_shutdown();
    }

    fn is_shutdown_requested(&self) -> bool {
        self.inner.is_shutdown_requested()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_satisfies_the_full_contract_suite() {
        run_full_suite(MockRuntimeProvider::new());
    }

    #[test]
    fn fault_injecting_provider_forces_exactly_one_cancellation() {
        let provider = FaultInjectingProvider::new(
            Arc::try_unwrap(MockRuntimeProvider::new()).unwrap_or_else(|_| unreachable!()),
        );
        provider.force_next_sleep_cancelled();
        let token = StopToken::none();
        let provider_for_first: Arc<FaultInjectingProvider<MockRuntimeProvider>> =
            Arc::clone(&provider);
        let first: Task<RuntimeEvent> = Task::spawn(async move {
            Ok(provider_for_first
                .sleep_for(Duration::from_millis(5), &token)
                .await)
        });
        assert!(sync_wait(first).unwrap().cancelled);

        let token = StopToken::none();
        let second: Task<RuntimeEvent> = Task::spawn(async move {
            Ok(provider.sleep_for(Duration::ZERO, &token).await)
        });
        assert!(!sync_wait(second).unwrap().cancelled);
    }
}
