//! 同步/进程内的 mock 运行时提供者——`spec.md` §4.3 明确点名的"mock target"。
//!
//! # 设计背景（Why）
//! - 原始实现的测试套件（`tests/include/mock_io.hpp`）围绕一个确定性、不依赖真实
//!   文件描述符/套接字的完成后端展开；本 crate把这个角色落到 [`MockRuntimeProvider`]
//!   上，作为 `webcraft-core` 自身单测/doctest 的默认后端，也是 `webcraft-rt-tck`
//!   构建更复杂契约测试（故障注入等）的基座。
//! - `sleep_for` 没有复用任何真实完成队列，而是每次调用派生一个一次性的计时线程——
//!   这是故意的简化：mock 后端的目标是"确定性优先、吞吐量其次"，真正的吞吐路径由
//!   io_uring/IOCP/kqueue 适配器 crate 提供。
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::Duration;

use super::{RuntimeEvent, RuntimeProvider, StopToken};

/// 进程内、同步驱动的 [`RuntimeProvider`] 实现。
///
/// 不持有任何原生完成队列句柄；`yield_now`/`sleep_for` 各自用最小的手写 Future
/// 模拟"提交 -> 等待 -> 完成"这条路径，足以驱动 C1/C2/C4/C6/C7/C8 的契约测试。
#[derive(Debug, Default)]
pub struct MockRuntimeProvider {
    shutdown: AtomicBool,
}

impl MockRuntimeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl RuntimeProvider for MockRuntimeProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn yield_now(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(YieldOnce { done: false })
    }

    fn sleep_for(
        &self,
        duration: Duration,
        token: &StopToken,
    ) -> Pin<Box<dyn Future<Output = RuntimeEvent> + Send + 'static>> {
        Box::pin(SleepFuture::new(duration, token))
    }

    fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// 恰好让出一次：首次 poll 立刻自唤醒并返回 `Pending`，第二次 poll 返回 `Ready`。
///
/// 依赖 [`crate::task::driver`] 的"唤醒发生在轮询期间则继续原地驱动"语义，
/// 不需要真的把控制权交回操作系统调度器。
struct YieldOnce {
    done: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(());
        }
        this.done = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

struct SleepShared {
    waker: Option<Waker>,
    result: Option<RuntimeEvent>,
}

/// 手写的计时器 Future：派生一个一次性线程在 `duration` 后落子；`token` 被取消时
/// 提前落子为 [`RuntimeEvent::CANCELLED`]。两条路径用同一把锁互斥，先到先得。
struct SleepFuture {
    shared: Arc<Mutex<SleepShared>>,
    started: bool,
    duration: Duration,
    token: StopToken,
}

impl SleepFuture {
    fn new(duration: Duration, token: &StopToken) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SleepShared {
                waker: None,
                result: None,
            })),
            started: false,
            duration,
            token: token.clone(),
        }
    }

    fn settle(shared: &Arc<Mutex<SleepShared>>, event: RuntimeEvent) {
        let waker = {
            let mut guard = shared.lock().unwrap_or_else(|p| p.into_inner());
            if guard.result.is_some() {
                return;
            }
            guard.result = Some(event);
            guard.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Future for SleepFuture {
    type Output = RuntimeEvent;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<RuntimeEvent> {
        let this = self.get_mut();

        if !this.started {
            this.started = true;

            if this.token.is_stop_requested() {
                return Poll::Ready(RuntimeEvent::CANCELLED);
            }
            if this.duration.is_zero() {
                return Poll::Ready(RuntimeEvent::COMPLETED);
            }

            let shared_for_timer = Arc::clone(&this.shared);
            let duration = this.duration;
            thread::spawn(move || {
                thread::sleep(duration);
                SleepFuture::settle(&shared_for_timer, RuntimeEvent::COMPLETED);
            });

            let shared_for_cancel = Arc::clone(&this.shared);
            this.token.on_stop(move || {
                SleepFuture::settle(&shared_for_cancel, RuntimeEvent::CANCELLED);
            });
        }

        let mut guard = this.shared.lock().unwrap_or_else(|p| p.into_inner());
        match guard.result.take() {
            Some(event) => Poll::Ready(event),
            None => {
                guard.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::StopSource;
    use crate::task::{Task, sync_wait};
    use std::time::Instant;

    #[test]
    fn yield_now_resumes_without_blocking() {
        let provider = MockRuntimeProvider::new();
        let result: Task<()> = Task::spawn(async move {
            provider.yield_now().await;
            Ok(())
        });
        sync_wait(result).unwrap();
    }

    #[test]
    fn sleep_for_waits_at_least_the_requested_duration() {
        let provider = MockRuntimeProvider::new();
        let token = StopSource::new().token();
        let start = Instant::now();
        let task: Task<RuntimeEvent> = Task::spawn(async move {
            Ok(provider.sleep_for(Duration::from_millis(30), &token).await)
        });
        let event = sync_wait(task).unwrap();
        assert!(!event.cancelled);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn sleep_for_honors_cancellation_before_deadline() {
        let provider = MockRuntimeProvider::new();
        let source = StopSource::new();
        let token = source.token();
        let start = Instant::now();

        let cancel_after = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            source.request_stop();
        });

        let task: Task<RuntimeEvent> = Task::spawn(async move {
            Ok(provider.sleep_for(Duration::from_secs(5), &token).await)
        });
        let event = sync_wait(task).unwrap();
        cancel_after.join().unwrap();

        assert!(event.cancelled);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn zero_duration_completes_synchronously() {
        let provider = MockRuntimeProvider::new();
        let token = StopToken::none();
        let task: Task<RuntimeEvent> = Task::spawn(async move {
            Ok(provider.sleep_for(Duration::ZERO, &token).await)
        });
        let event = sync_wait(task).unwrap();
        assert!(!event.cancelled);
    }
}
