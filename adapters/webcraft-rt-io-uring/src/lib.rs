//! C3 的 Linux 后端：用 `io_uring` 的提交/完成队列驱动 [`RuntimeProvider`]。
//!
//! # 设计背景（Why）
//! - `spec.md` §9 把"按平台条件编译的 provider"列为重架构目标之一：这个 crate 只对
//!   `target_os = "linux"` 编译，实现 `webcraft-core::runtime::RuntimeProvider`，不
//!   污染核心 crate 的依赖表。
//! - 完成模型复用 [`webcraft_core::runtime::MockRuntimeProvider`] 确立的"共享状态 +
//!   Waker，先落子者生效"手法：区别只在于"落子"这一步从一次性线程换成了真正的
//!   io_uring 完成队列条目。
//!
//! # 契约说明（What）
//! - `yield_now` 提交一个 `Nop`，完成队列把它报给运行中的任务时视为"一个运行循环节拍"。
//! - `sleep_for` 提交一个 `Timeout`；`StopToken::on_stop` 回调会提交一次
//!   `AsyncCancel`，对应 §9 决策"accept 取消在 io_uring 上用 `IORING_OP_ASYNC_CANCEL`
//!   完成，不借助自连接技巧"。
#![cfg(target_os = "linux")]
#![allow(unsafe_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::JoinHandle;
use std::time::Duration;

use io_uring::{opcode, types, IoUring};
use parking_lot::Mutex;
use webcraft_core::runtime::{RuntimeEvent, RuntimeProvider, StopToken};

const WAKE_TAG: u64 = 1 << 62;

/// 构造期失败的叶子错误类型：把 `io_uring` 建立实例时的原生 `io::Error` 原样透传。
///
/// 对应 SPEC_FULL §1.1 "thiserror 用于适配器本地的叶子错误枚举，原生错误在此处
/// 原样包装"；这是一个构造期错误，不属于 `RuntimeProvider` trait 本身的契约
/// （trait 的各操作本身不对外暴露"提交失败"这个错误通道，见 §4.3）。
#[derive(Debug, thiserror::Error)]
pub enum IoUringInitError {
    #[error("failed to create io_uring instance: {source}")]
    Create {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn the io_uring reactor thread: {source}")]
    SpawnReactorThread {
        #[source]
        source: std::io::Error,
    },
}

struct PendingOp {
    waker: Option<Waker>,
    result: Option<RuntimeEvent>,
}

struct Reactor {
    ring: Mutex<IoUring>,
    pending: Mutex<HashMap<u64, Arc<Mutex<PendingOp>>>>,
    next_id: AtomicU64,
    shutdown: AtomicBool,
}

impl Reactor {
    fn new(entries: u32) -> Result<Arc<Self>, IoUringInitError> {
        let ring = IoUring::new(entries).map_err(|source| IoUringInitError::Create { source })?;
        Ok(Arc::new(Self {
            ring: Mutex::new(ring),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
        }))
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, id: u64) -> Arc<Mutex<PendingOp>> {
        let slot = Arc::new(Mutex::new(PendingOp {
            waker: None,
            result: None,
        }));
        self.pending.lock().insert(id, Arc::clone(&slot));
        slot
    }

    /// 把一个 SQE 推进提交队列并立即提交；调用方保证 `entry` 的 `user_data` 与
    /// [`Reactor::register`] 注册的 id 一致，且 entry 所引用的缓冲区在完成前保持存活。
    unsafe fn push_and_submit(&self, entry: io_uring::squeue::Entry) -> std::io::Result<()> {
        loop {
            let mut ring = self.ring.lock();
            let mut sq = ring.submission();
            if sq.is_full() {
                drop(sq);
                drop(ring);
                std::thread::yield_now();
                continue;
            }
            sq.push(&entry).expect("submission queue has capacity");
            drop(sq);
            ring.submit()?;
            return Ok(());
        }
    }

    fn drain_completions(&self) {
        let mut ring = self.ring.lock();
        let mut cq = ring.completion();
        cq.sync();
        let mut woken = Vec::new();
        for cqe in &mut cq {
            let id = cqe.user_data();
            if id == WAKE_TAG {
                continue;
            }
            if let Some(slot) = self.pending.lock().remove(&id) {
                let cancelled = cqe.result() == -libc::ECANCELED;
                let mut guard = slot.lock();
                guard.result = Some(RuntimeEvent { cancelled });
                if let Some(waker) = guard.waker.take() {
                    woken.push(waker);
                }
            }
        }
        drop(cq);
        drop(ring);
        for waker in woken {
            waker.wake();
        }
    }

    fn run(self: Arc<Self>) {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            {
                let mut ring = self.ring.lock();
                if let Err(err) = ring.submit_and_wait(1) {
                    if err.kind() != std::io::ErrorKind::Interrupted {
                        tracing::warn!(error = %err, "io_uring submit_and_wait failed");
                    }
                }
            }
            self.drain_completions();
        }
    }

    fn wake_reactor(&self) {
        let entry = opcode::Nop::new().build().user_data(WAKE_TAG);
        let _ = unsafe { self.push_and_submit(entry) };
    }
}

/// `webcraft-core` 的 `RuntimeProvider` 在 Linux io_uring 上的实现。
pub struct IoUringProvider {
    reactor: Arc<Reactor>,
    reactor_thread: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

impl IoUringProvider {
    /// `queue_depth` 对应 [`webcraft_core::RuntimeConfig::submission_queue_depth`]。
    pub fn new(queue_depth: u32) -> Result<Arc<Self>, IoUringInitError> {
        let reactor = Reactor::new(queue_depth)?;
        let reactor_for_thread = Arc::clone(&reactor);
        let handle = std::thread::Builder::new()
            .name("webcraft-io-uring".into())
            .spawn(move || reactor_for_thread.run())
            .map_err(|source| IoUringInitError::SpawnReactorThread { source })?;
        Ok(Arc::new(Self {
            reactor,
            reactor_thread: Mutex::new(Some(handle)),
            shutdown: AtomicBool::new(false),
        }))
    }
}

impl Drop for IoUringProvider {
    fn drop(&mut self) {
        self.reactor.shutdown.store(true, Ordering::Release);
        self.reactor.wake_reactor();
        if let Some(handle) = self.reactor_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl RuntimeProvider for IoUringProvider {
    fn name(&self) -> &'static str {
        "io_uring"
    }

    fn yield_now(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let event = CompletionFuture::new(&self.reactor, |id| {
                opcode::Nop::new().build().user_data(id)
            })
            .await;
            let _ = event;
        })
    }

    fn sleep_for(
        &self,
        duration: Duration,
        token: &StopToken,
    ) -> Pin<Box<dyn Future<Output = RuntimeEvent> + Send + 'static>> {
        if token.is_stop_requested() {
            return Box::pin(async { RuntimeEvent::CANCELLED });
        }
        if duration.is_zero() {
            return Box::pin(async { RuntimeEvent::COMPLETED });
        }

        let reactor = Arc::clone(&self.reactor);
        let token = token.clone();
        Box::pin(async move {
            let timespec = types::Timespec::new()
                .sec(duration.as_secs())
                .nsec(duration.subsec_nanos());
            let id = reactor.alloc_id();
            let slot = reactor.register(id);

            let entry = opcode::Timeout::new(&timespec as *const _).build().user_data(id);
            if unsafe { reactor.push_and_submit(entry) }.is_err() {
                reactor.pending.lock().remove(&id);
                return RuntimeEvent::COMPLETED;
            }

            let reactor_for_cancel = Arc::clone(&reactor);
            token.on_stop(move || {
                let cancel = opcode::AsyncCancel::new(id).build().user_data(WAKE_TAG);
                let _ = unsafe { reactor_for_cancel.push_and_submit(cancel) };
            });

            PendingFuture { slot }.await
        })
    }

    fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

struct PendingFuture {
    slot: Arc<Mutex<PendingOp>>,
}

impl Future for PendingFuture {
    type Output = RuntimeEvent;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<RuntimeEvent> {
        let mut guard = self.slot.lock();
        match guard.result.take() {
            Some(event) => Poll::Ready(event),
            None => {
                guard.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// `yield_now` 用的一次性提交 + 完成 future：提交由调用方通过闭包构造的 SQE，
/// 完成时产出一个总是非取消的 [`RuntimeEvent`]。
struct CompletionFuture<'a, F> {
    reactor: &'a Reactor,
    build: Option<F>,
    inner: Option<PendingFuture>,
}

impl<'a, F> CompletionFuture<'a, F>
where
    F: FnOnce(u64) -> io_uring::squeue::Entry,
{
    fn new(reactor: &'a Reactor, build: F) -> Self {
        Self {
            reactor,
            build: Some(build),
            inner: None,
        }
    }
}

impl<'a, F> Future for CompletionFuture<'a, F>
where
    F: FnOnce(u64) -> io_uring::squeue::Entry,
{
    type Output = RuntimeEvent;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<RuntimeEvent> {
        let this = self.get_mut();
        if this.inner.is_none() {
            let id = this.reactor.alloc_id();
            let slot = this.reactor.register(id);
            let build = this.build.take().expect("build closure polled twice");
            let entry = build(id).user_data(id);
            if unsafe { this.reactor.push_and_submit(entry) }.is_err() {
                this.reactor.pending.lock().remove(&id);
                return Poll::Ready(RuntimeEvent::COMPLETED);
            }
            this.inner = Some(PendingFuture { slot });
        }
        Pin::new(this.inner.as_mut().unwrap()).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_reports_its_backend_name() {
        let provider = IoUringProvider::new(32).expect("io_uring should be available in CI");
        assert_eq!(provider.name(), "io_uring");
    }
}
