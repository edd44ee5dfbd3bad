//! C3 的 BSD/macOS 后端：用 kqueue 的 `EVFILT_TIMER`/`EVFILT_USER` 驱动 [`RuntimeProvider`]。
//!
//! # 设计背景（Why）
//! - 这里直接用 `libc::kqueue`/`libc::kevent` 而不是更高层的 `kqueue` crate：后者的
//!   `Watcher` 外观面向文件/描述符事件，不暴露 `EVFILT_TIMER`、`NOTE_NSECONDS` 纳秒精度
//!   或按 ident 做 `EV_DELETE` 的取消语义，而这些正是本适配器需要的精确控制；直接用
//!   `libc` 调用系统调用是 kqueue 反应器在 Rust 生态里的标准写法（`mio` 的 BSD 后端
//!   也是这样做的）。因此工作空间里登记的 `kqueue` crate 依赖在本 crate 中未被使用，
//!   详见仓库根 `DESIGN.md` 的依赖裁剪记录。
//! - `EVFILT_USER` 承担 `yield_now` 的"提交一个空操作"角色；`EVFILT_TIMER` 承担
//!   `sleep_for`。取消走 §9 决策"kqueue 上用 `EV_DELETE` 处理 accept 取消"的同一手法：
//!   `StopToken::on_stop` 回调直接对该计时器 ident 发出 `EV_DELETE`，并在本地落子为
//!   取消结果，不等待内核再报一次事件。
#![cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
#![allow(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use webcraft_core::runtime::{RuntimeEvent, RuntimeProvider, StopToken};

/// 构造期失败的叶子错误类型，原样携带 `kqueue(2)`/反应器线程失败时的 `io::Error`。
#[derive(Debug, thiserror::Error)]
pub enum KqueueInitError {
    #[error("failed to create the kqueue descriptor: {source}")]
    Create {
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn the kqueue reactor thread: {source}")]
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
    kq: i32,
    pending: Mutex<HashMap<usize, Arc<Mutex<PendingOp>>>>,
    next_id: AtomicUsize,
    shutdown: AtomicBool,
}

unsafe impl Send for Reactor {}
unsafe impl Sync for Reactor {}

impl Reactor {
    fn new() -> Result<Arc<Self>, KqueueInitError> {
        let kq = unsafe { libc::kqueue() };
        if kq < 0 {
            return Err(KqueueInitError::Create {
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(Arc::new(Self {
            kq,
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            shutdown: AtomicBool::new(false),
        }))
    }

    fn alloc_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn register(&self, id: usize) -> Arc<Mutex<PendingOp>> {
        let slot = Arc::new(Mutex::new(PendingOp {
            waker: None,
            result: None,
        }));
        self.pending.lock().insert(id, Arc::clone(&slot));
        slot
    }

    fn settle(&self, id: usize, event: RuntimeEvent) {
        let slot = { self.pending.lock().remove(&id) };
        if let Some(slot) = slot {
            let waker = {
                let mut guard = slot.lock();
                guard.result = Some(event);
                guard.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        }
    }

    fn apply_change(&self, change: libc::kevent) -> std::io::Result<()> {
        let changes = [change];
        let ret = unsafe {
            libc::kevent(
                self.kq,
                changes.as_ptr(),
                1,
                std::ptr::null_mut(),
                0,
                std::ptr::null(),
            )
        };
        if ret < 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    fn schedule_timer(&self, id: usize, duration: Duration) -> std::io::Result<()> {
        let change = libc::kevent {
            ident: id as libc::uintptr_t,
            filter: libc::EVFILT_TIMER,
            flags: libc::EV_ADD | libc::EV_ONESHOT,
            fflags: libc::NOTE_NSECONDS as u32,
            data: duration.as_nanos().min(i64::MAX as u128) as isize as libc::intptr_t,
            udata: std::ptr::null_mut(),
        };
        self.apply_change(change)
    }

    fn cancel_timer(&self, id: usize) {
        let change = libc::kevent {
            ident: id as libc::uintptr_t,
            filter: libc::EVFILT_TIMER,
            flags: libc::EV_DELETE,
            fflags: 0,
            data: 0,
            udata: std::ptr::null_mut(),
        };
        // the timer may have already fired and been auto-removed (EV_ONESHOT); a
        // failing EV_DELETE in that race is expected and not an error for us.
        let _ = self.apply_change(change);
    }

    fn trigger_user_event(&self, id: usize) -> std::io::Result<()> {
        let change = libc::kevent {
            ident: id as libc::uintptr_t,
            filter: libc::EVFILT_USER,
            flags: libc::EV_ADD | libc::EV_ONESHOT,
            fflags: libc::NOTE_TRIGGER,
            data: 0,
            udata: std::ptr::null_mut(),
        };
        self.apply_change(change)
    }

    fn run(self: Arc<Self>) {
        let mut events: Vec<libc::kevent> = Vec::with_capacity(64);
        events.resize(64, unsafe { std::mem::zeroed() });
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            let n = unsafe {
                libc::kevent(
                    self.kq,
                    std::ptr::null(),
                    0,
                    events.as_mut_ptr(),
                    events.len() as i32,
                    std::ptr::null(),
                )
            };
            if n < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() != std::io::ErrorKind::Interrupted {
                    tracing::warn!(error = %err, "kevent wait failed");
                }
                continue;
            }
            for event in &events[..n as usize] {
                let id = event.ident as usize;
                self.settle(id, RuntimeEvent::COMPLETED);
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.kq);
        }
    }
}

/// `webcraft-core` 的 `RuntimeProvider` 在 kqueue 上的实现。
pub struct KqueueProvider {
    reactor: Arc<Reactor>,
    reactor_thread: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
}

const SHUTDOWN_WAKE_ID: usize = 0;

impl KqueueProvider {
    pub fn new() -> Result<Arc<Self>, KqueueInitError> {
        let reactor = Reactor::new()?;
        let reactor_for_thread = Arc::clone(&reactor);
        let handle = std::thread::Builder::new()
            .name("webcraft-kqueue".into())
            .spawn(move || reactor_for_thread.run())
            .map_err(|source| KqueueInitError::SpawnReactorThread { source })?;
        Ok(Arc::new(Self {
            reactor,
            reactor_thread: Mutex::new(Some(handle)),
            shutdown: AtomicBool::new(false),
        }))
    }
}

impl Drop for KqueueProvider {
    fn drop(&mut self) {
        self.reactor.shutdown.store(true, Ordering::Release);
        let _ = self.reactor.trigger_user_event(SHUTDOWN_WAKE_ID);
        if let Some(handle) = self.reactor_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

impl RuntimeProvider for KqueueProvider {
    fn name(&self) -> &'static str {
        "kqueue"
    }

    fn yield_now(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let id = self.reactor.alloc_id();
            let slot = self.reactor.register(id);
            if self.reactor.trigger_user_event(id).is_err() {
                self.reactor.pending.lock().remove(&id);
                return;
            }
            PendingFuture { slot }.await;
        })
    }

    fn sleep_for(
        &self,
        duration: Duration,
        token: &StopToken,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = RuntimeEvent> + Send + 'static>> {
        if token.is_stop_requested() {
            return Box::pin(async { RuntimeEvent::CANCELLED });
        }
        if duration.is_zero() {
            return Box::pin(async { RuntimeEvent::COMPLETED });
        }

        let reactor = Arc::clone(&self.reactor);
        let token = token.clone();
        Box::pin(async move {
            let id = reactor.alloc_id();
            let slot = reactor.register(id);
            if reactor.schedule_timer(id, duration).is_err() {
                reactor.pending.lock().remove(&id);
                return RuntimeEvent::COMPLETED;
            }

            let reactor_for_cancel = Arc::clone(&reactor);
            token.on_stop(move || {
                reactor_for_cancel.cancel_timer(id);
                reactor_for_cancel.settle(id, RuntimeEvent::CANCELLED);
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

impl std::future::Future for PendingFuture {
    type Output = RuntimeEvent;

    fn poll(self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<RuntimeEvent> {
        let mut guard = self.slot.lock();
        match guard.result.take() {
            Some(event) => std::task::Poll::Ready(event),
            None => {
                guard.waker = Some(cx.waker().clone());
                std::task::Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_reports_its_backend_name() {
        let provider = KqueueProvider::new().expect("kqueue must be available on BSD/macOS CI");
        assert_eq!(provider.name(), "kqueue");
    }

    #[test]
    fn create_failure_is_reported_as_init_error() {
        let err = KqueueInitError::Create {
            source: std::io::Error::from_raw_os_error(libc::EMFILE),
        };
        assert!(err.to_string().contains("failed to create"));
    }
}
