//! 内部驱动逻辑：如何在没有后台调度线程的情况下"即时启动并自驱动"一个 future。
//!
//! # 设计背景（Why）
//! - 原始 `task<T>` 是一个 C++20 协程：构造时函数体立即同步执行到首个挂起点
//!   （`initial_suspend` 返回 `suspend_never`），Rust 的 `Future` 默认懒启动，
//!   两者语义不同。这里用一个自定义 [`std::task::Wake`] 实现出"立即 poll 一次，
//!   之后每次被唤醒都在当前线程原地继续 poll"的驱动器，对外行为与原始协程一致。
//! - 唤醒可能来自另一个线程（例如线程池 worker 完成阻塞任务后调用
//!   [`super::TaskCompletionSource::set_value`]），所以驱动状态用锁保护，并用一个
//!   `dirty` 标志吸收"正在 poll 时又被唤醒"的竞态，避免丢失唤醒或递归加锁。
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crate::future::BoxFuture;

enum DriverState<Out> {
    /// 仍在运行；`fut` 为 `None` 表示当前正有一个线程持有它在 poll。
    Active {
        fut: Option<BoxFuture<'static, Out>>,
        polling: bool,
        dirty: bool,
    },
    Finished,
}

struct Driver<Out> {
    state: Mutex<DriverState<Out>>,
    on_ready: Mutex<Option<Box<dyn FnOnce(Out) + Send>>>,
}

impl<Out: Send + 'static> Wake for Driver<Out> {
    fn wake(self: Arc<Self>) {
        Driver::drive(&self);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        Driver::drive(self);
    }
}

impl<Out: Send + 'static> Driver<Out> {
    fn drive(this: &Arc<Self>) {
        loop {
            let mut fut = {
                let mut guard = this.state.lock();
                match &mut *guard {
                    DriverState::Finished => return,
                    DriverState::Active {
                        fut,
                        polling,
                        dirty,
                    } => {
                        if *polling {
                            *dirty = true;
                            return;
                        }
                        *polling = true;
                        match fut.take() {
                            Some(fut) => fut,
                            None => {
                                // Reentrant drive observed an in-flight poll that hasn't put the
                                // future back yet; the `dirty` flag above already covers this.
                                *polling = false;
                                return;
                            }
                        }
                    }
                }
            };

            let waker = Waker::from(Arc::clone(this));
            let mut cx = Context::from_waker(&waker);
            let poll_result = Pin::as_mut(&mut fut).poll(&mut cx);

            let mut guard = this.state.lock();
            match poll_result {
                Poll::Ready(value) => {
                    *guard = DriverState::Finished;
                    drop(guard);
                    if let Some(cb) = this.on_ready.lock().take() {
                        cb(value);
                    }
                    return;
                }
                Poll::Pending => match &mut *guard {
                    DriverState::Active {
                        fut: slot,
                        polling,
                        dirty,
                    } => {
                        *polling = false;
                        *slot = Some(fut);
                        if *dirty {
                            *dirty = false;
                            continue;
                        }
                        return;
                    }
                    DriverState::Finished => return,
                },
            }
        }
    }
}

/// 立即开始驱动 `fut`：同步 poll 至首个挂起点；此后由其唤醒的线程继续原地驱动，
/// 完成时调用 `on_ready`（在完成所在的那个线程上，可能不是发起 spawn 的线程）。
pub fn spawn_driver<Fut>(fut: Fut, on_ready: impl FnOnce(Fut::Output) + Send + 'static)
where
    Fut: Future + Send + 'static,
    Fut::Output: Send + 'static,
{
    let driver = Arc::new(Driver {
        state: Mutex::new(DriverState::Active {
            fut: Some(Box::pin(fut)),
            polling: false,
            dirty: false,
        }),
        on_ready: Mutex::new(Some(Box::new(on_ready))),
    });
    Driver::drive(&driver);
}
