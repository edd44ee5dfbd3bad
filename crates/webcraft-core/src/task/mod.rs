//! 急切启动的任务、一次性完成源与组合子（`when_all`/`when_any`）。
//!
//! # 设计背景（Why）
//! - 原始运行时里的 `task<T>` 是一个 C++20 协程：函数体在构造期间就同步执行到第一个
//!   挂起点，句柄本身只负责安装/触发"继续执行"的延续（continuation）。Rust 的
//!   `Future` trait 天生是懒启动的，所以我们不能直接把 `async fn` 当成 `task<T>`；
//!   [`Task<T>`] 用一个急切驱动器（见 [`driver`] 子模块）在构造时立即 poll 一次，
//!   把"协程帧"换成"被后台驱动的 boxed future + 一个完成槽"。
//! - "异常重新抛出"在 Rust 里没有对应物；我们把 `task<T>` 的异常通道直接烘焙进输出
//!   类型，即 [`TaskResult<T>`]（`Result<T, WebcraftError>`），调用方通过 `?` 或
//!   `match` 显式传播，而不是依赖隐式展开。
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::error::{ErrorCategory, WebcraftError, WebcraftResult};
use crate::observability::fields;

mod combinators;
mod driver;
mod event_signal;
mod sync_wait_impl;

pub use combinators::{
    when_all, when_all2, when_all3, when_all4, when_all5, when_all6, when_all_void, when_any,
};
pub use event_signal::EventSignal;
pub use sync_wait_impl::sync_wait;

/// 任务的统一结果类型：成功即 `T`，失败即统一错误载体。
///
/// 对应原始协程 `task<T>` 的"返回值或重新抛出异常"两条路径；在 Rust 里二者都落在
/// 这一个 `Result` 里，调用方必须显式处理。
pub type TaskResult<T> = Result<T, WebcraftError>;

/// 一个已完成或正在完成槽，供 [`Task<T>`] 和 [`TaskCompletionSource<T>`] 共用。
enum SlotState<T> {
    Pending(Option<Waker>),
    Ready(TaskResult<T>),
    /// 结果已经被 `.await` 取走；再次 poll 属于编程错误（重复 await 同一个任务）。
    Consumed,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> Slot<T> {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SlotState::Pending(None)),
        })
    }

    fn complete(&self, result: TaskResult<T>) {
        let waker = {
            let mut guard = self.state.lock();
            match &mut *guard {
                SlotState::Pending(waker) => {
                    let waker = waker.take();
                    *guard = SlotState::Ready(result);
                    waker
                }
                SlotState::Ready(_) | SlotState::Consumed => {
                    // 已经完成过一次；按契约这是调用方的编程错误，这里静默丢弃新结果
                    // 而不是 panic，保持与线程池 worker 线程上报路径的健壮性一致。
                    tracing::warn!("task slot completed more than once; extra result discarded");
                    return;
                }
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn poll(&self, waker: &Waker) -> Poll<TaskResult<T>> {
        let mut guard = self.state.lock();
        match &mut *guard {
            SlotState::Ready(_) => {
                let SlotState::Ready(result) = std::mem::replace(&mut *guard, SlotState::Consumed)
                else {
                    unreachable!()
                };
                Poll::Ready(result)
            }
            SlotState::Pending(slot) => {
                *slot = Some(waker.clone());
                Poll::Pending
            }
            SlotState::Consumed => {
                panic!("webcraft_core::task: task polled again after its result was taken")
            }
        }
    }
}

/// 一个急切启动、单次消费的异步计算句柄。
///
/// # 契约说明（What）
/// - 构造（[`Task::spawn`]）即同步运行函数体直到第一个挂起点；
/// - `.await` 最多产出一次结果；重复 `.await` 会 panic（对应"double-awaiting is a
///   programmer error"）；
/// - 丢弃一个尚未完成、且没有被 [`fire_and_forget`] 接管的 `Task`，会在其内部
///   驱动器的引用计数归零时回收其状态机——等价于原始协程帧被销毁。
pub struct Task<T: Send + 'static> {
    slot: Arc<Slot<T>>,
}

impl<T: Send + 'static> Task<T> {
    /// 急切地启动 `fut`：同步 poll 至首个挂起点，再返回句柄。
    pub fn spawn<F>(fut: F) -> Self
    where
        F: Future<Output = TaskResult<T>> + Send + 'static,
    {
        let slot = Slot::new();
        let completion_slot = Arc::clone(&slot);
        driver::spawn_driver(fut, move |result| completion_slot.complete(result));
        Task { slot }
    }

    fn from_slot(slot: Arc<Slot<T>>) -> Self {
        Task { slot }
    }

    /// 该任务此刻是否已经完成（不消费结果）。
    pub fn is_finished(&self) -> bool {
        matches!(
            *self.slot.state.lock(),
            SlotState::Ready(_) | SlotState::Consumed
        )
    }
}

impl<T: Send + 'static> Future for Task<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.slot.poll(cx.waker())
    }
}

/// 一次性完成源：生产者与 [`Task<T>`] 消费者配对返回，保证"任务只被取出一次"
/// 这一契约在构造期就成立，而不需要运行期的"已取出"错误路径。
///
/// 直接对应原始 `task_completion_source<T>`；其 `task()` 访问器在这里被折叠进
/// [`TaskCompletionSource::new`] 的返回值中。
pub struct TaskCompletionSource<T: Send + 'static> {
    slot: Arc<Slot<T>>,
}

impl<T: Send + 'static> TaskCompletionSource<T> {
    /// 返回 `(生产者句柄, 消费者任务)`。
    pub fn new() -> (Self, Task<T>) {
        let slot = Slot::new();
        let task = Task::from_slot(Arc::clone(&slot));
        (TaskCompletionSource { slot }, task)
    }

    /// 产出成功值；重复调用（包括在 `set_exception` 之后）是契约违例，返回
    /// [`ErrorCategory::State`] 错误而不是 panic。
    pub fn set_value(&self, value: T) -> WebcraftResult<()> {
        if self.already_completed() {
            return Err(already_completed_error());
        }
        self.slot.complete(Ok(value));
        Ok(())
    }

    /// 产出失败结果。
    pub fn set_exception(&self, error: WebcraftError) -> WebcraftResult<()> {
        if self.already_completed() {
            return Err(already_completed_error());
        }
        self.slot.complete(Err(error));
        Ok(())
    }

    fn already_completed(&self) -> bool {
        !matches!(*self.slot.state.lock(), SlotState::Pending(_))
    }
}

fn already_completed_error() -> WebcraftError {
    WebcraftError::new(
        "webcraft.task.already_completed",
        "task completion source already completed",
        ErrorCategory::State,
    )
}

/// 启动一个不被任何人 `.await` 的任务；任务体内的错误被记录后丢弃，不会 panic
/// 也不会静默地传播到别处（对应原始文档里"fire_and_forget 吞掉异常"的约定）。
pub fn fire_and_forget<F>(fut: F)
where
    F: Future<Output = TaskResult<()>> + Send + 'static,
{
    driver::spawn_driver(fut, |result| {
        if let Err(err) = result {
            tracing::error!(
                { fields::TASK_ID } = "fire_and_forget",
                error = %err,
                "fire-and-forget task failed; error swallowed per contract"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_runs_eagerly_to_completion_when_never_pending() {
        let task = Task::spawn(async { Ok::<_, WebcraftError>(42) });
        assert!(task.is_finished());
        let result = sync_wait(task);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn spawn_propagates_errors() {
        let task: Task<i32> = Task::spawn(async {
            Err(WebcraftError::state("boom"))
        });
        let err = sync_wait(task).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::State);
    }

    #[test]
    fn completion_source_delivers_value_to_awaiting_task() {
        let (tcs, task) = TaskCompletionSource::<u32>::new();
        tcs.set_value(7).unwrap();
        assert_eq!(sync_wait(task).unwrap(), 7);
    }

    #[test]
    fn completion_source_rejects_double_completion() {
        let (tcs, _task) = TaskCompletionSource::<u32>::new();
        tcs.set_value(1).unwrap();
        let err = tcs.set_value(2).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::State);
    }

    #[test]
    #[should_panic(expected = "polled again")]
    fn double_await_panics() {
        let (tcs, mut task) = TaskCompletionSource::<u32>::new();
        tcs.set_value(1).unwrap();
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(Pin::new(&mut task).poll(&mut cx).is_ready());
        let _ = Pin::new(&mut task).poll(&mut cx);
    }
}
