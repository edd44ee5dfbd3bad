//! `sync_wait`: 从非异步代码阻塞等待一个 awaitable 完成。
//!
//! 直接对应原始 `sync_wait.hpp`：内部构造一个一次性信号，驱动 future 跑到完成，
//! 再把调用线程挂起在信号上，而不是复用 [`super::Task`] 的完成槽（原始实现也没有
//! 复用 `task_completion_source`，而是就地写了一个最小的驱动闭包）。
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

use super::driver::spawn_driver;
use super::event_signal::EventSignal;

/// 阻塞当前线程，直到 `fut` 完成，并返回其输出。
///
/// `fut` 的轮询发生在任何促成其进展的线程上（例如完成队列的运行循环线程，或者
/// 线程池 worker 线程）；调用 `sync_wait` 的线程只是睡在一个条件变量上等通知。
pub fn sync_wait<F>(fut: F) -> F::Output
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let signal = Arc::new(EventSignal::new());
    let slot: Arc<Mutex<Option<F::Output>>> = Arc::new(Mutex::new(None));

    let signal_for_driver = Arc::clone(&signal);
    let slot_for_driver = Arc::clone(&slot);
    spawn_driver(fut, move |value| {
        *slot_for_driver.lock() = Some(value);
        signal_for_driver.set();
    });

    signal.wait();
    slot.lock()
        .take()
        .expect("sync_wait: signal fired without storing a result")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WebcraftError;
    use crate::task::{Task, TaskCompletionSource};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn sync_wait_blocks_until_another_thread_completes_the_source() {
        let (tcs, task) = TaskCompletionSource::<i32>::new();
        let worker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tcs.set_value(99).unwrap();
        });
        assert_eq!(sync_wait(task).unwrap(), 99);
        worker.join().unwrap();
    }

    #[test]
    fn sync_wait_returns_immediately_ready_values() {
        let task: Task<i32> = Task::spawn(async { Ok::<_, WebcraftError>(5) });
        assert_eq!(sync_wait(task).unwrap(), 5);
    }
}
