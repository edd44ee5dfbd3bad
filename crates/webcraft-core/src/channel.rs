//! C8：进程内 MPSC 通道——管线中规范的枢纽节点。
//!
//! # 设计背景（Why）
//! - §4.8 把通道描述成"一个 FIFO 队列 + 一个等待中接收者的延续槽"；这与
//!   [`crate::task::Slot`] 的单槽设计同构，因此这里复用"锁保护的状态机 + Waker"
//!   这套手法，而不是引入外部无锁队列 crate。
//! - 多生产者只需要在"入队尾部"这一点序列化；接收端是单一所有者，因此不需要
//!   无锁算法，`parking_lot::Mutex` 足够，且比仅为这一处而引入 crossbeam 队列更简单。
//! - §4.8 额外点名了一个"有界双端无锁队列"作为支撑组件，供任务窃取场景使用；本
//!   crate 的调度模型是单线程协作式运行循环（§5），没有真正的任务窃取执行器消费它，
//!   但规范仍然把它列为 C8 的一部分，因此在 [`deque`] 子模块里独立实现并测试，
//!   作为可被未来窃取式执行器复用的构件。
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Waker};

use crate::error::{WebcraftError, WebcraftResult};
use crate::observability::fields;

pub mod deque;

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    receiver_waker: Mutex<Option<Waker>>,
    producers: AtomicUsize,
    receiver_alive: std::sync::atomic::AtomicBool,
    id: u64,
}

/// 发送端句柄；可自由克隆以支持多生产者，最后一个句柄释放时令接收端观察到
/// "生产者已全部释放"这一状态。
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

/// 接收端句柄；单一所有者，不可克隆。
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

/// 构造一对 `(Sender, Receiver)`，对应 §3 "Channel<T>" 的生命周期：
/// `live -> closed-empty -> closed-drained`。
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed) as u64;
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::new()),
        receiver_waker: Mutex::new(None),
        producers: AtomicUsize::new(1),
        receiver_alive: std::sync::atomic::AtomicBool::new(true),
        id,
    });
    (
        Sender {
            shared: Arc::clone(&shared),
        },
        Receiver { shared },
    )
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.shared.producers.fetch_add(1, Ordering::AcqRel);
        Sender {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if self.shared.producers.fetch_sub(1, Ordering::AcqRel) == 1 {
            // last producer gone: wake a possibly-parked receiver so it observes EOF.
            if let Some(waker) = self.shared.receiver_waker.lock().take() {
                waker.wake();
            }
        }
    }
}

impl<T> Sender<T> {
    /// 入队一个值并在有等待中的接收者时恰好唤醒一次。
    ///
    /// 仅在接收端存活时成功；接收端释放后返回 [`crate::error::ErrorCategory::State`] 错误。
    pub fn send(&self, value: T) -> WebcraftResult<()> {
        if !self.shared.receiver_alive.load(Ordering::Acquire) {
            return Err(WebcraftError::state("channel receiver has been dropped"));
        }
        self.shared.queue.lock().push_back(value);
        tracing::trace!({ fields::CHANNEL_ID } = self.shared.id, "channel send");
        if let Some(waker) = self.shared.receiver_waker.lock().take() {
            waker.wake();
        }
        Ok(())
    }

    pub fn producer_count(&self) -> usize {
        self.shared.producers.load(Ordering::Acquire)
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.shared.receiver_alive.store(false, Ordering::Release);
    }
}

impl<T> Receiver<T> {
    /// 接收下一个值；队列为空且所有生产者均已释放时返回 `Ok(None)`（end-of-stream）。
    pub async fn recv(&mut self) -> WebcraftResult<Option<T>> {
        RecvFuture { receiver: self }.await
    }

    fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<WebcraftResult<Option<T>>> {
        let mut queue = self.shared.queue.lock();
        if let Some(value) = queue.pop_front() {
            tracing::trace!({ fields::CHANNEL_ID } = self.shared.id, "channel recv");
            return Poll::Ready(Ok(Some(value)));
        }
        if self.shared.producers.load(Ordering::Acquire) == 0 {
            return Poll::Ready(Ok(None));
        }
        *self.shared.receiver_waker.lock() = Some(cx.waker().clone());
        Poll::Pending
    }
}

struct RecvFuture<'a, T> {
    receiver: &'a mut Receiver<T>,
}

impl<'a, T> Future for RecvFuture<'a, T> {
    type Output = WebcraftResult<Option<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, sync_wait};

    #[test]
    fn fifo_order_per_producer() {
        let (tx, mut rx) = channel::<i32>();
        for v in 0..100 {
            tx.send(v).unwrap();
        }
        drop(tx);
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let mut out = Vec::new();
            while let Some(v) = rx.recv().await? {
                out.push(v);
            }
            Ok(out)
        });
        let received = sync_wait(task).unwrap();
        assert_eq!(received, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn send_after_receiver_drop_fails() {
        let (tx, rx) = channel::<i32>();
        drop(rx);
        let err = tx.send(1).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::State);
    }

    #[test]
    fn recv_after_all_producers_drop_and_queue_drained_yields_eof() {
        let (tx, mut rx) = channel::<i32>();
        tx.send(1).unwrap();
        drop(tx);
        let task: Task<(Option<i32>, Option<i32>)> = Task::spawn(async move {
            let first = rx.recv().await?;
            let second = rx.recv().await?;
            Ok((first, second))
        });
        let (first, second) = sync_wait(task).unwrap();
        assert_eq!(first, Some(1));
        assert_eq!(second, None);
    }

    #[test]
    fn recv_suspends_until_a_later_send() {
        let (tx, mut rx) = channel::<&'static str>();
        let worker = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            tx.send("hello").unwrap();
        });
        let task: Task<Option<&'static str>> = Task::spawn(async move { rx.recv().await });
        assert_eq!(sync_wait(task).unwrap(), Some("hello"));
        worker.join().unwrap();
    }

    #[test]
    fn multiple_producers_interleave_without_losing_items() {
        let (tx, mut rx) = channel::<i32>();
        let tx2 = tx.clone();
        assert_eq!(tx.producer_count(), 2);
        let w1 = std::thread::spawn(move || {
            for v in 0..50 {
                tx.send(v).unwrap();
            }
        });
        let w2 = std::thread::spawn(move || {
            for v in 100..150 {
                tx2.send(v).unwrap();
            }
        });
        w1.join().unwrap();
        w2.join().unwrap();
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let mut out = Vec::new();
            while let Some(v) = rx.recv().await? {
                out.push(v);
            }
            Ok(out)
        });
        let mut received = sync_wait(task).unwrap();
        assert_eq!(received.len(), 100);
        received.sort_unstable();
        assert_eq!(received, (0..50).chain(100..150).collect::<Vec<_>>());
    }
}
