//! C5：有界线程池，用于需要把阻塞的原生调用挪出运行循环线程的后端（§4.9 macOS 文件 I/O）。
//!
//! # 设计背景（Why）
//! - §4.5 要求 `[min, max]` worker 边界 + 空闲收缩 + 提交时按需扩容；这是一个经典的
//!   "懒扩容、惰性收缩"池模式，用 `std::sync::mpsc` 的 `recv_timeout` 做空闲探测最直接，
//!   不需要引入额外的定时器基础设施。
//! - 工作项里的 panic 必须被吸收（§4.5"Panics inside a work item are absorbed"）——
//!   通过 `std::panic::catch_unwind` 在 worker 循环内兜底，避免一次业务 panic 打穿整个
//!   worker 线程并逐步耗尽池容量。
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::RuntimeConfig;
use crate::error::WebcraftError;
use crate::observability::fields;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    current_workers: AtomicUsize,
    idle_workers: AtomicUsize,
    min_workers: usize,
    max_workers: usize,
    idle_timeout: Duration,
    shutdown: std::sync::atomic::AtomicBool,
}

/// 有界线程池：`submit` 入队一个工作项，按需扩容至 `max_workers`；空闲达到
/// `idle_timeout` 的 worker 在 `current_workers > min_workers` 时自行退出。
pub struct ThreadPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    pub fn new(config: RuntimeConfig) -> Self {
        let (sender, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(Mutex::new(receiver)),
            current_workers: AtomicUsize::new(0),
            idle_workers: AtomicUsize::new(0),
            min_workers: config.min_workers,
            max_workers: config.max_workers.max(1),
            idle_timeout: config.idle_timeout,
            shutdown: std::sync::atomic::AtomicBool::new(false),
        });

        let pool = Self {
            shared: Arc::clone(&shared),
            handles: Mutex::new(Vec::new()),
        };
        for _ in 0..config.min_workers {
            pool.spawn_worker();
        }
        pool
    }

    /// 提交一个工作项；若所有 worker 都忙且容量未到 `max_workers`，按需扩容一个新 worker。
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), WebcraftError> {
        let sender_guard = self.shared.sender.lock();
        let Some(sender) = sender_guard.as_ref() else {
            return Err(WebcraftError::shutdown_refused(
                "thread pool is shutting down; submission refused",
            ));
        };
        sender
            .send(Box::new(job))
            .map_err(|_| WebcraftError::shutdown_refused("thread pool worker channel closed"))?;
        drop(sender_guard);

        if self.shared.idle_workers.load(Ordering::Acquire) == 0
            && self.shared.current_workers.load(Ordering::Acquire) < self.shared.max_workers
        {
            self.spawn_worker();
        }
        Ok(())
    }

    fn spawn_worker(&self) {
        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || worker_loop(shared));
        self.handles.lock().push(handle);
    }

    pub fn current_workers(&self) -> usize {
        self.shared.current_workers.load(Ordering::Acquire)
    }

    /// 停止接受新提交并阻塞等待所有 worker 完成排空后退出。
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.sender.lock().take();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: Arc<Shared>) {
    shared.current_workers.fetch_add(1, Ordering::AcqRel);
    tracing::debug!(
        { fields::THREAD_POOL_WORKERS } = shared.current_workers.load(Ordering::Acquire),
        "thread pool worker started"
    );

    loop {
        shared.idle_workers.fetch_add(1, Ordering::AcqRel);
        let job = {
            let receiver = shared.receiver.lock();
            receiver.recv_timeout(shared.idle_timeout)
        };
        shared.idle_workers.fetch_sub(1, Ordering::AcqRel);

        match job {
            Ok(job) => {
                let result = panic::catch_unwind(AssertUnwindSafe(job));
                if result.is_err() {
                    tracing::error!("thread pool work item panicked; panic absorbed");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if shared.current_workers.load(Ordering::Acquire) > shared.min_workers {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    shared.current_workers.fetch_sub(1, Ordering::AcqRel);
    tracing::debug!("thread pool worker exiting");
}
