//! 协作式取消令牌：`StopSource`/`StopToken`。
//!
//! # 设计背景（Why）
//! - `spec.md` §4.3/§5 要求每一个可能阻塞在原生完成事件上的操作都能接受一个停止令牌；
//!   取消不是抛异常，而是被观察为一次"正常完成、但带取消标志"的结果。
//! - 这里选择"回调登记"而不是"轮询标志位"：后端的取消回调（`IORING_OP_ASYNC_CANCEL`、
//!   `CancelIoEx`、`EV_DELETE`）必须在 `request_stop` 那一刻同步执行，回调模型让这一步
//!   天然成立，而不需要运行时再去反复轮询每一个事件的令牌。
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct StopInner {
    requested: AtomicBool,
    callbacks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

/// 取消信号的生产端；`request_stop` 可安全地被多个线程并发调用，只有第一次调用生效。
#[derive(Clone)]
pub struct StopSource {
    inner: Arc<StopInner>,
}

/// 取消信号的只读观察端，可自由克隆并传递给多个正在进行的操作。
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<StopInner>,
}

impl StopSource {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StopInner {
                requested: AtomicBool::new(false),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// 取得与本源配对的令牌；可重复调用，返回的所有令牌共享同一个取消状态。
    pub fn token(&self) -> StopToken {
        StopToken {
            inner: Arc::clone(&self.inner),
        }
    }

    /// 请求取消：第一次调用会同步触发此前登记的全部回调；此后调用为空操作。
    pub fn request_stop(&self) {
        if self.inner.requested.swap(true, Ordering::AcqRel) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.inner.callbacks.lock());
        for cb in callbacks {
            cb();
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }
}

impl Default for StopSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StopToken {
    /// 一个永不触发取消的令牌，供不需要取消能力的调用点传入。
    pub fn none() -> Self {
        StopSource::new().token()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// 登记一个仅运行一次的取消回调。若取消已经发生，回调被同步立即调用。
    ///
    /// 对应 §4.3 "cancellation callback"：适配器用它把协作式取消接到原生取消 API 上。
    pub fn on_stop(&self, callback: impl FnOnce() + Send + 'static) {
        if self.is_stop_requested() {
            callback();
            return;
        }
        let mut callbacks = self.inner.callbacks.lock();
        if self.is_stop_requested() {
            drop(callbacks);
            callback();
            return;
        }
        callbacks.push(Box::new(callback));
    }
}
