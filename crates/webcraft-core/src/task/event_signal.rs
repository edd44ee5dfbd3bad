//! 一次性的阻塞信号，供 [`super::sync_wait`] 在非异步线程上等待任务完成。
//!
//! # 设计背景（Why）
//! - 原始实现里的 `event_signal` 用自旋 + `yield` 等待一个原子标志位；这种忙等在 C++
//!   协程运行时里可以接受，但移植到这里我们改用 `Condvar`，避免在宿主线程上烧 CPU。
//! - 语义保持不变：`set` 之后，任意数量的 `wait` 调用都会立即返回；信号不可复位。
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub struct EventSignal {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl EventSignal {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    pub fn set(&self) {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = true;
        self.condvar.notify_all();
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn wait(&self) {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while !*guard {
            guard = self
                .condvar
                .wait(guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// 等待最多 `timeout`；返回 `true` 表示信号已置位，`false` 表示超时。
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        while !*guard {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return *guard;
            }
            let (next_guard, result) = self
                .condvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard = next_guard;
            if result.timed_out() && !*guard {
                return false;
            }
        }
        true
    }
}

impl Default for EventSignal {
    fn default() -> Self {
        Self::new()
    }
}
