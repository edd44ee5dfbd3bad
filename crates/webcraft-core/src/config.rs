//! Runtime-construction configuration.
//!
//! # 设计背景（Why）
//! - 线程池、平台完成队列都需要少量构造期配置（容量、超时），但本 crate 的配置场景
//!   没有 `spark-core::configuration` 那种运行期热更新需求——运行时一旦构造即固定。
//! - 因此这里只保留一个简单的 Builder 风格值对象，而不是完整的配置事件/快照体系。
use std::time::Duration;

/// 线程池与完成队列的构造期参数。
///
/// # 契约说明（What）
/// - `min_workers`/`max_workers` 对应 §4.5 线程池的 `[min, max]` 边界；
/// - `idle_timeout` 对应工作线程空闲收缩的阈值；
/// - `submission_queue_depth` 是完成队列后端（io_uring/IOCP/kqueue）的提交队列容量提示，
///   具体适配器可以按需忽略或钳制该值。
#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub idle_timeout: Duration,
    pub submission_queue_depth: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            min_workers: 0,
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            idle_timeout: Duration::from_secs(10),
            submission_queue_depth: 256,
        }
    }
}

impl RuntimeConfig {
    pub fn with_workers(mut self, min: usize, max: usize) -> Self {
        self.min_workers = min;
        self.max_workers = max;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_submission_queue_depth(mut self, depth: u32) -> Self {
        self.submission_queue_depth = depth;
        self
    }
}
