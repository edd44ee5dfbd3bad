//! Stable `tracing` field names used across the runtime.
//!
//! # 设计背景（Why）
//! - 任务调度、运行时事件与通道都会在热路径上打点；若每个模块各自拼接字段名，
//!   日志聚合系统将无法按字段做跨模块的查询与告警。
//! - 沿用 `spark-core::observability::keys` 的做法：把字段名集中成常量，
//!   调用点只引用常量而不是裸字符串字面量。
//!
//! # 使用方式（How）
//! ```rust
//! use webcraft_core::observability::fields;
//! tracing::debug!(field = fields::TASK_ID, "example");
//! ```
pub mod fields {
    pub const TASK_ID: &str = "task.id";
    pub const TASK_PRIORITY: &str = "task.priority";
    pub const RUNTIME_EVENT_OP: &str = "runtime.event.op";
    pub const RUNTIME_EVENT_CANCELLED: &str = "runtime.event.cancelled";
    pub const TIMER_DURATION_MS: &str = "timer.duration_ms";
    pub const CHANNEL_ID: &str = "channel.id";
    pub const THREAD_POOL_WORKERS: &str = "thread_pool.workers";
}
