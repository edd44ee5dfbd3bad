//! Shared future type aliases used throughout the runtime.
//!
//! # 设计背景（Why）
//! - `task`、`generator`、`stream` 模块都需要以对象安全的方式装箱 Future，
//!   避免把具体的 `async fn` 状态机类型渗透进公开 API。
use std::boxed::Box;
use std::future::Future;
use std::pin::Pin;

/// 跨线程可移动的装箱 Future，供 [`crate::task::Task`] 与运行时提交路径使用。
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 不要求 `Send` 的装箱 Future，供单线程执行器（如 mock 运行时的运行循环本身）使用。
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;
