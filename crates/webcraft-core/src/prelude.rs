//! 常用类型的一站式引入，镜像同类 crate 的 prelude 做法。
//!
//! # 使用方式（How）
//! ```rust
//! use webcraft_core::prelude::*;
//! ```
pub use crate::channel::{Receiver, Sender, channel};
pub use crate::error::{ErrorCategory, WebcraftError, WebcraftResult};
pub use crate::future::{BoxFuture, LocalBoxFuture};
pub use crate::generator::{AsyncGenerator, Generator};
pub use crate::runtime::{RuntimeEvent, RuntimeProvider, StopSource, StopToken};
pub use crate::stream::adaptors::StreamExt;
pub use crate::stream::{BufferedReadable, BufferedWritable, Closeable, Readable, Writable};
pub use crate::task::{Task, TaskCompletionSource, TaskResult, fire_and_forget, sync_wait, when_all, when_any};
pub use crate::threadpool::ThreadPool;
pub use crate::timer::TimerService;
