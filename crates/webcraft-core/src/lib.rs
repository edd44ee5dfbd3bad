#![deny(unsafe_code)]
#![doc = "webcraft-core: 跨平台异步任务/流运行时契约与内存态参考后端。"]
#![doc = ""]
#![doc = "本 crate 只定义契约与一个同步的 in-process 参考实现（[`runtime::mock`]）；"]
#![doc = "真正的完成端口后端（io_uring/IOCP/kqueue）位于工作区内独立的 adapter crate 中，"]
#![doc = "并通过 [`runtime::RuntimeProvider`] 这一个扩展点接入。"]

pub mod channel;
pub mod config;
pub mod error;
pub mod future;
pub mod generator;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod stream;
pub mod task;
pub mod threadpool;
pub mod timer;

pub use config::RuntimeConfig;
pub use error::{ErrorCategory, WebcraftError, WebcraftResult};
pub use future::{BoxFuture, LocalBoxFuture};
pub use runtime::{RuntimeEvent, RuntimeProvider, StopSource, StopToken};
pub use task::{Task, TaskCompletionSource, TaskResult, fire_and_forget, sync_wait, when_all, when_any};
