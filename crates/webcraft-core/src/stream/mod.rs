//! C6：流契约——可读/可写/可关闭/可批量操作的能力特质集合。
//!
//! # 设计背景（Why）
//! - §4.6 把流描述成"按能力集合组合的多态类型"：一个具体流可以只读、只写，或者
//!   同时具备批量与关闭能力。Rust 里最自然的落地方式是若干独立 trait，具体类型按需
//!   实现其中任意子集，而不是一个臃肿的全能接口——这与 `futures::Stream`/`AsyncWrite`
//!   在标准生态里拆分职责的做法一致。
//! - 批量操作的默认回退（§4.6 "Default buffered fallback"）用 trait 默认方法实现：
//!   只声明单项操作的类型，自动获得一个"循环到第一个短结果或 EOF 为止"的批量实现，
//!   不需要每个具体流都手写。
use crate::error::WebcraftResult;

pub mod adaptors;
pub mod collectors;
mod generator_bridge;

pub use generator_bridge::{GeneratorStream, StreamGenerator};

/// 可读流：产出一个有序的 `T` 序列；`None` 表示流已结束（EOF 是稳定状态，
/// 一旦观察到，后续调用必须继续返回 `None`）。
#[async_trait::async_trait]
pub trait Readable<T: Send>: Send {
    async fn recv(&mut self) -> WebcraftResult<Option<T>>;
}

/// 可批量读取的流；默认实现以循环调用 [`Readable::recv`] 的方式回退，
/// 在遇到第一个 EOF 时停止并返回已填充的数量。
#[async_trait::async_trait]
pub trait BufferedReadable<T: Send>: Readable<T> {
    async fn recv_buf(&mut self, buf: &mut [Option<T>]) -> WebcraftResult<usize> {
        let mut filled = 0;
        for slot in buf.iter_mut() {
            match self.recv().await? {
                Some(value) => {
                    *slot = Some(value);
                    filled += 1;
                }
                None => break,
            }
        }
        Ok(filled)
    }
}

#[async_trait::async_trait]
impl<T: Send, R: Readable<T> + ?Sized> BufferedReadable<T> for R {}

/// 可写流：接受一个 `T`；`true` 表示被接受，`false` 表示接收端已经关闭。
#[async_trait::async_trait]
pub trait Writable<T: Send>: Send {
    async fn send(&mut self, item: T) -> WebcraftResult<bool>;
}

/// 可批量写入的流；默认实现逐项写入，在第一次拒绝处停止，返回已被接受的数量
/// （"short result = sink closed mid-batch"，对应 §4.6）。
#[async_trait::async_trait]
pub trait BufferedWritable<T: Send + Clone>: Writable<T> {
    async fn send_buf(&mut self, items: &[T]) -> WebcraftResult<usize> {
        let mut accepted = 0;
        for item in items {
            if !self.send(item.clone()).await? {
                break;
            }
            accepted += 1;
        }
        Ok(accepted)
    }
}

#[async_trait::async_trait]
impl<T: Send + Clone, W: Writable<T> + ?Sized> BufferedWritable<T> for W {}

/// 可关闭的流端点；关闭操作必须幂等（对应 §8 Testable Property 7）。
#[async_trait::async_trait]
pub trait Closeable: Send {
    async fn close(&mut self) -> WebcraftResult<()>;
}
