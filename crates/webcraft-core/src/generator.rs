//! C2：同步/异步生成器原语，供流（C6）用作拉动式生产者。
//!
//! # 设计背景（Why）
//! - 原始 `generator<T>`/`async_generator<T>` 是协程：函数体在 `begin()`/`++` 处暂停，
//!   产出的值借出到迭代器的槽位里。Rust 没有稳定的生成器语法，§9 把"协程/promise
//!   机制"列为需要重架构的模式之一：用状态机（这里是手写的 `Future` 实现）替代。
//! - 对于"任意函数体、在任意位置 yield"这种通用生成器，状态机没法由宏自动生成；
//!   这里采用一个在生产 Rust 代码里常见的等价写法——生成器函数体作为一个独立任务
//!   运行，通过一个单消费者的 [`crate::channel`] 把产出的值喂给调用方的迭代，
//!   "yield" 即"向通道 send 一次"。这保留了"restart-free：只能迭代一次"、
//!   "异步生成器的自增可以挂起"这两条契约，又完全落在安全 Rust 内。
use std::future::Future;

use crate::channel::{self, Receiver, Sender};
use crate::error::WebcraftResult;
use crate::task::{Task, TaskResult};

/// 同步生成器：迭代本身不挂起，但可能失败。
///
/// 对应 §4.2 "Throwing before the first yield surfaces at iterator construction"——
/// 这里没有单独的 `begin()` 步骤，第一次 `next()` 调用即相当于原始的 `begin()`。
pub trait Generator<T> {
    /// 产出下一个值；`Ok(None)` 表示序列正常结束。
    fn next(&mut self) -> WebcraftResult<Option<T>>;
}

/// 把任意 `Iterator<Item = WebcraftResult<T>>` 包装成 [`Generator<T>`]。
pub struct IterGenerator<I> {
    iter: I,
}

impl<I, T> Generator<T> for IterGenerator<I>
where
    I: Iterator<Item = WebcraftResult<T>>,
{
    fn next(&mut self) -> WebcraftResult<Option<T>> {
        self.iter.next().transpose()
    }
}

/// 从一个中不会失败的迭代器构造生成器。
pub fn from_iter<I, T>(iter: I) -> IterGenerator<std::iter::Map<I::IntoIter, fn(T) -> WebcraftResult<T>>>
where
    I: IntoIterator<Item = T>,
{
    IterGenerator {
        iter: iter.into_iter().map(Ok as fn(T) -> WebcraftResult<T>),
    }
}

/// 异步生成器：自增本身可能挂起（对应 §4.2 "async generator ... `begin()` and
/// increment return tasks"）。
#[async_trait::async_trait]
pub trait AsyncGenerator<T: Send>: Send {
    async fn next(&mut self) -> WebcraftResult<Option<T>>;
}

/// 生成器函数体用来产出值的句柄；`yield_value` 对应原始协程里的一次 `co_yield`。
///
/// 发送失败（消费者已经放弃迭代）时返回 `false`，生成器体应当据此尽快返回。
#[derive(Clone)]
pub struct Yielder<T: Send + 'static> {
    sender: Sender<T>,
}

impl<T: Send + 'static> Yielder<T> {
    pub async fn yield_value(&self, value: T) -> bool {
        self.sender.send(value).is_ok()
    }
}

/// 从一个生成器函数体构造异步生成器：`body` 接收一个 [`Yielder`]，每次调用
/// `yield_value` 相当于产出一个元素；`body` 的返回值决定生成器收尾时的错误。
pub fn from_body<T, F, Fut>(body: F) -> BodyAsyncGenerator<T>
where
    T: Send + 'static,
    F: FnOnce(Yielder<T>) -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult<()>> + Send + 'static,
{
    let (sender, receiver) = channel::channel();
    let yielder = Yielder { sender };
    let driver = Task::spawn(async move { body(yielder).await });
    BodyAsyncGenerator {
        receiver,
        driver: Some(driver),
    }
}

/// 由 [`from_body`] 返回的异步生成器：按通道接收顺序产出值，驱动任务的错误在
/// 序列自然结束（通道 EOF）时传播给调用方。
pub struct BodyAsyncGenerator<T: Send + 'static> {
    receiver: Receiver<T>,
    driver: Option<Task<()>>,
}

#[async_trait::async_trait]
impl<T: Send + 'static> AsyncGenerator<T> for BodyAsyncGenerator<T> {
    async fn next(&mut self) -> WebcraftResult<Option<T>> {
        match self.receiver.recv().await? {
            Some(value) => Ok(Some(value)),
            None => {
                if let Some(driver) = self.driver.take() {
                    driver.await?;
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WebcraftError;
    use crate::task::sync_wait;

    #[test]
    fn sync_generator_drains_the_wrapped_iterator() {
        let mut gen = from_iter(vec![1, 2, 3]);
        assert_eq!(Generator::next(&mut gen).unwrap(), Some(1));
        assert_eq!(Generator::next(&mut gen).unwrap(), Some(2));
        assert_eq!(Generator::next(&mut gen).unwrap(), Some(3));
        assert_eq!(Generator::next(&mut gen).unwrap(), None);
    }

    #[test]
    fn async_generator_yields_values_in_order() {
        let mut gen = from_body(|yielder| async move {
            for v in 0..5 {
                if !yielder.yield_value(v).await {
                    break;
                }
            }
            Ok(())
        });

        let task: Task<Vec<i32>> = Task::spawn(async move {
            let mut out = Vec::new();
            while let Some(v) = gen.next().await? {
                out.push(v);
            }
            Ok(out)
        });
        assert_eq!(sync_wait(task).unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn async_generator_propagates_body_error_at_termination() {
        let mut gen = from_body(|yielder: Yielder<i32>| async move {
            yielder.yield_value(1).await;
            Err(WebcraftError::state("boom"))
        });

        let task: Task<Vec<i32>> = Task::spawn(async move {
            let mut out = Vec::new();
            while let Some(v) = gen.next().await? {
                out.push(v);
            }
            Ok(out)
        });
        let err = sync_wait(task).unwrap_err();
        assert_eq!(err.category(), crate::error::ErrorCategory::State);
    }
}
