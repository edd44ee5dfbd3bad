//! C7：流水线适配器——§4.7 的组合式、惰性流阶段。
//!
//! # 设计背景（Why）
//! - 原始规范把每个适配器描述成"值语义工厂，包装源流并暴露相同的能力集合"；这里
//!   用一个泛型包装结构体对应每个适配器，`StreamExt` 提供左结合的管线方法
//!   （`.map(..).filter(..).limit(..)`），与 `Iterator`/`futures::StreamExt` 的组合
//!   风格一致，而不是引入单独的组合子 DSL。
//! - `transform` 是唯一真正"异步生成器驱动"的适配器（§4.7 "async-gen→async-gen"）；
//!   其余适配器（`map`/`filter`/...）都可以表达成对底层单项 `recv` 的纯同步决策，
//!   按 §9 "every adaptor is layered over transform in the original" 的说法，本实现
//!   让 `map`/`filter` 直接包装 `recv`，而把真正"一进多出"的能力留给 `transform`，
//!   这样简单适配器不用为一次 1-对-1 映射背上生成器驱动任务的开销。
use std::future::Future;

use super::Readable;
use crate::error::WebcraftResult;
use crate::generator::{AsyncGenerator, Yielder, from_body};

/// `transform`：对每个输入元素调用 `f`，`f` 可以通过 [`Yielder`] 产出 0..N 个输出。
///
/// 对应 §4.7 "For each element, feeds it to `fn`; `fn` may yield 0..many outputs"。
pub fn transform<In, Out, S, F, Fut>(mut source: S, mut f: F) -> impl Readable<Out>
where
    In: Send + 'static,
    Out: Send + 'static,
    S: Readable<In> + Send + 'static,
    F: FnMut(In, Yielder<Out>) -> Fut + Send + 'static,
    Fut: Future<Output = WebcraftResult<()>> + Send + 'static,
{
    let generator = from_body(move |yielder| async move {
        while let Some(item) = source.recv().await? {
            f(item, yielder.clone()).await?;
        }
        Ok(())
    });
    super::GeneratorStream::new(generator)
}

/// `map(fn)`：一对一纯映射。
pub struct Map<S, F> {
    source: S,
    f: F,
}

#[async_trait::async_trait]
impl<In, Out, S, F> Readable<Out> for Map<S, F>
where
    In: Send,
    Out: Send,
    S: Readable<In> + Send,
    F: FnMut(In) -> Out + Send,
{
    async fn recv(&mut self) -> WebcraftResult<Option<Out>> {
        Ok(self.source.recv().await?.map(|v| (self.f)(v)))
    }
}

/// `filter(pred)`：丢弃 `pred` 为假的元素。
pub struct Filter<S, F> {
    source: S,
    pred: F,
}

#[async_trait::async_trait]
impl<T, S, F> Readable<T> for Filter<S, F>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> bool + Send,
{
    async fn recv(&mut self) -> WebcraftResult<Option<T>> {
        loop {
            match self.source.recv().await? {
                Some(value) if (self.pred)(&value) => return Ok(Some(value)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }
}

/// `limit(n)`：最多产出前 `n` 个元素，之后视为 EOF；不触碰源流的剩余部分。
pub struct Limit<S> {
    source: S,
    remaining: usize,
}

#[async_trait::async_trait]
impl<T, S> Readable<T> for Limit<S>
where
    T: Send,
    S: Readable<T> + Send,
{
    async fn recv(&mut self) -> WebcraftResult<Option<T>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.source.recv().await
    }
}

/// `skip(n)`：丢弃前 `n` 个元素；若源流长度不足 `n`，按 EOF 收尾。
pub struct Skip<S> {
    source: S,
    remaining: usize,
}

#[async_trait::async_trait]
impl<T, S> Readable<T> for Skip<S>
where
    T: Send,
    S: Readable<T> + Send,
{
    async fn recv(&mut self) -> WebcraftResult<Option<T>> {
        while self.remaining > 0 {
            self.remaining -= 1;
            if self.source.recv().await?.is_none() {
                return Ok(None);
            }
        }
        self.source.recv().await
    }
}

/// `take_while(pred)`：产出直至第一个 `pred` 为假的元素，随后视为 EOF。
pub struct TakeWhile<S, F> {
    source: S,
    pred: F,
    done: bool,
}

#[async_trait::async_trait]
impl<T, S, F> Readable<T> for TakeWhile<S, F>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> bool + Send,
{
    async fn recv(&mut self) -> WebcraftResult<Option<T>> {
        if self.done {
            return Ok(None);
        }
        match self.source.recv().await? {
            Some(value) if (self.pred)(&value) => Ok(Some(value)),
            Some(_) => {
                self.done = true;
                Ok(None)
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}

/// `drop_while(pred)`：丢弃直至第一个 `pred` 为假的元素，随后全部透传。
pub struct DropWhile<S, F> {
    source: S,
    pred: Option<F>,
}

#[async_trait::async_trait]
impl<T, S, F> Readable<T> for DropWhile<S, F>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> bool + Send,
{
    async fn recv(&mut self) -> WebcraftResult<Option<T>> {
        if let Some(mut pred) = self.pred.take() {
            loop {
                match self.source.recv().await? {
                    Some(value) if pred(&value) => continue,
                    Some(value) => return Ok(Some(value)),
                    None => return Ok(None),
                }
            }
        }
        self.source.recv().await
    }
}

/// `pipe(sink)`：把每个元素抄送给 `sink`（按值的克隆）并原样重新产出。
pub struct Pipe<S, W> {
    source: S,
    sink: W,
}

#[async_trait::async_trait]
impl<T, S, W> Readable<T> for Pipe<S, W>
where
    T: Send + Clone,
    S: Readable<T> + Send,
    W: super::Writable<T> + Send,
{
    async fn recv(&mut self) -> WebcraftResult<Option<T>> {
        match self.source.recv().await? {
            Some(value) => {
                let _ = self.sink.send(value.clone()).await?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// `forward_to(sink)`：把源流排空进 `sink`，第一次写入失败即停止。
pub async fn forward_to<T, S, W>(mut source: S, mut sink: W) -> WebcraftResult<()>
where
    T: Send,
    S: Readable<T> + Send,
    W: super::Writable<T> + Send,
{
    while let Some(value) = source.recv().await? {
        if !sink.send(value).await? {
            break;
        }
    }
    Ok(())
}

/// 管线方法扩展：把每个适配器暴露成左结合的方法调用。
pub trait StreamExt<T: Send>: Readable<T> + Sized {
    fn map<Out, F>(self, f: F) -> Map<Self, F>
    where
        F: FnMut(T) -> Out + Send,
    {
        Map { source: self, f }
    }

    fn filter<F>(self, pred: F) -> Filter<Self, F>
    where
        F: FnMut(&T) -> bool + Send,
    {
        Filter { source: self, pred }
    }

    fn limit(self, n: usize) -> Limit<Self> {
        Limit {
            source: self,
            remaining: n,
        }
    }

    fn skip(self, n: usize) -> Skip<Self> {
        Skip {
            source: self,
            remaining: n,
        }
    }

    fn take_while<F>(self, pred: F) -> TakeWhile<Self, F>
    where
        F: FnMut(&T) -> bool + Send,
    {
        TakeWhile {
            source: self,
            pred,
            done: false,
        }
    }

    fn drop_while<F>(self, pred: F) -> DropWhile<Self, F>
    where
        F: FnMut(&T) -> bool + Send,
    {
        DropWhile {
            source: self,
            pred: Some(pred),
        }
    }

    fn pipe<W>(self, sink: W) -> Pipe<Self, W>
    where
        T: Clone,
        W: super::Writable<T> + Send,
    {
        Pipe { source: self, sink }
    }

    /// 排空整个管线进 `sink`；与 [`forward_to`] 等价，但作为链式调用的终止方法。
    async fn forward_to<W>(self, sink: W) -> WebcraftResult<()>
    where
        Self: Send,
        W: super::Writable<T> + Send,
    {
        forward_to(self, sink).await
    }
}

impl<T: Send, S: Readable<T>> StreamExt<T> for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::collectors::to_vector;
    use crate::task::{Task, sync_wait};

    struct VecStream {
        items: std::vec::IntoIter<i32>,
    }

    fn vec_stream(items: Vec<i32>) -> VecStream {
        VecStream {
            items: items.into_iter(),
        }
    }

    #[async_trait::async_trait]
    impl Readable<i32> for VecStream {
        async fn recv(&mut self) -> WebcraftResult<Option<i32>> {
            Ok(self.items.next())
        }
    }

    #[test]
    fn filter_map_to_vector_matches_scenario_s4() {
        let source = vec_stream((1..=10).collect());
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let piped = source.filter(|v| v % 2 == 0).map(|v| v * 10);
            to_vector(piped).await
        });
        assert_eq!(
            sync_wait(task).unwrap(),
            vec![20, 40, 60, 80, 100]
        );
    }

    #[test]
    fn limit_zero_yields_immediate_eof_without_touching_source() {
        let source = vec_stream(vec![1, 2, 3]);
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let limited = source.limit(0);
            to_vector(limited).await
        });
        assert_eq!(sync_wait(task).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn skip_beyond_length_yields_eof() {
        let source = vec_stream(vec![1, 2, 3]);
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let skipped = source.skip(10);
            to_vector(skipped).await
        });
        assert_eq!(sync_wait(task).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn take_while_over_empty_source_yields_eof() {
        let source = vec_stream(vec![]);
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let taken = source.take_while(|_| true);
            to_vector(taken).await
        });
        assert_eq!(sync_wait(task).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn drop_while_passes_through_remainder() {
        let source = vec_stream(vec![1, 2, 3, 1, 2]);
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let dropped = source.drop_while(|v| *v < 3);
            to_vector(dropped).await
        });
        assert_eq!(sync_wait(task).unwrap(), vec![3, 1, 2]);
    }

    #[test]
    fn forward_to_method_is_equivalent_to_the_free_function() {
        use crate::stream::Writable;
        use std::sync::Arc;
        use parking_lot::Mutex;

        struct VecSink {
            items: Arc<Mutex<Vec<i32>>>,
        }

        #[async_trait::async_trait]
        impl Writable<i32> for VecSink {
            async fn send(&mut self, value: i32) -> WebcraftResult<bool> {
                self.items.lock().push(value);
                Ok(true)
            }
        }

        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = VecSink {
            items: Arc::clone(&collected),
        };
        let source = vec_stream(vec![1, 2, 3]);
        let task: Task<()> = Task::spawn(async move {
            source.filter(|v| *v != 2).forward_to(sink).await
        });
        sync_wait(task).unwrap();
        assert_eq!(*collected.lock(), vec![1, 3]);
    }

    #[test]
    fn transform_can_fan_one_input_into_many_outputs() {
        let source = vec_stream(vec![1, 2, 3]);
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let fanned = transform(source, |v, yielder| async move {
                yielder.yield_value(v).await;
                yielder.yield_value(v * 100).await;
                Ok(())
            });
            to_vector(fanned).await
        });
        assert_eq!(
            sync_wait(task).unwrap(),
            vec![1, 100, 2, 200, 3, 300]
        );
    }
}
