//! Stream ⇄ AsyncGenerator 互转（§4.2）。
use super::Readable;
use crate::error::WebcraftResult;
use crate::generator::AsyncGenerator;

/// 把一个 [`Readable`] 流包装成异步生成器：反复调用 `recv`，直到 EOF 正常收尾。
pub struct StreamGenerator<S> {
    stream: S,
}

impl<S> StreamGenerator<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

#[async_trait::async_trait]
impl<T, S> AsyncGenerator<T> for StreamGenerator<S>
where
    T: Send,
    S: Readable<T> + Send,
{
    async fn next(&mut self) -> WebcraftResult<Option<T>> {
        self.stream.recv().await
    }
}

/// 把一个异步生成器包装成只读流：`recv` 即生成器的下一次自增。
pub struct GeneratorStream<G> {
    generator: G,
}

impl<G> GeneratorStream<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }
}

#[async_trait::async_trait]
impl<T, G> Readable<T> for GeneratorStream<G>
where
    T: Send,
    G: AsyncGenerator<T> + Send,
{
    async fn recv(&mut self) -> WebcraftResult<Option<T>> {
        self.generator.next().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator;
    use crate::task::{Task, sync_wait};

    struct VecStream {
        items: std::vec::IntoIter<i32>,
    }

    #[async_trait::async_trait]
    impl Readable<i32> for VecStream {
        async fn recv(&mut self) -> WebcraftResult<Option<i32>> {
            Ok(self.items.next())
        }
    }

    #[test]
    fn stream_to_generator_preserves_order() {
        let stream = VecStream {
            items: vec![1, 2, 3].into_iter(),
        };
        let mut gen = StreamGenerator::new(stream);
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let mut out = Vec::new();
            while let Some(v) = gen.next().await? {
                out.push(v);
            }
            Ok(out)
        });
        assert_eq!(sync_wait(task).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn generator_to_stream_preserves_order() {
        let gen = generator::from_body(|y| async move {
            for v in 0..3 {
                y.yield_value(v).await;
            }
            Ok(())
        });
        let mut stream = GeneratorStream::new(gen);
        let task: Task<Vec<i32>> = Task::spawn(async move {
            let mut out = Vec::new();
            while let Some(v) = stream.recv().await? {
                out.push(v);
            }
            Ok(out)
        });
        assert_eq!(sync_wait(task).unwrap(), vec![0, 1, 2]);
    }
}
