//! C7：收集器——把流耗尽为一个标量/聚合值的终结适配器（§4.7 收集器表）。
//!
//! # 设计背景（Why）
//! - 收集器都是"消费到底才产出一个值"的终结操作，天然适合写成泛型自由函数而不是
//!   trait 方法——这与 `Iterator::sum`/`Iterator::fold` 等标准库收集器的形状一致，
//!   调用方 `collectors::to_vector(stream).await` 读起来与 `stream.to_vector()` 同样
//!   直观，又避免了给 [`super::Readable`] 叠加一层不对象安全的 trait 方法。
use std::collections::HashMap;
use std::hash::Hash;

use super::Readable;
use crate::error::WebcraftResult;

/// `reduce(op)`：对空输入返回 "empty-reduction" 的 [`crate::error::ErrorCategory::State`] 错误。
pub async fn reduce<T, S, F>(mut source: S, mut op: F) -> WebcraftResult<T>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(T, T) -> T + Send,
{
    let mut acc = match source.recv().await? {
        Some(first) => first,
        None => {
            return Err(crate::error::WebcraftError::state(
                "reduce called on an empty stream",
            ));
        }
    };
    while let Some(next) = source.recv().await? {
        acc = op(acc, next);
    }
    Ok(acc)
}

/// `joining(sep, prefix, suffix)`：内部基于 [`reduce`] 实现，`T` 必须可转换为字符串。
pub async fn joining<T, S>(source: S, sep: &str, prefix: &str, suffix: &str) -> WebcraftResult<String>
where
    T: Send + ToString,
    S: Readable<T> + Send,
{
    let items = to_vector(source).await?;
    if items.is_empty() {
        return Ok(format!("{prefix}{suffix}"));
    }
    let joined = items
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(sep);
    Ok(format!("{prefix}{joined}{suffix}"))
}

/// `to_vector()`：按顺序收集全部元素。
pub async fn to_vector<T, S>(mut source: S) -> WebcraftResult<Vec<T>>
where
    T: Send,
    S: Readable<T> + Send,
{
    let mut out = Vec::new();
    while let Some(value) = source.recv().await? {
        out.push(value);
    }
    Ok(out)
}

/// `group_by(key_fn)`：组内保持插入顺序。
pub async fn group_by<T, K, S, F>(mut source: S, mut key_fn: F) -> WebcraftResult<HashMap<K, Vec<T>>>
where
    T: Send,
    K: Eq + Hash + Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> K + Send,
{
    let mut groups: HashMap<K, Vec<T>> = HashMap::new();
    while let Some(value) = source.recv().await? {
        let key = key_fn(&value);
        groups.entry(key).or_default().push(value);
    }
    Ok(groups)
}

/// `min`：要求 `T: Ord`；空输入失败。
pub async fn min<T, S>(source: S) -> WebcraftResult<T>
where
    T: Send + Ord,
    S: Readable<T> + Send,
{
    reduce(source, |a, b| if a <= b { a } else { b }).await
}

/// `max`：要求 `T: Ord`；空输入失败。
pub async fn max<T, S>(source: S) -> WebcraftResult<T>
where
    T: Send + Ord,
    S: Readable<T> + Send,
{
    reduce(source, |a, b| if a >= b { a } else { b }).await
}

/// `sum`：要求 `T: Add`；空输入失败。
pub async fn sum<T, S>(source: S) -> WebcraftResult<T>
where
    T: Send + std::ops::Add<Output = T>,
    S: Readable<T> + Send,
{
    reduce(source, |a, b| a + b).await
}

/// `find_first(pred)`：返回第一个满足 `pred` 的元素，或 `None`。
pub async fn find_first<T, S, F>(mut source: S, mut pred: F) -> WebcraftResult<Option<T>>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> bool + Send,
{
    while let Some(value) = source.recv().await? {
        if pred(&value) {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// `find_last(pred)`：返回最后一个满足 `pred` 的元素（必须耗尽整个流）。
pub async fn find_last<T, S, F>(mut source: S, mut pred: F) -> WebcraftResult<Option<T>>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> bool + Send,
{
    let mut last = None;
    while let Some(value) = source.recv().await? {
        if pred(&value) {
            last = Some(value);
        }
    }
    Ok(last)
}

/// `any_matches`：任一元素满足 `pred` 即短路返回 `true`。
pub async fn any_matches<T, S, F>(mut source: S, mut pred: F) -> WebcraftResult<bool>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> bool + Send,
{
    while let Some(value) = source.recv().await? {
        if pred(&value) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `all_matches`：任一元素不满足 `pred` 即短路返回 `false`。
pub async fn all_matches<T, S, F>(mut source: S, mut pred: F) -> WebcraftResult<bool>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> bool + Send,
{
    while let Some(value) = source.recv().await? {
        if !pred(&value) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// `none_matches`：任一元素满足 `pred` 即短路返回 `false`。
pub async fn none_matches<T, S, F>(source: S, pred: F) -> WebcraftResult<bool>
where
    T: Send,
    S: Readable<T> + Send,
    F: FnMut(&T) -> bool + Send,
{
    Ok(!any_matches(source, pred).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
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
    fn joining_matches_scenario_s9() {
        struct StrStream {
            items: std::vec::IntoIter<&'static str>,
        }
        #[async_trait::async_trait]
        impl Readable<&'static str> for StrStream {
            async fn recv(&mut self) -> WebcraftResult<Option<&'static str>> {
                Ok(self.items.next())
            }
        }
        let stream = StrStream {
            items: vec!["a", "b", "c"].into_iter(),
        };
        let task: Task<String> = Task::spawn(async move { joining(stream, ",", "[", "]").await });
        assert_eq!(sync_wait(task).unwrap(), "[a,b,c]");
    }

    #[test]
    fn reduce_on_empty_stream_fails_with_state_error() {
        let stream = vec_stream(vec![]);
        let task: Task<i32> = Task::spawn(async move { reduce(stream, |a, b| a + b).await });
        let err = sync_wait(task).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::State);
    }

    #[test]
    fn min_max_sum_over_a_populated_stream() {
        let task: Task<(i32, i32, i32)> = Task::spawn(async move {
            let mn = min(vec_stream(vec![3, 1, 2])).await?;
            let mx = max(vec_stream(vec![3, 1, 2])).await?;
            let sm = sum(vec_stream(vec![3, 1, 2])).await?;
            Ok((mn, mx, sm))
        });
        assert_eq!(sync_wait(task).unwrap(), (1, 3, 6));
    }

    #[test]
    fn group_by_preserves_insertion_order_within_group() {
        let stream = vec_stream(vec![1, 2, 3, 4, 5, 6]);
        let task: Task<HashMap<bool, Vec<i32>>> =
            Task::spawn(async move { group_by(stream, |v| v % 2 == 0).await });
        let groups = sync_wait(task).unwrap();
        assert_eq!(groups[&true], vec![2, 4, 6]);
        assert_eq!(groups[&false], vec![1, 3, 5]);
    }

    #[test]
    fn find_first_and_find_last() {
        let task: Task<(Option<i32>, Option<i32>)> = Task::spawn(async move {
            let first = find_first(vec_stream(vec![1, 2, 3, 4]), |v| *v % 2 == 0).await?;
            let last = find_last(vec_stream(vec![1, 2, 3, 4]), |v| *v % 2 == 0).await?;
            Ok((first, last))
        });
        assert_eq!(sync_wait(task).unwrap(), (Some(2), Some(4)));
    }

    #[test]
    fn any_all_none_matches_short_circuit() {
        let task: Task<(bool, bool, bool)> = Task::spawn(async move {
            let any = any_matches(vec_stream(vec![1, 2, 3]), |v| *v == 2).await?;
            let all = all_matches(vec_stream(vec![2, 4, 6]), |v| v % 2 == 0).await?;
            let none = none_matches(vec_stream(vec![1, 3, 5]), |v| v % 2 == 0).await?;
            Ok((any, all, none))
        });
        assert_eq!(sync_wait(task).unwrap(), (true, true, true));
    }
}
