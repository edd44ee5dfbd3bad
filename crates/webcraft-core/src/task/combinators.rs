//! `when_all`/`when_any`: 在一组任务上做扇出/扇入组合。
//!
//! # 契约说明（What）
//! - `when_all`：等待全部任务完成，按输入顺序收集结果；第一个观察到的错误胜出，
//!   其余错误被吞掉（不取消任何兄弟任务——它们各自已经在独立驱动）。
//! - `when_any`：返回第一个完成的任务的结果；其余任务既不取消也不等待，胜负仅由
//!   一次 `compare_exchange` 决定（"胜者通吃"）。
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Task, TaskCompletionSource, TaskResult, fire_and_forget};

/// 并发等待全部任务；返回按输入顺序排列的结果集合，或第一个观察到的错误。
pub fn when_all<T: Send + 'static>(tasks: Vec<Task<T>>) -> Task<Vec<T>> {
    Task::spawn(async move {
        let mut results = Vec::with_capacity(tasks.len());
        let mut first_error = None;
        for task in tasks {
            match task.await {
                Ok(value) => results.push(value),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(results),
        }
    })
}

/// 异构版本的 [`when_all`]：逐元素等待一组类型互不相同的任务，按原始位置收集结果
/// 到一个元组里；`Task<()>` 分支在结果元组里落在对应位置上的 `()`。
///
/// 与同构的 `Vec<Task<T>>` 版本共享"第一个观察到的错误胜出，其余错误被吞掉"的
/// 语义，只是输入/输出都换成了编译期定长的元组，为元组的每个元素类型各生成一份。
macro_rules! when_all_tuple {
    ($name:ident; $($idx:tt => $t:ident as $v:ident),+) => {
        #[doc = concat!(
            "等待 ", stringify!($name),
            " 个类型互不相同的任务；返回按输入顺序排列的结果元组，或第一个观察到的错误。"
        )]
        pub fn $name<$($t: Send + 'static),+>(
            tasks: ($(Task<$t>),+,),
        ) -> Task<($($t),+,)> {
            Task::spawn(async move {
                let mut first_error = None;
                $(
                    let $v = match tasks.$idx.await {
                        Ok(value) => Some(value),
                        Err(err) => {
                            if first_error.is_none() {
                                first_error = Some(err);
                            }
                            None
                        }
                    };
                )+
                match first_error {
                    Some(err) => Err(err),
                    None => Ok(($($v.unwrap()),+,)),
                }
            })
        }
    };
}

when_all_tuple!(when_all2; 0 => T0 as v0, 1 => T1 as v1);
when_all_tuple!(when_all3; 0 => T0 as v0, 1 => T1 as v1, 2 => T2 as v2);
when_all_tuple!(when_all4; 0 => T0 as v0, 1 => T1 as v1, 2 => T2 as v2, 3 => T3 as v3);
when_all_tuple!(when_all5; 0 => T0 as v0, 1 => T1 as v1, 2 => T2 as v2, 3 => T3 as v3, 4 => T4 as v4);
when_all_tuple!(when_all6; 0 => T0 as v0, 1 => T1 as v1, 2 => T2 as v2, 3 => T3 as v3, 4 => T4 as v4, 5 => T5 as v5);

/// [`when_all`] 的无返回值变体。
pub fn when_all_void(tasks: Vec<Task<()>>) -> Task<()> {
    Task::spawn(async move {
        let mut first_error = None;
        for task in tasks {
            if let Err(err) = task.await {
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    })
}

/// 扇出唤醒组：多个赛跑中的任务共享一份"胜者通吃"状态，第一个到达者赢得
/// [`WakeGroup::try_claim`]，其余到达者的结果被静默丢弃。
///
/// 对应原始实现里 `when_any` 专用的扇出唤醒类型：一组竞争者共享一个胜负判定点，
/// 而不是每个分支各自维护状态。
struct WakeGroup {
    won: AtomicBool,
}

impl WakeGroup {
    fn new() -> Self {
        Self {
            won: AtomicBool::new(false),
        }
    }

    /// 恰好一个调用者会得到 `true`；此后所有调用者都得到 `false`。
    fn try_claim(&self) -> bool {
        !self.won.swap(true, Ordering::AcqRel)
    }
}

/// 返回第一个完成的任务的结果；其余任务的完成不再影响返回值。
pub fn when_any<T: Send + 'static>(tasks: Vec<Task<T>>) -> Task<T> {
    let (tcs, result_task) = TaskCompletionSource::<T>::new();
    let tcs = Arc::new(tcs);
    let group = Arc::new(WakeGroup::new());

    for task in tasks {
        let tcs = Arc::clone(&tcs);
        let group = Arc::clone(&group);
        fire_and_forget(async move {
            let outcome: TaskResult<T> = task.await;
            if group.try_claim() {
                let _ = match outcome {
                    Ok(value) => tcs.set_value(value),
                    Err(err) => tcs.set_exception(err),
                };
            }
            Ok(())
        });
    }

    result_task
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCategory, WebcraftError};
    use crate::task::sync_wait;

    #[test]
    fn when_all_preserves_input_order() {
        let tasks = vec![
            Task::spawn(async { Ok::<_, WebcraftError>(1) }),
            Task::spawn(async { Ok::<_, WebcraftError>(2) }),
            Task::spawn(async { Ok::<_, WebcraftError>(3) }),
        ];
        let result = sync_wait(when_all(tasks)).unwrap();
        assert_eq!(result, vec![1, 2, 3]);
    }

    #[test]
    fn when_all_surfaces_first_error_and_keeps_others_quiet() {
        let tasks = vec![
            Task::spawn(async { Ok::<_, WebcraftError>(1) }),
            Task::spawn(async { Err(WebcraftError::state("first failure")) }),
            Task::spawn(async { Err(WebcraftError::state("second failure")) }),
        ];
        let err = sync_wait(when_all(tasks)).unwrap_err();
        assert_eq!(err.message(), "first failure");
        assert_eq!(err.category(), ErrorCategory::State);
    }

    #[test]
    fn when_all2_collects_heterogeneous_results_in_order() {
        let tasks = (
            Task::spawn(async { Ok::<_, WebcraftError>(7) }),
            Task::spawn(async { Ok::<_, WebcraftError>("seven") }),
        );
        let (n, s) = sync_wait(when_all2(tasks)).unwrap();
        assert_eq!(n, 7);
        assert_eq!(s, "seven");
    }

    #[test]
    fn when_all2_with_void_slot_reports_unit() {
        let tasks = (
            Task::spawn(async { Ok::<_, WebcraftError>(()) }),
            Task::spawn(async { Ok::<_, WebcraftError>(42) }),
        );
        let (unit, n) = sync_wait(when_all2(tasks)).unwrap();
        assert_eq!(unit, ());
        assert_eq!(n, 42);
    }

    #[test]
    fn when_all3_surfaces_first_error_after_awaiting_every_branch() {
        let tasks = (
            Task::spawn(async { Ok::<_, WebcraftError>(1) }),
            Task::spawn(async { Err::<i32, _>(WebcraftError::state("middle failure")) }),
            Task::spawn(async { Err::<i32, _>(WebcraftError::state("last failure")) }),
        );
        let err = sync_wait(when_all3(tasks)).unwrap_err();
        assert_eq!(err.message(), "middle failure");
    }

    #[test]
    fn when_any_returns_first_completion() {
        let (tcs_slow, task_slow) = TaskCompletionSource::<i32>::new();
        let (tcs_fast, task_fast) = TaskCompletionSource::<i32>::new();
        tcs_fast.set_value(10).unwrap();
        let winner = sync_wait(when_any(vec![task_slow, task_fast])).unwrap();
        assert_eq!(winner, 10);
        // the loser is never observed; completing it afterwards is harmless.
        tcs_slow.set_value(20).unwrap();
    }
}
