//! C4：计时器服务——`sleep_for`/`sleep_until`/`set_timeout`/`set_interval`。
//!
//! # 设计背景（Why）
//! - §4.4 把计时器服务描述成"叠在运行时提供者之上的一薄层"：真正的计时原语
//!   （到期、取消）属于 [`crate::runtime::RuntimeProvider`]；本模块只负责
//!   `sleep_until`（换算成 `sleep_for`）与重复调度（`set_interval`）这两件事。
//! - §4.4 明确"不做漂移校正"：`set_interval` 每一轮都重新 `sleep_for` 整个周期，
//!   因此是调度间隔的下界而不是速率保证——这里照抄该行为，不额外实现漂移补偿。
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::WebcraftResult;
use crate::runtime::{RuntimeEvent, RuntimeProvider, StopSource, StopToken};
use crate::task::{Task, fire_and_forget};

/// 计时器服务：对 [`RuntimeProvider`] 的计时原语做轻量封装。
#[derive(Clone)]
pub struct TimerService {
    provider: Arc<dyn RuntimeProvider>,
}

impl TimerService {
    pub fn new(provider: Arc<dyn RuntimeProvider>) -> Self {
        Self { provider }
    }

    /// 至少等待 `duration`；可通过 `token` 协作式取消。
    pub async fn sleep_for(&self, duration: Duration, token: &StopToken) -> RuntimeEvent {
        self.provider.sleep_for(duration, token).await
    }

    /// 等待直到单调时钟到达 `deadline`；若 `deadline` 已过，等价于 `sleep_for(Duration::ZERO, ..)`。
    pub async fn sleep_until(&self, deadline: Instant, token: &StopToken) -> RuntimeEvent {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.provider.sleep_for(remaining, token).await
    }

    /// 调度 `body` 在 `duration` 之后运行恰好一次；返回的 [`StopSource`] 既能取消尚未
    /// 触发的计时器，也会把取消令牌转发进 `body`，供其内部协作式响应。
    pub fn set_timeout<F, Fut>(&self, body: F, duration: Duration) -> StopSource
    where
        F: FnOnce(StopToken) -> Fut + Send + 'static,
        Fut: Future<Output = WebcraftResult<()>> + Send + 'static,
    {
        let source = StopSource::new();
        let token = source.token();
        let provider = Arc::clone(&self.provider);

        fire_and_forget(async move {
            let event = provider.sleep_for(duration, &token).await;
            if event.cancelled {
                return Ok(());
            }
            body(token).await
        });

        source
    }

    /// 重复调度 `body`，每次完成后等待 `duration` 再运行下一轮；对应 §4.4 "lower-bound
    /// spacing, not a rate"。返回的 [`StopSource`] 在两次运行之间或运行期间都能生效。
    pub fn set_interval<F, Fut>(&self, mut body: F, duration: Duration) -> StopSource
    where
        F: FnMut(StopToken) -> Fut + Send + 'static,
        Fut: Future<Output = WebcraftResult<()>> + Send + 'static,
    {
        let source = StopSource::new();
        let loop_token = source.token();
        let provider = Arc::clone(&self.provider);

        fire_and_forget(async move {
            loop {
                let event = provider.sleep_for(duration, &loop_token).await;
                if event.cancelled || loop_token.is_stop_requested() {
                    return Ok(());
                }
                body(loop_token.clone()).await?;
                if loop_token.is_stop_requested() {
                    return Ok(());
                }
            }
        });

        source
    }

    /// 便捷包装：把 `sleep_for` 结果折叠成一个 [`Task`]，供需要把计时器嵌入更大任务
    /// 组合（如 `when_any` 实现超时）的调用方使用。
    pub fn sleep_task(&self, duration: Duration, token: StopToken) -> Task<RuntimeEvent> {
        let provider = Arc::clone(&self.provider);
        Task::spawn(async move { Ok(provider.sleep_for(duration, &token).await) })
    }
}
