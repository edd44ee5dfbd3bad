//! C3：运行时提供者——把各平台的完成端口抽象成一个统一的扩展点。
//!
//! # 设计背景（Why）
//! - 原始设计里 `runtime provider` 是一个按平台条件编译的单例（io_uring/IOCP/kqueue）；
//!   §9 的"平台条件编译"重架构建议要求把它换成一个 trait + 每平台一个实现，外加一个
//!   始终可用的"mock"实现用于测试——这正是 [`RuntimeProvider`] 在本 crate 里承担的角色。
//! - §9 同时要求去掉"全局单例"：这里的 provider 是一个显式值（通常包进 `Arc`），由调用方
//!   显式持有与传递，而不是通过进程级全局状态查找。
//!
//! # 契约说明（What）
//! - [`RuntimeEvent`] 对应 §3 数据模型中的"运行时事件"记录：一次完成的结果（是否被取消），
//!   在本 crate 的 trait 层面足够表达 `sleep_for`/`yield` 等通用操作；承载 I/O 原生提交负载
//!   的具体字段属于各适配器 crate（C9 之外，§1 明确排除于本 crate 范围）。
//! - [`RuntimeProvider`] 只固化两个跨平台都存在、且 C4/C8/C7 的测试都需要的原语：
//!   `yield_now`（协作式公平性）与 `sleep_for`（计时器后端，C4 在其上构建
//!   `sleep_until`/`set_timeout`/`set_interval`）。适配器 crate 在各自的 trait 扩展里加上
//!   I/O 提交方法，而不需要修改这个核心 trait。
mod mock;
mod stop;

pub use mock::MockRuntimeProvider;
pub use stop::{StopSource, StopToken};

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// 一次完成的结果：对应 §3 "运行时事件"里的 `(result code, cancelled flag)` 对。
///
/// 本 crate 的跨平台原语（`yield_now`/`sleep_for`）只产出"是否被取消"这一个比特；
/// 适配器 crate 的具体 I/O 操作会把原生错误码映射进 [`crate::error::WebcraftError`]，
/// 而不是塞进这个结构体。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RuntimeEvent {
    /// 该事件是否作为取消结果完成，而不是自然完成。
    pub cancelled: bool,
}

impl RuntimeEvent {
    pub const COMPLETED: RuntimeEvent = RuntimeEvent { cancelled: false };
    pub const CANCELLED: RuntimeEvent = RuntimeEvent { cancelled: true };
}

/// 跨平台完成后端的统一扩展点。
///
/// # 实现者须知
/// - `yield_now`：提交一个空操作完成，等待者应在运行循环捡到它之后尽快恢复；
///   对应 §4.3 的 `yield()`。
/// - `sleep_for`：至少等待 `duration`；若 `token` 在到期前被取消，返回
///   [`RuntimeEvent::CANCELLED`] 而不是报错（对应 §5 "Cancelled ... 作为正常完成"）。
///   零/负时长或已经停止的令牌必须同步完成（§4.3）。
pub trait RuntimeProvider: Send + Sync + 'static {
    /// 供日志/诊断使用的后端名称（如 `"mock"`、`"io_uring"`、`"iocp"`、`"kqueue"`）。
    fn name(&self) -> &'static str;

    /// 提交一个空操作完成；用于计算密集型循环中的协作式让出。
    fn yield_now(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// 至少等待 `duration`；可通过 `token` 协作式取消。
    fn sleep_for(
        &self,
        duration: Duration,
        token: &StopToken,
    ) -> Pin<Box<dyn Future<Output = RuntimeEvent> + Send + 'static>>;

    /// 请求关闭：运行循环应尽快退出，已提交但未完成的操作按各后端约定处理。
    fn request_shutdown(&self);

    /// 是否已经请求过关闭。
    fn is_shutdown_requested(&self) -> bool;
}
