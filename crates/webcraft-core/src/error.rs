//! Error taxonomy for the async runtime and stream core.
//!
//! # 设计背景（Why）
//! - 运行时横跨任务调度、平台完成端口与流水线适配器，若每个子系统各自定义错误类型，
//!   调用方将难以在 `sync_wait` 出口统一处理失败路径。
//! - 借鉴 `spark-core::error::CoreError` 的分层思路：一个稳定的错误码 + 人类可读消息 +
//!   可选底层原因，叠加一层结构化分类供自动化处理使用。
//!
//! # 契约说明（What）
//! - [`WebcraftError`] 是唯一的跨模块错误载体；[`ErrorCategory`] 对应 `spec.md` §7 的七个分类。
//! - `Cancelled` 不是严格意义上的错误——调用方应优先检查操作返回的取消标志，仅在错误路径中
//!   才会看到 [`ErrorCategory::Cancelled`]（例如某些适配器选择以 `Result` 报告取消而非旁路标志位）。
use core::fmt;
use std::error::Error as StdError;

/// 统一的 `Result` 别名，供所有公开 API 使用。
pub type WebcraftResult<T> = Result<T, WebcraftError>;

/// 结构化错误分类，驱动上层重试/关闭策略。
///
/// 对应 `spec.md` §7 的错误分类：`ParseError`、`IoError`、`AddressError`、`StateError`、
/// `Cancelled`、`ShutdownError`，外加一个 `Unspecified` 兜底值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// 配置/协议文本解析失败，携带行号上下文（见 [`WebcraftError::with_line`]）。
    Parse,
    /// 原生操作失败（平台错误码透传）。
    Io,
    /// 地址解析失败，或要求组播地址却收到单播地址。
    Address,
    /// 契约违例：重复完成 TCS、对已关闭资源操作、对空序列执行 reduce/min/max/sum。
    State,
    /// 操作作为一次正常完成被取消（携带取消标志，而非作为异常路径）。
    Cancelled,
    /// 向正在关闭的线程池提交工作。
    ShutdownRefused,
    #[default]
    Unspecified,
}

/// 运行时/流核心的统一错误类型。
#[derive(Debug)]
pub struct WebcraftError {
    code: &'static str,
    message: String,
    category: ErrorCategory,
    line: Option<u32>,
    cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl WebcraftError {
    /// 构造一个带稳定错误码与分类的错误。
    pub fn new(code: &'static str, message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            code,
            message: message.into(),
            category,
            line: None,
            cause: None,
        }
    }

    /// `ParseError` 的便捷构造器，附带出错行号。
    pub fn parse(message: impl Into<String>, line: u32) -> Self {
        Self::new("webcraft.parse", message, ErrorCategory::Parse).with_line(line)
    }

    /// `IoError` 的便捷构造器，附带底层原因。
    pub fn io(message: impl Into<String>, cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::new("webcraft.io", message, ErrorCategory::Io).with_cause(cause)
    }

    /// `AddressError` 的便捷构造器。
    pub fn address(message: impl Into<String>) -> Self {
        Self::new("webcraft.address", message, ErrorCategory::Address)
    }

    /// `StateError` 的便捷构造器：契约违例。
    pub fn state(message: impl Into<String>) -> Self {
        Self::new("webcraft.state", message, ErrorCategory::State)
    }

    /// `ShutdownError` 的便捷构造器：线程池正在关闭。
    pub fn shutdown_refused(message: impl Into<String>) -> Self {
        Self::new("webcraft.shutdown", message, ErrorCategory::ShutdownRefused)
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// 解析失败时的行号（1-based），仅 `ErrorCategory::Parse` 才会填充。
    pub fn line(&self) -> Option<u32> {
        self.line
    }
}

impl fmt::Display for WebcraftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", self.code, line, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl StdError for WebcraftError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_line_number() {
        let err = WebcraftError::parse("unexpected token", 42);
        assert_eq!(err.category(), ErrorCategory::Parse);
        assert_eq!(err.line(), Some(42));
        assert!(err.to_string().contains("line 42"));
    }

    #[test]
    fn state_error_has_no_cause_by_default() {
        let err = WebcraftError::state("task completion source already completed");
        assert!(StdError::source(&err).is_none());
        assert_eq!(err.category(), ErrorCategory::State);
    }
}
