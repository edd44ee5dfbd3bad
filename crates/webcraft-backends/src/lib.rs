//! C9：后端外观——文件/TCP 套接字/TCP 监听器/UDP 套接字的瘦 facade。
//!
//! # 设计背景（Why）
//! - `spec.md` §1 明确把具体的 socket/file 后端排除在本仓库的核心范围之外："each is
//!   specified only as a producer/consumer of the stream contract plus a per-platform
//!   completion operation"。本 crate 因此只定义 §4.9 描述的 trait 外观
//!   （[`FileBackend`]/[`TcpSocketBackend`]/[`TcpListenerBackend`]/[`UdpSocketBackend`]），
//!   并提供一个足以在测试里驱动 C6/C7/C8 的进程内回环参考实现——不做真正的操作系统
//!   套接字/文件描述符管理，那属于三个 `adapters/webcraft-rt-*` crate 各自的职责。
//! - `ConnectionInfo`/`MulticastGroup` 的校验规则照抄 §3/§4.9：组播地址必须落在
//!   IPv4 `224.0.0.0/4` 或 IPv6 `ff00::/8` 内，否则以 [`webcraft_core::ErrorCategory::Address`]
//!   拒绝，不依赖任何平台 socket API 就能验证。
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use webcraft_core::error::{WebcraftError, WebcraftResult};
use webcraft_core::stream::{Closeable, Readable, Writable};

/// `{host, port}`；使用前需经由平台名字服务解析（§3 "Connection info"）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
}

impl ConnectionInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// 一个经过校验的组播组地址 + 端口；只能通过 [`MulticastGroup::parse`] 构造。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MulticastGroup {
    addr: IpAddr,
    port: u16,
}

impl MulticastGroup {
    /// 校验 `addr` 落在组播范围内（IPv4 `224.0.0.0/4`，IPv6 `ff00::/8`），否则返回
    /// [`webcraft_core::ErrorCategory::Address`] 错误。
    pub fn parse(addr: IpAddr, port: u16) -> WebcraftResult<Self> {
        let is_multicast = match addr {
            IpAddr::V4(v4) => is_ipv4_multicast(v4),
            IpAddr::V6(v6) => is_ipv6_multicast(v6),
        };
        if !is_multicast {
            return Err(WebcraftError::address(format!(
                "{addr} is not a multicast address"
            )));
        }
        Ok(Self { addr, port })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

fn is_ipv4_multicast(addr: Ipv4Addr) -> bool {
    (224..=239).contains(&addr.octets()[0])
}

fn is_ipv6_multicast(addr: Ipv6Addr) -> bool {
    addr.segments()[0] & 0xff00 == 0xff00
}

/// §4.9 文件后端外观：`open_readable_stream`/`open_writable_stream(append?)`。
#[async_trait::async_trait]
pub trait FileBackend: Send + Sync {
    type Readable: Readable<Vec<u8>> + Closeable + Send;
    type Writable: Writable<Vec<u8>> + Closeable + Send;

    async fn open_readable_stream(&self, path: &str) -> WebcraftResult<Self::Readable>;

    /// `append = false` 截断文件；`append = true` 在不截断的前提下追加（§4.9）。
    async fn open_writable_stream(&self, path: &str, append: bool) -> WebcraftResult<Self::Writable>;
}

/// §4.9 TCP 套接字外观。
#[async_trait::async_trait]
pub trait TcpSocketBackend: Send + Sync {
    type Readable: Readable<Vec<u8>> + Send;
    type Writable: Writable<Vec<u8>> + Send;

    async fn connect(&self, info: ConnectionInfo) -> WebcraftResult<()>;
    fn readable(&self) -> Self::Readable;
    fn writable(&self) -> Self::Writable;

    /// `read`/`write`/`both`；幂等，重复关闭同一方向是空操作。
    async fn shutdown(&self, direction: ShutdownDirection) -> WebcraftResult<()>;
    async fn close(&self) -> WebcraftResult<()>;
    fn remote(&self) -> Option<ConnectionInfo>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownDirection {
    Read,
    Write,
    Both,
}

/// §4.9 TCP 监听器外观。
#[async_trait::async_trait]
pub trait TcpListenerBackend: Send + Sync {
    type Socket: TcpSocketBackend;

    async fn bind(&self, info: ConnectionInfo) -> WebcraftResult<()>;
    async fn listen(&self, backlog: u32) -> WebcraftResult<()>;
    /// 返回下一个已接受的套接字；关闭监听器会让一次挂起的 `accept` 以取消结果收尾
    /// （§4.9 "closing the listener cancels a pending accept"）。
    async fn accept(&self) -> WebcraftResult<Option<Self::Socket>>;
    async fn close(&self) -> WebcraftResult<()>;
}

/// §4.9 UDP 套接字外观，含组播加入/离开。
#[async_trait::async_trait]
pub trait UdpSocketBackend: Send + Sync {
    async fn bind(&self, info: ConnectionInfo) -> WebcraftResult<()>;
    async fn recv_from(&self, buf: &mut [u8]) -> WebcraftResult<(usize, ConnectionInfo)>;
    async fn send_to(&self, buf: &[u8], target: ConnectionInfo) -> WebcraftResult<usize>;
    async fn join(&self, group: MulticastGroup) -> WebcraftResult<()>;
    async fn leave(&self, group: MulticastGroup) -> WebcraftResult<()>;
}

/// 进程内回环参考实现：没有真正的文件描述符/套接字，足以在单测里练习 C6/C7/C8。
pub mod loopback;

pub use loopback::{LoopbackFile, LoopbackUdpBus};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multicast_group_accepts_ipv4_range() {
        let group = MulticastGroup::parse("239.255.0.1".parse().unwrap(), 9000).unwrap();
        assert_eq!(group.port(), 9000);
    }

    #[test]
    fn multicast_group_rejects_unicast_ipv4() {
        let err = MulticastGroup::parse("10.0.0.1".parse().unwrap(), 9000).unwrap_err();
        assert_eq!(err.category(), webcraft_core::ErrorCategory::Address);
    }

    #[test]
    fn multicast_group_accepts_ipv6_ff00_prefix() {
        MulticastGroup::parse("ff02::1".parse().unwrap(), 9000).unwrap();
    }

    #[test]
    fn multicast_group_rejects_unicast_ipv6() {
        let err = MulticastGroup::parse("::1".parse().unwrap(), 9000).unwrap_err();
        assert_eq!(err.category(), webcraft_core::ErrorCategory::Address);
    }
}
