//! 进程内回环参考实现——没有真正的文件描述符，足够驱动 C6/C7/C8 的测试。
//!
//! # 设计背景（Why）
//! - `spec.md` §1 把具体操作系统后端排除在范围之外，但 C6（流契约）/C7（流适配器）/
//!   C8（通道）仍然需要点"真实"的生产者/消费者去练习，而不是只测试纯内存 `Vec` 源。
//!   这里用 [`webcraft_core::channel`] 搭一个最小的内存总线，刚好满足这个需要，
//!   对应教师仓库里 `spark-core` 测试目录下"用内存 fixture 代替真实 socket"的一贯做法。
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use webcraft_core::channel::{self, Receiver, Sender};
use webcraft_core::error::{WebcraftError, WebcraftResult};
use webcraft_core::stream::{Closeable, Readable, Writable};

use crate::ConnectionInfo;

/// 一个进程内"文件"：字节块队列 + 关闭标志；读端耗尽且写端已关闭时报告 EOF。
pub struct LoopbackFile {
    sender: Option<Sender<Vec<u8>>>,
    receiver: Receiver<Vec<u8>>,
}

impl LoopbackFile {
    /// 构造一对共享同一块内容的读写端点，模拟"打开同一文件的读流和写流"。
    pub fn new() -> (LoopbackFileWriter, LoopbackFile) {
        let (tx, rx) = channel::channel::<Vec<u8>>();
        (
            LoopbackFileWriter { sender: tx.clone() },
            LoopbackFile {
                sender: Some(tx),
                receiver: rx,
            },
        )
    }

    /// 用既有内容预填充一个只读文件（`append` 语义在此不适用）。
    pub fn with_content(chunks: Vec<Vec<u8>>) -> LoopbackFile {
        let (tx, rx) = channel::channel::<Vec<u8>>();
        for chunk in chunks {
            let _ = tx.send(chunk);
        }
        drop(tx);
        LoopbackFile {
            sender: None,
            receiver: rx,
        }
    }
}

#[async_trait::async_trait]
impl Readable<Vec<u8>> for LoopbackFile {
    async fn recv(&mut self) -> WebcraftResult<Option<Vec<u8>>> {
        self.receiver.recv().await
    }
}

#[async_trait::async_trait]
impl Closeable for LoopbackFile {
    async fn close(&mut self) -> WebcraftResult<()> {
        self.sender = None;
        Ok(())
    }
}

/// `LoopbackFile` 的写入端；`append` 语义上对应"不截断既有内容直接追加"，因为
/// 回环实现从不持久化，`append` 与否在这里等价。
pub struct LoopbackFileWriter {
    sender: Sender<Vec<u8>>,
}

#[async_trait::async_trait]
impl Writable<Vec<u8>> for LoopbackFileWriter {
    async fn send(&mut self, item: Vec<u8>) -> WebcraftResult<bool> {
        match self.sender.send(item) {
            Ok(()) => Ok(true),
            Err(err) if err.category() == webcraft_core::ErrorCategory::State => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[async_trait::async_trait]
impl Closeable for LoopbackFileWriter {
    async fn close(&mut self) -> WebcraftResult<()> {
        Ok(())
    }
}

/// 一对背靠背连接的进程内套接字端点，模拟已建立的 TCP 连接。
pub struct LoopbackTcpHalf {
    outbound: Sender<Vec<u8>>,
    inbound: Receiver<Vec<u8>>,
}

impl LoopbackTcpHalf {
    /// 构造一对互联的端点：一端的写入就是另一端的读取。
    pub fn pair() -> (LoopbackTcpHalf, LoopbackTcpHalf) {
        let (a_tx, a_rx) = channel::channel::<Vec<u8>>();
        let (b_tx, b_rx) = channel::channel::<Vec<u8>>();
        (
            LoopbackTcpHalf {
                outbound: a_tx,
                inbound: b_rx,
            },
            LoopbackTcpHalf {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }
}

#[async_trait::async_trait]
impl Readable<Vec<u8>> for LoopbackTcpHalf {
    async fn recv(&mut self) -> WebcraftResult<Option<Vec<u8>>> {
        self.inbound.recv().await
    }
}

#[async_trait::async_trait]
impl Writable<Vec<u8>> for LoopbackTcpHalf {
    async fn send(&mut self, item: Vec<u8>) -> WebcraftResult<bool> {
        match self.outbound.send(item) {
            Ok(()) => Ok(true),
            Err(err) if err.category() == webcraft_core::ErrorCategory::State => Ok(false),
            Err(err) => Err(err),
        }
    }
}

#[async_trait::async_trait]
impl Closeable for LoopbackTcpHalf {
    async fn close(&mut self) -> WebcraftResult<()> {
        Ok(())
    }
}

/// 进程内 UDP 总线：`bind` 注册一个地址，`send_to` 按地址投递到目标的接收队列。
/// 没有注册表项时 `send_to` 返回 [`webcraft_core::ErrorCategory::Address`]。
#[derive(Clone, Default)]
pub struct LoopbackUdpBus {
    registry: Arc<Mutex<HashMap<(String, u16), Sender<(ConnectionInfo, Vec<u8>)>>>>,
}

impl LoopbackUdpBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在给定地址注册一个新端点，返回其接收句柄。
    pub fn bind(&self, info: ConnectionInfo) -> LoopbackUdpSocket {
        let (tx, rx) = channel::channel::<(ConnectionInfo, Vec<u8>)>();
        self.registry
            .lock()
            .insert((info.host.clone(), info.port), tx);
        LoopbackUdpSocket {
            bus: self.clone(),
            local: info,
            receiver: rx,
        }
    }
}

pub struct LoopbackUdpSocket {
    bus: LoopbackUdpBus,
    local: ConnectionInfo,
    receiver: Receiver<(ConnectionInfo, Vec<u8>)>,
}

impl LoopbackUdpSocket {
    pub fn local(&self) -> &ConnectionInfo {
        &self.local
    }

    pub async fn recv_from(&mut self) -> WebcraftResult<Option<(Vec<u8>, ConnectionInfo)>> {
        Ok(self
            .receiver
            .recv()
            .await?
            .map(|(from, payload)| (payload, from)))
    }

    pub fn send_to(&self, payload: Vec<u8>, target: ConnectionInfo) -> WebcraftResult<()> {
        let sender = self
            .bus
            .registry
            .lock()
            .get(&(target.host.clone(), target.port))
            .cloned();
        match sender {
            Some(sender) => sender
                .send((self.local.clone(), payload))
                .map_err(|_| WebcraftError::address(format!("{}:{} is unreachable", target.host, target.port))),
            None => Err(WebcraftError::address(format!(
                "no loopback socket bound at {}:{}",
                target.host, target.port
            ))),
        }
    }
}
