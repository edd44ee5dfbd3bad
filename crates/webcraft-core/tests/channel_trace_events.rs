//! 断言通道的发送/接收确实落下可观测的 trace 事件，而不是仅仅停留在文档里。

use tracing_test::{logs_contain, traced_test};
use webcraft_core::channel::channel;
use webcraft_core::task::{Task, sync_wait};

#[traced_test]
#[test]
fn send_and_recv_emit_trace_events() {
    let (tx, mut rx) = channel::<i32>();
    tx.send(1).unwrap();
    drop(tx);

    let task: Task<Option<i32>> = Task::spawn(async move { rx.recv().await });
    assert_eq!(sync_wait(task).unwrap(), Some(1));

    assert!(logs_contain("channel send"));
    assert!(logs_contain("channel recv"));
}
