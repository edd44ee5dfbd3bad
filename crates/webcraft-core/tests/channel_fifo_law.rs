//! 属性测试：MPSC 通道的 FIFO 与存活性法则。
//!
//! 对任意数量的生产者、任意各自的发送序列：每个生产者自己的发送顺序在接收端
//! 必须保持相对顺序；接收端存活期间发出的每一项都必须被收到；全部生产者释放
//! 且队列排空后必须收到且只收到一次 EOF。

use proptest::prelude::*;
use webcraft_core::channel::channel;
use webcraft_core::task::{Task, sync_wait};

proptest! {
    #[test]
    fn per_producer_order_is_preserved_and_nothing_is_lost(
        producer_batches in prop::collection::vec(
            prop::collection::vec(0i32..1000, 0..30),
            1..6,
        ),
    ) {
        let (tx, mut rx) = channel::<(usize, i32)>();
        let senders: Vec<_> = producer_batches.iter().enumerate().map(|(producer, _)| {
            let tx = tx.clone();
            (producer, tx)
        }).collect();
        drop(tx);

        let handles: Vec<_> = senders
            .into_iter()
            .zip(producer_batches.iter().cloned())
            .map(|((producer, tx), batch)| {
                std::thread::spawn(move || {
                    for value in batch {
                        tx.send((producer, value)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let task: Task<Vec<(usize, i32)>> = Task::spawn(async move {
            let mut out = Vec::new();
            while let Some(item) = rx.recv().await? {
                out.push(item);
            }
            Ok(out)
        });
        let received = sync_wait(task).unwrap();

        let total_sent: usize = producer_batches.iter().map(Vec::len).sum();
        prop_assert_eq!(received.len(), total_sent);

        for (producer, expected) in producer_batches.iter().enumerate() {
            let actual: Vec<i32> = received
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, v)| *v)
                .collect();
            prop_assert_eq!(&actual, expected);
        }
    }

    #[test]
    fn no_item_is_delivered_after_receiver_drop(values in prop::collection::vec(0i32..1000, 0..20)) {
        let (tx, rx) = channel::<i32>();
        drop(rx);
        for value in values {
            prop_assert!(tx.send(value).is_err());
        }
    }
}
