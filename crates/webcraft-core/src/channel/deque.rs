#![allow(unsafe_code)]
//! 有界无锁双端队列——§4.8 点名的"supporting component"。
//!
//! # 设计背景（Why）
//! - 原始规范把它描述成"单一所有者操作前端（`push_front`/`pop_front`），多消费者
//!   操作后端（`push_back`/`pop_back`）"，这正是 Chase-Lev 工作窃取队列的经典形状：
//!   所有者线程在热路径上免锁地推入/弹出自己的工作项，窃取者线程通过 CAS 争用
//!   队列另一端，互不阻塞所有者。
//! - 本 crate 的调度模型是单线程协作式运行循环（§5），没有真正的任务窃取执行器
//!   消费这个队列；它作为独立、可被未来扩展复用的构件单独实现与测试，而不是拿
//!   "用不上"当理由不实现规范点名的部分。
//!
//! # 契约说明（What）
//! - 容量固定为 `2^ORDER` 槽；`Full = head - tail >= capacity`。
//! - `push_front`/`pop_front` 只能由持有 `&mut` 的所有者调用（编译期独占）；
//! - `push_back`/`pop_back` 通过 `&self` 的 CAS 循环实现，可以被任意数量的线程并发调用。
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering, fence};

/// 有界、单所有者前端 + 多消费者后端的无锁双端队列。
///
/// `ORDER` 选择槽位数 `2^ORDER`（例如 `ORDER = 8` 给出 256 个槽位）。
pub struct BoundedDeque<T, const ORDER: u32> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// 所有者独占的前端游标；只由持有 `&mut self` 的调用递增/递减。
    head: CachePadded<AtomicUsize>,
    /// 多消费者共享的后端游标；窃取者通过 CAS 争用它前进。
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send, const ORDER: u32> Send for BoundedDeque<T, ORDER> {}
unsafe impl<T: Send, const ORDER: u32> Sync for BoundedDeque<T, ORDER> {}

impl<T, const ORDER: u32> BoundedDeque<T, ORDER> {
    pub fn new() -> Self {
        let capacity = 1usize << ORDER;
        let mut buffer = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            buffer.push(UnsafeCell::new(MaybeUninit::uninit()));
        }
        Self {
            buffer: buffer.into_boxed_slice(),
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    fn slot(&self, index: usize) -> *mut MaybeUninit<T> {
        self.buffer[index & self.mask].get()
    }

    /// 所有者端推入一个值；满队列时原样返回给调用方。
    pub fn push_front(&mut self, value: T) -> Result<(), T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= self.capacity() {
            return Err(value);
        }
        unsafe {
            (*self.slot(head)).write(value);
        }
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// 所有者端弹出最近推入的值（LIFO，对应"front"端）。
    pub fn pop_front(&mut self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let new_head = head.wrapping_sub(1);
        self.head.store(new_head, Ordering::Release);
        fence(Ordering::SeqCst);
        let tail = self.tail.load(Ordering::Acquire);
        if new_head == tail {
            // Exactly one element left: race against concurrent stealers for it.
            let won = self
                .tail
                .compare_exchange(
                    tail,
                    tail.wrapping_add(1),
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok();
            if !won {
                self.head.store(head, Ordering::Release);
                return None;
            }
            self.head.store(head, Ordering::Release);
        } else if new_head.wrapping_sub(tail) > self.capacity() {
            // underflow: nothing left, restore head.
            self.head.store(head, Ordering::Release);
            return None;
        }
        Some(unsafe { (*self.slot(new_head)).assume_init_read() })
    }

    /// 窃取者端通过 CAS 弹出队列另一端的值；多个窃取者可以并发调用。
    pub fn pop_back(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Acquire);
        fence(Ordering::SeqCst);
        let head = self.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let value = unsafe { (*self.slot(tail)).assume_init_read() };
        match self.tail.compare_exchange(
            tail,
            tail.wrapping_add(1),
            Ordering::SeqCst,
            Ordering::Relaxed,
        ) {
            Ok(_) => Some(value),
            Err(_) => {
                // Lost the race; the value we read may since have been overwritten by the
                // owner, so we must not return it.
                std::mem::forget(value);
                None
            }
        }
    }

    /// 窃取者端把一个值归还到后端；多个线程可并发调用。
    pub fn push_back(&self, value: T) -> Result<(), T> {
        let mut tail = self.tail.load(Ordering::Relaxed);
        let mut value = value;
        loop {
            let head = self.head.load(Ordering::Acquire);
            if head.wrapping_sub(tail) >= self.capacity() {
                return Err(value);
            }
            let new_tail = tail.wrapping_sub(1);
            // Write before publishing the new tail, same order `push_front` uses at its
            // head store: a concurrent `pop_back` must never observe a published slot
            // before the value is actually written into it.
            unsafe {
                (*self.slot(new_tail)).write(value);
            }
            match self.tail.compare_exchange_weak(
                tail,
                new_tail,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => {
                    // Lost the race before publishing; nobody else could have observed this
                    // slot yet, so reclaim the value we just wrote and retry at the new tail.
                    value = unsafe { (*self.slot(new_tail)).assume_init_read() };
                    tail = actual;
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head == tail
    }

    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }
}

impl<T, const ORDER: u32> Default for BoundedDeque<T, ORDER> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const ORDER: u32> Drop for BoundedDeque<T, ORDER> {
    fn drop(&mut self) {
        while self.pop_front().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn owner_push_pop_front_is_lifo() {
        let mut deque: BoundedDeque<i32, 4> = BoundedDeque::new();
        deque.push_front(1).unwrap();
        deque.push_front(2).unwrap();
        deque.push_front(3).unwrap();
        assert_eq!(deque.pop_front(), Some(3));
        assert_eq!(deque.pop_front(), Some(2));
        assert_eq!(deque.pop_front(), Some(1));
        assert_eq!(deque.pop_front(), None);
    }

    #[test]
    fn push_front_fails_when_full() {
        let mut deque: BoundedDeque<i32, 2> = BoundedDeque::new();
        for i in 0..4 {
            deque.push_front(i).unwrap();
        }
        assert_eq!(deque.push_front(99), Err(99));
    }

    #[test]
    fn stealers_drain_concurrently_without_duplication() {
        let mut deque: BoundedDeque<i32, 10> = BoundedDeque::new();
        let total = 500;
        for i in 0..total {
            deque.push_front(i).unwrap();
        }
        let deque = Arc::new(deque);
        let mut handles = Vec::new();
        for _ in 0..4 {
            let deque = Arc::clone(&deque);
            handles.push(thread::spawn(move || {
                let mut collected = Vec::new();
                while let Some(v) = deque.pop_back() {
                    collected.push(v);
                }
                collected
            }));
        }
        let mut all = Vec::new();
        for h in handles {
            all.extend(h.join().unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..total).collect::<Vec<_>>());
    }
}
