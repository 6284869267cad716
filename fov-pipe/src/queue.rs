use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Queue payload. `Eof` is the in-band end-of-stream marker: a producer
/// enqueues it exactly once after its last item, and a consumer that dequeues
/// it must forward it downstream before terminating. Shutdown travels with
/// the data, so an empty queue never means "done".
pub enum Cmd<T> {
    Data(T),
    Eof,
}

impl<T> Cmd<T> {
    pub fn is_eof(&self) -> bool {
        matches!(self, Cmd::Eof)
    }
}

/// Blocking bounded FIFO connecting two pipeline stages.
///
/// `push` blocks while the queue holds `capacity` items, `pop` blocks while
/// it is empty. Items move in on push and out on pop, so a payload is owned
/// by exactly one side at any time. All pipeline queues are used
/// single-producer single-consumer.
pub struct Queue<T> {
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> Queue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, item: T) {
        let mut items = self.items.lock().unwrap();
        while items.len() == self.capacity {
            items = self.not_full.wait(items).unwrap();
        }
        items.push_back(item);
        self.not_empty.notify_one();
    }

    pub fn pop(&self) -> T {
        let mut items = self.items.lock().unwrap();
        while items.is_empty() {
            items = self.not_empty.wait(items).unwrap();
        }
        let item = items.pop_front().unwrap();
        self.not_full.notify_one();
        item
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn fifo_order_single_producer() {
        for capacity in [1, 2, 32] {
            let q = Arc::new(Queue::new(capacity));
            let producer = {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..1000u32 {
                        q.push(Cmd::Data(i));
                    }
                    q.push(Cmd::Eof);
                })
            };

            let mut received = Vec::new();
            loop {
                match q.pop() {
                    Cmd::Data(i) => received.push(i),
                    Cmd::Eof => break,
                }
            }
            producer.join().unwrap();

            assert_eq!(received, (0..1000).collect::<Vec<_>>());
            assert!(q.is_empty());
        }
    }

    #[test]
    fn push_blocks_at_capacity() {
        let q = Arc::new(Queue::new(1));
        q.push(1u32);

        let producer = {
            let q = q.clone();
            thread::spawn(move || q.push(2))
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!producer.is_finished());
        assert_eq!(q.len(), 1);

        assert_eq!(q.pop(), 1);
        producer.join().unwrap();
        assert_eq!(q.pop(), 2);
    }

    #[test]
    fn pop_blocks_until_push() {
        let q = Arc::new(Queue::new(4));
        let consumer = {
            let q = q.clone();
            thread::spawn(move || q.pop())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());

        q.push(7u32);
        assert_eq!(consumer.join().unwrap(), 7);
    }

    #[test]
    fn eof_passes_through_like_data() {
        let q: Queue<Cmd<u32>> = Queue::new(2);
        q.push(Cmd::Data(1));
        q.push(Cmd::Eof);
        assert!(matches!(q.pop(), Cmd::Data(1)));
        assert!(q.pop().is_eof());
    }
}
