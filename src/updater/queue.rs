//! 任务优先级队列
//!
//! 数值越小优先级越高；同优先级按入队顺序（FIFO）出队。
//! 多个工作协程与周期注入循环共用同一实例。

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use super::task::UpdateTask;

/// 队列内部条目
///
/// 入队序号用于同优先级的 FIFO 定序。
#[derive(Debug)]
struct QueuedTask {
    priority: u8,
    seq: u64,
    task: UpdateTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    // BinaryHeap 取最大值：优先级数值小者为大，其次序号小者为大
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// 线程安全的任务优先级队列
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: Mutex<BinaryHeap<QueuedTask>>,
    next_seq: AtomicU64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队
    pub fn push(&self, task: UpdateTask) {
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::SeqCst);
        let entry = QueuedTask {
            priority: task.priority,
            seq,
            task,
        };
        self.heap.lock().push(entry);
    }

    /// 非阻塞出队最高优先级任务
    pub fn try_pop(&self) -> Option<UpdateTask> {
        self.heap.lock().pop().map(|entry| entry.task)
    }

    /// 当前队列长度
    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::task::{TaskKind, TaskParams};

    fn task(kind: TaskKind, priority: u8) -> UpdateTask {
        UpdateTask::new(kind, TaskParams::new(), priority, 3)
    }

    #[test]
    fn test_priority_order() {
        let queue = TaskQueue::new();
        queue.push(task(TaskKind::Analytics, 3));
        queue.push(task(TaskKind::Trending, 1));
        queue.push(task(TaskKind::ProductList, 2));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop().unwrap().kind, TaskKind::Trending);
        assert_eq!(queue.try_pop().unwrap().kind, TaskKind::ProductList);
        assert_eq!(queue.try_pop().unwrap().kind, TaskKind::Analytics);
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn test_fifo_within_same_priority() {
        let queue = TaskQueue::new();
        let first = task(TaskKind::Trending, 2);
        let second = task(TaskKind::Trending, 2);
        let third = task(TaskKind::Trending, 2);

        let expected = vec![first.id.clone(), second.id.clone(), third.id.clone()];
        queue.push(first);
        queue.push(second);
        queue.push(third);

        let popped: Vec<String> = std::iter::from_fn(|| queue.try_pop())
            .map(|t| t.id)
            .collect();
        assert_eq!(popped, expected);
    }

    #[test]
    fn test_high_priority_jumps_ahead() {
        let queue = TaskQueue::new();
        let low = task(TaskKind::Analytics, 2);
        let high = task(TaskKind::Trending, 1);

        // 低优先级先入队，高优先级仍然先出队
        queue.push(low);
        queue.push(high);

        assert_eq!(queue.try_pop().unwrap().priority, 1);
        assert_eq!(queue.try_pop().unwrap().priority, 2);
    }

    #[test]
    fn test_empty_queue() {
        let queue = TaskQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(queue.try_pop().is_none());
    }
}
