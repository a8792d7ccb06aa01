use crate::query::{Operator, OperatorKind};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("only select queries can be batched")]
    NotSelect,
    #[error("select range is inverted: {low} > {high}")]
    InvalidRange { low: i64, high: i64 },
    #[error("batch queue allocation failed")]
    Allocation,
}

/// 대기 중인 `select` 하나.
///
/// 결과 핸들은 연산자와 따로 복사해 둔다.
#[derive(Debug, Clone)]
pub struct BatchNode {
    query: Operator,
    column: Box<str>,
    range_low: i64,
    range_high: i64,
    share_query_handle: Box<str>,
}

impl BatchNode {
    pub fn new(query: Operator) -> Result<Self, QueueError> {
        let OperatorKind::Select {
            qualified_column_name,
            range_low,
            range_high,
            result_handle,
        } = &query.kind
        else {
            return Err(QueueError::NotSelect);
        };
        Ok(Self {
            column: qualified_column_name.clone(),
            range_low: *range_low,
            range_high: *range_high,
            share_query_handle: result_handle.clone(),
            query,
        })
    }

    pub fn query(&self) -> &Operator {
        &self.query
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn range_low(&self) -> i64 {
        self.range_low
    }

    pub fn range_high(&self) -> i64 {
        self.range_high
    }

    pub fn handle(&self) -> &str {
        &self.share_query_handle
    }

    /// low <= value < high
    pub fn contains(&self, value: i32) -> bool {
        let value = i64::from(value);
        self.range_low <= value && value < self.range_high
    }
}

/// `range_low` 순으로 정렬된 대기열. 같은 `range_low`끼리는 들어온 순서를 지킨다.
#[derive(Debug, Default)]
pub struct BatchQueue {
    nodes: Vec<BatchNode>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// `range_low`가 더 큰 첫 노드 바로 앞에 끼워 넣는다. 없으면 맨 뒤에 붙인다.
    pub fn enqueue(&mut self, node: BatchNode) -> Result<(), QueueError> {
        if node.range_low > node.range_high {
            return Err(QueueError::InvalidRange {
                low: node.range_low,
                high: node.range_high,
            });
        }
        self.nodes
            .try_reserve(1)
            .map_err(|_| QueueError::Allocation)?;
        let at = self
            .nodes
            .partition_point(|queued| queued.range_low <= node.range_low);
        self.nodes.insert(at, node);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn drain(&mut self) -> Vec<BatchNode> {
        std::mem::take(&mut self.nodes)
    }

    /// 큐를 바꾸지 않는 순회. 반복자는 `clone()`으로 다시 시작할 수 있다.
    pub fn peek_all(&self) -> std::slice::Iter<'_, BatchNode> {
        self.nodes.iter()
    }
}

/// 새 `select`를 받는 live 큐와, 병합 실행 중에만 쓰이는 refine 큐.
#[derive(Debug, Default)]
pub struct BatchQueues {
    live: Mutex<BatchQueue>,
    refine: Mutex<BatchQueue>,
}

impl BatchQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, node: BatchNode) -> Result<(), QueueError> {
        self.live.lock().enqueue(node)
    }

    pub fn pending(&self) -> usize {
        self.live.lock().len()
    }

    pub fn show_pending(&self) {
        let live = self.live.lock();
        for node in live.peek_all() {
            debug!(
                column = node.column(),
                low = node.range_low(),
                high = node.range_high(),
                handle = node.handle(),
                "pending select"
            );
        }
    }

    /// live 큐를 빈 큐로 바꿔 떼어낸 뒤 비운다.
    ///
    /// 교체는 live 잠금 안에서 일어나므로 동시에 들어온 노드는 떼어낸 큐나
    /// 새 큐 중 정확히 한 곳에만 들어간다. refine 잠금이 병합 실행을 한 번에
    /// 하나로 묶는다.
    pub fn swap_and_drain(&self) -> Vec<BatchNode> {
        let mut refine = self.refine.lock();
        {
            let mut live = self.live.lock();
            std::mem::swap(&mut *live, &mut *refine);
        }
        refine.drain()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::session::{ConnectionId, Session};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn select(low: i64, high: i64, handle: &str) -> BatchNode {
        let query = Operator {
            conn: ConnectionId(1),
            session: Arc::new(Session::new(ConnectionId(1))),
            kind: OperatorKind::Select {
                qualified_column_name: "db1.tbl1.col1".into(),
                range_low: low,
                range_high: high,
                result_handle: handle.into(),
            },
        };
        BatchNode::new(query).unwrap()
    }

    #[test]
    fn test_round_trip_keeps_fields() {
        let mut queue = BatchQueue::new();
        queue.enqueue(select(-5, 42, "s_handle")).unwrap();
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].range_low(), -5);
        assert_eq!(drained[0].range_high(), 42);
        assert_eq!(drained[0].handle(), "s_handle");
        assert_eq!(drained[0].column(), "db1.tbl1.col1");
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_ordered_by_range_low() {
        let mut queue = BatchQueue::new();
        for low in [10, 3, 7] {
            queue.enqueue(select(low, 100, "h")).unwrap();
        }
        let lows: Vec<_> = queue.drain().iter().map(BatchNode::range_low).collect();
        assert_eq!(lows, vec![3, 7, 10]);
    }

    #[test]
    fn test_equal_keys_keep_arrival_order() {
        let mut queue = BatchQueue::new();
        queue.enqueue(select(5, 10, "a")).unwrap();
        queue.enqueue(select(1, 10, "b")).unwrap();
        queue.enqueue(select(5, 10, "c")).unwrap();
        let handles: Vec<_> = queue.peek_all().map(|n| n.handle().to_string()).collect();
        assert_eq!(handles, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_peek_is_read_only() {
        let mut queue = BatchQueue::new();
        assert!(queue.is_empty());
        for _ in 0..3 {
            assert_eq!(queue.peek_all().count(), 0);
        }
        assert!(queue.is_empty());

        queue.enqueue(select(1, 2, "x")).unwrap();
        let iter = queue.peek_all();
        assert_eq!(iter.clone().count(), 1);
        assert_eq!(iter.count(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_rejects_inverted_range() {
        let mut node = select(1, 2, "x");
        node.range_low = 9;
        let mut queue = BatchQueue::new();
        assert_eq!(
            queue.enqueue(node),
            Err(QueueError::InvalidRange { low: 9, high: 2 })
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rejects_non_select() {
        let query = Operator {
            conn: ConnectionId(1),
            session: Arc::new(Session::new(ConnectionId(1))),
            kind: OperatorKind::Shutdown,
        };
        assert!(matches!(BatchNode::new(query), Err(QueueError::NotSelect)));
    }

    #[test]
    fn test_contains_is_half_open() {
        let node = select(3, 5, "x");
        assert!(!node.contains(2));
        assert!(node.contains(3));
        assert!(node.contains(4));
        assert!(!node.contains(5));
    }

    #[test]
    fn test_swap_and_drain() {
        let queues = BatchQueues::new();
        queues.enqueue(select(2, 3, "a")).unwrap();
        queues.enqueue(select(1, 3, "b")).unwrap();
        let drained = queues.swap_and_drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(queues.pending(), 0);
        assert!(queues.swap_and_drain().is_empty());
    }

    #[test]
    fn test_concurrent_enqueue_and_swap() {
        let queues = Arc::new(BatchQueues::new());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let queues = queues.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let handle = format!("w{w}_{i}");
                        queues.enqueue(select(i, i + 1, &handle)).unwrap();
                    }
                })
            })
            .collect();

        let mut seen = Vec::new();
        while writers.iter().any(|w| !w.is_finished()) {
            seen.extend(queues.swap_and_drain());
        }
        for writer in writers {
            writer.join().unwrap();
        }
        seen.extend(queues.swap_and_drain());

        let unique: HashSet<_> = seen.iter().map(|n| n.handle().to_string()).collect();
        assert_eq!(seen.len(), 1000);
        assert_eq!(unique.len(), 1000);
    }
}
