use super::batch::BatchNode;
use crate::storage::Catalog;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub answered: usize,
    pub scans: usize,
    pub missing: Vec<Box<str>>,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// 같은 컬럼을 향한 `select`들을 모아 컬럼마다 한 번만 훑는다.
///
/// `nodes`는 큐에서 나온 순서(`range_low` 오름차순)를 유지해야 한다. 결과는
/// 각 노드의 세션에 핸들 이름으로 묶인다.
pub fn shared_scan(catalog: &Catalog, nodes: Vec<BatchNode>) -> ScanReport {
    let mut order: HashMap<Box<str>, usize> = HashMap::new();
    let mut groups: Vec<Vec<BatchNode>> = Vec::new();
    for node in nodes {
        let idx = *order.entry(node.column().into()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push(node);
    }

    let mut report = ScanReport::default();
    for group in groups {
        let column = group[0].column();
        match catalog.with_column(column, |data| scan_column(data, &group)) {
            Ok(results) => {
                report.scans += 1;
                for (node, positions) in group.iter().zip(results) {
                    debug!(
                        conn = %node.query().conn,
                        handle = node.handle(),
                        hits = positions.len(),
                        "select answered"
                    );
                    node.query().session.bind(node.handle(), positions);
                    report.answered += 1;
                }
            }
            Err(err) => {
                warn!(column, %err, queries = group.len(), "shared scan skipped");
                report.missing.push(column.into());
            }
        }
    }
    report
}

/// 값 하나마다 `range_low`가 그 값을 넘는 첫 질의에서 멈춘다.
fn scan_column(data: &[i32], group: &[BatchNode]) -> Vec<Vec<usize>> {
    let mut results = vec![Vec::new(); group.len()];
    for (pos, &value) in data.iter().enumerate() {
        for (node, hits) in group.iter().zip(results.iter_mut()) {
            if node.range_low() > i64::from(value) {
                break;
            }
            if node.contains(value) {
                hits.push(pos);
            }
        }
    }
    results
}
