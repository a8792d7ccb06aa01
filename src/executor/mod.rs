pub mod batch;
pub mod scan;

use crate::query::{Operator, OperatorKind, compile};
use crate::session::Session;
use crate::storage::csv::{CsvStore, StorageError};
use crate::storage::{Catalog, CatalogError};
use batch::{BatchNode, BatchQueues};
use scan::{ScanReport, shared_scan};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Queued,
    ParseError,
    NotFound,
    CatalogError,
    QueueError,
    IoError,
    Shutdown,
}

/// 클라이언트에게 돌려보낼 한 줄.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub text: String,
}

impl Response {
    fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    fn success(action: &str) -> Self {
        Self::new(Status::Ok, format!("{action} successfully.\n"))
    }

    fn failed(status: Status, action: &str) -> Self {
        Self::new(status, format!("{action} failed.\n"))
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, Status::Ok | Status::Queued | Status::Shutdown)
    }
}

fn catalog_status(err: &CatalogError) -> Status {
    if err.is_not_found() {
        Status::NotFound
    } else {
        Status::CatalogError
    }
}

pub struct Executor {
    catalog: Catalog,
    batches: BatchQueues,
    store: CsvStore,
    persist_on_shutdown: bool,
}

impl Executor {
    pub fn new(store: CsvStore) -> Self {
        Self {
            catalog: Catalog::new(),
            batches: BatchQueues::new(),
            store,
            persist_on_shutdown: true,
        }
    }

    pub fn with_persist_on_shutdown(mut self, persist: bool) -> Self {
        self.persist_on_shutdown = persist;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn batches(&self) -> &BatchQueues {
        &self.batches
    }

    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    /// 한 줄을 컴파일하고 실행한다. 주석이면 `None`.
    pub async fn run(&self, src: &str, session: &Arc<Session>) -> Option<Response> {
        let op = compile(src, session.id(), session.clone())?;
        Some(self.dispatch(op).await)
    }

    pub async fn dispatch(&self, op: Operator) -> Response {
        let Operator {
            conn,
            session,
            kind,
        } = op;
        match kind {
            OperatorKind::CreateDatabase { name } => {
                self.catalog_op("create database", self.catalog.create_database(&name))
            }
            OperatorKind::CreateTable {
                db_name,
                qualified_name,
                column_count,
            } => self.catalog_op(
                "create table",
                self.catalog
                    .create_table(&db_name, &qualified_name, column_count),
            ),
            OperatorKind::CreateColumn {
                qualified_table_name,
                qualified_column_name,
            } => self.catalog_op(
                "create column",
                self.catalog
                    .create_column(&qualified_table_name, &qualified_column_name),
            ),
            OperatorKind::Insert {
                qualified_table_name,
                values,
            } => self.catalog_op(
                "relational insert",
                self.catalog.insert_row(&qualified_table_name, &values),
            ),
            OperatorKind::Load { path } => self.load(&path).await,
            kind @ OperatorKind::Select { .. } => self.enqueue(Operator {
                conn,
                session,
                kind,
            }),
            OperatorKind::BatchExecute => {
                let report = self.run_batch();
                if report.is_complete() {
                    Response::success("execute batch queries")
                } else {
                    Response::failed(Status::NotFound, "execute batch queries")
                }
            }
            OperatorKind::Print { handle } => match session.resolve(&handle) {
                Some(positions) => {
                    let mut text = positions
                        .iter()
                        .map(usize::to_string)
                        .collect::<Vec<_>>()
                        .join(",");
                    text.push('\n');
                    Response::new(Status::Ok, text)
                }
                None => {
                    warn!(%conn, %handle, "unknown result handle");
                    Response::failed(Status::NotFound, "print")
                }
            },
            OperatorKind::Shutdown => {
                info!(%conn, "shutdown requested");
                self.shutdown().await
            }
            OperatorKind::Error { message } => {
                Response::new(Status::ParseError, format!("{message}\n"))
            }
        }
    }

    fn catalog_op(&self, action: &str, result: Result<(), CatalogError>) -> Response {
        match result {
            Ok(()) => Response::success(action),
            Err(err) => {
                warn!(%err, "{action} failed");
                Response::failed(catalog_status(&err), action)
            }
        }
    }

    async fn load(&self, path: &str) -> Response {
        const ACTION: &str = "load data into database";
        match self.store.load_csv(&self.catalog, Path::new(path)).await {
            Ok(rows) => {
                info!(path, rows, "load finished");
                Response::success(ACTION)
            }
            Err(StorageError::Catalog(err)) => {
                warn!(path, %err, "load rejected");
                Response::failed(catalog_status(&err), ACTION)
            }
            Err(err) => {
                warn!(path, %err, "load failed");
                Response::failed(Status::IoError, ACTION)
            }
        }
    }

    fn enqueue(&self, op: Operator) -> Response {
        const ACTION: &str = "add select query into batch queue";
        let conn = op.conn;
        let queued = BatchNode::new(op).and_then(|node| self.batches.enqueue(node));
        match queued {
            Ok(()) => Response::new(Status::Queued, format!("{ACTION} successfully.\n")),
            Err(err) => {
                warn!(%conn, %err, "select not queued");
                Response::failed(Status::QueueError, ACTION)
            }
        }
    }

    /// 쌓인 `select`를 떼어내 공유 스캔으로 실행한다.
    pub fn run_batch(&self) -> ScanReport {
        self.batches.show_pending();
        let nodes = self.batches.swap_and_drain();
        if nodes.is_empty() {
            return ScanReport::default();
        }
        let queued = nodes.len();
        let report = shared_scan(&self.catalog, nodes);
        info!(queued, scans = report.scans, answered = report.answered, "batch executed");
        report
    }

    /// 남은 배치를 실행하고, 영속화한 뒤 카탈로그를 비운다. 영속화 실패는 기록만 한다.
    pub async fn shutdown(&self) -> Response {
        self.run_batch();
        if self.persist_on_shutdown
            && let Err(err) = self.store.persist_csv(&self.catalog).await
        {
            error!(%err, "persist all the data failed");
        }
        self.catalog.clear();
        Response::new(
            Status::Shutdown,
            "persist all the data and shutdown the server.\n",
        )
    }
}
