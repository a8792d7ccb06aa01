pub mod csv;
pub mod manifest;

use manifest::{DatabaseEntry, Manifest, TableEntry};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("database not found: {0}")]
    DatabaseNotFound(String),
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("database already exists: {0}")]
    DatabaseExists(String),
    #[error("table already exists: {0}")]
    TableExists(String),
    #[error("column already exists: {0}")]
    ColumnExists(String),
    #[error("table {table} already holds {capacity} columns")]
    TableFull { table: String, capacity: usize },
    #[error("table {table} expects {expected} values, got {found}")]
    RowWidth {
        table: String,
        expected: usize,
        found: usize,
    },
    #[error("column listed more than once: {0}")]
    DuplicateColumn(String),
    #[error("invalid qualified name: {0}")]
    InvalidName(String),
}

impl CatalogError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::DatabaseNotFound(_)
                | CatalogError::TableNotFound(_)
                | CatalogError::ColumnNotFound(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub name: Box<str>,
    pub tables: Vec<Box<str>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: Box<str>,
    pub capacity: usize,
    pub columns: Vec<Box<str>>,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: Box<str>,
    pub rows: usize,
}

/// 영속화용 테이블 사본. `data[i]`는 `columns[i]`의 값들이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub name: Box<str>,
    pub columns: Vec<Box<str>>,
    pub data: Vec<Vec<i32>>,
}

#[derive(Debug)]
struct Column {
    name: Box<str>,
    data: Vec<i32>,
}

#[derive(Debug)]
struct Table {
    name: Box<str>,
    capacity: usize,
    columns: Vec<Column>,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| &*c.name == name)
    }

    fn rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }
}

#[derive(Debug)]
struct Database {
    tables: Vec<Table>,
}

impl Database {
    fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| &*t.name == name)
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| &*t.name == name)
    }
}

/// `db.tbl` -> `db`, `db.tbl.col` -> `db.tbl`
fn parent_of(qualified: &str) -> CatalogResult<&str> {
    qualified
        .rsplit_once('.')
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
        .ok_or_else(|| CatalogError::InvalidName(qualified.to_string()))
}

/// 이미 있으면 성공으로 친다.
fn ignore_exists(result: CatalogResult<()>) -> CatalogResult<()> {
    match result {
        Err(
            CatalogError::DatabaseExists(_)
            | CatalogError::TableExists(_)
            | CatalogError::ColumnExists(_),
        ) => Ok(()),
        other => other,
    }
}

/// 데이터베이스, 테이블, 컬럼 목록. 모든 변경은 하나의 쓰기 잠금 아래에서 일어난다.
#[derive(Debug, Default)]
pub struct Catalog {
    databases: RwLock<HashMap<Box<str>, Database>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_database(&self, name: &str) -> CatalogResult<()> {
        let mut databases = self.databases.write();
        if databases.contains_key(name) {
            return Err(CatalogError::DatabaseExists(name.to_string()));
        }
        databases.insert(name.into(), Database { tables: Vec::new() });
        Ok(())
    }

    pub fn create_table(&self, db_name: &str, qualified_name: &str, capacity: usize) -> CatalogResult<()> {
        if parent_of(qualified_name)? != db_name {
            return Err(CatalogError::InvalidName(qualified_name.to_string()));
        }
        let mut databases = self.databases.write();
        let db = databases
            .get_mut(db_name)
            .ok_or_else(|| CatalogError::DatabaseNotFound(db_name.to_string()))?;
        if db.table(qualified_name).is_some() {
            return Err(CatalogError::TableExists(qualified_name.to_string()));
        }
        db.tables.push(Table {
            name: qualified_name.into(),
            capacity,
            columns: Vec::with_capacity(capacity),
        });
        Ok(())
    }

    pub fn create_column(&self, table_name: &str, qualified_name: &str) -> CatalogResult<()> {
        if parent_of(qualified_name)? != table_name {
            return Err(CatalogError::InvalidName(qualified_name.to_string()));
        }
        let db_name = parent_of(table_name)?;
        let mut databases = self.databases.write();
        let table = databases
            .get_mut(db_name)
            .and_then(|db| db.table_mut(table_name))
            .ok_or_else(|| CatalogError::TableNotFound(table_name.to_string()))?;
        if table.column(qualified_name).is_some() {
            return Err(CatalogError::ColumnExists(qualified_name.to_string()));
        }
        if table.columns.len() >= table.capacity {
            return Err(CatalogError::TableFull {
                table: table_name.to_string(),
                capacity: table.capacity,
            });
        }
        // 기존 행 수에 맞춰 0으로 채운다
        let data = vec![0; table.rows()];
        table.columns.push(Column {
            name: qualified_name.into(),
            data,
        });
        Ok(())
    }

    pub fn lookup_database(&self, name: &str) -> CatalogResult<DatabaseInfo> {
        let databases = self.databases.read();
        let db = databases
            .get(name)
            .ok_or_else(|| CatalogError::DatabaseNotFound(name.to_string()))?;
        Ok(DatabaseInfo {
            name: name.into(),
            tables: db.tables.iter().map(|t| t.name.clone()).collect(),
        })
    }

    pub fn lookup_table(&self, name: &str) -> CatalogResult<TableInfo> {
        let databases = self.databases.read();
        let table = Self::find_table(&databases, name)?;
        Ok(TableInfo {
            name: table.name.clone(),
            capacity: table.capacity,
            columns: table.columns.iter().map(|c| c.name.clone()).collect(),
            rows: table.rows(),
        })
    }

    pub fn lookup_column(&self, name: &str) -> CatalogResult<ColumnInfo> {
        self.with_column(name, |data| ColumnInfo {
            name: name.into(),
            rows: data.len(),
        })
    }

    /// 읽기 잠금을 쥔 채로 컬럼 값을 `f`에 빌려준다.
    pub fn with_column<R>(&self, name: &str, f: impl FnOnce(&[i32]) -> R) -> CatalogResult<R> {
        let databases = self.databases.read();
        let table = Self::find_table(&databases, parent_of(name)?)
            .map_err(|_| CatalogError::ColumnNotFound(name.to_string()))?;
        let idx = table
            .column(name)
            .ok_or_else(|| CatalogError::ColumnNotFound(name.to_string()))?;
        Ok(f(&table.columns[idx].data))
    }

    /// 행 하나를 추가한다. 테이블의 모든 컬럼이 만들어져 있어야 한다.
    pub fn insert_row(&self, table_name: &str, values: &[i32]) -> CatalogResult<()> {
        let mut databases = self.databases.write();
        let table = Self::find_table_mut(&mut databases, table_name)?;
        if table.columns.len() != table.capacity || values.len() != table.capacity {
            return Err(CatalogError::RowWidth {
                table: table_name.to_string(),
                expected: table.capacity,
                found: values.len(),
            });
        }
        for (column, &value) in table.columns.iter_mut().zip(values) {
            column.data.push(value);
        }
        Ok(())
    }

    /// `header`의 컬럼들에 `rows`를 덧붙인다. 모두 같은 테이블이어야 하고
    /// 그 테이블의 컬럼을 한 번씩 빠짐없이 나열해야 한다.
    pub fn append_rows(&self, header: &[String], rows: &[Vec<i32>]) -> CatalogResult<usize> {
        let first = header
            .first()
            .ok_or_else(|| CatalogError::InvalidName(String::new()))?;
        let table_name = parent_of(first)?;
        if let Some(stray) = header.iter().find(|name| parent_of(name).ok() != Some(table_name)) {
            return Err(CatalogError::InvalidName(stray.clone()));
        }
        let mut databases = self.databases.write();
        let table = Self::find_table_mut(&mut databases, table_name)?;
        if header.len() != table.columns.len() {
            return Err(CatalogError::RowWidth {
                table: table_name.to_string(),
                expected: table.columns.len(),
                found: header.len(),
            });
        }
        let mut indices = Vec::with_capacity(header.len());
        let mut seen = HashSet::with_capacity(header.len());
        for name in header {
            let idx = table
                .column(name)
                .ok_or_else(|| CatalogError::ColumnNotFound(name.clone()))?;
            if !seen.insert(idx) {
                return Err(CatalogError::DuplicateColumn(name.clone()));
            }
            indices.push(idx);
        }
        if let Some(row) = rows.iter().find(|row| row.len() != indices.len()) {
            return Err(CatalogError::RowWidth {
                table: table_name.to_string(),
                expected: indices.len(),
                found: row.len(),
            });
        }
        for row in rows {
            for (&idx, &value) in indices.iter().zip(row) {
                table.columns[idx].data.push(value);
            }
        }
        Ok(rows.len())
    }

    /// 헤더가 가리키는 데이터베이스, 테이블, 컬럼 중 없는 것을 만든다.
    /// 새 테이블의 컬럼 수는 헤더 길이로 잡는다.
    pub fn ensure_columns(&self, header: &[String]) -> CatalogResult<()> {
        for name in header {
            let table_name = parent_of(name)?;
            let db_name = parent_of(table_name)?;
            ignore_exists(self.create_database(db_name))?;
            ignore_exists(self.create_table(db_name, table_name, header.len()))?;
            ignore_exists(self.create_column(table_name, name))?;
        }
        Ok(())
    }

    /// 데이터 없이 카탈로그의 모양만 뽑는다. 이름순으로 정렬된다.
    pub fn manifest(&self) -> Manifest {
        let databases = self.databases.read();
        let mut entries: Vec<_> = databases
            .iter()
            .map(|(name, db)| DatabaseEntry {
                name: name.to_string(),
                tables: db
                    .tables
                    .iter()
                    .map(|table| TableEntry {
                        name: table.name.to_string(),
                        capacity: table.capacity,
                        columns: table.columns.iter().map(|c| c.name.to_string()).collect(),
                    })
                    .collect(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Manifest { databases: entries }
    }

    /// `manifest`에 있는 것 중 없는 것을 만든다. 테이블 용량도 그대로 되살린다.
    pub fn apply_manifest(&self, manifest: &Manifest) -> CatalogResult<()> {
        for db in &manifest.databases {
            ignore_exists(self.create_database(&db.name))?;
            for table in &db.tables {
                ignore_exists(self.create_table(&db.name, &table.name, table.capacity))?;
                for column in &table.columns {
                    ignore_exists(self.create_column(&table.name, column))?;
                }
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<TableSnapshot> {
        let databases = self.databases.read();
        databases
            .values()
            .flat_map(|db| db.tables.iter())
            .filter(|table| !table.columns.is_empty())
            .map(|table| TableSnapshot {
                name: table.name.clone(),
                columns: table.columns.iter().map(|c| c.name.clone()).collect(),
                data: table.columns.iter().map(|c| c.data.clone()).collect(),
            })
            .collect()
    }

    pub fn database_count(&self) -> usize {
        self.databases.read().len()
    }

    /// 모든 데이터베이스를 내려놓는다.
    pub fn clear(&self) {
        self.databases.write().clear();
    }

    fn find_table<'a>(databases: &'a HashMap<Box<str>, Database>, name: &str) -> CatalogResult<&'a Table> {
        databases
            .get(parent_of(name)?)
            .and_then(|db| db.table(name))
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }

    fn find_table_mut<'a>(
        databases: &'a mut HashMap<Box<str>, Database>,
        name: &str,
    ) -> CatalogResult<&'a mut Table> {
        databases
            .get_mut(parent_of(name)?)
            .and_then(|db| db.table_mut(name))
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))
    }
}
