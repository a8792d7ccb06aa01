use super::manifest::Manifest;
use super::{Catalog, CatalogError, TableSnapshot};
use csv::{ByteRecord, ReaderBuilder, Trim, WriterBuilder};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info};

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// 카탈로그 모양을 담는 파일. CSV 파일들과 같은 디렉터리에 둔다.
pub const MANIFEST_FILE: &str = "catalog.toml";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed csv {} at line {line}: {reason}", .path.display())]
    Format {
        path: PathBuf,
        line: u64,
        reason: String,
    },
    #[error("failed to write csv {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("bad manifest {}: {reason}", .path.display())]
    Manifest { path: PathBuf, reason: String },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn manifest_err<E: std::fmt::Display>(path: &Path) -> impl FnOnce(E) -> StorageError + '_ {
    move |err| StorageError::Manifest {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

/// 파싱된 CSV. 첫 줄은 `db.tbl.col` 형태의 헤더, 나머지는 정수 행.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<i32>>,
}

pub fn parse_csv(path: &Path, text: &str) -> StorageResult<CsvTable> {
    let format_err = |line: u64, reason: String| StorageError::Format {
        path: path.to_path_buf(),
        line,
        reason,
    };
    let csv_err = |err: csv::Error| {
        let line = err.position().map_or(1, |pos| pos.line());
        format_err(line, err.to_string())
    };

    // 행 길이는 아래에서 직접 검사해 줄 번호를 남긴다
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());
    let header: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    if header.iter().all(String::is_empty) {
        return Err(format_err(1, "missing header".to_string()));
    }
    if header.iter().any(|name| name.split('.').count() != 3) {
        return Err(format_err(1, "header must list db.tbl.col names".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map_or(0, |pos| pos.line());
        let row = record
            .iter()
            .map(str::parse::<i32>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format_err(line, err.to_string()))?;
        if row.len() != header.len() {
            return Err(format_err(
                line,
                format!("expected {} values, got {}", header.len(), row.len()),
            ));
        }
        rows.push(row);
    }
    Ok(CsvTable { header, rows })
}

/// 헤더 한 줄 뒤에 행들을 쓴다. 컬럼 길이가 다르면 가장 짧은 컬럼까지만 쓴다.
pub fn render_csv(table: &TableSnapshot) -> csv::Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    let mut record = ByteRecord::with_capacity(256, table.columns.len());
    for name in &table.columns {
        record.push_field(name.as_bytes());
    }
    writer.write_record(&record)?;

    let rows = table.data.iter().map(Vec::len).min().unwrap_or(0);
    for row in 0..rows {
        record.clear();
        for value in table.data.iter().filter_map(|column| column.get(row)) {
            record.push_field(value.to_string().as_bytes());
        }
        writer.write_record(&record)?;
    }
    writer.into_inner().map_err(|err| err.into_error().into())
}

/// CSV 적재와 영속화. 파일 입출력 중에는 카탈로그 잠금을 쥐지 않는다.
#[derive(Debug, Clone)]
pub struct CsvStore {
    data_dir: PathBuf,
}

impl CsvStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// 이미 만들어진 테이블에 행을 덧붙인다.
    pub async fn load_csv(&self, catalog: &Catalog, path: &Path) -> StorageResult<usize> {
        let text = fs::read_to_string(path).await.map_err(io_err(path))?;
        let table = parse_csv(path, &text)?;
        let rows = catalog.append_rows(&table.header, &table.rows)?;
        debug!(path = %path.display(), rows, "loaded csv");
        Ok(rows)
    }

    /// 카탈로그 모양을 `catalog.toml`에, 테이블마다 `<db>.<tbl>.csv` 파일 하나를 쓴다.
    pub async fn persist_csv(&self, catalog: &Catalog) -> StorageResult<usize> {
        let manifest = catalog.manifest();
        let snapshot = catalog.snapshot();
        fs::create_dir_all(&self.data_dir)
            .await
            .map_err(io_err(&self.data_dir))?;

        let manifest_path = self.data_dir.join(MANIFEST_FILE);
        let text = manifest.to_toml().map_err(manifest_err(&manifest_path))?;
        fs::write(&manifest_path, text)
            .await
            .map_err(io_err(&manifest_path))?;

        for table in &snapshot {
            let path = self.data_dir.join(format!("{}.csv", table.name));
            let bytes = render_csv(table).map_err(|source| StorageError::Csv {
                path: path.clone(),
                source,
            })?;
            fs::write(&path, bytes).await.map_err(io_err(&path))?;
        }
        info!(
            databases = manifest.databases.len(),
            tables = snapshot.len(),
            dir = %self.data_dir.display(),
            "persisted catalog"
        );
        Ok(snapshot.len())
    }

    /// `data_dir`의 매니페스트와 CSV 파일들로 카탈로그를 다시 만든다.
    /// 디렉터리가 없으면 아무것도 하지 않는다. 반환값은 읽은 CSV 파일 수.
    pub async fn restore(&self, catalog: &Catalog) -> StorageResult<usize> {
        let mut entries = match fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(io_err(&self.data_dir)(err)),
        };

        let manifest_path = self.data_dir.join(MANIFEST_FILE);
        match fs::read_to_string(&manifest_path).await {
            Ok(text) => {
                let manifest = Manifest::from_toml(&text).map_err(manifest_err(&manifest_path))?;
                catalog.apply_manifest(&manifest)?;
            }
            // 매니페스트가 없으면 CSV 헤더만으로 만든다
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %manifest_path.display(), "no manifest");
            }
            Err(err) => return Err(io_err(&manifest_path)(err)),
        }

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(io_err(&self.data_dir))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in &paths {
            let text = fs::read_to_string(path).await.map_err(io_err(path))?;
            let table = parse_csv(path, &text)?;
            catalog.ensure_columns(&table.header)?;
            catalog.append_rows(&table.header, &table.rows)?;
        }
        info!(
            databases = catalog.database_count(),
            tables = paths.len(),
            dir = %self.data_dir.display(),
            "restored catalog"
        );
        Ok(paths.len())
    }
}
