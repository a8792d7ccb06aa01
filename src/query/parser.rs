use super::error::{QueryErr, Result};
use super::lexer::{Lexer, strip_close_paren, trim_quotes};
use crate::session::{ConnectionId, Session};
use std::sync::Arc;
use tracing::{debug, warn};

/// `select`의 `null` 하한/상한.
pub const UNBOUNDED_LOW: i64 = i64::MIN;
pub const UNBOUNDED_HIGH: i64 = i64::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorKind {
    CreateDatabase {
        name: Box<str>,
    },
    CreateTable {
        db_name: Box<str>,
        qualified_name: Box<str>,
        column_count: usize,
    },
    CreateColumn {
        qualified_table_name: Box<str>,
        qualified_column_name: Box<str>,
    },
    Load {
        path: Box<str>,
    },
    Insert {
        qualified_table_name: Box<str>,
        values: Vec<i32>,
    },
    // low <= v < high
    Select {
        qualified_column_name: Box<str>,
        range_low: i64,
        range_high: i64,
        result_handle: Box<str>,
    },
    BatchExecute,
    Print {
        handle: Box<str>,
    },
    Shutdown,
    Error {
        message: Box<str>,
    },
}

/// 컴파일된 명령 하나. 결과를 돌려보낼 연결과 세션을 함께 들고 다닌다.
#[derive(Debug, Clone)]
pub struct Operator {
    pub conn: ConnectionId,
    pub session: Arc<Session>,
    pub kind: OperatorKind,
}

/// 명령 문자열을 연산자로 바꾼다. 주석 줄이면 `None`.
///
/// 문법 오류는 `OperatorKind::Error`로 돌아오며, 카탈로그는 건드리지 않는다.
pub fn compile(raw: &str, conn: ConnectionId, session: Arc<Session>) -> Option<Operator> {
    let raw = raw.trim();
    if raw.starts_with("--") {
        return None;
    }
    let (handle, cmd) = match raw.split_once('=') {
        Some((handle, cmd)) => {
            let handle = handle.trim();
            debug!(%conn, handle, "result handle");
            ((!handle.is_empty()).then_some(handle), cmd.trim())
        }
        None => (None, raw),
    };
    debug!(%conn, query = cmd, "compiling");
    let kind = parse(cmd, handle).unwrap_or_else(|err| {
        warn!(%conn, query = cmd, %err, "rejected command");
        OperatorKind::Error {
            message: err.to_string().into(),
        }
    });
    Some(Operator {
        conn,
        session,
        kind,
    })
}

fn parse(cmd: &str, handle: Option<&str>) -> Result<OperatorKind> {
    if let Some(args) = cmd.strip_prefix("create(db,") {
        parse_create_db(args)
    } else if let Some(args) = cmd.strip_prefix("create(tbl,") {
        parse_create_tbl(args)
    } else if let Some(args) = cmd.strip_prefix("create(col,") {
        parse_create_col(args)
    } else if let Some(args) = cmd.strip_prefix("load(") {
        parse_load(args)
    } else if let Some(args) = cmd.strip_prefix("relational_insert") {
        parse_insert(args)
    } else if let Some(args) = cmd.strip_prefix("select(") {
        parse_select(args, handle)
    } else if let Some(args) = cmd.strip_prefix("print(") {
        parse_print(args)
    } else if let Some(args) = cmd.strip_prefix("batch_execute") {
        match args.trim() {
            "" | "()" => Ok(OperatorKind::BatchExecute),
            _ => Err(QueryErr::UnknownCommand),
        }
    } else if cmd.starts_with("shutdown") {
        Ok(OperatorKind::Shutdown)
    } else {
        Err(QueryErr::UnknownCommand)
    }
}

/// `db.tbl` 처럼 비어 있지 않은 부분이 정확히 `parts`개인지 확인한다.
fn is_qualified(name: &str, parts: usize) -> bool {
    let mut lexer = Lexer::new(name);
    let mut count = 0;
    while let Some(part) = lexer.next_period() {
        if part.is_empty() {
            return false;
        }
        count += 1;
    }
    count == parts
}

fn parse_create_db(args: &str) -> Result<OperatorKind> {
    let args = trim_quotes(args);
    let name = strip_close_paren(&args).ok_or(QueryErr::CreateDb)?;
    if name.is_empty() || name.contains(['.', ',']) {
        return Err(QueryErr::CreateDb);
    }
    Ok(OperatorKind::CreateDatabase { name: name.into() })
}

fn parse_create_tbl(args: &str) -> Result<OperatorKind> {
    let mut lexer = Lexer::new(args);
    let (Some(tbl_name), Some(db_name), Some(col_cnt)) =
        (lexer.next_comma(), lexer.next_comma(), lexer.next_comma())
    else {
        return Err(QueryErr::CreateTbl);
    };
    let tbl_name = trim_quotes(&tbl_name);
    let db_name = trim_quotes(&db_name);
    let col_cnt = strip_close_paren(&col_cnt).ok_or(QueryErr::CreateTbl)?;
    if !is_qualified(&tbl_name, 1) || !is_qualified(&db_name, 1) {
        return Err(QueryErr::CreateTbl);
    }
    let column_count = match col_cnt.parse::<usize>() {
        Ok(n) if n >= 1 => n,
        _ => return Err(QueryErr::ColumnCount),
    };
    Ok(OperatorKind::CreateTable {
        qualified_name: format!("{db_name}.{tbl_name}").into(),
        db_name: db_name.into(),
        column_count,
    })
}

fn parse_create_col(args: &str) -> Result<OperatorKind> {
    let mut lexer = Lexer::new(args);
    let (Some(col_name), Some(tbl_name)) = (lexer.next_comma(), lexer.next_comma()) else {
        return Err(QueryErr::CreateCol);
    };
    // 인자는 정확히 두 개
    if !lexer.finished() {
        return Err(QueryErr::CreateCol);
    }
    let col_name = trim_quotes(&col_name);
    let tbl_name = strip_close_paren(&tbl_name).ok_or(QueryErr::CreateCol)?;
    let tbl_name = trim_quotes(tbl_name);
    if !is_qualified(&col_name, 1) || !is_qualified(&tbl_name, 2) {
        return Err(QueryErr::CreateCol);
    }
    Ok(OperatorKind::CreateColumn {
        qualified_column_name: format!("{tbl_name}.{col_name}").into(),
        qualified_table_name: tbl_name.into(),
    })
}

fn parse_load(args: &str) -> Result<OperatorKind> {
    let args = trim_quotes(args);
    let path = strip_close_paren(&args).ok_or(QueryErr::Load)?;
    if path.is_empty() {
        return Err(QueryErr::Load);
    }
    Ok(OperatorKind::Load { path: path.into() })
}

fn parse_insert(args: &str) -> Result<OperatorKind> {
    let args = args.trim_start().strip_prefix('(').ok_or(QueryErr::Insert)?;
    let args = strip_close_paren(args.trim_end()).ok_or(QueryErr::Insert)?;
    let mut lexer = Lexer::new(args);
    let tbl_name = lexer.next_comma().ok_or(QueryErr::Insert)?;
    if !is_qualified(&tbl_name, 2) {
        return Err(QueryErr::Insert);
    }
    let mut values = Vec::new();
    while let Some(token) = lexer.next_comma() {
        values.push(token.parse::<i32>().map_err(|_| QueryErr::Insert)?);
    }
    if values.is_empty() {
        return Err(QueryErr::Insert);
    }
    Ok(OperatorKind::Insert {
        qualified_table_name: tbl_name.into(),
        values,
    })
}

fn parse_bound(token: &str, unbounded: i64) -> Result<i64> {
    if token == "null" {
        return Ok(unbounded);
    }
    token
        .parse::<i32>()
        .map(i64::from)
        .map_err(|_| QueryErr::Select)
}

fn parse_select(args: &str, handle: Option<&str>) -> Result<OperatorKind> {
    let handle = handle.ok_or(QueryErr::Select)?;
    let mut lexer = Lexer::new(args);
    let (Some(col_name), Some(low), Some(high)) =
        (lexer.next_comma(), lexer.next_comma(), lexer.next_comma())
    else {
        return Err(QueryErr::Select);
    };
    if !lexer.finished() || !is_qualified(&col_name, 3) {
        return Err(QueryErr::Select);
    }
    let high = strip_close_paren(&high).ok_or(QueryErr::Select)?;
    let range_low = parse_bound(&low, UNBOUNDED_LOW)?;
    let range_high = parse_bound(high, UNBOUNDED_HIGH)?;
    if range_low > range_high {
        return Err(QueryErr::SelectRange);
    }
    Ok(OperatorKind::Select {
        qualified_column_name: col_name.into(),
        range_low,
        range_high,
        result_handle: handle.into(),
    })
}

fn parse_print(args: &str) -> Result<OperatorKind> {
    let handle = strip_close_paren(args.trim_end()).ok_or(QueryErr::Print)?;
    if !is_qualified(handle, 1) || handle.contains(',') {
        return Err(QueryErr::Print);
    }
    Ok(OperatorKind::Print {
        handle: handle.into(),
    })
}
