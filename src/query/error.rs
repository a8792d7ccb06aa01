use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryErr>;

/// 컴파일 실패. `Display` 결과가 그대로 클라이언트에게 전달된다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryErr {
    #[error("error command, please try again.")]
    UnknownCommand,
    #[error("create database command is error, use command like [create(db,\"name\")]")]
    CreateDb,
    #[error("create table command is error, use command like [create(tbl,\"grades\",name,2)]")]
    CreateTbl,
    #[error("query unsupported, wrong column number")]
    ColumnCount,
    #[error(
        "create column command is error, use command like [create(col,\"col_name\",full_tbl_name)]"
    )]
    CreateCol,
    #[error("load data command is error, use command like [load(\"data_path\")]")]
    Load,
    #[error("relational insert command is error, use command like [relational_insert(db.tbl,1,2)]")]
    Insert,
    #[error("select command is error, use command like [s1=select(db.tbl.col,low,high)]")]
    Select,
    #[error("select range is error, the lower bound exceeds the upper bound")]
    SelectRange,
    #[error("print command is error, use command like [print(handle)]")]
    Print,
}
