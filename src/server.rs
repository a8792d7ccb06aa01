use crate::executor::{Executor, Status};
use crate::session::{ConnectionId, Session};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// 연결마다 태스크 하나. 요청도 응답도 `\n`으로 끝나는 한 줄이다.
pub struct Server {
    listener: TcpListener,
    executor: Arc<Executor>,
    shutdown: Arc<Notify>,
}

impl Server {
    pub async fn bind(addr: &str, executor: Arc<Executor>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            executor,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// `shutdown` 명령이 처리될 때까지 연결을 받는다.
    pub async fn run(self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "waiting for connections");
        let mut next_id = 0;
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(%err, "failed to accept a new connection");
                            continue;
                        }
                    };
                    next_id += 1;
                    let conn = ConnectionId(next_id);
                    let executor = self.executor.clone();
                    let shutdown = self.shutdown.clone();
                    tokio::spawn(async move {
                        info!(%conn, %peer, "connected");
                        if let Err(err) = handle_client(stream, conn, executor, shutdown).await {
                            warn!(%conn, %err, "connection dropped");
                        }
                        info!(%conn, "connection closed");
                    });
                }
                _ = self.shutdown.notified() => {
                    info!("server shut down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    conn: ConnectionId,
    executor: Arc<Executor>,
    shutdown: Arc<Notify>,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let session = Arc::new(Session::new(conn));
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = executor.run(&line, &session).await;
        // 주석 줄은 빈 줄로 응답
        let text = response.as_ref().map_or("\n", |r| r.text.as_str());
        debug!(%conn, reply = text.trim_end(), "responding");
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await?;
        if response.is_some_and(|r| r.status == Status::Shutdown) {
            shutdown.notify_one();
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::csv::CsvStore;

    #[tokio::test]
    async fn test_session_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(Executor::new(CsvStore::new(dir.path())));
        let server = Server::bind("127.0.0.1:0", executor).await.unwrap();
        let addr = server.local_addr().unwrap();
        let running = tokio::spawn(server.run());

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        let script = [
            ("create(db,\"db1\")", "create database successfully."),
            ("--comment", ""),
            ("badcommand(x,y)", "error command, please try again."),
            ("create(tbl,\"t\",db1,1)", "create table successfully."),
            ("create(col,\"a\",db1.t)", "create column successfully."),
            ("relational_insert(db1.t,4)", "relational insert successfully."),
            ("s1=select(db1.t.a,0,10)", "add select query into batch queue successfully."),
            ("batch_execute()", "execute batch queries successfully."),
            ("print(s1)", "0"),
            ("shutdown", "persist all the data and shutdown the server."),
        ];
        for (command, expected) in script {
            writer.write_all(format!("{command}\n").as_bytes()).await.unwrap();
            let reply = lines.next_line().await.unwrap().unwrap();
            assert_eq!(reply, expected, "{command}");
        }

        running.await.unwrap().unwrap();
        assert!(dir.path().join("db1.t.csv").exists());
    }
}
