//! End-to-end tests for the fetch service.
//!
//! A scripted POP3 server runs on a loopback listener so the full path
//! (TCP connect, greeting, commands, storage) is exercised.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::similar_names)]

use mailfetch_core::{
    Account, Config, Error, SessionConfig, SqliteMailStore, fetch_account, fetch_all,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Maildrop served by the scripted server.
struct Script {
    mails: Vec<&'static str>,
    /// RETR index answered with `-ERR`.
    fail_retr: Option<u32>,
}

impl Script {
    fn reply(&self, line: &str) -> String {
        let (name, arg) = line.split_once(' ').unwrap_or((line, ""));
        match name {
            "USER" | "PASS" | "DELE" => "+OK\r\n".to_string(),
            "LIST" => {
                let mut out = format!("+OK {} messages\r\n", self.mails.len());
                for (i, mail) in self.mails.iter().enumerate() {
                    out.push_str(&format!("{} {}\r\n", i + 1, mail.len()));
                }
                out.push_str(".\r\n");
                out
            }
            "RETR" => {
                let index: u32 = arg.parse().unwrap();
                if self.fail_retr == Some(index) {
                    return "-ERR no such message\r\n".to_string();
                }
                let mut out = "+OK\r\n".to_string();
                for body_line in self.mails[index as usize - 1].split_terminator("\r\n") {
                    if body_line.starts_with('.') {
                        out.push('.');
                    }
                    out.push_str(body_line);
                    out.push_str("\r\n");
                }
                out.push_str(".\r\n");
                out
            }
            "QUIT" => "+OK bye\r\n".to_string(),
            _ => "-ERR unknown command\r\n".to_string(),
        }
    }
}

/// Serves one connection and returns the commands it received.
async fn serve(script: Script) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let mut received = Vec::new();

        write.write_all(b"+OK POP3 ready\r\n").await.unwrap();
        while let Ok(Some(line)) = lines.next_line().await {
            let reply = script.reply(&line);
            write.write_all(reply.as_bytes()).await.unwrap();
            let quit = line == "QUIT";
            received.push(line);
            if quit {
                break;
            }
        }
        received
    });

    (port, handle)
}

fn config() -> SessionConfig {
    SessionConfig::new()
        .connect_timeout(std::time::Duration::from_secs(5))
        .io_timeout(std::time::Duration::from_secs(5))
}

#[tokio::test]
async fn test_fetch_account_stores_deletes_and_quits() {
    let (port, server) = serve(Script {
        mails: vec![
            "Subject: first\r\n\r\nhello\r\n",
            "Subject: second\r\n\r\n.hidden\r\n..two\r\n",
        ],
        fail_retr: None,
    })
    .await;
    let account = Account::new("127.0.0.1", port, "alice", "secret");
    let store = SqliteMailStore::in_memory().await.unwrap();

    let report = fetch_account(&account, &store, config()).await.unwrap();
    assert_eq!(report.deleted, 2);
    assert_eq!(report.stored.len(), 2);

    let received = server.await.unwrap();
    assert_eq!(
        received,
        vec![
            "USER alice",
            "PASS secret",
            "LIST",
            "RETR 1",
            "RETR 2",
            "DELE 1",
            "DELE 2",
            "QUIT",
        ]
    );

    let stored = store.mails(&account).await.unwrap();
    assert_eq!(stored[0].subject.as_deref(), Some("first"));
    assert_eq!(stored[1].body, "Subject: second\r\n\r\n.hidden\r\n..two\r\n");
}

#[tokio::test]
async fn test_failed_retrieve_leaves_maildrop_untouched() {
    let (port, server) = serve(Script {
        mails: vec!["a\r\n", "b\r\n"],
        fail_retr: Some(2),
    })
    .await;
    let account = Account::new("127.0.0.1", port, "alice", "secret");
    let store = SqliteMailStore::in_memory().await.unwrap();

    let err = fetch_account(&account, &store, config()).await.unwrap_err();
    assert!(matches!(err, Error::Pop3(ref e) if e.server_message() == Some("no such message")));

    let received = server.await.unwrap();
    assert_eq!(received, vec!["USER alice", "PASS secret", "LIST", "RETR 1", "RETR 2"]);
    assert!(store.mails(&account).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_all_skips_unreachable_account() {
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_port = closed.local_addr().unwrap().port();
    drop(closed);

    let (port, server) = serve(Script {
        mails: vec!["Subject: only\r\n\r\nbody\r\n"],
        fail_retr: None,
    })
    .await;

    let config = Config::new(vec![
        Account::new("127.0.0.1", closed_port, "bob", "x"),
        Account::new("127.0.0.1", port, "alice", "secret"),
    ]);
    let store = SqliteMailStore::in_memory().await.unwrap();

    let outcomes = fetch_all(&config, &store).await;
    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].is_ok());
    assert!(matches!(
        outcomes[0].error(),
        Some(Error::Pop3(mailfetch_pop3::Error::Connection(_)))
    ));
    assert!(outcomes[1].is_ok());
    assert_eq!(outcomes[1].account, format!("alice@127.0.0.1:{port}"));

    server.await.unwrap();
}
