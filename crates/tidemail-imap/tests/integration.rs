//! Integration tests for the IMAP server.
//!
//! These tests drive complete sessions through the public API, first over a
//! mock stream and then over a real TCP socket.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_test::io::Builder;

use tidemail_imap::connection::{SessionEnd, greeting, serve_session};
use tidemail_imap::{
    FramedStream, MemoryStore, Server, ServerConfig, Session, SessionState, Status,
};

fn store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.add_user("fred", "secret").unwrap();
    store.create_mailbox("INBOX").unwrap();
    store.create_mailbox("Archive/2024").unwrap();
    store.append("INBOX", true).unwrap();
    store.append("INBOX", false).unwrap();
    store.append("INBOX", false).unwrap();
    store
}

fn session() -> Session {
    let store = store();
    Session::new(1, store.clone(), store)
}

#[test]
fn test_session_walkthrough() {
    let mut session = session();

    let response = session.handle(b"a1 LIST \"\" *\r\n");
    assert_eq!(response.status(), Status::No);

    let response = session.handle(b"a2 LOGIN fred secret\r\n");
    assert!(response.is_ok());
    assert_eq!(session.state(), &SessionState::Authenticated);

    let response = session.handle(b"a3 SELECT inbox\r\n");
    assert_eq!(response.message(), "[READ-WRITE] SELECT completed");
    assert_eq!(
        response.untagged(),
        [
            "3 EXISTS",
            "2 RECENT",
            "OK [UNSEEN 2] Message 2 is first unseen",
            "OK [UIDVALIDITY 1] UIDs valid",
            "OK [UIDNEXT 4] Predicted next UID",
        ]
    );
    assert_eq!(session.selected_mailbox().unwrap().name, "INBOX");

    let response = session.handle(b"a4 LIST \"\" *\r\n");
    assert_eq!(
        response.untagged(),
        [
            "LIST (\\HasNoChildren) \"/\" \"INBOX\"",
            "LIST (\\HasChildren) \"/\" \"Archive\"",
            "LIST (\\HasNoChildren) \"/\" \"Archive/2024\"",
        ]
    );

    let response = session.handle(b"a5 CLOSE\r\n");
    assert!(response.is_ok());
    assert!(session.selected_mailbox().is_none());

    let response = session.handle(b"a6 LOGOUT\r\n");
    assert!(response.is_ok());
    assert!(session.is_closed());

    let response = session.handle(b"a7 NOOP\r\n");
    assert_eq!(response.status(), Status::Bad);
}

#[test]
fn test_list_inbox_in_any_case() {
    let mut session = session();
    session.handle(b"a1 LOGIN fred secret\r\n");

    for command in [&b"a2 LIST \"\" inbox\r\n"[..], b"a3 LIST \"\" InBox\r\n"] {
        let response = session.handle(command);
        assert_eq!(response.untagged(), ["LIST (\\HasNoChildren) \"/\" \"INBOX\""]);
    }

    let response = session.handle(b"a4 LIST \"\" archive\r\n");
    assert!(response.is_ok());
    assert!(response.untagged().is_empty());
}

#[test]
fn test_response_bytes() {
    let mut session = session();
    let response = session.handle(b"A00001 CAPABILITY\r\n");
    assert_eq!(
        &response.to_bytes()[..],
        b"* CAPABILITY IMAP4rev1 STARTTLS\r\nA00001 OK CAPABILITY completed\r\n"
    );
}

#[tokio::test]
async fn test_mock_stream_session() {
    let mock = Builder::new()
        .read(b"A1 LOGIN {4}\r\n")
        .write(b"+ Ready for literal data\r\n")
        .read(b"fred {6}\r\n")
        .write(b"+ Ready for literal data\r\n")
        .read(b"secret\r\n")
        .write(b"A1 OK LOGIN completed\r\n")
        .read(b"A2 EXAMINE Archive/2024\r\n")
        .write(b"* 0 EXISTS\r\n* 0 RECENT\r\n* OK [UNSEEN 0] Message 0 is first unseen\r\n")
        .write(b"* OK [UIDVALIDITY 3] UIDs valid\r\n* OK [UIDNEXT 1] Predicted next UID\r\n")
        .write(b"A2 OK [READ-ONLY] EXAMINE completed\r\n")
        .read(b"A3 LOGOUT\r\n")
        .write(b"* BYE IMAP4rev1 Server logging out\r\nA3 OK LOGOUT completed\r\n")
        .build();

    let mut session = session();
    let mut framed = FramedStream::new(mock);
    let end = serve_session(&mut framed, &mut session, &ServerConfig::default())
        .await
        .unwrap();

    assert_eq!(end, SessionEnd::Logout);
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_tcp_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let store = store();
    let config = ServerConfig::new(addr.to_string());
    let expected_greeting = greeting(&config);
    let server = Server::new(config, store.clone(), store);
    tokio::spawn(server.serve(listener));

    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, expected_greeting);

    writer.write_all(b"t1 BOGUS\r\n").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert!(line.starts_with("t1 BAD "));

    writer.write_all(b"t2 LOGIN fred secret\r\n").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "t2 OK LOGIN completed\r\n");

    writer.write_all(b"t3 LOGOUT\r\n").await.unwrap();
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "* BYE IMAP4rev1 Server logging out\r\n");
    line.clear();
    reader.read_line(&mut line).await.unwrap();
    assert_eq!(line, "t3 OK LOGOUT completed\r\n");

    // The server closes the connection after LOGOUT
    line.clear();
    assert_eq!(reader.read_line(&mut line).await.unwrap(), 0);
}
