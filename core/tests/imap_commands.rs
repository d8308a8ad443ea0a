/*
 * imap_commands.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Id-set merging and command splitting properties, and command execution against a
 * scripted server over an in-memory stream.
 */

use std::collections::BTreeSet;
use std::future::Future;
use std::io;
use std::pin::Pin;

use proptest::prelude::*;
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use carteggio_core::protocol::imap::{
    CommandLimits, FolderSelectedCommand, IdSet, IdToken, ImapConnection, IoErrorHandler, ResponseLimits,
    SearchCriteria, SearchResponse,
};
use carteggio_core::store::{Flag, FolderState, MessagingError};

proptest! {
    #[test]
    fn optimized_groupings_cover_exactly_the_input(ids in prop::collection::btree_set(1u64..3000, 0..300)) {
        let mut set = IdSet::from_ids(ids.iter().copied());
        set.optimize_groupings();
        prop_assert_eq!(set.expand().unwrap(), ids.clone());

        let tokens = set.tokens();
        let mut previous_end: Option<u64> = None;
        for token in &tokens {
            let (start, end) = match token {
                IdToken::Id(id) => (*id, *id),
                IdToken::Group(g) => {
                    prop_assert!(g.end() > g.start());
                    (g.start(), g.end())
                }
            };
            if let Some(prev) = previous_end {
                // Runs are maximal: a gap separates consecutive tokens.
                prop_assert!(start > prev + 1);
            }
            previous_end = Some(end);
        }
    }

    #[test]
    fn split_commands_stay_under_limit(
        ids in prop::collection::btree_set(1u64..100_000, 1..400),
        limit in 40usize..400,
    ) {
        let command = FolderSelectedCommand::fetch(IdSet::from_ids(ids.iter().copied()), ["UID", "FLAGS"]);
        let commands = command.split_if_needed(limit).unwrap();
        let mut seen = Vec::new();
        for sub in &commands {
            prop_assert!(sub.create_command_string().len() < limit);
            seen.extend(sub.id_set().expand().unwrap());
        }
        let unique: BTreeSet<u64> = seen.iter().copied().collect();
        prop_assert_eq!(unique.len(), seen.len());
        prop_assert_eq!(unique, ids);
    }
}

/// Answers every command with `untagged` followed by a tagged OK.
async fn answer(stream: DuplexStream, untagged: String) -> Vec<String> {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();
    let mut received = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        let tag = line.split(' ').next().unwrap_or_default().to_string();
        let reply = format!("{}{} OK completed\r\n", untagged, tag);
        if write.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
        received.push(line);
    }
    received
}

/// Answers every command with one SEARCH hit, an EXISTS and a tagged OK.
async fn serve(stream: DuplexStream, hit: u64) -> Vec<String> {
    answer(stream, format!("* SEARCH {}\r\n* 12 EXISTS\r\n", hit)).await
}

#[tokio::test]
async fn split_command_runs_every_part_in_order() {
    let (client, server) = duplex(64 * 1024);
    let server = tokio::spawn(serve(server, 7));
    let limits = CommandLimits {
        default_limit: 60,
        condstore_limit: 60,
    };
    let mut connection = ImapConnection::new(client, limits);
    let mut folder = FolderState::new("INBOX");
    let ids = IdSet::from_ids((1..60).map(|i| i * 10));
    let result = connection
        .search(SearchCriteria::default(), ids, &mut folder, None)
        .await
        .unwrap();
    drop(connection);
    let received = server.await.unwrap();

    assert!(received.len() > 1);
    assert_eq!(result.ids, vec![7; received.len()]);
    assert_eq!(folder.message_count, 12);
    for (i, line) in received.iter().enumerate() {
        assert!(line.starts_with(&format!("A{:04} UID SEARCH UID ", i + 1)));
        let command = line.split_once(' ').unwrap().1;
        assert!(command.len() < 60);
    }
}

struct Reconnect {
    calls: usize,
    untagged: String,
}

impl Reconnect {
    fn new(untagged: &str) -> Self {
        Self {
            calls: 0,
            untagged: untagged.to_string(),
        }
    }
}

impl IoErrorHandler<DuplexStream> for Reconnect {
    fn on_io_error<'a>(
        &'a mut self,
        connection: &'a mut ImapConnection<DuplexStream>,
        _error: io::Error,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessagingError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls += 1;
            let (client, server) = duplex(4096);
            tokio::spawn(answer(server, self.untagged.clone()));
            connection.replace_stream(client);
            Ok(())
        })
    }
}

#[tokio::test]
async fn io_error_is_handed_to_folder_and_retried() {
    let (client, server) = duplex(4096);
    drop(server);
    let mut connection = ImapConnection::new(client, CommandLimits::default());
    let mut reconnect = Reconnect::new("* SEARCH 42\r\n");
    let command = FolderSelectedCommand::search(SearchCriteria::default(), IdSet::from_ids([1, 2, 3]));
    let responses = connection
        .execute(
            &command,
            &mut (),
            Some(&mut reconnect as &mut dyn IoErrorHandler<DuplexStream>),
        )
        .await
        .unwrap();
    assert_eq!(reconnect.calls, 1);
    assert_eq!(SearchResponse::parse(&responses).ids, vec![42]);
}

#[tokio::test]
async fn io_error_without_handler_propagates() {
    let (client, server) = duplex(4096);
    drop(server);
    let mut connection = ImapConnection::new(client, CommandLimits::default());
    let command = FolderSelectedCommand::search(SearchCriteria::default(), IdSet::new());
    let error = connection.execute(&command, &mut (), None).await.unwrap_err();
    assert!(matches!(error, MessagingError::Io(_)));
    assert!(!error.is_permanent());
}

#[tokio::test]
async fn typed_fetch_goes_through_io_handler() {
    let (client, server) = duplex(4096);
    drop(server);
    let mut connection = ImapConnection::new(client, CommandLimits::default());
    let mut reconnect = Reconnect::new("* 3 FETCH (UID 5 FLAGS (\\Seen))\r\n");
    let mut folder = FolderState::new("INBOX");
    let fetched = connection
        .fetch(
            IdSet::from_ids([5]),
            &["UID", "FLAGS"],
            &mut folder,
            Some(&mut reconnect as &mut dyn IoErrorHandler<DuplexStream>),
        )
        .await
        .unwrap();
    assert_eq!(reconnect.calls, 1);
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].uid, Some(5));
    assert_eq!(fetched[0].flags, Some(vec![Flag::Seen]));
}

#[tokio::test]
async fn oversized_literal_from_server_is_a_protocol_error() {
    let (client, server) = duplex(4096);
    tokio::spawn(answer(server, "* 1 FETCH (UID 1 BODY[] {4294967295}\r\n".to_string()));
    let mut connection = ImapConnection::new(client, CommandLimits::default()).with_response_limits(ResponseLimits {
        max_line_length: 1024,
        max_literal_size: 1024 * 1024,
    });
    let error = connection
        .fetch(IdSet::from_ids([1]), &["BODY[]"], &mut (), None)
        .await
        .unwrap_err();
    assert!(matches!(error, MessagingError::Protocol(_)));
}
