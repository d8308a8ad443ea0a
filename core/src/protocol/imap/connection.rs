/*
 * connection.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Carteggio, a cross-platform email client.
 *
 * Carteggio is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Carteggio is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Carteggio.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Command execution over an established IMAP stream.
//!
//! The connection does not open sockets: callers hand it any `AsyncRead + AsyncWrite`
//! stream (TLS or not) positioned before the server greeting or after authentication.

use std::future::Future;
use std::io;
use std::pin::Pin;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::protocol::imap::command::{CommandLimits, FolderSelectedCommand, SearchCriteria, StoreMode};
use crate::protocol::imap::id_set::IdSet;
use crate::protocol::imap::response::{read_response, ImapResponse, ResponseLimits, ResponseStatus};
use crate::protocol::imap::responses::{CopyUidResponse, FetchResponse, SearchResponse, StoreResponse};
use crate::store::{Flag, MessagingError, NegativeImapResponse};

/// Receives untagged responses as they arrive, before the command completes.
pub trait UntaggedHandler {
    fn handle_untagged(&mut self, response: &ImapResponse);
}

impl UntaggedHandler for () {
    fn handle_untagged(&mut self, _response: &ImapResponse) {}
}

/// Decides what happens when the stream fails mid-command.
///
/// Returning `Ok(())` means the connection was re-established (typically via
/// [`ImapConnection::replace_stream`]) and the sub-command is sent again once. Returning an
/// error propagates it to the caller.
pub trait IoErrorHandler<S>: Send {
    fn on_io_error<'a>(
        &'a mut self,
        connection: &'a mut ImapConnection<S>,
        error: io::Error,
    ) -> Pin<Box<dyn Future<Output = Result<(), MessagingError>> + Send + 'a>>;
}

/// Untagged responses of one command and the tagged completion that ended it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    pub untagged: Vec<ImapResponse>,
    pub completion: ImapResponse,
}

pub struct ImapConnection<S> {
    stream: S,
    read_buf: Vec<u8>,
    tag_counter: u32,
    capabilities: Vec<String>,
    limits: CommandLimits,
    response_limits: ResponseLimits,
}

impl<S> ImapConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, limits: CommandLimits) -> Self {
        Self {
            stream,
            read_buf: Vec::with_capacity(4096),
            tag_counter: 0,
            capabilities: Vec::new(),
            limits,
            response_limits: ResponseLimits::default(),
        }
    }

    pub fn with_response_limits(mut self, response_limits: ResponseLimits) -> Self {
        self.response_limits = response_limits;
        self
    }

    /// Swap in a fresh stream after reconnecting. Capabilities are forgotten.
    pub fn replace_stream(&mut self, stream: S) {
        self.stream = stream;
        self.read_buf.clear();
        self.capabilities.clear();
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Read the server greeting, keeping any `[CAPABILITY ...]` it advertises.
    pub async fn read_greeting(&mut self) -> Result<ImapResponse, MessagingError> {
        let greeting = read_response(&mut self.stream, &mut self.read_buf, &self.response_limits).await?;
        match greeting.status {
            Some(ResponseStatus::Ok) | Some(ResponseStatus::PreAuth) => {
                self.note_capabilities(&greeting);
                Ok(greeting)
            }
            Some(ResponseStatus::Bye) => Err(negative(&greeting)),
            _ => Err(MessagingError::protocol(format!("unexpected greeting: {:?}", greeting))),
        }
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn is_condstore_capable(&self) -> bool {
        self.has_capability("CONDSTORE")
    }

    /// Line limit for commands on this connection.
    pub fn line_length_limit(&self) -> usize {
        self.limits.limit_for(self.is_condstore_capable())
    }

    pub async fn refresh_capabilities(&mut self) -> Result<&[String], MessagingError> {
        self.execute_simple_command("CAPABILITY").await?;
        Ok(&self.capabilities)
    }

    /// Generate next tag (A0001, A0002, ...).
    fn next_tag(&mut self) -> String {
        self.tag_counter = self.tag_counter % 9999 + 1;
        format!("A{:04}", self.tag_counter)
    }

    fn note_capabilities(&mut self, response: &ImapResponse) {
        if response.is_data("CAPABILITY") {
            self.capabilities = response.elements[1..]
                .iter()
                .filter_map(|e| e.as_str())
                .map(str::to_uppercase)
                .collect();
        } else if response.code_name().is_some_and(|n| n.eq_ignore_ascii_case("CAPABILITY")) {
            self.capabilities = response.code_args().iter().map(|c| c.to_uppercase()).collect();
        }
    }

    /// Write a line (no CRLF) then CRLF.
    async fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.stream.write_all(line).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Send `command` and read until its tagged completion. A `NO` or `BAD` completion
    /// becomes [`MessagingError::NegativeResponse`].
    pub async fn execute_simple_command(&mut self, command: &str) -> Result<CommandResponse, MessagingError> {
        self.execute_line(command, &mut ()).await
    }

    async fn execute_line<H>(&mut self, command: &str, handler: &mut H) -> Result<CommandResponse, MessagingError>
    where
        H: UntaggedHandler + ?Sized,
    {
        let tag = self.next_tag();
        let full = format!("{} {}", tag, command);
        let verb = command.split(' ').take(2).collect::<Vec<_>>().join(" ");
        tracing::debug!(%tag, command = %verb, "sending");
        self.write_line(full.as_bytes()).await?;

        let mut untagged = Vec::new();
        loop {
            let response = read_response(&mut self.stream, &mut self.read_buf, &self.response_limits).await?;
            if response.tag.as_deref() == Some(tag.as_str()) {
                self.note_capabilities(&response);
                if response.is_ok() {
                    return Ok(CommandResponse {
                        untagged,
                        completion: response,
                    });
                }
                return Err(negative(&response));
            }
            if response.continuation {
                return Err(MessagingError::protocol("unexpected continuation request"));
            }
            if response.is_tagged() {
                tracing::debug!(tag = ?response.tag, "ignoring response for another tag");
                continue;
            }
            self.note_capabilities(&response);
            handler.handle_untagged(&response);
            untagged.push(response);
        }
    }

    /// Run a folder command, splitting it to fit the line limit and sending the parts in
    /// order. Untagged responses go to `handler` as they arrive. An I/O failure is handed to
    /// `io_handler`, which may reconnect so that the failed part is retried once.
    pub async fn execute<H>(
        &mut self,
        command: &FolderSelectedCommand,
        handler: &mut H,
        mut io_handler: Option<&mut dyn IoErrorHandler<S>>,
    ) -> Result<Vec<CommandResponse>, MessagingError>
    where
        H: UntaggedHandler + Send + ?Sized,
    {
        let commands = command.split_if_needed(self.line_length_limit())?;
        let mut responses = Vec::with_capacity(commands.len());
        for sub in &commands {
            let line = sub.create_command_string();
            let response = match self.execute_line(&line, handler).await {
                Err(MessagingError::Io(error)) => match io_handler.as_deref_mut() {
                    Some(io_handler) => {
                        tracing::warn!(error = %error, "I/O error during command; handing to folder");
                        io_handler.on_io_error(self, error).await?;
                        self.execute_line(&line, handler).await?
                    }
                    None => {
                        tracing::warn!(error = %error, "I/O error during command");
                        return Err(MessagingError::Io(error));
                    }
                },
                other => other?,
            };
            responses.push(response);
        }
        Ok(responses)
    }

    pub async fn search<H>(
        &mut self,
        criteria: SearchCriteria,
        ids: IdSet,
        handler: &mut H,
        io_handler: Option<&mut dyn IoErrorHandler<S>>,
    ) -> Result<SearchResponse, MessagingError>
    where
        H: UntaggedHandler + Send + ?Sized,
    {
        let command = FolderSelectedCommand::search(criteria, ids);
        let responses = self.execute(&command, handler, io_handler).await?;
        Ok(SearchResponse::parse(&responses))
    }

    pub async fn fetch<H>(
        &mut self,
        ids: IdSet,
        items: &[&str],
        handler: &mut H,
        io_handler: Option<&mut dyn IoErrorHandler<S>>,
    ) -> Result<Vec<FetchResponse>, MessagingError>
    where
        H: UntaggedHandler + Send + ?Sized,
    {
        let command = FolderSelectedCommand::fetch(ids, items.iter().copied());
        let responses = self.execute(&command, handler, io_handler).await?;
        Ok(FetchResponse::parse_all(&responses))
    }

    pub async fn store<H>(
        &mut self,
        ids: IdSet,
        mode: StoreMode,
        flags: Vec<Flag>,
        silent: bool,
        handler: &mut H,
        io_handler: Option<&mut dyn IoErrorHandler<S>>,
    ) -> Result<StoreResponse, MessagingError>
    where
        H: UntaggedHandler + Send + ?Sized,
    {
        let command = FolderSelectedCommand::store(ids, mode, silent, flags);
        let responses = self.execute(&command, handler, io_handler).await?;
        Ok(StoreResponse::parse(&responses))
    }

    /// Copy to `destination`. The mapping is None when the server lacks UIDPLUS.
    pub async fn copy<H>(
        &mut self,
        ids: IdSet,
        destination: &str,
        handler: &mut H,
        io_handler: Option<&mut dyn IoErrorHandler<S>>,
    ) -> Result<Option<CopyUidResponse>, MessagingError>
    where
        H: UntaggedHandler + Send + ?Sized,
    {
        let command = FolderSelectedCommand::copy(ids, destination);
        let responses = self.execute(&command, handler, io_handler).await?;
        Ok(CopyUidResponse::parse(&responses))
    }
}

fn negative(response: &ImapResponse) -> MessagingError {
    let alert = response
        .code_name()
        .filter(|n| n.eq_ignore_ascii_case("ALERT"))
        .map(|_| response.text.clone());
    MessagingError::NegativeResponse(NegativeImapResponse {
        status: response.status.unwrap_or(ResponseStatus::Bad),
        response_code: response.code.clone(),
        text: response.text.clone(),
        alert,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};

    #[tokio::test]
    async fn greeting_capabilities_and_negative_completion() {
        let (client, server) = duplex(4096);
        let server = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            write
                .write_all(b"* OK [CAPABILITY IMAP4rev1 CONDSTORE UIDPLUS] ready\r\n")
                .await
                .unwrap();
            let line = lines.next_line().await.unwrap().unwrap();
            assert_eq!(line, "A0001 SELECT \"nope\"");
            write.write_all(b"A0001 NO [NONEXISTENT] no such mailbox\r\n").await.unwrap();
        });
        let mut connection = ImapConnection::new(client, CommandLimits::default());
        connection.read_greeting().await.unwrap();
        assert!(connection.is_condstore_capable());
        assert_eq!(connection.line_length_limit(), 8182);
        match connection.execute_simple_command("SELECT \"nope\"").await {
            Err(MessagingError::NegativeResponse(negative)) => {
                assert_eq!(negative.status, ResponseStatus::No);
                assert_eq!(negative.response_code.as_deref(), Some("NONEXISTENT"));
                assert_eq!(negative.text, "no such mailbox");
            }
            other => panic!("unexpected {:?}", other),
        }
        server.await.unwrap();
    }
}
