/*
 * response.rs
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

//! IMAP response reading and tokenizing: tagged, untagged and continuation responses,
//! with literals read from the stream as part of the response they belong to.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::store::MessagingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    No,
    Bad,
    PreAuth,
    Bye,
}

impl ResponseStatus {
    fn from_atom(atom: &str) -> Option<Self> {
        match atom.to_ascii_uppercase().as_str() {
            "OK" => Some(ResponseStatus::Ok),
            "NO" => Some(ResponseStatus::No),
            "BAD" => Some(ResponseStatus::Bad),
            "PREAUTH" => Some(ResponseStatus::PreAuth),
            "BYE" => Some(ResponseStatus::Bye),
            _ => None,
        }
    }
}

/// One token of response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImapElement {
    /// Atoms keep any section that follows them, e.g. `BODY[HEADER.FIELDS (FROM)]`.
    Atom(String),
    Quoted(String),
    Literal(Vec<u8>),
    List(Vec<ImapElement>),
    Nil,
}

impl ImapElement {
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            ImapElement::Atom(a) => Some(a),
            _ => None,
        }
    }

    /// Text of an atom or quoted string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ImapElement::Atom(s) | ImapElement::Quoted(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<u64> {
        self.as_atom()?.parse().ok()
    }

    pub fn as_list(&self) -> Option<&[ImapElement]> {
        match self {
            ImapElement::List(items) => Some(items),
            _ => None,
        }
    }

    /// Bytes of a literal or string; None for NIL and lists.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ImapElement::Literal(bytes) => Some(bytes),
            ImapElement::Atom(s) | ImapElement::Quoted(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn is_atom(&self, name: &str) -> bool {
        self.as_atom().is_some_and(|a| a.eq_ignore_ascii_case(name))
    }
}

/// One complete server response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImapResponse {
    /// None for untagged (`*`) and continuation (`+`) responses.
    pub tag: Option<String>,
    pub continuation: bool,
    pub status: Option<ResponseStatus>,
    /// Contents of a bracketed response code, without the brackets.
    pub code: Option<String>,
    /// Human-readable text of a status or continuation response.
    pub text: String,
    /// Data of responses that are not status responses (`5 EXISTS`, `SEARCH 1 2`).
    pub elements: Vec<ImapElement>,
}

impl ImapResponse {
    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    pub fn is_untagged(&self) -> bool {
        self.tag.is_none() && !self.continuation
    }

    pub fn is_ok(&self) -> bool {
        self.status == Some(ResponseStatus::Ok)
    }

    /// First word of the response code (`UIDNEXT`, `COPYUID`).
    pub fn code_name(&self) -> Option<&str> {
        self.code.as_deref()?.split_whitespace().next()
    }

    /// Words of the response code after its name.
    pub fn code_args(&self) -> Vec<&str> {
        self.code
            .as_deref()
            .map(|c| c.split_whitespace().skip(1).collect())
            .unwrap_or_default()
    }

    /// `* <n> <NAME> ...`, as in EXISTS, EXPUNGE and FETCH responses.
    pub fn number_and_name(&self) -> Option<(u64, &str)> {
        let number = self.elements.first()?.as_number()?;
        let name = self.elements.get(1)?.as_atom()?;
        Some((number, name))
    }

    /// Whether an untagged data response starts with `name` (`SEARCH`, `CAPABILITY`).
    pub fn is_data(&self, name: &str) -> bool {
        self.is_untagged() && self.elements.first().is_some_and(|e| e.is_atom(name))
    }

    /// Parse a response without literals.
    pub fn parse_line(line: &str) -> Result<Self, MessagingError> {
        parse_response(&[ResponseLine {
            line: line.to_string(),
            literal: None,
        }])
    }
}

/// A line of a response, and the literal announced at its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    pub line: String,
    pub literal: Option<Vec<u8>>,
}

/// Bounds on what a server may send in one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseLimits {
    /// Longest line, CRLF included.
    pub max_line_length: usize,
    /// Most literal bytes in one response, summed over all its literals.
    pub max_literal_size: u64,
}

impl Default for ResponseLimits {
    fn default() -> Self {
        Self {
            max_line_length: 64 * 1024,
            max_literal_size: 64 * 1024 * 1024,
        }
    }
}

/// Read one line; if line ends with {N}, return (line, Some(N)) without reading the N bytes.
async fn read_imap_line_literal_size<S>(
    stream: &mut S,
    buf: &mut Vec<u8>,
    max_line_length: usize,
) -> Result<(String, Option<u64>), MessagingError>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    loop {
        let mut b = [0u8; 1];
        let n = stream.read(&mut b).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed").into());
        }
        buf.push(b[0]);
        if buf.len() >= 2 && buf[buf.len() - 2..] == *b"\r\n" {
            break;
        }
        if buf.len() >= max_line_length {
            return Err(MessagingError::protocol(format!(
                "response line exceeds {} bytes",
                max_line_length
            )));
        }
    }
    let line_end = buf.len() - 2;
    let line = String::from_utf8_lossy(&buf[..line_end]).to_string();
    let literal_size = literal_size(&line);
    Ok((line, literal_size))
}

fn literal_size(line: &str) -> Option<u64> {
    let open = line.rfind('{')?;
    line[open + 1..].strip_suffix('}')?.trim().parse().ok()
}

/// Read every line and literal of one response.
///
/// A line or literal total beyond `limits` is a protocol error; the connection is then out
/// of step with the server and should be dropped.
pub async fn read_response<S>(
    stream: &mut S,
    buf: &mut Vec<u8>,
    limits: &ResponseLimits,
) -> Result<ImapResponse, MessagingError>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    let mut literal_total: u64 = 0;
    loop {
        let (line, size) = read_imap_line_literal_size(stream, buf, limits.max_line_length).await?;
        let literal = match size {
            Some(n) => {
                literal_total = literal_total.saturating_add(n);
                if literal_total > limits.max_literal_size {
                    return Err(MessagingError::protocol(format!(
                        "literal of {} bytes exceeds the limit of {}",
                        n, limits.max_literal_size
                    )));
                }
                let len = usize::try_from(n)
                    .map_err(|_| MessagingError::protocol(format!("literal of {} bytes is too large", n)))?;
                let mut data = vec![0u8; len];
                stream.read_exact(&mut data).await?;
                Some(data)
            }
            None => None,
        };
        let done = literal.is_none();
        lines.push(ResponseLine { line, literal });
        if done {
            break;
        }
    }
    let response = parse_response(&lines)?;
    tracing::trace!(tag = ?response.tag, status = ?response.status, "response");
    Ok(response)
}

pub fn parse_response(lines: &[ResponseLine]) -> Result<ImapResponse, MessagingError> {
    let first = lines
        .first()
        .ok_or_else(|| MessagingError::protocol("empty response"))?;
    if let Some(rest) = first.line.strip_prefix('+') {
        return Ok(ImapResponse {
            continuation: true,
            text: rest.trim_start().to_string(),
            ..Default::default()
        });
    }
    let mut tokens = Tokenizer::new(lines);
    let tag = match tokens.next_element()? {
        Some(ImapElement::Atom(tag)) => tag,
        other => return Err(MessagingError::protocol(format!("response without tag: {:?}", other))),
    };
    let mut response = ImapResponse {
        tag: (tag != "*").then_some(tag),
        ..Default::default()
    };
    let status = tokens.peek_atom().and_then(|a| ResponseStatus::from_atom(&a));
    if let Some(status) = status {
        tokens.next_element()?;
        response.status = Some(status);
        tokens.skip_spaces();
        if tokens.peek_byte() == Some(b'[') {
            response.code = Some(tokens.bracketed()?);
        }
        tokens.skip_spaces();
        response.text = tokens.rest_of_line();
        return Ok(response);
    }
    if response.tag.is_some() {
        return Err(MessagingError::protocol("tagged response without status"));
    }
    while let Some(element) = tokens.next_element()? {
        response.elements.push(element);
    }
    Ok(response)
}

/// Walks response lines as one character stream, yielding literals in place of `{n}`.
struct Tokenizer<'a> {
    lines: &'a [ResponseLine],
    line: usize,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(lines: &'a [ResponseLine]) -> Self {
        Self { lines, line: 0, pos: 0 }
    }

    fn current(&self) -> Option<&'a ResponseLine> {
        self.lines.get(self.line)
    }

    /// Whether the tokenizer sits on the `{n}` announcing this line's literal.
    fn at_literal(&self) -> bool {
        match self.current() {
            Some(l) if l.literal.is_some() => {
                let rest = &l.line[self.pos..];
                rest.starts_with('{') && literal_size(rest).is_some() && !rest[1..].contains('{')
            }
            _ => false,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        let l = self.current()?;
        l.line.as_bytes().get(self.pos).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek_byte() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn peek_atom(&self) -> Option<String> {
        let l = self.current()?;
        let rest = l.line[self.pos..].trim_start();
        let end = rest.find([' ', '[', '(', ')']).unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }

    fn rest_of_line(&mut self) -> String {
        let Some(l) = self.current() else {
            return String::new();
        };
        let rest = l.line[self.pos..].to_string();
        self.pos = l.line.len();
        rest
    }

    fn next_element(&mut self) -> Result<Option<ImapElement>, MessagingError> {
        self.skip_spaces();
        if self.at_literal() {
            let literal = self.current().and_then(|l| l.literal.clone()).unwrap_or_default();
            self.line += 1;
            self.pos = 0;
            return Ok(Some(ImapElement::Literal(literal)));
        }
        let Some(b) = self.peek_byte() else {
            return Ok(None);
        };
        match b {
            b'(' => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_spaces();
                    if self.peek_byte() == Some(b')') {
                        self.pos += 1;
                        return Ok(Some(ImapElement::List(items)));
                    }
                    match self.next_element()? {
                        Some(item) => items.push(item),
                        None => return Err(MessagingError::protocol("unterminated list")),
                    }
                }
            }
            b')' => Err(MessagingError::protocol("unexpected ')'")),
            b'"' => self.quoted().map(|s| Some(ImapElement::Quoted(s))),
            _ => {
                let atom = self.atom();
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(Some(ImapElement::Nil))
                } else {
                    Ok(Some(ImapElement::Atom(atom)))
                }
            }
        }
    }

    fn quoted(&mut self) -> Result<String, MessagingError> {
        let l = self
            .current()
            .ok_or_else(|| MessagingError::protocol("unterminated quoted string"))?;
        let bytes = l.line.as_bytes();
        let mut out = Vec::new();
        let mut i = self.pos + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if i + 1 < bytes.len() => {
                    out.push(bytes[i + 1]);
                    i += 2;
                }
                b'"' => {
                    self.pos = i + 1;
                    return Ok(String::from_utf8_lossy(&out).into_owned());
                }
                c => {
                    out.push(c);
                    i += 1;
                }
            }
        }
        Err(MessagingError::protocol("unterminated quoted string"))
    }

    /// Atom characters up to a space or parenthesis, with `[...]` sections taken whole.
    fn atom(&mut self) -> String {
        let Some(l) = self.current() else {
            return String::new();
        };
        let bytes = l.line.as_bytes();
        let start = self.pos;
        let mut depth = 0usize;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'[' => depth += 1,
                b']' if depth > 0 => depth -= 1,
                b' ' | b'(' | b')' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        l.line[start..self.pos].to_string()
    }

    /// Response code text between `[` and the matching `]`.
    fn bracketed(&mut self) -> Result<String, MessagingError> {
        let l = self
            .current()
            .ok_or_else(|| MessagingError::protocol("missing response code"))?;
        let rest = &l.line[self.pos + 1..];
        let end = rest
            .find(']')
            .ok_or_else(|| MessagingError::protocol("unterminated response code"))?;
        self.pos += end + 2;
        Ok(rest[..end].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_responses() {
        let r = ImapResponse::parse_line("A0001 OK [READ-WRITE] SELECT completed").unwrap();
        assert_eq!(r.tag.as_deref(), Some("A0001"));
        assert_eq!(r.status, Some(ResponseStatus::Ok));
        assert_eq!(r.code.as_deref(), Some("READ-WRITE"));
        assert_eq!(r.text, "SELECT completed");

        let r = ImapResponse::parse_line("* OK [COPYUID 38505 304,319:320 3956:3958] Done").unwrap();
        assert!(r.is_untagged());
        assert_eq!(r.code_name(), Some("COPYUID"));
        assert_eq!(r.code_args(), vec!["38505", "304,319:320", "3956:3958"]);

        let r = ImapResponse::parse_line("A0002 NO no such mailbox").unwrap();
        assert_eq!(r.status, Some(ResponseStatus::No));
        assert_eq!(r.code, None);
    }

    #[test]
    fn data_responses() {
        let r = ImapResponse::parse_line("* 23 EXISTS").unwrap();
        assert_eq!(r.number_and_name(), Some((23, "EXISTS")));

        let r = ImapResponse::parse_line("* SEARCH 2 84 882").unwrap();
        assert!(r.is_data("SEARCH"));
        assert_eq!(r.elements.len(), 4);

        let r = ImapResponse::parse_line("* 12 FETCH (UID 40 FLAGS (\\Seen $Forwarded) INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" X NIL)").unwrap();
        let items = r.elements[2].as_list().unwrap();
        assert_eq!(items[1].as_number(), Some(40));
        assert_eq!(items[3].as_list().unwrap().len(), 2);
        assert_eq!(items[5], ImapElement::Quoted("17-Jul-1996 02:44:25 -0700".into()));
        assert_eq!(items[7], ImapElement::Nil);

        let r = ImapResponse::parse_line("+ Ready for literal").unwrap();
        assert!(r.continuation);
        assert_eq!(r.text, "Ready for literal");
    }

    #[test]
    fn sections_stay_in_atom() {
        let r = ImapResponse::parse_line("* 1 FETCH (BODY[HEADER.FIELDS (FROM TO)] \"x\")").unwrap();
        let items = r.elements[2].as_list().unwrap();
        assert_eq!(items[0], ImapElement::Atom("BODY[HEADER.FIELDS (FROM TO)]".into()));
    }

    #[tokio::test]
    async fn reads_literal_from_stream() {
        let data: &[u8] = b"* 1 FETCH (UID 7 BODY[HEADER] {14}\r\nSubject: hi\r\n RFC822.SIZE 300)\r\nA0001 OK done\r\n";
        let mut stream = data;
        let mut buf = Vec::new();
        let r = read_response(&mut stream, &mut buf, &ResponseLimits::default()).await.unwrap();
        let items = r.elements[2].as_list().unwrap();
        assert_eq!(items[3], ImapElement::Literal(b"Subject: hi\r\n ".to_vec()));
        assert_eq!(items[4], ImapElement::Atom("RFC822.SIZE".into()));
        assert_eq!(items[5].as_number(), Some(300));
        let done = read_response(&mut stream, &mut buf, &ResponseLimits::default()).await.unwrap();
        assert_eq!(done.tag.as_deref(), Some("A0001"));
    }

    #[tokio::test]
    async fn closed_stream_is_io_error() {
        let mut stream: &[u8] = b"* 1 EXI";
        let mut buf = Vec::new();
        assert!(matches!(read_response(&mut stream, &mut buf, &ResponseLimits::default()).await, Err(MessagingError::Io(_))));
    }

    #[tokio::test]
    async fn oversized_literal_is_refused_before_allocation() {
        let mut stream: &[u8] = b"* 1 FETCH (BODY[] {4294967295}\r\nxx";
        let mut buf = Vec::new();
        match read_response(&mut stream, &mut buf, &ResponseLimits::default()).await {
            Err(MessagingError::Protocol(message)) => assert!(message.contains("4294967295")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn overlong_line_is_refused() {
        let limits = ResponseLimits {
            max_line_length: 32,
            ..Default::default()
        };
        let line = format!("* OK {}\r\n", "x".repeat(100));
        let mut stream = line.as_bytes();
        let mut buf = Vec::new();
        assert!(matches!(
            read_response(&mut stream, &mut buf, &limits).await,
            Err(MessagingError::Protocol(_))
        ));
        assert!(buf.len() <= 32);

        let mut stream: &[u8] = b"* 3 EXISTS\r\n";
        let r = read_response(&mut stream, &mut buf, &limits).await.unwrap();
        assert!(r.number_and_name().is_some());
    }
}
