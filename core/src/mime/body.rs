/*
 * body.rs
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

//! Leaf bodies and transfer encodings.
//!
//! A `Binary` body keeps its bytes in one of three places: decoded in memory, already encoded
//! in memory (raw data as received, e.g. a FETCH literal), or already encoded in an exclusive
//! temp file. Writing a body always produces bytes in its declared encoding.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tempfile::{NamedTempFile, TempPath};

use crate::mime::part::{Multipart, PartId};
use crate::mime::{base64, quoted_printable};

/// Leaf bodies up to this size stay in memory when parsing.
pub const DEFAULT_MEMORY_THRESHOLD: usize = 64 * 1024;

const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    QuotedPrintable,
    Base64,
    Binary,
}

impl TransferEncoding {
    /// Parse a Content-Transfer-Encoding value; unknown mechanisms yield None.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "7bit" => Some(Self::SevenBit),
            "8bit" => Some(Self::EightBit),
            "quoted-printable" => Some(Self::QuotedPrintable),
            "base64" => Some(Self::Base64),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::QuotedPrintable => "quoted-printable",
            Self::Base64 => "base64",
            Self::Binary => "binary",
        }
    }

    /// Whether bytes on the wire differ from the content.
    pub fn is_encoding(self) -> bool {
        matches!(self, Self::QuotedPrintable | Self::Base64)
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn encode(data: &[u8], encoding: TransferEncoding) -> Vec<u8> {
    match encoding {
        TransferEncoding::QuotedPrintable => quoted_printable::encode(data),
        TransferEncoding::Base64 => base64::encode(data),
        _ => data.to_vec(),
    }
}

pub fn decode(data: &[u8], encoding: TransferEncoding) -> Vec<u8> {
    let mut out = Vec::new();
    let mut reader = DecodingReader::new(data, encoding);
    // Reading from a slice cannot fail.
    let _ = reader.read_to_end(&mut out);
    out
}

/// Text content held as a string; encoded (UTF-8, then transfer encoding) on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBody {
    text: String,
    encoding: TransferEncoding,
}

impl TextBody {
    /// New text body; quoted-printable unless changed.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            encoding: TransferEncoding::QuotedPrintable,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: TransferEncoding) {
        self.encoding = encoding;
    }

    pub fn encoded_bytes(&self) -> Vec<u8> {
        encode(self.text.as_bytes(), self.encoding)
    }
}

#[derive(Debug, Clone)]
pub enum BinaryStorage {
    /// Decoded content; encoded on write.
    Memory(Bytes),
    /// Encoded content in an exclusive temp file.
    TempFile(TempFileBody),
    /// Encoded content as received.
    Raw(Bytes),
}

#[derive(Debug, Clone)]
pub struct BinaryBody {
    storage: BinaryStorage,
    encoding: TransferEncoding,
}

impl BinaryBody {
    pub fn memory(data: impl Into<Bytes>, encoding: TransferEncoding) -> Self {
        Self {
            storage: BinaryStorage::Memory(data.into()),
            encoding,
        }
    }

    pub fn raw(data: impl Into<Bytes>, encoding: TransferEncoding) -> Self {
        Self {
            storage: BinaryStorage::Raw(data.into()),
            encoding,
        }
    }

    pub fn temp_file(body: TempFileBody, encoding: TransferEncoding) -> Self {
        Self {
            storage: BinaryStorage::TempFile(body),
            encoding,
        }
    }

    pub fn storage(&self) -> &BinaryStorage {
        &self.storage
    }

    pub fn encoding(&self) -> TransferEncoding {
        self.encoding
    }

    /// Change the transfer encoding. Encoded storage is decoded into memory first so the
    /// content survives; the new encoding is applied when the body is written.
    pub fn set_encoding(&mut self, encoding: TransferEncoding) -> io::Result<()> {
        if encoding == self.encoding {
            return Ok(());
        }
        if !matches!(self.storage, BinaryStorage::Memory(_)) {
            let decoded = self.decoded_bytes()?;
            self.storage = BinaryStorage::Memory(Bytes::from(decoded));
        }
        self.encoding = encoding;
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        match &self.storage {
            BinaryStorage::TempFile(t) => t.is_available(),
            _ => true,
        }
    }

    /// Bytes as they go on the wire.
    pub fn open_encoded(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(match &self.storage {
            BinaryStorage::Memory(b) => Box::new(Cursor::new(encode(b, self.encoding))),
            BinaryStorage::Raw(b) => Box::new(Cursor::new(b.clone())),
            BinaryStorage::TempFile(t) => Box::new(t.open()?),
        })
    }

    /// Content with the transfer encoding removed.
    pub fn decoded_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(match &self.storage {
            BinaryStorage::Memory(b) => Box::new(Cursor::new(b.clone())),
            BinaryStorage::Raw(b) => Box::new(DecodingReader::new(Cursor::new(b.clone()), self.encoding)),
            BinaryStorage::TempFile(t) => Box::new(DecodingReader::new(t.open()?, self.encoding)),
        })
    }

    pub fn decoded_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.decoded_reader()?.read_to_end(&mut out)?;
        Ok(out)
    }

    pub fn decoded_size(&self) -> io::Result<u64> {
        match &self.storage {
            BinaryStorage::Memory(b) => Ok(b.len() as u64),
            _ => io::copy(&mut self.decoded_reader()?, &mut io::sink()),
        }
    }
}

/// Body of a MIME part.
#[derive(Debug, Clone)]
pub enum Body {
    Text(TextBody),
    Binary(BinaryBody),
    Multipart(Multipart),
    /// Nested message (`message/rfc822`), a part in the same tree.
    Message(PartId),
}

impl Body {
    pub fn text(text: impl Into<String>) -> Self {
        Body::Text(TextBody::new(text))
    }

    /// Transfer encoding of a leaf body.
    pub fn encoding(&self) -> Option<TransferEncoding> {
        match self {
            Body::Text(t) => Some(t.encoding()),
            Body::Binary(b) => Some(b.encoding()),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Body::Text(_) | Body::Binary(_))
    }

    pub fn is_available(&self) -> bool {
        match self {
            Body::Binary(b) => b.is_available(),
            _ => true,
        }
    }

    /// Decoded content of a leaf body.
    pub fn decoded_bytes(&self) -> io::Result<Vec<u8>> {
        match self {
            Body::Text(t) => Ok(t.text().as_bytes().to_vec()),
            Body::Binary(b) => b.decoded_bytes(),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "container body has no content")),
        }
    }

    pub fn decoded_reader(&self) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Body::Text(t) => Ok(Box::new(Cursor::new(t.text().as_bytes().to_vec()))),
            Body::Binary(b) => b.decoded_reader(),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "container body has no content")),
        }
    }
}

/// Encoded content in a temp file owned exclusively by the body.
///
/// Clones share the file. The file is deleted when the reader from
/// [`open_terminal_reader`](Self::open_terminal_reader) is dropped; after that every open
/// fails with an I/O error.
#[derive(Debug, Clone)]
pub struct TempFileBody {
    path: Arc<Mutex<Option<TempPath>>>,
    size: u64,
}

impl TempFileBody {
    /// Write `data` to a new temp file in `dir` (system temp dir when None).
    pub fn create_in(dir: Option<&Path>, data: &[u8]) -> io::Result<Self> {
        let mut file = match dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new()?,
        };
        file.write_all(data)?;
        file.flush()?;
        Ok(Self {
            path: Arc::new(Mutex::new(Some(file.into_temp_path()))),
            size: data.len() as u64,
        })
    }

    /// Size of the stored (encoded) bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_available(&self) -> bool {
        self.lock().is_some()
    }

    pub fn open(&self) -> io::Result<File> {
        match &*self.lock() {
            Some(path) => File::open(path),
            None => Err(consumed()),
        }
    }

    /// Open the file for a last read; it is removed once the returned reader is dropped.
    pub fn open_terminal_reader(&self) -> io::Result<TerminalReader> {
        let path = self.lock().take().ok_or_else(consumed)?;
        let file = File::open(&path)?;
        Ok(TerminalReader { file, _path: path })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<TempPath>> {
        self.path.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn consumed() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "temp file body has been consumed")
}

/// Reader over a temp file that deletes the file on drop.
#[derive(Debug)]
pub struct TerminalReader {
    file: File,
    _path: TempPath,
}

impl Read for TerminalReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Streams transfer-decoded content out of an encoded reader.
pub struct DecodingReader<R> {
    inner: R,
    encoding: TransferEncoding,
    src: Vec<u8>,
    src_pos: usize,
    out: Vec<u8>,
    out_pos: usize,
    eof: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: TransferEncoding) -> Self {
        Self {
            inner,
            encoding,
            src: Vec::new(),
            src_pos: 0,
            out: Vec::new(),
            out_pos: 0,
            eof: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        self.src.drain(..self.src_pos);
        self.src_pos = 0;
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.inner.read(&mut chunk)?;
        if n == 0 {
            self.eof = true;
        } else {
            self.src.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    fn decode_available(&mut self) {
        let remaining = self.src.len() - self.src_pos;
        self.out.clear();
        self.out.resize(remaining + 3, 0);
        self.out_pos = 0;
        let mut dst_pos = 0;
        let mut src_pos = self.src_pos;
        match self.encoding {
            TransferEncoding::Base64 => {
                base64::decode(&self.src, &mut src_pos, &mut self.out, &mut dst_pos, remaining + 3, self.eof);
            }
            TransferEncoding::QuotedPrintable => {
                quoted_printable::decode(&self.src, &mut src_pos, &mut self.out, &mut dst_pos, remaining + 3, self.eof);
            }
            _ => {
                self.out[..remaining].copy_from_slice(&self.src[src_pos..]);
                dst_pos = remaining;
                src_pos = self.src.len();
            }
        }
        self.out.truncate(dst_pos);
        self.src_pos = if self.eof && dst_pos == 0 { self.src.len() } else { src_pos };
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.out_pos < self.out.len() {
                let n = buf.len().min(self.out.len() - self.out_pos);
                buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                return Ok(n);
            }
            if self.eof && self.src_pos >= self.src.len() {
                return Ok(0);
            }
            if !self.eof {
                self.fill()?;
            }
            self.decode_available();
        }
    }
}

/// Builds leaf bodies for parsed parts: small ones in memory, large ones in temp files.
#[derive(Debug, Clone)]
pub struct BodyFactory {
    temp_directory: Option<PathBuf>,
    memory_threshold: usize,
}

impl Default for BodyFactory {
    fn default() -> Self {
        Self {
            temp_directory: None,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
        }
    }
}

impl BodyFactory {
    pub fn new(temp_directory: Option<PathBuf>, memory_threshold: usize) -> Self {
        Self {
            temp_directory,
            memory_threshold,
        }
    }

    pub fn temp_directory(&self) -> Option<&Path> {
        self.temp_directory.as_deref()
    }

    pub fn memory_threshold(&self) -> usize {
        self.memory_threshold
    }

    /// Body for encoded bytes as received.
    pub fn create_body(&self, data: Vec<u8>, encoding: TransferEncoding) -> io::Result<Body> {
        if data.len() > self.memory_threshold {
            let file = TempFileBody::create_in(self.temp_directory(), &data)?;
            return Ok(Body::Binary(BinaryBody::temp_file(file, encoding)));
        }
        Ok(Body::Binary(BinaryBody::raw(data, encoding)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_names() {
        assert_eq!(TransferEncoding::parse(" Base64 "), Some(TransferEncoding::Base64));
        assert_eq!(TransferEncoding::parse("x-uuencode"), None);
        assert_eq!(TransferEncoding::QuotedPrintable.to_string(), "quoted-printable");
    }

    #[test]
    fn decoding_reader_small_reads() {
        let encoded = base64::encode(&[7u8; 5000]);
        let mut reader = DecodingReader::new(Cursor::new(encoded), TransferEncoding::Base64);
        let mut out = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, vec![7u8; 5000]);
    }

    #[test]
    fn set_encoding_reencodes() {
        let mut body = BinaryBody::raw(&b"aGVsbG8=\r\n"[..], TransferEncoding::Base64);
        body.set_encoding(TransferEncoding::QuotedPrintable).unwrap();
        let mut wire = Vec::new();
        body.open_encoded().unwrap().read_to_end(&mut wire).unwrap();
        assert_eq!(wire, b"hello");
        assert_eq!(body.decoded_size().unwrap(), 5);
    }

    #[test]
    fn temp_file_is_deleted_after_terminal_read() {
        let dir = tempfile::tempdir().unwrap();
        let body = TempFileBody::create_in(Some(dir.path()), b"payload").unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        let mut content = String::new();
        body.open_terminal_reader().unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "payload");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert!(!body.is_available());
        assert!(body.open().is_err());
        assert!(body.open_terminal_reader().is_err());
    }

    #[test]
    fn factory_spills_large_bodies() {
        let dir = tempfile::tempdir().unwrap();
        let factory = BodyFactory::new(Some(dir.path().to_path_buf()), 4);
        match factory.create_body(b"tiny".to_vec(), TransferEncoding::SevenBit).unwrap() {
            Body::Binary(b) => assert!(matches!(b.storage(), BinaryStorage::Raw(_))),
            other => panic!("unexpected body {:?}", other),
        }
        match factory.create_body(b"larger".to_vec(), TransferEncoding::SevenBit).unwrap() {
            Body::Binary(b) => {
                assert!(matches!(b.storage(), BinaryStorage::TempFile(_)));
                assert_eq!(b.decoded_bytes().unwrap(), b"larger");
            }
            other => panic!("unexpected body {:?}", other),
        }
    }
}
