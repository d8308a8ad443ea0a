/*
 * config.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Carteggio.
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

//! Core configuration: body storage, rendering preference, IMAP command and response
//! limits and crypto settings, stored as XML in ~/.carteggio/config.xml.
//! All XML read/write uses the quick_xml parser/writer; no regex or hand parsing.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use crate::mime::{BodyFactory, DEFAULT_MEMORY_THRESHOLD};
use crate::protocol::imap::{CommandLimits, ResponseLimits};
use crate::store::MessagingError;
use crate::view::ViewOptions;

const ROOT_ELEMENT: &str = "carteggio";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Directory for temp-file bodies; None uses the system temp directory.
    pub temp_directory: Option<PathBuf>,
    /// Leaf bodies larger than this are kept in temp files.
    pub memory_body_threshold: usize,
    pub prefer_html: bool,
    pub command_length_limit: usize,
    pub condstore_command_length_limit: usize,
    /// Longest IMAP response line accepted from a server.
    pub max_response_line_length: usize,
    /// Most literal bytes accepted in one IMAP response.
    pub max_literal_size: u64,
    /// Identifier of the OpenPGP provider; None when none is configured.
    pub openpgp_provider: Option<String>,
    /// Verify signed-only (unencrypted) parts.
    pub process_signed_only: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        let limits = CommandLimits::default();
        let response_limits = ResponseLimits::default();
        Self {
            temp_directory: None,
            memory_body_threshold: DEFAULT_MEMORY_THRESHOLD,
            prefer_html: true,
            command_length_limit: limits.default_limit,
            condstore_command_length_limit: limits.condstore_limit,
            max_response_line_length: response_limits.max_line_length,
            max_literal_size: response_limits.max_literal_size,
            openpgp_provider: None,
            process_signed_only: true,
        }
    }
}

impl CoreConfig {
    /// Factory for bodies created while parsing, honouring the temp directory and threshold.
    pub fn body_factory(&self) -> BodyFactory {
        let dir = self.temp_directory.clone().unwrap_or_else(std::env::temp_dir);
        BodyFactory::new(Some(dir), self.memory_body_threshold)
    }

    pub fn command_limits(&self) -> CommandLimits {
        CommandLimits {
            default_limit: self.command_length_limit,
            condstore_limit: self.condstore_command_length_limit,
        }
    }

    pub fn response_limits(&self) -> ResponseLimits {
        ResponseLimits {
            max_line_length: self.max_response_line_length,
            max_literal_size: self.max_literal_size,
        }
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            openpgp_provider_configured: self.openpgp_provider.is_some(),
            prefer_html: self.prefer_html,
        }
    }
}

/// Default config directory: ~/.carteggio.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from).map(|h| h.join(".carteggio"))
}

/// Default config path: ~/.carteggio/config.xml.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|d| d.join("config.xml"))
}

/// Load configuration from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<CoreConfig, MessagingError> {
    match fs::read_to_string(path) {
        Ok(content) => load_config_from_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(CoreConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Parse configuration XML. Unknown elements are ignored.
pub fn load_config_from_str(content: &str) -> Result<CoreConfig, MessagingError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut config = CoreConfig::default();
    let mut element_name = Vec::<u8>::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(MessagingError::Config(format!("XML parse error: {}", e))),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                element_name.clear();
                element_name.extend_from_slice(e.name().as_ref());
            }
            Ok(Event::Text(e)) => {
                if element_name.is_empty() {
                    continue;
                }
                let text = e
                    .unescape()
                    .map_err(|e| MessagingError::Config(e.to_string()))?
                    .trim()
                    .to_string();
                apply_setting(&mut config, &element_name, text)?;
                element_name.clear();
            }
            Ok(Event::End(_)) => element_name.clear(),
            _ => {}
        }
        buf.clear();
    }
    Ok(config)
}

fn apply_setting(config: &mut CoreConfig, name: &[u8], text: String) -> Result<(), MessagingError> {
    match name {
        b"temp-directory" => config.temp_directory = (!text.is_empty()).then(|| PathBuf::from(text)),
        b"memory-body-threshold" => config.memory_body_threshold = parse_number(name, &text)?,
        b"prefer-html" => config.prefer_html = parse_bool(name, &text)?,
        b"command-length-limit" => config.command_length_limit = parse_number(name, &text)?,
        b"condstore-command-length-limit" => config.condstore_command_length_limit = parse_number(name, &text)?,
        b"max-response-line-length" => config.max_response_line_length = parse_number(name, &text)?,
        b"max-literal-size" => config.max_literal_size = parse_number(name, &text)?,
        b"openpgp-provider" => config.openpgp_provider = (!text.is_empty()).then_some(text),
        b"process-signed-only" => config.process_signed_only = parse_bool(name, &text)?,
        _ => {}
    }
    Ok(())
}

fn parse_number<T: FromStr>(name: &[u8], text: &str) -> Result<T, MessagingError> {
    text.parse().map_err(|_| invalid(name, text))
}

fn parse_bool(name: &[u8], text: &str) -> Result<bool, MessagingError> {
    match text {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(invalid(name, text)),
    }
}

fn invalid(name: &[u8], text: &str) -> MessagingError {
    MessagingError::Config(format!("invalid value {:?} for <{}>", text, String::from_utf8_lossy(name)))
}

fn xml_err(e: impl std::fmt::Display) -> MessagingError {
    MessagingError::Config(e.to_string())
}

/// Write `config` to `path`, creating the parent directory.
pub fn save_config(path: &Path, config: &CoreConfig) -> Result<(), MessagingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, config_xml_to_bytes(config)?)?;
    Ok(())
}

/// Build config XML into a byte vector (UTF-8).
fn config_xml_to_bytes(config: &CoreConfig) -> Result<Vec<u8>, MessagingError> {
    let mut out = Vec::new();
    let mut writer = Writer::new_with_indent(&mut out, b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))
        .map_err(xml_err)?;
    let mut settings: Vec<(&str, String)> = Vec::new();
    if let Some(dir) = &config.temp_directory {
        settings.push(("temp-directory", dir.display().to_string()));
    }
    settings.push(("memory-body-threshold", config.memory_body_threshold.to_string()));
    settings.push(("prefer-html", config.prefer_html.to_string()));
    settings.push(("command-length-limit", config.command_length_limit.to_string()));
    settings.push(("condstore-command-length-limit", config.condstore_command_length_limit.to_string()));
    settings.push(("max-response-line-length", config.max_response_line_length.to_string()));
    settings.push(("max-literal-size", config.max_literal_size.to_string()));
    if let Some(provider) = &config.openpgp_provider {
        settings.push(("openpgp-provider", provider.clone()));
    }
    settings.push(("process-signed-only", config.process_signed_only.to_string()));
    for (name, value) in &settings {
        writer
            .write_event(Event::Start(BytesStart::new(*name)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::Text(BytesText::new(value)))
            .map_err(xml_err)?;
        writer
            .write_event(Event::End(BytesEnd::new(*name)))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))
        .map_err(xml_err)?;
    Ok(out)
}
