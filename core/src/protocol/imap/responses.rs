/*
 * responses.rs
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

//! Typed results of folder commands, parsed from the responses of every sub-command.

use std::collections::BTreeMap;

use crate::protocol::imap::connection::CommandResponse;
use crate::protocol::imap::id_set::parse_id_set;
use crate::protocol::imap::response::{ImapElement, ImapResponse};
use crate::store::Flag;

/// UIDs (or sequence numbers) matched by a SEARCH.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResponse {
    pub ids: Vec<u64>,
}

impl SearchResponse {
    pub fn parse(responses: &[CommandResponse]) -> Self {
        let ids = responses
            .iter()
            .flat_map(|r| r.untagged.iter())
            .filter(|r| r.is_data("SEARCH"))
            .flat_map(|r| r.elements[1..].iter().filter_map(ImapElement::as_number))
            .collect();
        SearchResponse { ids }
    }
}

/// Source to destination UID mapping from `COPYUID` (RFC 4315).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyUidResponse {
    pub uid_validity: u64,
    pub uid_mapping: BTreeMap<u64, u64>,
}

impl CopyUidResponse {
    /// None when no sub-command reported a usable COPYUID.
    pub fn parse(responses: &[CommandResponse]) -> Option<Self> {
        let mut result: Option<CopyUidResponse> = None;
        let codes = responses
            .iter()
            .flat_map(|r| r.untagged.iter().chain(std::iter::once(&r.completion)));
        for response in codes {
            if !response.is_ok() || !response.code_name().is_some_and(|n| n.eq_ignore_ascii_case("COPYUID")) {
                continue;
            }
            let args = response.code_args();
            let [validity, source, destination] = args.as_slice() else {
                continue;
            };
            let (Ok(validity), Ok(source), Ok(destination)) =
                (validity.parse::<u64>(), parse_id_set(source), parse_id_set(destination))
            else {
                continue;
            };
            if source.len() != destination.len() {
                tracing::debug!(
                    source = source.len(),
                    destination = destination.len(),
                    "ignoring COPYUID with mismatched sets"
                );
                continue;
            }
            let entry = result.get_or_insert_with(|| CopyUidResponse {
                uid_validity: validity,
                ..Default::default()
            });
            entry.uid_mapping.extend(source.into_iter().zip(destination));
        }
        result
    }
}

/// Flags reported back by a non-silent STORE, keyed by UID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreResponse {
    pub flags: BTreeMap<u64, Vec<Flag>>,
}

impl StoreResponse {
    pub fn parse(responses: &[CommandResponse]) -> Self {
        let flags = FetchResponse::parse_all(responses)
            .into_iter()
            .filter_map(|f| Some((f.uid?, f.flags?)))
            .collect();
        StoreResponse { flags }
    }
}

/// One untagged FETCH response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub sequence_number: u64,
    pub uid: Option<u64>,
    pub flags: Option<Vec<Flag>>,
    /// INTERNALDATE as sent (`17-Jul-1996 02:44:25 -0700`).
    pub internal_date: Option<String>,
    pub size: Option<u64>,
    /// Data of the first `BODY[...]` item, typically a header section.
    pub body_section: Option<Vec<u8>>,
}

impl FetchResponse {
    pub fn parse(response: &ImapResponse) -> Option<Self> {
        let (sequence_number, name) = response.number_and_name()?;
        if !name.eq_ignore_ascii_case("FETCH") {
            return None;
        }
        let items = response.elements.get(2)?.as_list()?;
        let mut fetch = FetchResponse {
            sequence_number,
            ..Default::default()
        };
        for pair in items.chunks(2) {
            let [key, value] = pair else {
                break;
            };
            let Some(key) = key.as_atom() else {
                continue;
            };
            let upper = key.to_ascii_uppercase();
            match upper.as_str() {
                "UID" => fetch.uid = value.as_number(),
                "FLAGS" => {
                    fetch.flags = value
                        .as_list()
                        .map(|l| l.iter().filter_map(ImapElement::as_str).map(Flag::from_imap).collect())
                }
                "INTERNALDATE" => fetch.internal_date = value.as_str().map(str::to_string),
                "RFC822.SIZE" => fetch.size = value.as_number(),
                _ if upper.starts_with("BODY[") && fetch.body_section.is_none() => {
                    fetch.body_section = value.as_bytes().map(<[u8]>::to_vec)
                }
                _ => {}
            }
        }
        Some(fetch)
    }

    pub fn parse_all(responses: &[CommandResponse]) -> Vec<Self> {
        responses
            .iter()
            .flat_map(|r| r.untagged.iter())
            .filter_map(FetchResponse::parse)
            .collect()
    }
}
