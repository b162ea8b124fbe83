// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Event catalog built from contract ABIs
//!
//! For every monitored contract the catalog holds one [`EventSignature`] per
//! ABI event: its name, canonical text signature (`Name(type1,type2,...)`),
//! topic hash (keccak-256 of that text), parameter list, and a resolved
//! decoder. Lookups by `(address, topic hash)` are O(1) and hand back the
//! decoder directly, so the handler dispatches on the topic without any
//! name-based indirection.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use eventmonitor::EventCatalog;
//! use alloy_primitives::{address, keccak256};
//!
//! let token = address!("1111111111111111111111111111111111111111");
//! let abi = r#"[{"type":"event","name":"Transfer","anonymous":false,"inputs":[
//!     {"name":"from","type":"address","indexed":true},
//!     {"name":"to","type":"address","indexed":true},
//!     {"name":"value","type":"uint256","indexed":false}]}]"#;
//!
//! let catalog = EventCatalog::from_abis(&HashMap::from([(token, abi.to_string())])).unwrap();
//! let topic = keccak256("Transfer(address,address,uint256)");
//!
//! assert_eq!(catalog.event_name(token, topic), Some("Transfer"));
//! assert_eq!(catalog.topic_for(token, "Transfer"), Some(topic));
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    str::FromStr,
    sync::Arc,
};

use alloy_dyn_abi::{DynSolEvent, Specifier};
use alloy_json_abi::Event;
use alloy_primitives::{keccak256, Address, B256};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{CatalogError, DecodeError};
use crate::types::event::DecodedArg;
use crate::types::log::RawLogEntry;

/// One parameter of an event, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventParam {
    /// Parameter name (`arg{i}` when the ABI leaves it blank)
    pub name: String,
    /// Canonical Solidity type
    pub kind: String,
    /// Whether the parameter is carried in a topic
    pub indexed: bool,
}

/// A catalogued event of one contract.
#[derive(Debug, Clone)]
pub struct EventSignature {
    name: String,
    signature: String,
    topic: B256,
    params: Vec<EventParam>,
    decoder: DynSolEvent,
}

impl EventSignature {
    /// Build the signature of an ABI event.
    ///
    /// Anonymous events have no topic hash to match on and are rejected, as
    /// are events whose parameter types don't resolve.
    pub fn from_abi_event(event: &Event) -> Result<Self, String> {
        if event.anonymous {
            return Err(format!("{} is anonymous", event.name));
        }
        let decoder = event.resolve().map_err(|e| e.to_string())?;
        let signature = event.signature();
        let topic = keccak256(signature.as_bytes());

        let params = event
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| EventParam {
                name: if input.name.is_empty() {
                    format!("arg{i}")
                } else {
                    input.name.clone()
                },
                kind: input.selector_type().into_owned(),
                indexed: input.indexed,
            })
            .collect();

        Ok(Self {
            name: event.name.clone(),
            signature,
            topic,
            params,
            decoder,
        })
    }

    /// Event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical text signature, e.g. `Transfer(address,address,uint256)`.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// keccak-256 of the canonical signature.
    pub fn topic(&self) -> B256 {
        self.topic
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> &[EventParam] {
        &self.params
    }

    /// Decode a log of this event into named arguments.
    pub fn decode(&self, entry: &RawLogEntry) -> Result<Vec<DecodedArg>, DecodeError> {
        let decoded = self
            .decoder
            .decode_log_parts(entry.topics.iter().copied(), &entry.data)
            .map_err(|e| DecodeError::abi_mismatch(&self.name, e.to_string()))?;

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();

        self.params
            .iter()
            .map(|param| {
                let value = if param.indexed {
                    indexed.next()
                } else {
                    body.next()
                };
                value
                    .map(|value| DecodedArg {
                        name: param.name.clone(),
                        value,
                    })
                    .ok_or_else(|| {
                        DecodeError::abi_mismatch(
                            &self.name,
                            format!("no value decoded for {}", param.name),
                        )
                    })
            })
            .collect()
    }
}

/// Per-contract event signatures with a topic index.
#[derive(Debug, Clone, Default)]
pub struct EventCatalog {
    contracts: BTreeMap<Address, Vec<Arc<EventSignature>>>,
    by_topic: HashMap<(Address, B256), Arc<EventSignature>>,
}

impl EventCatalog {
    /// Build the catalog from one ABI document per contract.
    ///
    /// A document is a JSON array of ABI entries, or a JSON string holding
    /// such an array (the shape block explorers return). Entries that are not
    /// events are ignored; malformed event entries are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::AbiMalformed`] if a document is not an array.
    pub fn from_abis(abis: &HashMap<Address, String>) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        // Sorted so that catalogs built from the same documents are identical
        let sorted: BTreeMap<_, _> = abis.iter().collect();
        for (address, document) in sorted {
            catalog.insert_contract(*address, document)?;
        }
        Ok(catalog)
    }

    fn insert_contract(&mut self, address: Address, document: &str) -> Result<(), CatalogError> {
        let entries = parse_abi_entries(document)
            .map_err(|details| CatalogError::abi_malformed(address, details))?;

        let mut signatures = Vec::new();
        for (position, entry) in entries.into_iter().enumerate() {
            if entry.get("type").and_then(Value::as_str) != Some("event") {
                continue;
            }
            match parse_event(entry).and_then(|event| EventSignature::from_abi_event(&event)) {
                Ok(signature) => {
                    debug!(
                        contract = %address,
                        event = signature.name(),
                        signature = signature.signature(),
                        topic = %signature.topic(),
                        "Catalogued event"
                    );
                    let signature = Arc::new(signature);
                    self.by_topic
                        .insert((address, signature.topic()), signature.clone());
                    signatures.push(signature);
                }
                Err(reason) => {
                    warn!(contract = %address, position, reason, "Skipping ABI event entry");
                }
            }
        }

        self.contracts.insert(address, signatures);
        Ok(())
    }

    /// Contracts in the catalog, in address order.
    pub fn contracts(&self) -> impl Iterator<Item = Address> + '_ {
        self.contracts.keys().copied()
    }

    /// Events of a contract in ABI order; empty for unknown contracts.
    pub fn events(&self, address: Address) -> &[Arc<EventSignature>] {
        self.contracts
            .get(&address)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The event a contract's log with this topic hash belongs to.
    pub fn lookup(&self, address: Address, topic: B256) -> Option<&Arc<EventSignature>> {
        self.by_topic.get(&(address, topic))
    }

    /// Name of the event with this topic hash.
    pub fn event_name(&self, address: Address, topic: B256) -> Option<&str> {
        self.lookup(address, topic).map(|signature| signature.name())
    }

    /// Topic hash of the first event named `name` in a contract's ABI.
    pub fn topic_for(&self, address: Address, name: &str) -> Option<B256> {
        self.events(address)
            .iter()
            .find(|signature| signature.name() == name)
            .map(|signature| signature.topic())
    }

    /// Total number of catalogued events across all contracts.
    pub fn len(&self) -> usize {
        self.by_topic.len()
    }

    /// Whether no event was catalogued.
    pub fn is_empty(&self) -> bool {
        self.by_topic.is_empty()
    }
}

fn parse_abi_entries(document: &str) -> Result<Vec<Value>, String> {
    let value: Value = serde_json::from_str(document).map_err(|e| e.to_string())?;
    match value {
        Value::Array(entries) => Ok(entries),
        Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(_) => Err("ABI string does not hold an array".to_string()),
            Err(e) => Err(e.to_string()),
        },
        _ => Err("ABI document is not an array".to_string()),
    }
}

fn parse_event(mut entry: Value) -> Result<Event, String> {
    if entry.get("name").and_then(Value::as_str).is_none() {
        return Err("event entry has no name".to_string());
    }
    let Some(object) = entry.as_object_mut() else {
        return Err("event entry is not an object".to_string());
    };
    let Some(Value::Array(inputs)) = object.get_mut("inputs") else {
        return Err("event entry has no inputs".to_string());
    };
    // Hand-written ABIs often leave these out
    for input in inputs.iter_mut().filter_map(Value::as_object_mut) {
        input.entry("indexed").or_insert(Value::Bool(false));
        input.entry("name").or_insert(Value::String(String::new()));
    }
    object.entry("anonymous").or_insert(Value::Bool(false));
    serde_json::from_value(entry).map_err(|e| e.to_string())
}

/// Parse and de-duplicate contract identifiers, keeping the caller's order.
///
/// Accepts hex addresses in any letter case, with or without checksum.
///
/// # Errors
///
/// Fails on the first identifier that is not a 20-byte hex address, or if the
/// list is empty.
///
/// # Example
///
/// ```rust
/// use eventmonitor::normalize_addresses;
///
/// let addresses = normalize_addresses(&[
///     "0x1111111111111111111111111111111111111111",
///     "0x1111111111111111111111111111111111111111",
/// ]).unwrap();
/// assert_eq!(addresses.len(), 1);
///
/// assert!(normalize_addresses(&["0x1234"]).is_err());
/// ```
pub fn normalize_addresses<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<Address>, CatalogError> {
    if inputs.is_empty() {
        return Err(CatalogError::EmptyInput { what: "contracts" });
    }

    let mut addresses: Vec<Address> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let raw = input.as_ref().trim();
        let address = Address::from_str(raw).map_err(|e| CatalogError::InvalidAddress {
            input: raw.to_string(),
            reason: e.to_string(),
        })?;
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }
    Ok(addresses)
}

/// Validate an event-name allow-list: trimmed, non-blank, de-duplicated.
pub fn normalize_event_names<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<String>, CatalogError> {
    if inputs.is_empty() {
        return Err(CatalogError::EmptyInput { what: "event names" });
    }

    let mut names: Vec<String> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let name = input.as_ref().trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidEventName {
                name: input.as_ref().to_string(),
            });
        }
        if !names.iter().any(|known| known == name) {
            names.push(name.to_string());
        }
    }
    Ok(names)
}
