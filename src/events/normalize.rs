// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! JSON rendering of decoded ABI values
//!
//! Integers render as decimal strings so 256-bit values survive consumers that
//! parse JSON numbers as doubles. Addresses render checksummed, byte strings as
//! `0x` hex.

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::hex;
use serde_json::Value;

/// Render a decoded value as JSON.
pub fn to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(hex::encode_prefixed(&word[..(*size).min(32)]))
        }
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Function(function) => Value::String(hex::encode_prefixed(function)),
        DynSolValue::Bytes(bytes) => Value::String(hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(values)
        | DynSolValue::FixedArray(values)
        | DynSolValue::Tuple(values) => Value::Array(values.iter().map(to_json).collect()),
        #[allow(unreachable_patterns)]
        other => Value::String(format!("{other:?}")),
    }
}
