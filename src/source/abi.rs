// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! ABI sources backed by memory or by files on disk.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use alloy_primitives::Address;
use async_trait::async_trait;
use tracing::debug;

use crate::errors::CatalogError;

use super::AbiSource;

/// ABI documents held in memory.
///
/// # Example
///
/// ```rust
/// use eventmonitor::StaticAbiSource;
/// use alloy_primitives::Address;
///
/// let source = StaticAbiSource::new().with_abi(Address::ZERO, "[]");
/// assert_eq!(source.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticAbiSource {
    abis: HashMap<Address, String>,
}

impl StaticAbiSource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the ABI of `address`.
    pub fn with_abi(mut self, address: Address, abi: impl Into<String>) -> Self {
        self.abis.insert(address, abi.into());
        self
    }

    /// Number of contracts with an ABI.
    pub fn len(&self) -> usize {
        self.abis.len()
    }

    /// Whether no ABI is held.
    pub fn is_empty(&self) -> bool {
        self.abis.is_empty()
    }
}

impl FromIterator<(Address, String)> for StaticAbiSource {
    fn from_iter<I: IntoIterator<Item = (Address, String)>>(iter: I) -> Self {
        Self {
            abis: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl AbiSource for StaticAbiSource {
    async fn contract_abis(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, String>, CatalogError> {
        addresses
            .iter()
            .map(|address| {
                self.abis
                    .get(address)
                    .map(|abi| (*address, abi.clone()))
                    .ok_or_else(|| CatalogError::abi_unavailable(*address, "no ABI registered"))
            })
            .collect()
    }
}

/// ABI documents stored as `<address>.json` files in one directory.
///
/// The checksummed file name is tried first, then the lowercase one.
#[derive(Debug, Clone)]
pub struct AbiDirectory {
    root: PathBuf,
}

impl AbiDirectory {
    /// Serve ABIs from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory the ABIs are read from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, address: Address) -> [PathBuf; 2] {
        [
            self.root.join(format!("{}.json", address.to_checksum(None))),
            self.root.join(format!("{address:#x}.json")),
        ]
    }

    async fn read(&self, address: Address) -> Result<String, CatalogError> {
        for path in self.candidates(address) {
            match tokio::fs::read_to_string(&path).await {
                Ok(abi) => {
                    debug!(contract = %address, path = %path.display(), "Loaded ABI");
                    return Ok(abi);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(CatalogError::abi_unavailable(
                        address,
                        format!("{}: {e}", path.display()),
                    ))
                }
            }
        }
        Err(CatalogError::abi_unavailable(
            address,
            format!("no ABI file in {}", self.root.display()),
        ))
    }
}

#[async_trait]
impl AbiSource for AbiDirectory {
    async fn contract_abis(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, String>, CatalogError> {
        let mut abis = HashMap::with_capacity(addresses.len());
        for address in addresses {
            abis.insert(*address, self.read(*address).await?);
        }
        Ok(abis)
    }
}
