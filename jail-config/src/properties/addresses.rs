// SPDX-License-Identifier: GPL-3.0-only

//! IP addresses of jail interfaces (`ip4_addr`, `ip6_addr`)
//!
//! Stored as `<nic>|<address>[/<prefix>]` entries joined by `,`. The words
//! `dhcp` and `accept_rtadv` are accepted in place of an address.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::special::{NamedProperty, SpecialProperty};
use crate::error::{ConfigError, Result};
use crate::helpers::{StringStyle, parse_none, to_string};
use jail_types::Value;

const AUTOCONFIG_WORDS: [&str; 2] = ["dhcp", "accept_rtadv"];

/// IP version selecting property names and address syntax
pub trait AddressFamily: fmt::Debug + Clone + Default + PartialEq + Send + Sync + 'static {
    const ADDRESSES: &'static str;
    const ROUTER: &'static str;
    const MAX_PREFIX: u8;

    fn parse_address(address: &str) -> Option<IpAddr>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ipv4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ipv6;

impl AddressFamily for Ipv4 {
    const ADDRESSES: &'static str = "ip4_addr";
    const ROUTER: &'static str = "defaultrouter";
    const MAX_PREFIX: u8 = 32;

    fn parse_address(address: &str) -> Option<IpAddr> {
        address.parse::<Ipv4Addr>().ok().map(IpAddr::V4)
    }
}

impl AddressFamily for Ipv6 {
    const ADDRESSES: &'static str = "ip6_addr";
    const ROUTER: &'static str = "defaultrouter6";
    const MAX_PREFIX: u8 = 128;

    fn parse_address(address: &str) -> Option<IpAddr> {
        address.parse::<Ipv6Addr>().ok().map(IpAddr::V6)
    }
}

/// Canonical `<address>/<prefix>` form; a missing prefix means a host address
fn parse_interface_address<F: AddressFamily>(input: &str) -> Result<String> {
    let input = input.trim();
    let lower = input.to_ascii_lowercase();
    if AUTOCONFIG_WORDS.contains(&lower.as_str()) {
        return Ok(lower);
    }

    let (address, prefix) = match input.split_once('/') {
        Some((address, prefix)) => {
            let prefix = prefix.parse::<u8>().ok().filter(|p| *p <= F::MAX_PREFIX).ok_or_else(|| {
                ConfigError::invalid(F::ADDRESSES, format!("invalid prefix length in {input:?}"))
            })?;
            (address, prefix)
        }
        None => (input, F::MAX_PREFIX),
    };
    let address = F::parse_address(address)
        .ok_or_else(|| ConfigError::invalid(F::ADDRESSES, format!("invalid address {input:?}")))?;
    Ok(format!("{address}/{prefix}"))
}

/// Addresses per interface, in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Addresses<F: AddressFamily> {
    entries: Vec<(String, Vec<String>)>,
    family: PhantomData<F>,
}

pub type Ipv4Addresses = Addresses<Ipv4>;
pub type Ipv6Addresses = Addresses<Ipv6>;

impl<F: AddressFamily> Addresses<F> {
    /// Add an address to `nic`; duplicates are ignored
    pub fn add(&mut self, nic: &str, address: &str) -> Result<()> {
        if nic.is_empty() {
            return Err(ConfigError::invalid(F::ADDRESSES, format!("missing NIC for {address:?}")));
        }
        let address = parse_interface_address::<F>(address)?;

        match self.entries.iter_mut().find(|(name, _)| name == nic) {
            Some((_, addresses)) => {
                if !addresses.contains(&address) {
                    addresses.push(address);
                }
            }
            None => self.entries.push((nic.to_string(), vec![address])),
        }
        Ok(())
    }

    pub fn remove(&mut self, nic: &str, address: &str) -> Result<bool> {
        let address = parse_interface_address::<F>(address)?;
        let Some(index) = self.entries.iter().position(|(name, _)| name == nic) else {
            return Ok(false);
        };

        let addresses = &mut self.entries[index].1;
        let before = addresses.len();
        addresses.retain(|a| *a != address);
        let removed = addresses.len() != before;
        if addresses.is_empty() {
            self.entries.remove(index);
        }
        Ok(removed)
    }

    /// Drop every address of `nic`
    pub fn remove_nic(&mut self, nic: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(name, _)| name != nic);
        self.entries.len() != before
    }

    pub fn addresses(&self, nic: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == nic)
            .map(|(_, addresses)| addresses.as_slice())
    }

    pub fn nics(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// All addresses across all interfaces
    pub fn networks(&self) -> Vec<&str> {
        self.entries
            .iter()
            .flat_map(|(_, addresses)| addresses.iter().map(String::as_str))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn add_entry(&mut self, entry: &str) -> Result<()> {
        let (nic, address) = entry.split_once('|').ok_or_else(|| {
            ConfigError::invalid(
                F::ADDRESSES,
                format!("invalid entry {entry:?} (should be <nic>|<address>)"),
            )
        })?;
        self.add(nic.trim(), address)
    }
}

impl<F: AddressFamily> NamedProperty for Addresses<F> {
    const NAME: &'static str = F::ADDRESSES;
}

impl<F: AddressFamily> SpecialProperty for Addresses<F> {
    fn name(&self) -> &'static str {
        F::ADDRESSES
    }

    fn set(&mut self, raw: &Value) -> Result<()> {
        let mut parsed = Self::default();

        match raw {
            value if parse_none(value) => {}
            Value::String(s) => {
                for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                    parsed.add_entry(entry)?;
                }
            }
            Value::List(items) => {
                for entry in items {
                    parsed.add_entry(entry)?;
                }
            }
            Value::Map(map) => {
                for (nic, addresses) in map {
                    match addresses {
                        Value::List(items) => {
                            for address in items {
                                parsed.add(nic, address)?;
                            }
                        }
                        value if parse_none(value) => {}
                        value => parsed.add(nic, &to_string(value, StringStyle::DISPLAY))?,
                    }
                }
            }
            other => {
                return Err(ConfigError::invalid(
                    F::ADDRESSES,
                    format!("expected <nic>|<address> entries, found {}", other.type_name()),
                ));
            }
        }

        *self = parsed;
        Ok(())
    }

    fn serialize(&self) -> Value {
        if self.entries.is_empty() {
            return Value::Null;
        }
        let entries: Vec<String> = self
            .entries
            .iter()
            .flat_map(|(nic, addresses)| addresses.iter().map(move |a| format!("{nic}|{a}")))
            .collect();
        Value::String(entries.join(","))
    }

    fn value(&self) -> Value {
        self.serialize()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
