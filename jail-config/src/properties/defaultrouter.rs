// SPDX-License-Identifier: GPL-3.0-only

//! Default gateway of a jail (`defaultrouter`, `defaultrouter6`)
//!
//! Stored as `<address>` or `<address>@<nic>` when the route is bound to a
//! static interface.

use std::any::Any;
use std::marker::PhantomData;
use std::net::IpAddr;

use super::addresses::{AddressFamily, Ipv4, Ipv6};
use super::special::{NamedProperty, SpecialProperty};
use crate::error::{ConfigError, Result};
use crate::helpers::parse_none;
use jail_types::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defaultrouter<F: AddressFamily> {
    gateway: Option<IpAddr>,
    static_interface: Option<String>,
    family: PhantomData<F>,
}

pub type Ipv4Defaultrouter = Defaultrouter<Ipv4>;
pub type Ipv6Defaultrouter = Defaultrouter<Ipv6>;

impl<F: AddressFamily> Defaultrouter<F> {
    pub fn gateway(&self) -> Option<IpAddr> {
        self.gateway
    }

    pub fn static_interface(&self) -> Option<&str> {
        self.static_interface.as_deref()
    }

    pub fn set_gateway(&mut self, address: &str, static_interface: Option<&str>) -> Result<()> {
        let gateway = F::parse_address(address.trim())
            .ok_or_else(|| ConfigError::invalid(F::ROUTER, format!("invalid gateway {address:?}")))?;
        self.gateway = Some(gateway);
        self.static_interface = static_interface
            .filter(|nic| !nic.is_empty())
            .map(ToString::to_string);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.gateway = None;
        self.static_interface = None;
    }
}

impl<F: AddressFamily> NamedProperty for Defaultrouter<F> {
    const NAME: &'static str = F::ROUTER;
}

impl<F: AddressFamily> SpecialProperty for Defaultrouter<F> {
    fn name(&self) -> &'static str {
        F::ROUTER
    }

    fn set(&mut self, raw: &Value) -> Result<()> {
        if parse_none(raw) {
            self.clear();
            return Ok(());
        }
        let Value::String(s) = raw else {
            return Err(ConfigError::invalid(
                F::ROUTER,
                format!("expected an address, found {}", raw.type_name()),
            ));
        };

        match s.split_once('@') {
            Some((address, nic)) => self.set_gateway(address, Some(nic)),
            None => self.set_gateway(s, None),
        }
    }

    fn serialize(&self) -> Value {
        match (self.gateway, &self.static_interface) {
            (None, _) => Value::Null,
            (Some(gateway), None) => Value::String(gateway.to_string()),
            (Some(gateway), Some(nic)) => Value::String(format!("{gateway}@{nic}")),
        }
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
