// SPDX-License-Identifier: GPL-3.0-only

//! RCTL resource limits, one property per resource
//!
//! Accepted forms are `<amount>` (deny, per jail), `<amount>:<action>`
//! (per jail) and the rctl syntax `<action>=<amount>[/<per>]`. Per-jail limits
//! are stored in the short legacy form.

use std::any::Any;

use super::special::SpecialProperty;
use crate::error::{ConfigError, Result};
use crate::helpers::parse_none;
use jail_types::Value;

pub static RESOURCE_LIMITS: [&str; 25] = [
    "cputime",
    "datasize",
    "stacksize",
    "coredumpsize",
    "memoryuse",
    "memorylocked",
    "maxproc",
    "openfiles",
    "vmemoryuse",
    "pseudoterminals",
    "swapuse",
    "nthr",
    "msgqqueued",
    "msgqsize",
    "nmsgq",
    "nsem",
    "nsemop",
    "nshm",
    "shmsize",
    "wallclock",
    "pcpu",
    "readbps",
    "writebps",
    "readiops",
    "writeiops",
];

const DEFAULT_ACTION: &str = "deny";
const DEFAULT_PER: &str = "jail";

pub fn is_resource_limit(name: &str) -> bool {
    RESOURCE_LIMITS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub amount: String,
    pub action: String,
    pub per: String,
}

impl Limit {
    /// Limit in rctl rule syntax
    pub fn rctl_string(&self) -> String {
        format!("{}={}/{}", self.action, self.amount, self.per)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimit {
    name: &'static str,
    limit: Option<Limit>,
}

impl ResourceLimit {
    /// Unset limit of one of [`RESOURCE_LIMITS`]
    pub fn new(name: &'static str) -> Self {
        Self { name, limit: None }
    }

    pub fn limit(&self) -> Option<&Limit> {
        self.limit.as_ref()
    }

    pub fn is_unset(&self) -> bool {
        self.limit.is_none()
    }

    pub fn set_limit(&mut self, amount: &str, action: &str, per: &str) -> Result<()> {
        self.limit = Some(self.build(amount, action, per)?);
        Ok(())
    }

    fn build(&self, amount: &str, action: &str, per: &str) -> Result<Limit> {
        if amount.is_empty() || action.is_empty() || per.is_empty() {
            return Err(ConfigError::invalid(self.name, "amount, action and per may not be empty"));
        }
        Ok(Limit {
            amount: amount.to_string(),
            action: action.to_string(),
            per: per.to_string(),
        })
    }

    fn parse(&self, value: &str) -> Result<Limit> {
        if let Some((action, rest)) = value.split_once('=') {
            let (amount, per) = rest.split_once('/').unwrap_or((rest, DEFAULT_PER));
            self.build(amount, action, per)
        } else if let Some((amount, action)) = value.split_once(':') {
            self.build(amount, action, DEFAULT_PER)
        } else {
            self.build(value, DEFAULT_ACTION, DEFAULT_PER)
        }
    }
}

impl SpecialProperty for ResourceLimit {
    fn name(&self) -> &'static str {
        self.name
    }

    fn set(&mut self, raw: &Value) -> Result<()> {
        let limit = match raw {
            value if parse_none(value) => None,
            Value::String(s) if s == "None=None/None" => None,
            Value::String(s) => Some(self.parse(s.trim())?),
            Value::Int(i) => Some(self.parse(&i.to_string())?),
            other => {
                return Err(ConfigError::invalid(
                    self.name,
                    format!("expected a resource limit, found {}", other.type_name()),
                ));
            }
        };
        self.limit = limit;
        Ok(())
    }

    fn serialize(&self) -> Value {
        match &self.limit {
            None => Value::Null,
            Some(limit) if limit.per == DEFAULT_PER => {
                Value::String(format!("{}:{}", limit.amount, limit.action))
            }
            Some(limit) => Value::String(limit.rctl_string()),
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

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(raw: Value) -> Result<ResourceLimit> {
        let mut limit = ResourceLimit::new("memoryuse");
        limit.set(&raw)?;
        Ok(limit)
    }

    #[test]
    fn accepted_notations() {
        let amount_only = limit(Value::from("8G")).unwrap();
        assert_eq!(amount_only.limit().map(Limit::rctl_string).as_deref(), Some("deny=8G/jail"));
        assert_eq!(amount_only.serialize(), Value::from("8G:deny"));

        let legacy = limit(Value::from("4G:log")).unwrap();
        assert_eq!(legacy.limit().map(|l| l.action.as_str()), Some("log"));

        let rctl = limit(Value::from("devctl=2G/process")).unwrap();
        assert_eq!(rctl.serialize(), Value::from("devctl=2G/process"));

        let per_jail = limit(Value::from("deny=1G")).unwrap();
        assert_eq!(per_jail.serialize(), Value::from("1G:deny"));

        assert_eq!(limit(Value::Int(100)).unwrap().serialize(), Value::from("100:deny"));
    }

    #[test]
    fn unset_values() {
        assert!(limit(Value::Null).unwrap().is_unset());
        assert!(limit(Value::from("none")).unwrap().is_unset());
        assert!(limit(Value::from("None=None/None")).unwrap().is_unset());
        assert_eq!(limit(Value::Null).unwrap().serialize(), Value::Null);
    }

    #[test]
    fn empty_parts_are_invalid() {
        for bad in ["deny=", ":log", "8G:", "deny=1G/"] {
            assert!(
                matches!(limit(Value::from(bad)), Err(ConfigError::InvalidValue { .. })),
                "{bad:?}"
            );
        }
        assert!(limit(Value::Bool(true)).is_err());
    }

    #[test]
    fn names_cover_rctl_resources() {
        assert!(is_resource_limit("pcpu"));
        assert!(!is_resource_limit("release"));
        assert_eq!(ResourceLimit::new("pcpu").name(), "pcpu");
    }
}
