// SPDX-License-Identifier: GPL-3.0-only

use std::any::Any;

use super::special::{NamedProperty, SpecialProperty};
use crate::error::Result;
use crate::helpers::parse_list;
use jail_types::Value;

/// Jails that must be running before this one starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Depends {
    terms: Vec<String>,
}

impl Depends {
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t == term)
    }

    /// Returns false when the term was already present
    pub fn add(&mut self, term: impl Into<String>) -> bool {
        let term = term.into();
        if self.contains(&term) {
            return false;
        }
        self.terms.push(term);
        true
    }

    pub fn remove(&mut self, term: &str) -> bool {
        let before = self.terms.len();
        self.terms.retain(|t| t != term);
        self.terms.len() != before
    }
}

impl NamedProperty for Depends {
    const NAME: &'static str = "depends";
}

impl SpecialProperty for Depends {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn set(&mut self, raw: &Value) -> Result<()> {
        self.terms.clear();
        for term in parse_list(raw) {
            self.add(term);
        }
        Ok(())
    }

    fn serialize(&self) -> Value {
        Value::List(self.terms.clone())
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
