//! Aliases: user-named shortcuts for integration parameters.
//!
//! An alias maps a human-friendly name ("general") to an integration-specific
//! value ("C0123ABC"). The caller owns the store and sends a fresh snapshot
//! with every request; the pipeline only ever reads it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single stored parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub value: String,
}

impl Alias {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Integration identifier → ordered aliases.
///
/// Integration identifiers are case-insensitive; they are stored upper-cased
/// (`"slack"` and `"SLACK"` are the same integration). When two keys collide
/// after normalization their aliases are merged, and the first alias with a
/// given name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<Alias>>", into = "BTreeMap<String, Vec<Alias>>")]
pub struct IntegrationAliasMap {
    entries: BTreeMap<String, Vec<Alias>>,
}

impl IntegrationAliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical form of an integration identifier.
    pub fn canonical(integration: &str) -> String {
        integration.trim().to_uppercase()
    }

    /// Add aliases for an integration, merging with any already present.
    pub fn insert(&mut self, integration: &str, aliases: Vec<Alias>) {
        let slot = self
            .entries
            .entry(Self::canonical(integration))
            .or_default();
        for alias in aliases {
            if !slot.iter().any(|a| a.name == alias.name) {
                slot.push(alias);
            }
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, integration: &str, aliases: Vec<Alias>) -> Self {
        self.insert(integration, aliases);
        self
    }

    /// All declared integrations, including those with zero aliases.
    pub fn integrations(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Whether the integration is declared (case-insensitive).
    pub fn contains(&self, integration: &str) -> bool {
        self.entries.contains_key(&Self::canonical(integration))
    }

    /// Aliases configured for an integration; empty when undeclared.
    pub fn aliases_for(&self, integration: &str) -> &[Alias] {
        self.entries
            .get(&Self::canonical(integration))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Concatenated aliases of several integrations, in the order given.
    pub fn aliases_for_all(&self, integrations: &[String]) -> Vec<Alias> {
        integrations
            .iter()
            .flat_map(|i| self.aliases_for(i).iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl From<BTreeMap<String, Vec<Alias>>> for IntegrationAliasMap {
    fn from(raw: BTreeMap<String, Vec<Alias>>) -> Self {
        let mut map = Self::new();
        for (integration, aliases) in raw {
            map.insert(&integration, aliases);
        }
        map
    }
}

impl From<IntegrationAliasMap> for BTreeMap<String, Vec<Alias>> {
    fn from(map: IntegrationAliasMap) -> Self {
        map.entries
    }
}
