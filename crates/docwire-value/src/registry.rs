use std::collections::HashMap;

use crate::error::{Result, WireError};

const MAX_ALIAS_LEN: usize = 64;

/// Explicit type-name ↔ short-alias table.
///
/// Built once at startup, then shared read-only (usually behind an `Arc`)
/// by every wire that renders object tags. Wires write the alias in place
/// of the full type name and map it back when decoding.
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry {
    by_type: HashMap<String, String>,
    by_alias: HashMap<String, String>,
}

impl AliasRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `(type_name, alias)` pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut registry = Self::new();
        for (type_name, alias) in pairs {
            registry.register(type_name, alias)?;
        }
        Ok(registry)
    }

    /// Register `alias` for `type_name`.
    ///
    /// Both directions must stay unambiguous: a type gets one alias and an
    /// alias names one type. Re-registering the identical pair is a no-op.
    pub fn register(&mut self, type_name: &str, alias: &str) -> Result<()> {
        validate_name(type_name, "type name")?;
        validate_name(alias, "alias")?;

        if let Some(existing) = self.by_type.get(type_name) {
            if existing == alias {
                return Ok(());
            }
            return Err(WireError::Alias(format!(
                "type '{type_name}' already aliased as '{existing}'"
            )));
        }
        if let Some(owner) = self.by_alias.get(alias) {
            return Err(WireError::Alias(format!(
                "alias '{alias}' already names '{owner}'"
            )));
        }
        if alias != type_name && self.by_type.contains_key(alias) {
            return Err(WireError::Alias(format!(
                "alias '{alias}' collides with a registered type name"
            )));
        }

        self.by_type.insert(type_name.to_string(), alias.to_string());
        self.by_alias.insert(alias.to_string(), type_name.to_string());
        Ok(())
    }

    /// Name to write for `type_name` (the alias, or the name itself).
    pub fn alias_for<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.by_type.get(type_name).map_or(type_name, String::as_str)
    }

    /// Full type name for a name read off the wire.
    pub fn type_for<'a>(&'a self, written: &'a str) -> &'a str {
        self.by_alias.get(written).map_or(written, String::as_str)
    }

    /// Check if a type has an alias.
    pub fn has_alias(&self, type_name: &str) -> bool {
        self.by_type.contains_key(type_name)
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<&str> {
        let mut aliases: Vec<&str> = self.by_alias.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        aliases
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

fn validate_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_ALIAS_LEN {
        return Err(WireError::Alias(format!(
            "invalid {what} length: {}",
            name.len()
        )));
    }
    if name.starts_with('@') || name.chars().any(char::is_whitespace) {
        return Err(WireError::Alias(format!(
            "{what} '{name}' must not start with '@' or contain whitespace"
        )));
    }
    Ok(())
}
