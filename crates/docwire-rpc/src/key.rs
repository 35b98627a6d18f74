use std::fmt;

use docwire_value::EventKey;

/// Identity of one interface method.
///
/// Methods with an id are written with the numeric key, which is shorter on
/// the wire; readers accept either form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    name: String,
    id: Option<u32>,
}

impl MethodKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// The event key a writer emits for this method.
    pub fn event_key(&self) -> EventKey {
        match self.id {
            Some(id) => EventKey::Id(id),
            None => EventKey::Name(self.name.clone()),
        }
    }
}

impl From<&str> for MethodKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}#{id}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_takes_precedence_on_the_wire() {
        assert_eq!(MethodKey::new("say").event_key(), EventKey::name("say"));
        assert_eq!(MethodKey::new("say").with_id(7).event_key(), EventKey::Id(7));
    }

    #[test]
    fn display_shows_id() {
        assert_eq!(MethodKey::new("say").to_string(), "say");
        assert_eq!(MethodKey::new("say").with_id(7).to_string(), "say#7");
    }
}
