use std::fmt;

use crate::tool::ToolDefinition;

/// Tools exposed by one server, in the order they were listed.
///
/// An entry may be declared without a definition; such entries, and entries
/// with an empty name, are skipped when the set is enumerated.
#[derive(Clone, Default)]
pub struct ToolSet {
    entries: Vec<(String, Option<ToolDefinition>)>,
}

impl ToolSet {
    /// Creates a new empty toolset.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a tool. Replacing an existing name keeps its position.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        definition: ToolDefinition,
    ) -> Option<ToolDefinition> {
        self.insert_entry(name, Some(definition))
    }

    /// Adds an entry that may have no definition.
    pub fn insert_entry(
        &mut self,
        name: impl Into<String>,
        definition: Option<ToolDefinition>,
    ) -> Option<ToolDefinition> {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => std::mem::replace(slot, definition),
            None => {
                self.entries.push((name, definition));
                None
            }
        }
    }

    /// Builder-style [`ToolSet::insert`].
    pub fn with_tool(mut self, name: impl Into<String>, definition: ToolDefinition) -> Self {
        self.insert(name, definition);
        self
    }

    /// Removes a tool.
    pub fn remove(&mut self, name: &str) -> Option<ToolDefinition> {
        let index = self.entries.iter().position(|(existing, _)| existing == name)?;
        self.entries.remove(index).1
    }

    /// Gets a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .and_then(|(_, definition)| definition.as_ref())
    }

    /// All entry names, including ones without a definition.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Entries with a non-empty name and a definition, in order.
    pub fn defined(&self) -> impl Iterator<Item = (&str, &ToolDefinition)> {
        self.entries.iter().filter_map(|(name, definition)| match definition {
            Some(definition) if !name.is_empty() => Some((name.as_str(), definition)),
            _ => None,
        })
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the toolset is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

impl FromIterator<(String, ToolDefinition)> for ToolSet {
    fn from_iter<I: IntoIterator<Item = (String, ToolDefinition)>>(iter: I) -> Self {
        let mut set = ToolSet::new();
        for (name, definition) in iter {
            set.insert(name, definition);
        }
        set
    }
}

impl IntoIterator for ToolSet {
    type Item = (String, Option<ToolDefinition>);
    type IntoIter = std::vec::IntoIter<(String, Option<ToolDefinition>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
