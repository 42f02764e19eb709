//! Category labels and the name ↔ id dictionary

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Classes of the Sydney Urban Objects dataset, in class-id order
pub const SYDNEY_URBAN_OBJECTS_CLASSES: [&str; 14] = [
    "4wd",
    "building",
    "bus",
    "car",
    "pedestrian",
    "pillar",
    "pole",
    "traffic_lights",
    "traffic_sign",
    "tree",
    "truck",
    "trunk",
    "ute",
    "van",
];

/// A resolved category: integer class id plus its name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub id: u32,
    pub name: String,
}

impl std::fmt::Display for Label {
    /// Formats as `<id>-<name>`, e.g. `3-car`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.id, self.name)
    }
}

/// Immutable bijection between category names and integer class ids
///
/// The dictionary is built once and handed to every component that needs it;
/// nothing in the workspace keeps a global copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDictionary {
    by_name: BTreeMap<String, u32>,
    by_id: BTreeMap<u32, String>,
}

impl LabelDictionary {
    /// Build from `(name, id)` pairs, rejecting duplicate names or ids
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let mut by_name = BTreeMap::new();
        let mut by_id = BTreeMap::new();

        for (name, id) in pairs {
            let name = name.into();
            if name.is_empty() || name.contains('.') {
                return Err(Error::InvalidConfig(format!(
                    "label name {:?} must be non-empty and contain no '.'",
                    name
                )));
            }
            if by_name.insert(name.clone(), id).is_some() {
                return Err(Error::InvalidConfig(format!("duplicate label name {:?}", name)));
            }
            if let Some(previous) = by_id.insert(id, name.clone()) {
                return Err(Error::InvalidConfig(format!(
                    "class id {} assigned to both {:?} and {:?}",
                    id, previous, name
                )));
            }
        }

        if by_name.is_empty() {
            return Err(Error::InvalidConfig("label dictionary is empty".to_string()));
        }

        Ok(Self { by_name, by_id })
    }

    /// The 14-class Sydney Urban Objects table
    pub fn sydney_urban_objects() -> Self {
        let by_name: BTreeMap<String, u32> = SYDNEY_URBAN_OBJECTS_CLASSES
            .iter()
            .enumerate()
            .map(|(id, name)| (name.to_string(), id as u32))
            .collect();
        let by_id = by_name.iter().map(|(name, &id)| (id, name.clone())).collect();
        Self { by_name, by_id }
    }

    /// Load a JSON object mapping names to ids, e.g. `{"car": 3, "tree": 9}`
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::file_access(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let pairs: BTreeMap<String, u32> = serde_json::from_str(text)?;
        Self::from_pairs(pairs)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.by_name)?)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Resolve a category name into a [`Label`]
    pub fn label(&self, name: &str) -> Result<Label> {
        self.id_of(name)
            .map(|id| Label { id, name: name.to_string() })
            .ok_or_else(|| Error::UnknownLabel(name.to_string()))
    }

    /// Resolve a class id into a [`Label`]
    pub fn label_for_id(&self, id: u32) -> Result<Label> {
        self.name_of(id)
            .map(|name| Label { id, name: name.to_string() })
            .ok_or_else(|| Error::UnknownLabel(format!("class id {}", id)))
    }

    /// Resolve the label encoded as the prefix of a file name,
    /// e.g. `pillar.2.3582.bin` or `pillar.2.3582_12.npy` → `pillar`
    pub fn label_for_file(&self, file_name: &str) -> Result<Label> {
        self.label(category_prefix(file_name))
    }

    /// Names in class-id order
    pub fn names(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.by_id.iter().map(|(&id, name)| (id, name.as_str()))
    }
}

impl Default for LabelDictionary {
    fn default() -> Self {
        Self::sydney_urban_objects()
    }
}

/// Category part of a dataset file name: everything before the first `.`
pub fn category_prefix(file_name: &str) -> &str {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    base.split('.').next().unwrap_or(base)
}
