use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Value stored under a section key.
///
/// Serializes without a tag: a scalar is a JSON string, a list is an array,
/// a composite is an object.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum SectionValue {
    Scalar(String),
    List(Vec<ListItem>),
    Composite(Composite),
}

/// Bullet and numbered items land in the same list; a section that mixes
/// both keeps them in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum ListItem {
    Bullet(String),
    Numbered { number: u64, content: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Composite {
    /// Scalar or list that was in place before an indented line promoted the
    /// section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Box<SectionValue>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_items: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<String>,
}

impl SectionValue {
    pub fn empty_composite() -> Self {
        SectionValue::Composite(Composite::default())
    }

    /// Short name of the variant, used in warnings and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SectionValue::Scalar(_) => "scalar",
            SectionValue::List(_) => "list",
            SectionValue::Composite(_) => "composite",
        }
    }

    /// Append a list item, turning this value into a list first. Whatever
    /// was there unless it already was a list (or an empty header) is
    /// thrown away; returns whether that happened.
    pub fn push_item(&mut self, item: ListItem) -> bool {
        let (mut items, discarded) = match std::mem::replace(self, SectionValue::List(Vec::new())) {
            SectionValue::List(items) => (items, false),
            SectionValue::Composite(c) => (Vec::new(), c != Composite::default()),
            SectionValue::Scalar(_) => (Vec::new(), true),
        };
        items.push(item);
        *self = SectionValue::List(items);
        discarded
    }

    /// Append a sub-item, turning this value into a composite first. A scalar
    /// or list is kept under `details`; returns whether a wrap happened.
    pub fn push_sub_item(&mut self, text: String) -> bool {
        let (mut composite, wrapped) = match std::mem::replace(self, SectionValue::empty_composite()) {
            SectionValue::Composite(c) => (c, false),
            prior => (
                Composite {
                    details: Some(Box::new(prior)),
                    ..Default::default()
                },
                true,
            ),
        };
        composite.sub_items.push(text);
        *self = SectionValue::Composite(composite);
        wrapped
    }
}

/// Section key → value, in first-insertion order.
///
/// Overwriting a key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    entries: Vec<(String, SectionValue)>,
    index: HashMap<String, usize>,
}

impl Document {
    /// Insert or overwrite. Returns the previous value, if any.
    pub fn insert(&mut self, key: String, value: SectionValue) -> Option<SectionValue> {
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut SectionValue> {
        self.index.get(key).map(|&i| &mut self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SectionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
