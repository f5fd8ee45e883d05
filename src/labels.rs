use std::collections::HashSet;
use thiserror::Error;

/// Class names in the order the shipped model was trained with.
pub const DEFAULT_LABELS: [&str; 7] = [
    "Bacteria",
    "Fungi",
    "Healthy",
    "Nematode",
    "Pest",
    "Phytophthora",
    "Virus",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelError {
    #[error("class label table is empty")]
    Empty,

    #[error("class label at index {0} is blank")]
    Blank(usize),

    #[error("duplicate class label: {0}")]
    Duplicate(String),
}

/// Ordered class names, index-aligned with the model's output vector.
///
/// The ordering is a contract with the model artifact: a table that does not
/// match the training-time ordering yields wrong labels without any error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabelTable {
    labels: Vec<String>,
}

impl ClassLabelTable {
    pub fn new(labels: Vec<String>) -> Result<Self, LabelError> {
        if labels.is_empty() {
            return Err(LabelError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, label) in labels.iter().enumerate() {
            if label.trim().is_empty() {
                return Err(LabelError::Blank(index));
            }
            if !seen.insert(label.as_str()) {
                return Err(LabelError::Duplicate(label.clone()));
            }
        }

        Ok(Self { labels })
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.labels
    }
}

impl Default for ClassLabelTable {
    fn default() -> Self {
        Self {
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub fn default_labels() -> Vec<String> {
    ClassLabelTable::default().labels
}
