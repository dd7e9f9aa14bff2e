use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Bijection between class indices and emotion names, in training order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelCodec {
    pub classes: Vec<String>,
}

impl LabelCodec {
    pub fn validate(&self) -> Result<(), String> {
        if self.classes.len() < 2 {
            return Err("label codec must contain at least 2 classes".to_string());
        }
        let mut seen = HashSet::new();
        for class in &self.classes {
            if class.trim().is_empty() {
                return Err("label codec contains a blank class name".to_string());
            }
            if !seen.insert(class.as_str()) {
                return Err(format!("duplicate class {class:?}"));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class name for an index produced by a classifier.
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == label)
    }
}
