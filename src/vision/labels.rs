use crate::{Error, Result};
use std::path::Path;

/// Human-readable class names indexed by model output position.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabels {
    names: Vec<String>,
}

impl ClassLabels {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// One class per non-empty line, either `<wnid> <name>` or `<name>`.
    pub fn parse(content: &str) -> Result<Self> {
        let names: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(char::is_whitespace) {
                Some((first, rest)) if is_wordnet_id(first) => rest.trim().to_string(),
                _ => line.to_string(),
            })
            .collect();

        if names.is_empty() {
            return Err(Error::config("label file contains no classes"));
        }
        Ok(Self { names })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("cannot read labels '{}': {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// WordNet synset ids look like `n01440764`.
fn is_wordnet_id(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('n') && token.len() > 1 && chars.all(|c| c.is_ascii_digit())
}
