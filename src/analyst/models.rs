//! Semantic model catalog.

use crate::error::{ChatError, Result};

/// A semantic model YAML file on a stage, `<DATABASE>.<SCHEMA>.<STAGE>/<FILE>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticModel {
    path: String,
}

impl SemanticModel {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// File name without the stage prefix.
    pub fn display_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Stage reference sent as `semantic_model_file`.
    pub fn file_reference(&self) -> String {
        format!("@{}", self.path)
    }
}

/// The configured models and the current selection.
#[derive(Debug, Clone)]
pub struct SemanticModelCatalog {
    models: Vec<SemanticModel>,
    selected: usize,
}

impl SemanticModelCatalog {
    pub fn new<I, S>(paths: I, selected: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models: Vec<SemanticModel> = paths.into_iter().map(SemanticModel::new).collect();
        if models.is_empty() {
            return Err(ChatError::config("No semantic models configured"));
        }
        if selected >= models.len() {
            return Err(ChatError::config(format!(
                "Semantic model index {selected} is out of range"
            )));
        }
        Ok(Self { models, selected })
    }

    pub fn models(&self) -> &[SemanticModel] {
        &self.models
    }

    pub fn selected(&self) -> &SemanticModel {
        &self.models[self.selected]
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    /// Selects a model by index. Returns whether the selection changed.
    pub fn select(&mut self, index: usize) -> Result<bool> {
        if index >= self.models.len() {
            return Err(ChatError::config(format!(
                "No semantic model #{} (catalog has {})",
                index + 1,
                self.models.len()
            )));
        }
        let changed = index != self.selected;
        self.selected = index;
        Ok(changed)
    }

    /// Looks up a model by 1-based number, display name or full path.
    pub fn find(&self, query: &str) -> Option<usize> {
        let query = query.trim();
        if let Ok(number) = query.parse::<usize>() {
            return (1..=self.models.len())
                .contains(&number)
                .then(|| number - 1);
        }
        self.models.iter().position(|m| {
            m.display_name().eq_ignore_ascii_case(query) || m.path().eq_ignore_ascii_case(query)
        })
    }
}
