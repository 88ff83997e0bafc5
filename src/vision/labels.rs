// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class-id to class-name mapping of a detection model

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

/// Immutable label table of a loaded model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassLabels {
    names: BTreeMap<u32, String>,
}

impl ClassLabels {
    /// Labels numbered from 0 in iteration order
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names
                .into_iter()
                .enumerate()
                .map(|(i, n)| (i as u32, n.into()))
                .collect(),
        }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(i, n)| (i, n.into())).collect(),
        }
    }

    /// Parse the `names` metadata entry written by Ultralytics ONNX exports
    ///
    /// The value is a Python dict literal, e.g. `{0: 'person', 1: 'bicycle'}`.
    pub fn from_metadata(value: &str) -> Result<Self> {
        let re = Regex::new(r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#)?;

        let mut names = BTreeMap::new();
        for caps in re.captures_iter(value) {
            let id: u32 = caps[1].parse().context("Invalid class id in model metadata")?;
            let name = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            names.insert(id, name);
        }

        if names.is_empty() {
            anyhow::bail!("No class names found in model metadata");
        }

        Ok(Self { names })
    }

    /// Parse a labels file
    ///
    /// Accepted forms: a JSON object (`{"0": "cat"}`), a JSON array
    /// (`["cat", "dog"]`), or plain text with one name per line.
    pub fn parse(content: &str) -> Result<Self> {
        let trimmed = content.trim();

        let labels = if trimmed.starts_with('{') {
            let map: BTreeMap<String, String> =
                serde_json::from_str(trimmed).context("Invalid JSON labels object")?;
            let mut names = BTreeMap::new();
            for (key, name) in map {
                let id: u32 = key
                    .parse()
                    .with_context(|| format!("Invalid class id '{}' in labels", key))?;
                names.insert(id, name);
            }
            Self { names }
        } else if trimmed.starts_with('[') {
            let list: Vec<String> =
                serde_json::from_str(trimmed).context("Invalid JSON labels array")?;
            Self::from_names(list)
        } else {
            Self::from_names(
                trimmed
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            )
        };

        if labels.is_empty() {
            anyhow::bail!("Labels file contains no class names");
        }

        Ok(labels)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read labels file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid labels file {}", path.display()))
    }

    pub fn get(&self, class_id: u32) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of score columns the model is expected to emit
    pub fn num_classes(&self) -> usize {
        self.names
            .keys()
            .next_back()
            .map(|max| *max as usize + 1)
            .unwrap_or(0)
    }
}
