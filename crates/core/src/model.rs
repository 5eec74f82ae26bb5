// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model references.
//!
//! Canonical form is `provider:model`; the wire/legacy form is
//! `provider/model`. Both parse to the same [`ModelRef`] and the two
//! renderings are round-trip convertible.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelRefError {
    #[error("model reference has no provider/model separator: {0:?}")]
    MissingSeparator(String),
    #[error("model reference has an empty provider or model segment: {0:?}")]
    EmptySegment(String),
}

/// A parsed `provider:model` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRef {
    provider: String,
    model: String,
}

impl ModelRef {
    /// Parse either the canonical `provider:model` or wire `provider/model`
    /// form. The first separator wins; the model segment may contain more
    /// separators (e.g. date-stamped model ids).
    pub fn parse(value: &str) -> Result<Self, ModelRefError> {
        let value = value.trim();
        let split = value
            .split_once(':')
            .or_else(|| value.split_once('/'))
            .ok_or_else(|| ModelRefError::MissingSeparator(value.to_string()))?;
        let (provider, model) = (split.0.trim(), split.1.trim());
        if provider.is_empty() || model.is_empty() {
            return Err(ModelRefError::EmptySegment(value.to_string()));
        }
        Ok(Self { provider: provider.to_string(), model: model.to_string() })
    }

    /// Best-effort parse: `None` for empty input or malformed references.
    pub fn parse_opt(value: Option<&str>) -> Option<Self> {
        let value = value?.trim();
        if value.is_empty() {
            return None;
        }
        Self::parse(value).ok()
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Canonical `provider:model` rendering.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }

    /// Wire `provider/model` rendering.
    pub fn wire(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

impl std::str::FromStr for ModelRef {
    type Err = ModelRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ModelRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for ModelRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
