//! Service layers and the combined plan
//!
//! A layer is a named, mergeable declaration of supervised services. The
//! supervisor keeps an ordered list of layers; the effective configuration
//! ("plan") is the fold of all layers in insertion order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// How a service definition is applied over an earlier one with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    /// Fields set in the new definition replace the old ones; unset fields are kept.
    Merge,
    /// The new definition replaces the old one wholesale.
    Replace,
}

/// Whether the supervisor starts the service on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    Enabled,
    #[default]
    Disabled,
}

impl std::fmt::Display for Startup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Startup::Enabled => f.write_str("enabled"),
            Startup::Disabled => f.write_str("disabled"),
        }
    }
}

/// One supervised service inside a layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(rename = "override", default, skip_serializing_if = "Option::is_none")]
    pub override_strategy: Option<Override>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<Startup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl ServiceSpec {
    /// Apply `other` over `self` field by field.
    ///
    /// Every field `other` sets replaces the current value; environment
    /// entries are merged key by key.
    pub fn merge_from(&mut self, other: &ServiceSpec) {
        if other.override_strategy.is_some() {
            self.override_strategy = other.override_strategy;
        }
        if other.summary.is_some() {
            self.summary = other.summary.clone();
        }
        if other.command.is_some() {
            self.command = other.command.clone();
        }
        if other.startup.is_some() {
            self.startup = other.startup;
        }
        if other.user.is_some() {
            self.user = other.user.clone();
        }
        if other.group.is_some() {
            self.group = other.group.clone();
        }
        for (key, value) in &other.environment {
            self.environment.insert(key.clone(), value.clone());
        }
    }

    /// Command split into argv (whitespace separated, no shell quoting).
    pub fn argv(&self) -> Vec<String> {
        self.command
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

/// Declarative definition of one or more supervised services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, ServiceSpec>,
}

impl Layer {
    /// Parse a layer from its YAML representation.
    pub fn from_yaml(yaml: &str) -> Result<Self, DomainError> {
        let layer: Layer = serde_yaml::from_str(yaml).map_err(|e| DomainError::LayerFormat {
            message: e.to_string(),
        })?;
        layer.validate()?;
        Ok(layer)
    }

    /// Render the layer as YAML using the supervisor's field names.
    pub fn to_yaml(&self) -> Result<String, DomainError> {
        serde_yaml::to_string(self).map_err(|e| DomainError::LayerFormat {
            message: e.to_string(),
        })
    }

    /// Every service must declare how it overrides earlier definitions.
    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, spec) in &self.services {
            if name.trim().is_empty() {
                return Err(DomainError::InvalidLayer {
                    service: name.clone(),
                    message: "service name must not be empty".into(),
                });
            }
            if spec.override_strategy.is_none() {
                return Err(DomainError::InvalidLayer {
                    service: name.clone(),
                    message: "missing override strategy (\"merge\" or \"replace\")".into(),
                });
            }
        }
        Ok(())
    }

    /// Combine `other` into this layer.
    pub fn combine(&mut self, other: &Layer) -> Result<(), DomainError> {
        other.validate()?;

        if !other.summary.is_empty() {
            self.summary = other.summary.clone();
        }
        if !other.description.is_empty() {
            self.description = other.description.clone();
        }

        for (name, spec) in &other.services {
            match (spec.override_strategy, self.services.get_mut(name)) {
                (Some(Override::Merge), Some(existing)) => existing.merge_from(spec),
                _ => {
                    self.services.insert(name.clone(), spec.clone());
                }
            }
        }
        Ok(())
    }
}

/// A layer together with the label it was added under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledLayer {
    pub label: String,
    pub layer: Layer,
}

/// Ordered collection of layers held by a supervisor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    layers: Vec<LabeledLayer>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer under `label`.
    ///
    /// With `combine`, a layer that already carries the label absorbs the new
    /// one; without it, reusing a label is a conflict.
    pub fn add_layer(&mut self, label: &str, layer: &Layer, combine: bool) -> Result<(), DomainError> {
        layer.validate()?;

        match self.layers.iter_mut().find(|l| l.label == label) {
            Some(existing) if combine => existing.layer.combine(layer),
            Some(_) => Err(DomainError::LayerConflict(label.to_string())),
            None => {
                self.layers.push(LabeledLayer {
                    label: label.to_string(),
                    layer: layer.clone(),
                });
                Ok(())
            }
        }
    }

    pub fn layers(&self) -> &[LabeledLayer] {
        &self.layers
    }

    /// Fold all layers in insertion order into the effective configuration.
    pub fn combined(&self) -> Result<Layer, DomainError> {
        let mut result = Layer::default();
        for labeled in &self.layers {
            result.combine(&labeled.layer)?;
        }
        Ok(result)
    }

    /// Effective definition of a single service, if any layer declares it.
    pub fn service(&self, name: &str) -> Result<Option<ServiceSpec>, DomainError> {
        Ok(self.combined()?.services.remove(name))
    }
}
