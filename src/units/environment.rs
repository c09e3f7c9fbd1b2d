// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Execution environment descriptors.
//!
//! A descriptor is opaque to the engine: it is attached to a unit, carried
//! along with every remote dispatch request, and left to the worker to
//! interpret. Nothing here builds or pulls images.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Opaque description of where a unit must run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    pub name: String,
    #[serde(default)]
    pub spec: Value,
}

impl EnvironmentDescriptor {
    pub fn new(name: impl Into<String>, spec: Value) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Builder for a container-image style environment.
#[derive(Debug, Clone, Default)]
pub struct Image {
    name: String,
    base_image: Option<String>,
    commands: Vec<String>,
}

impl Image {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn base_image(mut self, image: impl Into<String>) -> Self {
        self.base_image = Some(image.into());
        self
    }

    /// Append a build command; commands keep their declaration order.
    pub fn run(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn build(self) -> EnvironmentDescriptor {
        EnvironmentDescriptor::new(
            self.name,
            json!({
                "kind": "image",
                "base_image": self.base_image,
                "run": self.commands,
            }),
        )
    }
}

impl From<Image> for EnvironmentDescriptor {
    fn from(image: Image) -> Self {
        image.build()
    }
}
