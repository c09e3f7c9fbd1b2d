// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Declared input/output types of a unit.
//!
//! Values crossing between units are `serde_json::Value`s. A [`TypeRef`]
//! names the Rust type a unit was registered with and knows how to check a
//! value against it, which is what lets the graph check edges at build time
//! and the executor reject non-conforming inputs before a node runs.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

type Conformance = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Named, checkable type of the values a unit consumes or produces.
#[derive(Clone)]
pub struct TypeRef {
    name: String,
    check: Option<Conformance>,
}

impl TypeRef {
    /// Type descriptor for a serde-deserializable Rust type.
    ///
    /// `serde_json::Value` itself maps to [`TypeRef::any`].
    pub fn of<T: DeserializeOwned + 'static>() -> Self {
        if TypeId::of::<T>() == TypeId::of::<Value>() {
            return Self::any();
        }
        Self {
            name: std::any::type_name::<T>().to_string(),
            check: Some(Arc::new(|value: &Value| {
                T::deserialize(value).is_ok()
            })),
        }
    }

    /// Same check as [`TypeRef::of`], published under a caller-chosen name.
    pub fn named<T: DeserializeOwned + 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::of::<T>()
        }
    }

    /// Accepts every value and is compatible with every other type.
    pub fn any() -> Self {
        Self {
            name: "any".to_string(),
            check: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_any(&self) -> bool {
        self.check.is_none()
    }

    /// Whether `value` satisfies this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match &self.check {
            Some(check) => check(value),
            None => true,
        }
    }

    /// Whether values of `self` may flow into a consumer expecting `expected`.
    pub fn compatible_with(&self, expected: &TypeRef) -> bool {
        self.is_any() || expected.is_any() || self.name == expected.name
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeRef {}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.name).finish()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// What a unit takes per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputShape {
    /// One value per call; a node bound to several values runs once per value.
    One(TypeRef),
    /// All bound values at once, as a JSON array.
    List(TypeRef),
}

impl InputShape {
    pub fn element(&self) -> &TypeRef {
        match self {
            InputShape::One(t) | InputShape::List(t) => t,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, InputShape::List(_))
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputShape::One(t) => write!(f, "{}", t),
            InputShape::List(t) => write!(f, "list of {}", t),
        }
    }
}

/// What a unit produces per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputShape {
    One(TypeRef),
    /// Fan-out: each element is an independent output instance.
    List(TypeRef),
    /// A routing decision over the router's candidate set.
    Selection,
}

impl OutputShape {
    /// Element type carried along static edges; `None` for routers.
    pub fn element(&self) -> Option<&TypeRef> {
        match self {
            OutputShape::One(t) | OutputShape::List(t) => Some(t),
            OutputShape::Selection => None,
        }
    }
}

impl fmt::Display for OutputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputShape::One(t) => write!(f, "{}", t),
            OutputShape::List(t) => write!(f, "list of {}", t),
            OutputShape::Selection => f.write_str("selection"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub input: InputShape,
    pub output: OutputShape,
}

impl Signature {
    pub fn new(input: InputShape, output: OutputShape) -> Self {
        Self { input, output }
    }

    /// Whether this unit's output can feed `consumer` along a static edge.
    ///
    /// Only element types are compared: a list producer feeding a scalar
    /// consumer maps, a list consumer reduces whatever it is bound to.
    pub fn feeds(&self, consumer: &Signature) -> bool {
        match self.output.element() {
            Some(produced) => produced.compatible_with(consumer.input.element()),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Clip {
        url: String,
        seconds: u32,
    }

    #[test]
    fn accepts_checks_shape_of_value() {
        let t = TypeRef::of::<Clip>();
        assert!(t.accepts(&json!({"url": "u", "seconds": 3})));
        assert!(!t.accepts(&json!({"url": "u"})));
        assert!(!t.accepts(&json!("just a string")));
    }

    #[test]
    fn value_type_is_any() {
        let t = TypeRef::of::<Value>();
        assert!(t.is_any());
        assert!(t.accepts(&json!(null)));
        assert!(t.compatible_with(&TypeRef::of::<Clip>()));
    }

    #[test]
    fn compatibility_is_by_name() {
        assert!(TypeRef::of::<u32>().compatible_with(&TypeRef::of::<u32>()));
        assert!(!TypeRef::of::<u32>().compatible_with(&TypeRef::of::<String>()));
        let renamed = TypeRef::named::<u32>("Count");
        assert!(!renamed.compatible_with(&TypeRef::of::<u32>()));
        assert!(renamed.compatible_with(&TypeRef::named::<u64>("Count")));
    }

    #[test]
    fn list_producer_feeds_scalar_and_list_consumers() {
        let producer = Signature::new(
            InputShape::One(TypeRef::of::<String>()),
            OutputShape::List(TypeRef::of::<u32>()),
        );
        let mapper = Signature::new(
            InputShape::One(TypeRef::of::<u32>()),
            OutputShape::One(TypeRef::of::<u32>()),
        );
        let reducer = Signature::new(
            InputShape::List(TypeRef::of::<u32>()),
            OutputShape::One(TypeRef::of::<u32>()),
        );
        assert!(producer.feeds(&mapper));
        assert!(producer.feeds(&reducer));
        assert!(!mapper.feeds(&Signature::new(
            InputShape::One(TypeRef::of::<String>()),
            OutputShape::One(TypeRef::of::<String>()),
        )));
    }

    #[test]
    fn selection_feeds_nothing() {
        let router = Signature::new(InputShape::One(TypeRef::any()), OutputShape::Selection);
        let step = Signature::new(InputShape::One(TypeRef::any()), OutputShape::One(TypeRef::any()));
        assert!(!router.feeds(&step));
    }
}
