// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod environment;
pub mod function;
pub mod router;
pub mod signature;

pub use environment::{EnvironmentDescriptor, Image};
pub use function::FunctionUnit;
pub use router::{NodeHandle, Route, RouterUnit};
pub use signature::{InputShape, OutputShape, Signature, TypeRef};
