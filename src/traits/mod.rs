// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod unit;
pub mod worker;

pub use unit::{StepUnit, UnitKind};
pub use worker::{DispatchOutcome, DispatchRequest, DispatchStatus, Ticket, WorkerClient};
