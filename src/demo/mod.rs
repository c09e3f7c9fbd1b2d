// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Demo graphs shipped with the `stepwood` binary.

pub mod video_summary;
