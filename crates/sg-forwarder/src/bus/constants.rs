// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Constants for the event bus.

/// Maximum capacity of the bus channel.
///
/// Publishing never waits: when the channel is full the message is dropped with a warning.
pub(crate) const MAX_MESSAGES: usize = 100;
