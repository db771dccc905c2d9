// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # SG Forwarder
//!
//! Output adapters of a telemetry-forwarding pipeline, plus the JSON log intake that feeds them.
//!
//! ## Overview
//!
//! ```text
//!   UDP ─> LogListener ─> LogHandler ─> EventBus ─┬─> Elasticsearch ─> PerKeyBuffer ─> DispatchQueue ─> DispatchWorker
//!                                                 └─> Loki ─> LokiWorker
//! ```
//!
//! - [`logs`]: raw JSON log parsing, severity mapping and destination-key derivation
//! - [`bus`]: in-process delivery between handlers and applications
//! - [`format`] and [`time`]: record shapes per backend
//! - [`buffer`] and [`dispatch`]: per-destination accumulation and single-writer dispatch
//! - [`elasticsearch`] and [`loki`]: the output adapters
//! - [`config`]: YAML and environment configuration

#![deny(clippy::all)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]
#![allow(clippy::missing_errors_doc)]

pub mod buffer;
pub mod bus;
pub mod config;
pub mod dispatch;
pub mod elasticsearch;
pub mod error;
pub mod event;
pub mod format;
pub mod http;
pub mod logs;
pub mod loki;
pub mod time;
pub mod transport;
