//! # checkin-server
//!
//! HTTP surface for QR event check-in.
//!
//! Wraps the `checkin-core` engine behind an axum router: eligibility
//! previews, recording check-ins, browsing the log and adjusting the
//! geofence.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
