//! Loopback HTTP bridge feeding BPM samples into the peripheral.
//!
//! - `GET /`  -> `{"status":"OK"}`
//! - `POST /` -> `{"bpm": n}` is published on the BPM stream and echoed back
//! - anything else falls through to 404

pub mod routes;
pub mod server;

pub use server::{HttpBridgeConfig, HttpBridgeServer};
