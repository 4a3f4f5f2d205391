//! wagate - WhatsApp Gateway Service
//!
//! Pairs a single WhatsApp account through QR codes, keeps the session alive
//! and exposes connect / disconnect / status / send over a small REST API.
//!
//! Key principles:
//! - One session per process, owned by a single lifecycle task
//! - Credentials are an opaque blob, persisted atomically
//! - QR codes expire on a timer, never by polling

pub mod api;
pub mod storage;
pub mod whatsapp;
