//! HTTP server exposing the style-learning engine to collaborators.
//!
//! The AI composition/reply service and the ingestion producers talk to the
//! engine exclusively through these routes.
//!
//! # Endpoints
//!
//! - `GET  /health`          — Liveness probe
//! - `GET  /buffer/ping`     — Buffer-service liveness probe
//! - `POST /style/init`      — Bulk-learn general style from a list of emails
//! - `POST /style/update`    — Incremental single-email style update
//! - `POST /style/get`       — Current derived labels for a user
//! - `POST /buffer/add`      — Enqueue a sample and trigger async learning
//! - `POST /reply/init`      — Bulk-learn reply clusters from (incoming, reply) pairs
//! - `POST /reply/update`    — Feed one new pair into the online updater
//! - `POST /reply/get-style` — Reply-style labels for an incoming email

pub mod routes;

pub use routes::{app_router, AppState};
