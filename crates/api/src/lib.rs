//! HTTP control surface for the orchestrator.

pub mod app;
