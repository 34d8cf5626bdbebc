pub mod api;
pub mod checker;
pub mod config;
pub mod humanize;
pub mod ledger;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod queue;
pub mod webhook;
pub mod worker;
