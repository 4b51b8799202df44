//! Confidential record ledger: a permissioned ledger host for the record contract, its HTTP
//! gateway, and the relayer that verifies commitment proofs before marking records verified.

pub mod api;
pub mod authz;
pub mod client;
pub mod config;
pub mod contract;
pub mod db;
pub mod errors;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod models;
pub mod relayer;
pub mod retry;
pub mod state;
pub mod stub;
