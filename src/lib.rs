//! # AckLink Relay
//!
//! Library for the implementation of the AckLink relay: sponsored-payment
//! quoting, settlement orchestration and the claimable payment-link state
//! machine.

pub mod account;
pub mod acklink;
pub mod bulk;
pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod context;
pub mod endpoints;
pub mod error;
pub mod orchestrator;
pub mod quote;
pub mod rpc;
pub mod send;
pub mod services;
pub mod spawn;
pub mod storage;
pub mod supervisor;
pub mod types;
pub mod version;
