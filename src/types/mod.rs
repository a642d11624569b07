//! Relay types.

mod bulk;
pub use bulk::{BulkFeeMode, BulkSettlement};

pub mod contracts;

pub mod lane;
pub use lane::{
    normalize_speed, select_lane, CanonicalSpeed, Lane, LaneLists, SettlementMode, SpeedInput,
};

pub mod link;
pub use link::{derive_link_id, AckLink, LinkHashes, LinkMeta, LinkStatus, LinkStatusView};

mod orchestrator;
pub use orchestrator::{
    OrchestratorAction, OrchestratorContracts, OrchestratorRequest, OrchestratorResult,
    SettlementOutcome,
};

mod quote;
pub use quote::{Quote, SetupTag, SmartAccountFact, TokenFacts};

mod receipt;
pub use receipt::{NewReceipt, PrivateNote};

pub mod rpc;
