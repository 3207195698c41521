pub mod activities;
pub mod api;
pub mod balance;
pub mod cache;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod http_client;
pub mod kinds;
pub mod notice;
pub mod outcome;
pub mod session;
pub mod status;

#[cfg(any(test, feature = "test-helpers"))]
pub mod in_memory_api;

pub use error::{
    Error,
    ErrorClass,
};
pub use kinds::{
    ActionKind,
    ActivityKind,
};
pub use session::RewardSession;
pub use status::{
    ActivityStatus,
    StatusPatch,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;
