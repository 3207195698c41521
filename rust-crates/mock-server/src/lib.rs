//! An in-memory stand-in for the rewards REST backend, used for local runs
//! and HTTP integration tests.

pub mod backend;
pub mod server;

pub use backend::{
    ApiError,
    BackendConfig,
    Endpoint,
    RewardBackend,
};
pub use server::{
    MockServer,
    serve_forever,
};
