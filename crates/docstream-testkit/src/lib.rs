//! # Docstream Testkit
//!
//! Testing utilities for the docstream crates.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Collaborators**: Stand-in implementations of the capability
//!   contracts (key resolution, stream loading, schema validation)
//! - **Fixtures**: Helper structs for setting up commit chains
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up a document stream scenario:
//!
//! ```rust
//! use docstream_testkit::fixtures::TestFixture;
//! use serde_json::json;
//!
//! let fixture = TestFixture::new();
//! let genesis = fixture.make_genesis(json!({"a": 1}));
//! let update = fixture.make_signed(
//!     genesis.commit_id,
//!     json!([{"op": "replace", "path": "/a", "value": 2}]),
//! );
//! ```

pub mod collaborators;
pub mod fixtures;
pub mod generators;

pub use collaborators::{
    AcceptAllValidator, BasicSchemaValidator, RejectAllValidator, StaticKeyResolver,
    StaticStreamLoader,
};
pub use fixtures::{multi_party_fixtures, TestFixture, TEST_CONTROLLER};
