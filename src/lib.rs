//! ==============================================================================
//! lib.rs - firewatch host library
//! ==============================================================================
//!
//! purpose:
//!     the serial ingestion pipeline and its http surface, split out of the
//!     binary so every piece can be driven directly from tests.
//!
//! data flow:
//!     device bytes -> frame (parse) -> reader (stamp) -> store (push)
//!                  -> query (snapshot) -> api (json)
//!
//! ==============================================================================

pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod lifecycle;
pub mod mock;
pub mod query;
pub mod reader;
pub mod store;
