//! # caseflow-client
//!
//! HTTP implementation of `caseflow_core::traits::ResourceClient`.

pub mod http;

pub use http::HttpResourceClient;
