//! # Console HTTP
//!
//! Request pipeline for Solver Console backend calls. The client attaches
//! the session credential, renews it when it is about to expire, and turns a
//! rejected credential into a single sign-in redirect.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use console_auth::{AuthProviderFactory, NoopNavigator};
//! use console_http::HttpClient;
//! use std::sync::Arc;
//!
//! # async fn run(factory: Arc<AuthProviderFactory>) -> console_http::HttpResult<()> {
//! let client = HttpClient::new(factory, Arc::new(NoopNavigator))?;
//!
//! let jobs = client.get("/jobs/").await?;
//! if let Some(body) = jobs.as_json() {
//!     println!("{}", body);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod request;
pub mod response;

pub use client::HttpClient;
pub use error::{HttpError, HttpResult};
pub use request::{RequestBody, RequestOptions};
pub use response::{ApiResponse, ResponseContent, PARSE_FAILURE_MESSAGE};

pub use reqwest::Method;
