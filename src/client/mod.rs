//! Knowledge base clients.
//!
//! - [`TokenClient`] talks to the v2 JSON API with an API token
//! - [`PasswordClient`] drives the web app with a cookie session
//!
//! Both expose `toc`, `doc_list`, `doc_detail` and `doc_detail_list`, and
//! implement [`crate::pipeline::DetailFetcher`].

mod password;
mod token;

pub use password::PasswordClient;
pub use token::{PAGE_SIZE, TokenClient};
