//! UFile object storage SDK
//!
//! Re-exports the workspace crates under one name: identifiers, signing and
//! ETags from `ufile-core`, the HTTP transport from `ufile-net`, and the
//! client with its parallel transfer engine from `ufile-client`.

pub use ufile_client::*;
pub use ufile_core;
pub use ufile_net;
