// Handlers module

pub mod pages;
pub mod relay;

pub use pages::serve_path_handler;
pub use relay::{relay_session, DecodePolicy, RelayContext, SessionEnd};
