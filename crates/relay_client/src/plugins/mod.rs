//! Bundled plugins

pub mod api_response;
pub mod intro;
pub mod logger;
pub mod state_action;

pub use api_response::{ApiResponseExt, ApiResponsePlugin, API_RESPONSE};
pub use intro::ClientIntroPlugin;
pub use logger::{LoggerExt, LoggerPlugin, LOG};
pub use state_action::{StateActionExt, StateActionPlugin, STATE_ACTION_COMPLETE};
