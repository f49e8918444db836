//! Dashboard JSON API.
//!
//! - [`envelope`]: the response envelope every callback returns
//! - [`wrapper`]: turns one callback run into one response write
//! - [`router`]: public and private route registration
//! - [`users`]: session resolution for private routes
//! - [`settings`]: organization webhook settings

pub mod envelope;
pub mod router;
pub mod settings;
pub mod users;
pub mod wrapper;

pub use envelope::{ApiError, ApiResponse, CookieOptions, CookieValue, Cookies, SameSite};
pub use router::{
    ApiRequest, ApiRouter, CallbackExecutor, PrivateCallback, PrivateExecutor, PublicCallback,
    PublicExecutor, private_callback, public_callback,
};
pub use settings::{OrgWebHookState, SettingsApi};
pub use users::{InMemoryUserStore, UserStore};
pub use wrapper::{AxumSink, ResponseSink, RouteOptions, execute_wrapped};
