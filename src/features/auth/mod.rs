pub mod models;
pub mod session;

pub use models::{Account, AuthError, Credentials};
pub use session::{Gatekeeper, SessionStore};
