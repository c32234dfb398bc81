//! Identity and session management: token codec, session store, session
//! service, and the per-request principal/context types.
//! Keep the public surface thin and split implementation across sub-modules.

mod directory;
mod principal;
mod request_context;
mod session;
mod store;
mod token;

pub use directory::{hash_password, verify_password, MemoryUserDirectory, UserDirectory, UserRecord};
pub use principal::{Principal, UserSnapshot};
pub use request_context::{EarlyResponse, RequestContext};
pub use session::{AuthOutcome, SessionService, SESSION_MIDDLEWARE_PRIORITY};
pub use store::{MemoryCache, SessionCache, SessionStore};
pub use token::{Claims, TokenCodec, TokenError};
