mod error;
mod middleware;
mod state;

pub use error::AuthError;
pub use middleware::{bearer_token, require_auth, require_worker_key};
pub use state::{AuthContext, AuthState, Claims, SUPABASE_AUDIENCE, WorkerKey};
