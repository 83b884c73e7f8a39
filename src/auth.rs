//! Bearer-token supply for the gateway.

use std::sync::Mutex;

/// Supplies the bearer token attached to every gateway request.
///
/// The gateway calls [`invalidate`](TokenProvider::invalidate) whenever a
/// request comes back 401, so the next call re-authenticates instead of
/// replaying a dead credential.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Option<String>;
    fn invalidate(&self);
}

/// In-memory token store, good for tests and simple hosts.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock().unwrap() = Some(token.into());
    }
}

impl TokenProvider for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    fn invalidate(&self) {
        self.token.lock().unwrap().take();
    }
}
