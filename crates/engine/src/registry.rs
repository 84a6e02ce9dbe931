use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

/// Cooperative stop flag for one run. The orchestrator polls
/// [`CancelToken::is_cancelled`] between steps and between models — there is
/// no way to interrupt a single in-flight LLM or Wikipedia call, only to stop
/// starting new ones.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps live run ids to the token that stops them, so `/runs/{id}/stop` can
/// reach an orchestration loop it has no other handle on.
#[derive(Clone)]
pub struct RunRegistry {
    tokens: Arc<Mutex<HashMap<Uuid, CancelToken>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn register(&self, run_id: Uuid) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(run_id, token.clone());
        token
    }

    /// Returns `true` if the run was found and signalled to stop.
    pub fn request_stop(&self, run_id: Uuid) -> bool {
        match self.tokens.lock().get(&run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, run_id: Uuid) -> bool {
        self.tokens.lock().contains_key(&run_id)
    }

    pub fn remove(&self, run_id: Uuid) {
        self.tokens.lock().remove(&run_id);
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_is_observed() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn request_stop_unknown_run_returns_false() {
        let registry = RunRegistry::new();
        assert!(!registry.request_stop(Uuid::new_v4()));
    }

    #[test]
    fn request_stop_cancels_the_registered_token() {
        let registry = RunRegistry::new();
        let run_id = Uuid::new_v4();
        let token = registry.register(run_id);
        assert!(registry.request_stop(run_id));
        assert!(token.is_cancelled());
    }

    #[test]
    fn remove_drops_activity() {
        let registry = RunRegistry::new();
        let run_id = Uuid::new_v4();
        registry.register(run_id);
        assert!(registry.is_active(run_id));
        registry.remove(run_id);
        assert!(!registry.is_active(run_id));
    }
}
