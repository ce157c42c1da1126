//! Lifecycle manager — owns teardown hooks for the resources a session opens.
//!
//! Constructed explicitly by the binary and passed to whoever registers
//! cleanup. Hooks run once, newest first.

use std::sync::Mutex;

use tracing::debug;

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct LifecycleManager {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    hooks: Vec<(String, Hook)>,
    disposed: bool,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named teardown hook.
    ///
    /// After [`dispose`](Self::dispose) the hook runs immediately instead.
    pub fn register(&self, name: impl Into<String>, hook: impl FnOnce() + Send + 'static) {
        let name = name.into();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.disposed {
            drop(state);
            debug!(hook = %name, "Lifecycle: already disposed, running hook now");
            hook();
            return;
        }
        state.hooks.push((name, Box::new(hook)));
    }

    /// Run every registered hook in reverse order. Later calls do nothing.
    pub fn dispose(&self) {
        let hooks = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.hooks)
        };

        for (name, hook) in hooks.into_iter().rev() {
            debug!(hook = %name, "Lifecycle: running teardown hook");
            hook();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().map(|s| s.disposed).unwrap_or(true)
    }

    /// Number of hooks waiting for disposal.
    pub fn pending(&self) -> usize {
        self.state.lock().map(|s| s.hooks.len()).unwrap_or(0)
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        self.dispose();
    }
}
