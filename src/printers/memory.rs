// In-memory printer backend for tests and machines without a spooler.
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{PrinterBackend, PrinterError};

#[derive(Debug, Default)]
struct State {
    installed: Vec<String>,
    default: Option<String>,
    set_history: Vec<String>,
    failing: HashSet<String>,
}

/// A fake printer subsystem that records every default-printer switch.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPrinters {
    inner: Arc<Mutex<State>>,
}

impl InMemoryPrinters {
    pub fn new<I, S>(installed: I, default: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = State {
            installed: installed.into_iter().map(Into::into).collect(),
            default: default.map(str::to_string),
            ..State::default()
        };
        Self { inner: Arc::new(Mutex::new(state)) }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_default(&self) -> Option<String> {
        self.state().default.clone()
    }

    /// Every name passed to `set_default_printer`, in call order.
    pub fn set_history(&self) -> Vec<String> {
        self.state().set_history.clone()
    }

    /// Make switching to `name` fail.
    pub fn fail_switch_to(&self, name: &str) {
        self.state().failing.insert(name.to_string());
    }
}

#[async_trait]
impl PrinterBackend for InMemoryPrinters {
    async fn list_printers(&self) -> Result<Vec<String>, PrinterError> {
        Ok(self.state().installed.clone())
    }

    async fn default_printer(&self) -> Result<Option<String>, PrinterError> {
        Ok(self.current_default())
    }

    async fn set_default_printer(&self, name: &str) -> Result<(), PrinterError> {
        let mut state = self.state();
        state.set_history.push(name.to_string());
        if state.failing.contains(name) {
            return Err(PrinterError::Command(format!("cannot set default printer to {}", name)));
        }
        state.default = Some(name.to_string());
        Ok(())
    }
}
