//! Route-controller collaborator contract (spec §6.1). The core never
//! touches mwan3/UCI itself; it only calls `switch` and surfaces the result.

pub trait Controller: Send + Sync {
    fn switch(&self, from: Option<&str>, to: &str) -> anyhow::Result<()>;
}

/// No-op controller for tests and dry-run embedders.
pub struct NullController;

impl Controller for NullController {
    fn switch(&self, _from: Option<&str>, _to: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Records every call it receives without performing any real route change;
/// used by the scenario tests in `tests/scenarios.rs`.
#[derive(Default)]
pub struct RecordingController {
    calls: parking_lot::Mutex<Vec<(Option<String>, String)>>,
}

impl RecordingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(Option<String>, String)> {
        self.calls.lock().clone()
    }
}

impl Controller for RecordingController {
    fn switch(&self, from: Option<&str>, to: &str) -> anyhow::Result<()> {
        self.calls.lock().push((from.map(str::to_string), to.to_string()));
        Ok(())
    }
}
