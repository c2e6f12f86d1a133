use async_trait::async_trait;
use parking_lot::Mutex;

use kanji_esperanto_server::completion::{CaretContext, CaretSource, HostSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    Show,
    Hide,
}

/// Editing surface whose caret the test moves by hand
#[derive(Debug, Default)]
pub struct RecordingHost {
    caret: Mutex<CaretContext>,
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingHost {
    pub fn at(line: &str, column: usize) -> Self {
        Self {
            caret: Mutex::new(CaretContext::new(line, column)),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Caret at the end of `line`
    pub fn typed(line: &str) -> Self {
        Self::at(line, line.chars().count())
    }

    pub fn set_line(&self, line: &str) {
        *self.caret.lock() = CaretContext::new(line, line.chars().count());
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

impl CaretSource for RecordingHost {
    fn caret_context(&self) -> CaretContext {
        self.caret.lock().clone()
    }
}

#[async_trait]
impl HostSurface for RecordingHost {
    async fn show_completions(&self) {
        self.calls.lock().push(HostCall::Show);
    }

    async fn hide_completions(&self) {
        self.calls.lock().push(HostCall::Hide);
    }
}
