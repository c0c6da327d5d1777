use crate::core::story::ProgressEvent;
use log::debug;

/// Counts completed steps for one run and forwards every change to the
/// caller's callback as it happens.
pub struct ProgressReporter<'a> {
    completed_steps: usize,
    total_steps: usize,
    on_progress: Box<dyn FnMut(&ProgressEvent) + Send + 'a>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new<F>(total_steps: usize, on_progress: F) -> Self
    where
        F: FnMut(&ProgressEvent) + Send + 'a,
    {
        Self {
            completed_steps: 0,
            total_steps,
            on_progress: Box::new(on_progress),
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Emits at the current count.
    pub fn report(&mut self, message: impl Into<String>) -> ProgressEvent {
        self.emit(message.into())
    }

    /// Counts one finished step, then emits.
    pub fn advance(&mut self, message: impl Into<String>) -> ProgressEvent {
        self.completed_steps += 1;
        self.emit(message.into())
    }

    fn emit(&mut self, message: String) -> ProgressEvent {
        let event = ProgressEvent {
            completed_steps: self.completed_steps,
            total_steps: self.total_steps,
            message,
        };
        debug!(
            "progress {}/{}: {}",
            event.completed_steps, event.total_steps, event.message
        );
        (self.on_progress)(&event);
        event
    }
}
