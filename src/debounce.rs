//! Trailing-edge debounced validation for editors.
//!
//! Each [`ValidationDebouncer::schedule`] cancels the pending run and starts
//! a new quiet period. Only text that survives a full delay without being
//! replaced is validated; its result arrives on the channel returned by
//! [`ValidationDebouncer::new`], tagged with the generation it was
//! scheduled under so callers can discard stale results.

use crate::engine::{FormulaCheck, FormulaEngine};
use crate::validator::ValidationContext;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct DebouncedValidation {
    pub generation: u64,
    pub text: String,
    pub outcome: FormulaCheck,
}

pub struct ValidationDebouncer {
    engine: Arc<FormulaEngine>,
    delay: Duration,
    generation: u64,
    pending: Option<CancellationToken>,
    results: UnboundedSender<DebouncedValidation>,
}

impl ValidationDebouncer {
    /// Uses the delay from the engine's configuration.
    pub fn new(engine: Arc<FormulaEngine>) -> (Self, UnboundedReceiver<DebouncedValidation>) {
        let delay = Duration::from_millis(engine.config().debounce.delay_ms);
        Self::with_delay(engine, delay)
    }

    pub fn with_delay(
        engine: Arc<FormulaEngine>,
        delay: Duration,
    ) -> (Self, UnboundedReceiver<DebouncedValidation>) {
        let (results, rx) = unbounded_channel();
        let debouncer = ValidationDebouncer {
            engine,
            delay,
            generation: 0,
            pending: None,
            results,
        };
        (debouncer, rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|token| !token.is_cancelled())
    }

    /// Drops the pending validation, if any.
    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
            tracing::trace!(generation = self.generation, "debounced validation cancelled");
        }
    }

    /// Schedules validation of `text` after the quiet period, replacing any
    /// validation still waiting. Must be called inside a tokio runtime.
    pub fn schedule(&mut self, text: impl Into<String>, context: Option<ValidationContext>) -> u64 {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;

        let token = CancellationToken::new();
        self.pending = Some(token.clone());

        let text = text.into();
        let engine = Arc::clone(&self.engine);
        let results = self.results.clone();
        let delay = self.delay;

        tracing::trace!(generation, delay_ms = delay.as_millis() as u64, "validation scheduled");

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = sleep(delay) => {}
            }

            let outcome = engine.validate_formula(&text, context.as_ref());
            if token.is_cancelled() {
                return;
            }
            // The receiver going away just means nobody is listening anymore.
            let _ = results.send(DebouncedValidation {
                generation,
                text,
                outcome,
            });
            // Marks the run as finished for `is_pending`.
            token.cancel();
        });

        generation
    }
}

impl Drop for ValidationDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
