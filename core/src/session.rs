use filter_deck_common::config::Config;
use filter_deck_common::frame::Frame;
use tracing::{debug, info, warn};

use crate::error::{SessionError, TransformError};
use crate::registry::FilterRegistry;
use crate::state::TransformState;

const DEFAULT_APP_NAME: &str = "Filter Deck";

/// Selection-changed notification handed to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub name: String,
    pub description: String,
    /// `"<app name> - <description>"`, ready for a title bar.
    pub title: String,
}

/// Result of converting one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Converted(Frame),
    /// The transform could not run; `frame` is the unmodified input.
    Degraded { frame: Frame, cause: TransformError },
}

impl Outcome {
    pub fn frame(&self) -> &Frame {
        match self {
            Outcome::Converted(frame) | Outcome::Degraded { frame, .. } => frame,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded { .. })
    }
}

type Observer = Box<dyn FnMut(&Selection) + Send>;

/// Owns the active filter and its cross-frame state, and dispatches frames.
///
/// Single caller: `convert` is invoked once per frame from one loop, and
/// every selection change discards the previous filter's history.
pub struct FilterSession {
    registry: FilterRegistry,
    app_name: String,
    current: usize,
    state: TransformState,
    observer: Option<Observer>,
    /// Filters whose unavailability has already been reported at `warn`.
    warned: Vec<bool>,
}

impl FilterSession {
    pub fn new(registry: FilterRegistry, index: usize) -> Result<Self, SessionError> {
        let count = registry.count();
        if count == 0 {
            return Err(SessionError::EmptyRegistry);
        }
        if index >= count {
            return Err(SessionError::InvalidIndex {
                index: index as isize,
                count,
            });
        }

        for (i, descriptor) in registry.iter().enumerate() {
            if let Err(e) = descriptor.transform.availability() {
                warn!(
                    index = i,
                    filter = %descriptor.name,
                    error = %e,
                    "filter unavailable, frames will pass through unmodified"
                );
            }
        }

        Ok(Self {
            registry,
            app_name: DEFAULT_APP_NAME.to_string(),
            current: index,
            state: TransformState::default(),
            observer: None,
            warned: vec![false; count],
        })
    }

    /// Standard deck, starting on `session.default_filter`.
    pub fn from_config(config: &Config) -> Result<Self, SessionError> {
        let registry = FilterRegistry::standard(config);
        let name = &config.session.default_filter;
        let index = registry
            .position(name)
            .ok_or_else(|| SessionError::UnknownFilter(name.clone()))?;
        Ok(Self::new(registry, index)?.with_app_name(&config.session.app_name))
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Register the selection-changed callback, replacing any previous one.
    pub fn on_select(&mut self, observer: impl FnMut(&Selection) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    // -- Selection --------------------------------------------------------------

    pub fn current(&self) -> usize {
        self.current
    }

    /// Select filter `index`. Out-of-range indices leave the selection as is.
    pub fn set(&mut self, index: isize) -> Result<(), SessionError> {
        let count = self.count();
        match usize::try_from(index) {
            Ok(i) if i < count => {
                self.select(i);
                Ok(())
            }
            _ => Err(SessionError::InvalidIndex { index, count }),
        }
    }

    /// Step forward, wrapping to the first filter. Returns the new index.
    pub fn next(&mut self) -> usize {
        self.step(1)
    }

    /// Step back, wrapping to the last filter. Returns the new index.
    pub fn previous(&mut self) -> usize {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> usize {
        let count = self.count() as isize;
        let index = (self.current as isize + delta).rem_euclid(count) as usize;
        self.select(index);
        index
    }

    fn select(&mut self, index: usize) {
        self.current = index;
        self.state.reset();
        let selection = self.selection();
        info!(index, filter = %selection.name, "filter selected");
        if let Some(observer) = self.observer.as_mut() {
            observer(&selection);
        }
    }

    pub fn selection(&self) -> Selection {
        let (name, description) = self.registry.describe(self.current);
        Selection {
            index: self.current,
            name: name.to_string(),
            description: description.to_string(),
            title: format!("{} - {}", self.app_name, description),
        }
    }

    pub fn title(&self) -> String {
        self.selection().title
    }

    pub fn names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn count(&self) -> usize {
        self.registry.count()
    }

    // -- Dispatch ---------------------------------------------------------------

    /// Run the selected filter on `frame`. Never fails: a transform error
    /// yields the input frame and drops the filter's history.
    pub fn convert(&mut self, frame: &Frame) -> Outcome {
        let descriptor = self.registry.get(self.current);
        match descriptor.transform.apply(frame, &mut self.state) {
            Ok(out) => Outcome::Converted(out),
            Err(cause) => {
                self.state.reset();
                match &cause {
                    TransformError::Unavailable(_) if !self.warned[self.current] => {
                        self.warned[self.current] = true;
                        warn!(
                            filter = %descriptor.name,
                            error = %cause,
                            "filter unavailable, passing frames through"
                        );
                    }
                    _ => debug!(
                        filter = %descriptor.name,
                        seq = frame.seq,
                        error = %cause,
                        "degraded frame"
                    ),
                }
                Outcome::Degraded {
                    frame: frame.clone(),
                    cause,
                }
            }
        }
    }
}
