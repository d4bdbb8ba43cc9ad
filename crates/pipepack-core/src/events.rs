//! Progress channel.
//!
//! Every stage reports through a [`Reporter`], a cheap cloneable handle on an
//! unbounded channel. The renderer owns the receiving end. Events are
//! ephemeral: once received they are gone.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::trace;

/// Worker lifecycle state shown by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerState {
    Running,
    Watching,
    Error,
}

impl WorkerState {
    /// Terminal color tag paired with this state.
    #[must_use]
    pub fn color(self) -> StatusColor {
        match self {
            Self::Running | Self::Watching => StatusColor::Yellow,
            Self::Error => StatusColor::Red,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Watching => "WATCHING",
            Self::Error => "ERROR",
        }
    }
}

/// Terminal color tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Yellow,
    Red,
}

/// Severity of a worker message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgLevel {
    Log,
    Error,
}

/// A single progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    WorkerUpdate {
        id: String,
        state: WorkerState,
        color: StatusColor,
    },
    WorkerMsg {
        id: String,
        level: MsgLevel,
        text: String,
    },
    WorkerComplete {
        id: String,
        error: Option<String>,
    },
    WorkerReset {
        id: String,
    },
    MissingWebModule {
        specifier: String,
    },
}

/// Sending half of the progress channel.
///
/// A reporter created with [`Reporter::silent`] drops everything, which is
/// what library callers without a renderer want.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    tx: Option<mpsc::UnboundedSender<PipelineEvent>>,
}

impl Reporter {
    /// Create a reporter and the receiver a renderer should drain.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A reporter that discards all events.
    #[must_use]
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: PipelineEvent) {
        trace!(?event, "pipeline event");
        if let Some(tx) = &self.tx {
            // A closed receiver just means nobody is rendering anymore.
            let _ = tx.send(event);
        }
    }

    pub fn update(&self, id: &str, state: WorkerState) {
        self.emit(PipelineEvent::WorkerUpdate {
            id: id.to_string(),
            state,
            color: state.color(),
        });
    }

    pub fn log(&self, id: &str, text: impl Into<String>) {
        self.emit(PipelineEvent::WorkerMsg {
            id: id.to_string(),
            level: MsgLevel::Log,
            text: text.into(),
        });
    }

    pub fn error(&self, id: &str, text: impl Into<String>) {
        self.emit(PipelineEvent::WorkerMsg {
            id: id.to_string(),
            level: MsgLevel::Error,
            text: text.into(),
        });
    }

    pub fn complete(&self, id: &str, error: Option<String>) {
        self.emit(PipelineEvent::WorkerComplete {
            id: id.to_string(),
            error,
        });
    }

    pub fn reset(&self, id: &str) {
        self.emit(PipelineEvent::WorkerReset { id: id.to_string() });
    }

    pub fn missing_web_module(&self, specifier: &str) {
        self.emit(PipelineEvent::MissingWebModule {
            specifier: specifier.to_string(),
        });
    }
}

/// Take every event currently queued on `rx` without waiting.
pub fn drain_events(rx: &mut mpsc::UnboundedReceiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
