//! Per-sandbox log capture.
//!
//! Every event recorded under a sandbox's [`Dispatch`] is kept as one JSON
//! line in its [`LogHistory`], which the host reads through `getLogs`.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use tracing::{Dispatch, Level, Subscriber, field::Visit};
use tracing_subscriber::{
    Layer, Registry,
    filter::LevelFilter,
    fmt,
    layer::{Context, Layered, SubscriberExt},
};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Formatted log lines in the order they were recorded.
#[derive(Debug, Clone, Default)]
pub struct LogHistory(Arc<Mutex<Vec<String>>>);

impl LogHistory {
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// The history as a JSON array of strings.
    ///
    /// # Errors
    /// Serialization failure.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&*self.0.lock())?)
    }

    fn push(&self, line: String) {
        self.0.lock().push(line);
    }
}

struct FieldVisitor<Rec: FnMut(&'static str, Json)> {
    rec: Rec,
}

impl<Rec: FnMut(&'static str, Json)> FieldVisitor<Rec> {
    const fn new(rec: Rec) -> Self {
        Self { rec }
    }
}

impl<Rec: FnMut(&'static str, Json)> Visit for FieldVisitor<Rec> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        (self.rec)(field.name(), Json::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        (self.rec)(field.name(), Json::from(value));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        (self.rec)(field.name(), Json::from(format!("{value:?}")));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        (self.rec)(field.name(), Json::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        (self.rec)(field.name(), Json::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        (self.rec)(field.name(), Json::from(value));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        (self.rec)(field.name(), Json::from(value.to_string()));
    }
}

const fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Appends every event to a [`LogHistory`] as
/// `{"level", "time", "msg", ...fields}`.
pub struct HistoryLayer {
    history: LogHistory,
}

impl HistoryLayer {
    #[must_use]
    pub const fn new(history: LogHistory) -> Self {
        Self { history }
    }
}

impl<S: Subscriber> Layer<S> for HistoryLayer {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut line = Map::new();
        line.insert(
            "level".to_owned(),
            Json::from(level_name(*event.metadata().level())),
        );
        line.insert(
            "time".to_owned(),
            Json::from(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        event.record(&mut FieldVisitor::new(|name, value| {
            let key = if name == "message" { "msg" } else { name };
            line.insert(key.to_owned(), value);
        }));
        self.history.push(Json::Object(line).to_string());
    }
}

type Base = Layered<HistoryLayer, Layered<LevelFilter, Registry>>;

fn echo_layer(format: LogFormat) -> Box<dyn Layer<Base> + Send + Sync> {
    match format {
        LogFormat::Text => fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::io::stdout)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stdout)
            .boxed(),
    }
}

/// The logging stack of one sandbox.
#[derive(Clone)]
pub struct Logger {
    history: LogHistory,
    dispatch: Dispatch,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("lines", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Records at `DEBUG` when `verbose`, `INFO` otherwise. With
    /// `echo_stdout`, events are also printed in `format`.
    #[must_use]
    pub fn new(verbose: bool, format: LogFormat, echo_stdout: bool) -> Self {
        let history = LogHistory::default();
        let level = if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let subscriber = Registry::default()
            .with(level)
            .with(HistoryLayer::new(history.clone()))
            .with(echo_stdout.then(|| echo_layer(format)));
        Self {
            history,
            dispatch: Dispatch::new(subscriber),
        }
    }

    #[must_use]
    pub const fn history(&self) -> &LogHistory {
        &self.history
    }

    #[must_use]
    pub const fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }
}
