// src/logging.rs

//! Log routing
//!
//! Library code logs through `tracing`. A `LogRouter` fans those events out
//! to any number of sinks that can be attached, swapped and removed at run
//! time; `RouterLayer` is the `tracing_subscriber` layer that feeds the
//! globally installed router.

use crate::error::{Error, Result};
use chrono::Utc;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, RwLock};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;

static GLOBAL_ROUTER: RwLock<Option<Arc<LogRouter>>> = RwLock::new(None);

/// Receives routed log records
pub trait LogSink: Send + Sync {
    fn write(&self, level: Level, target: &str, message: &str);
}

/// One captured record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
}

/// Sink keeping records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn write(&self, level: Level, target: &str, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(LogEntry {
                level,
                target: target.to_string(),
                message: message.to_string(),
            });
        }
    }
}

/// Sink writing timestamped lines to any writer (a log file, stderr)
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
    max_level: Level,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W, max_level: Level) -> Self {
        Self {
            writer: Mutex::new(writer),
            max_level,
        }
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn write(&self, level: Level, target: &str, message: &str) {
        if level > self.max_level {
            return;
        }
        if let Ok(mut w) = self.writer.lock() {
            // a broken log destination must not break the caller
            let _ = writeln!(
                w,
                "{} {:>5} {}: {}",
                Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                level,
                target,
                message
            );
        }
    }
}

/// Fan-out of log records to attached sinks
#[derive(Default)]
pub struct LogRouter {
    sinks: RwLock<Vec<Box<dyn LogSink>>>,
}

impl fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogRouter")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

impl LogRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink and return its index
    pub fn add_sink(&self, sink: Box<dyn LogSink>) -> usize {
        match self.sinks.write() {
            Ok(mut sinks) => {
                sinks.push(sink);
                sinks.len() - 1
            }
            Err(_) => 0,
        }
    }

    /// Put `sink` in place of the one at `index`, returning the old one
    pub fn swap_sink(&self, index: usize, sink: Box<dyn LogSink>) -> Result<Box<dyn LogSink>> {
        let mut sinks = self
            .sinks
            .write()
            .map_err(|_| Error::LogicError("Log router lock poisoned".to_string()))?;
        let slot = sinks
            .get_mut(index)
            .ok_or_else(|| Error::InvalidArgument(format!("No log sink at index {}", index)))?;
        Ok(std::mem::replace(slot, sink))
    }

    /// Detach the sink at `index`; later indexes shift down
    pub fn remove_sink(&self, index: usize) -> Result<Box<dyn LogSink>> {
        let mut sinks = self
            .sinks
            .write()
            .map_err(|_| Error::LogicError("Log router lock poisoned".to_string()))?;
        if index >= sinks.len() {
            return Err(Error::InvalidArgument(format!("No log sink at index {}", index)));
        }
        Ok(sinks.remove(index))
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn write(&self, level: Level, target: &str, message: &str) {
        if let Ok(sinks) = self.sinks.read() {
            for sink in sinks.iter() {
                sink.write(level, target, message);
            }
        }
    }
}

/// Make `router` the destination of `RouterLayer`
pub fn install_global(router: Arc<LogRouter>) -> Result<()> {
    let mut global = GLOBAL_ROUTER
        .write()
        .map_err(|_| Error::LogicError("Global logger lock poisoned".to_string()))?;
    if global.is_some() {
        return Err(Error::LoggerAlreadyRegistered);
    }
    *global = Some(router);
    Ok(())
}

/// Remove the global router, returning it if one was installed
pub fn uninstall_global() -> Option<Arc<LogRouter>> {
    GLOBAL_ROUTER.write().ok().and_then(|mut g| g.take())
}

pub fn global_router() -> Option<Arc<LogRouter>> {
    GLOBAL_ROUTER.read().ok().and_then(|g| g.clone())
}

struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}

/// Layer forwarding every event to the global `LogRouter`
#[derive(Debug, Default, Clone, Copy)]
pub struct RouterLayer;

impl<S: Subscriber> tracing_subscriber::Layer<S> for RouterLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let Some(router) = global_router() else {
            return;
        };
        let mut visitor = MessageVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);

        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&visitor.fields.join(" "));
        }
        let meta = event.metadata();
        router.write(*meta.level(), meta.target(), &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    struct Shared(Arc<MemorySink>);

    impl LogSink for Shared {
        fn write(&self, level: Level, target: &str, message: &str) {
            self.0.write(level, target, message);
        }
    }

    #[test]
    fn test_router_swaps_sinks() {
        let router = LogRouter::new();
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());

        let index = router.add_sink(Box::new(Shared(first.clone())));
        router.write(Level::INFO, "test", "one");
        router.swap_sink(index, Box::new(Shared(second.clone()))).unwrap();
        router.write(Level::INFO, "test", "two");

        assert_eq!(first.entries().len(), 1);
        assert_eq!(second.entries()[0].message, "two");
        assert!(router.swap_sink(5, Box::new(MemorySink::new())).is_err());
        router.remove_sink(index).unwrap();
        assert_eq!(router.sink_count(), 0);
    }

    #[test]
    fn test_global_registration_and_layer() {
        let router = Arc::new(LogRouter::new());
        let sink = Arc::new(MemorySink::new());
        router.add_sink(Box::new(Shared(sink.clone())));

        install_global(router.clone()).unwrap();
        assert!(matches!(
            install_global(Arc::new(LogRouter::new())),
            Err(Error::LoggerAlreadyRegistered)
        ));

        let subscriber = tracing_subscriber::registry().with(RouterLayer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(repo = "repo1", "metadata is stale");
        });

        assert!(uninstall_global().is_some());
        assert!(uninstall_global().is_none());

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, Level::WARN);
        assert_eq!(entries[0].message, "metadata is stale repo=repo1");
    }
}
