//! Tracing setup
//!
//! The node binary logs to stderr through [`init_tracing`]. Hosts that embed the
//! core (e.g. a mobile app wrapping the service) register a [`CoreLogger`]
//! callback instead and receive one formatted line per event.

use std::fmt::Write;
use std::sync::Arc;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer};

/// Receives log lines from the core
pub trait CoreLogger: Send + Sync {
    fn log(&self, level: String, message: String);
}

/// Layer forwarding every event to a [`CoreLogger`]
pub struct CallbackLayer {
    logger: Arc<dyn CoreLogger>,
}

impl CallbackLayer {
    pub fn new(logger: Arc<dyn CoreLogger>) -> Self {
        Self { logger }
    }
}

impl<S> Layer<S> for CallbackLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = event.metadata().level().to_string();
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.logger.log(level, visitor.into_line());
    }
}

/// Collects the event message followed by `key=value` pairs
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn into_line(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl tracing::field::Visit for LineVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Install the callback logger as the global subscriber.
///
/// `directive` is a tracing filter such as `"info"` or `"peermsg_core=debug"`.
/// Returns false when a global subscriber was already installed.
pub fn init_logger(callback: Box<dyn CoreLogger>, directive: &str) -> bool {
    let subscriber = tracing_subscriber::registry()
        .with(CallbackLayer::new(Arc::from(callback)))
        .with(EnvFilter::new(directive));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// Install a stderr formatter. `RUST_LOG` takes precedence over `directive`.
pub fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
