// src/logging/syslog.rs

//! `tracing` layer that mirrors events to the local syslog socket.
//!
//! Lines use the BSD format `<PRI>taskmaster[PID]: MESSAGE`, with the daemon
//! facility. Span fields are prefixed like the `fmt` layer does
//! (`worker{job=web instance=0}: ...`) so each line names its job.
//!
//! Sends are non-blocking. A full or vanished socket drops the line.

use std::fmt::{self, Write as _};
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::Path;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Where the local syslog daemon listens.
pub const SYSLOG_SOCKET: &str = "/dev/log";

const TAG: &str = "taskmaster";
const FACILITY_DAEMON: u8 = 3;

pub struct SyslogLayer {
    socket: UnixDatagram,
    pid: u32,
}

impl fmt::Debug for SyslogLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyslogLayer")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl SyslogLayer {
    pub fn connect(path: impl AsRef<Path>) -> io::Result<Self> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(path)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            pid: std::process::id(),
        })
    }
}

/// Syslog severity for a `tracing` level.
pub fn severity(level: &Level) -> u8 {
    match *level {
        Level::ERROR => 3,
        Level::WARN => 4,
        Level::INFO => 6,
        _ => 7,
    }
}

/// One complete syslog datagram.
pub fn format_line(level: &Level, pid: u32, message: &str) -> String {
    format!(
        "<{}>{TAG}[{pid}]: {message}",
        FACILITY_DAEMON * 8 + severity(level)
    )
}

/// Formatted fields of a span, cached in its extensions.
struct SpanFields(String);

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: String,
}

impl FieldVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}

impl<S> Layer<S> for SyslogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut line = String::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                line.push_str(span.name());
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    if !fields.0.is_empty() {
                        let _ = write!(line, "{{{}}}", fields.0);
                    }
                }
                line.push_str(": ");
            }
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        line.push_str(&visitor.message);
        if !visitor.fields.is_empty() {
            line.push(' ');
            line.push_str(&visitor.fields);
        }

        let datagram = format_line(event.metadata().level(), self.pid, &line);
        let _ = self.socket.send(datagram.as_bytes());
    }
}
