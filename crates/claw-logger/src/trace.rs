//! Trace correlation identifiers and tagged log lines.
//!
//! A [`TraceContext`] carries a trace id shared by every event of one
//! logical request, a span id for the current unit of work and a child
//! span id handed to the next hop. Tagged emitters flatten a classification
//! tag plus key/value fields into one line:
//!
//! ```text
//! _com_http_success||status=200||trace_id=...||span_id=...
//! ```

use std::collections::HashMap;
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::panic::Location;

use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use serde_json::Value;

use crate::level::LogLevel;
use crate::logger::Logger;

/// Classification tag used when none is given.
pub const DL_TAG_UNDEFINED: &str = "_undef";
/// MySQL call failed.
pub const DL_TAG_MYSQL_FAILED: &str = "_com_mysql_failure";
/// Redis call failed.
pub const DL_TAG_REDIS_FAILED: &str = "_com_redis_failure";
/// MySQL call succeeded.
pub const DL_TAG_MYSQL_SUCCESS: &str = "_com_mysql_success";
/// Redis call succeeded.
pub const DL_TAG_REDIS_SUCCESS: &str = "_com_redis_success";
/// Thrift call failed.
pub const DL_TAG_THRIFT_FAILED: &str = "_com_thrift_failure";
/// Thrift call succeeded.
pub const DL_TAG_THRIFT_SUCCESS: &str = "_com_thrift_success";
/// Outgoing HTTP call succeeded.
pub const DL_TAG_HTTP_SUCCESS: &str = "_com_http_success";
/// Outgoing HTTP call failed.
pub const DL_TAG_HTTP_FAILED: &str = "_com_http_failure";
/// TCP connection failed.
pub const DL_TAG_TCP_FAILED: &str = "_com_tcp_failure";
/// Incoming request received.
pub const DL_TAG_REQUEST_IN: &str = "_com_request_in";
/// Response sent for an incoming request.
pub const DL_TAG_REQUEST_OUT: &str = "_com_request_out";

/// Prefix shared by business event tags.
pub const DL_TAG_BIZ_PREFIX: &str = "_com_";

/// Reserved field holding the classification tag.
pub const KEY_DL_TAG: &str = "dl_tag";
/// Reserved field holding the trace id.
pub const KEY_TRACE_ID: &str = "trace_id";
/// Reserved field holding the span id.
pub const KEY_SPAN_ID: &str = "span_id";
/// Reserved field holding the child span id.
pub const KEY_CHILD_SPAN_ID: &str = "child_span_id";

/// Marker closing every trace id, identifying the producing runtime.
pub const TRACE_ID_MARKER: &str = "b0";
/// Length of a trace id.
pub const TRACE_ID_LEN: usize = 32;
/// Length of a span id.
pub const SPAN_ID_LEN: usize = 16;

/// Key/value annotations of a tagged log line.
pub type TagFields = HashMap<String, Value>;

static LOCAL_IPV4: Lazy<Ipv4Addr> = Lazy::new(|| discover_local_ipv4().unwrap_or(Ipv4Addr::UNSPECIFIED));

/// Finds the address of the interface holding the default route.
///
/// Connecting a UDP socket only consults the routing table; nothing is sent.
fn discover_local_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// The local IPv4 address used in identifiers, `0.0.0.0` if unknown.
#[must_use]
pub fn local_ipv4() -> Ipv4Addr {
    *LOCAL_IPV4
}

/// Generates a trace id for this host.
#[must_use]
pub fn trace_id() -> String {
    trace_id_for(Some(IpAddr::V4(local_ipv4())))
}

/// Generates a trace id embedding `ip`.
///
/// Layout, all lowercase hex: IPv4 (8), unix seconds (8), low 16 bits of
/// the unix nanosecond clock (4), low 16 bits of the pid (4), random (6),
/// then [`TRACE_ID_MARKER`]. IPv6 or missing addresses encode as zeros.
#[must_use]
pub fn trace_id_for(ip: Option<IpAddr>) -> String {
    let now = Utc::now();
    let ip = match ip {
        Some(IpAddr::V4(v4)) => u32::from(v4),
        Some(IpAddr::V6(v6)) => v6.to_ipv4_mapped().map_or(0, u32::from),
        None => 0,
    };
    let seconds = now.timestamp() as u32;
    let nanos = now.timestamp_nanos_opt().unwrap_or_default() & 0xffff;
    let pid = std::process::id() & 0xffff;
    let random: u32 = rand::thread_rng().gen_range(0..1 << 24);

    let mut id = String::with_capacity(TRACE_ID_LEN);
    let _ = write!(
        id,
        "{ip:08x}{seconds:08x}{nanos:04x}{pid:04x}{random:06x}{TRACE_ID_MARKER}"
    );
    id
}

/// Generates a span id: the local address XOR unix seconds, then a random
/// 31-bit value, each as 8 hex digits.
#[must_use]
pub fn span_id() -> String {
    span_id_for(local_ipv4())
}

fn span_id_for(ip: Ipv4Addr) -> String {
    let seconds = Utc::now().timestamp() as u32;
    let random: u32 = rand::thread_rng().gen_range(0..=i32::MAX as u32);
    format!("{:08x}{random:08x}", u32::from(ip) ^ seconds)
}

/// Correlation identifiers for one logical operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    /// Shared by every event of the request.
    pub trace_id: String,
    /// The current unit of work.
    pub span_id: String,
    /// Span id handed to the next nested call.
    pub child_span_id: String,
    /// Free-form caller description.
    pub caller: String,
    /// Method that started the operation.
    pub src_method: String,
    /// Application-defined hint code.
    pub hint_code: i64,
    /// Application-defined hint text.
    pub hint_content: String,
}

impl TraceContext {
    /// Starts a new trace with fresh trace and span ids.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace_id: trace_id(),
            span_id: span_id(),
            ..Self::default()
        }
    }

    /// Continues an existing trace received from upstream.
    #[must_use]
    pub fn with_ids(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
            ..Self::default()
        }
    }

    /// Produces a fresh child span id, stores it and returns it.
    pub fn new_child_span(&mut self) -> &str {
        self.child_span_id = span_id();
        &self.child_span_id
    }

    /// Derives the context of a nested call: same trace, with this
    /// context's freshly produced child span as its span.
    #[must_use]
    pub fn child(&mut self) -> Self {
        let span = self.new_child_span().to_string();
        Self {
            trace_id: self.trace_id.clone(),
            span_id: span,
            caller: self.caller.clone(),
            src_method: self.src_method.clone(),
            ..Self::default()
        }
    }

    fn annotate(&self, dl_tag: &str, fields: &mut TagFields) {
        fields.insert(KEY_DL_TAG.to_string(), Value::from(check_dl_tag(dl_tag)));
        fields.insert(KEY_TRACE_ID.to_string(), Value::from(self.trace_id.as_str()));
        fields.insert(
            KEY_CHILD_SPAN_ID.to_string(),
            Value::from(self.child_span_id.as_str()),
        );
        fields.insert(KEY_SPAN_ID.to_string(), Value::from(self.span_id.as_str()));
    }
}

/// Validates a classification tag.
///
/// Every tag is currently accepted unchanged; tags are expected to start
/// with [`DL_TAG_BIZ_PREFIX`] or be [`DL_TAG_UNDEFINED`].
#[must_use]
pub fn check_dl_tag(tag: &str) -> &str {
    tag
}

/// Flattens tagged fields into `tag||key=value||...`.
///
/// The tag comes from the reserved `dl_tag` field (a string) and defaults to
/// [`DL_TAG_UNDEFINED`]; the reserved field is not repeated. String values
/// are written bare, `null` as `<nil>`, other values as compact JSON. The
/// result is escaped like a quoted literal (without the quotes) so it stays
/// on one line.
#[must_use]
pub fn parse_params(fields: &TagFields) -> String {
    let mut line = match fields.get(KEY_DL_TAG) {
        Some(Value::String(tag)) => tag.clone(),
        _ => DL_TAG_UNDEFINED.to_string(),
    };
    for (key, value) in fields.iter().filter(|(k, _)| k.as_str() != KEY_DL_TAG) {
        let _ = match value {
            Value::String(s) => write!(line, "||{key}={s}"),
            Value::Null => write!(line, "||{key}=<nil>"),
            other => write!(line, "||{key}={other}"),
        };
    }
    escape(&line)
}

fn escape(line: &str) -> String {
    let quoted = format!("{line:?}");
    quoted[1..quoted.len() - 1].to_string()
}

impl Logger {
    #[track_caller]
    fn tag(&self, level: LogLevel, trace: &TraceContext, dl_tag: &str, mut fields: TagFields) {
        if !self.enabled(level) {
            return;
        }
        trace.annotate(dl_tag, &mut fields);
        let line = parse_params(&fields);
        if let Err(err) = self.emit(level, Location::caller(), format_args!("{line}")) {
            tracing::warn!(error = %err, level = %level, "dropped tagged log record");
        }
    }

    /// Emits a tagged TRACE line.
    #[track_caller]
    pub fn tag_trace(&self, trace: &TraceContext, dl_tag: &str, fields: TagFields) {
        self.tag(LogLevel::Trace, trace, dl_tag, fields);
    }

    /// Emits a tagged DEBUG line.
    #[track_caller]
    pub fn tag_debug(&self, trace: &TraceContext, dl_tag: &str, fields: TagFields) {
        self.tag(LogLevel::Debug, trace, dl_tag, fields);
    }

    /// Emits a tagged INFO line.
    #[track_caller]
    pub fn tag_info(&self, trace: &TraceContext, dl_tag: &str, fields: TagFields) {
        self.tag(LogLevel::Info, trace, dl_tag, fields);
    }

    /// Emits a tagged WARNING line.
    #[track_caller]
    pub fn tag_warn(&self, trace: &TraceContext, dl_tag: &str, fields: TagFields) {
        self.tag(LogLevel::Warning, trace, dl_tag, fields);
    }

    /// Emits a tagged ERROR line.
    #[track_caller]
    pub fn tag_error(&self, trace: &TraceContext, dl_tag: &str, fields: TagFields) {
        self.tag(LogLevel::Error, trace, dl_tag, fields);
    }
}
