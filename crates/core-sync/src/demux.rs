//! Plugin-notification demultiplexer.
//!
//! The application channel multiplexes several message kinds over one
//! notification method; the first argument is a sub-method tag. Wire shapes:
//!
//! * `["buffer_update", context-map, [line, ...]]`
//! * `["buffer_update_incremental", context-map, line-number, line]`
//! * `["event", name, arg, ...]`
//!
//! The context map carries `path`, `total_lines`, `version`, and `line`
//! (the edited line, zero-based). Unknown tags and ill-shaped payloads are
//! logged and skipped, never fatal; the channel is expected to grow.

use crate::BufferContext;
use core_wire::Value;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum PluginMessage {
    BufferUpdate {
        context: BufferContext,
        lines: Vec<String>,
    },
    BufferUpdateIncremental {
        context: BufferContext,
        line_number: usize,
        line: String,
    },
    Event {
        name: String,
        args: Vec<Value>,
    },
}

/// Decode one plugin notification payload. `None` means the payload was
/// unusable and has been logged.
pub fn decode_plugin_notification(args: &[Value]) -> Option<PluginMessage> {
    let Some(tag) = args.first().and_then(Value::as_str) else {
        warn!(target: "sync.demux", "notification_missing_tag");
        return None;
    };
    match tag {
        "buffer_update" => {
            let context = decode_context(args.get(1))?;
            let lines = decode_lines(args.get(2))?;
            Some(PluginMessage::BufferUpdate { context, lines })
        }
        "buffer_update_incremental" => {
            let context = decode_context(args.get(1))?;
            let line_number = args.get(2).and_then(Value::as_u64).or_else(|| {
                warn!(target: "sync.demux", "incremental_missing_line_number");
                None
            })? as usize;
            let line = args.get(3).and_then(Value::as_str).map(str::to_string).or_else(|| {
                warn!(target: "sync.demux", "incremental_missing_line_text");
                None
            })?;
            Some(PluginMessage::BufferUpdateIncremental {
                context,
                line_number,
                line,
            })
        }
        "event" => {
            let name = args.get(1).and_then(Value::as_str)?.to_string();
            Some(PluginMessage::Event {
                name,
                args: args.get(2..).unwrap_or_default().to_vec(),
            })
        }
        other => {
            warn!(target: "sync.demux", tag = other, "unknown_sub_method_skipped");
            None
        }
    }
}

fn decode_context(value: Option<&Value>) -> Option<BufferContext> {
    let Some(map) = value else {
        warn!(target: "sync.demux", "context_missing");
        return None;
    };
    let read = |key: &str| -> Option<&Value> { map.map_get(key) };
    let context = (|| {
        Some(BufferContext {
            file_path: read("path")?.as_str()?.to_string(),
            total_lines: read("total_lines")?.as_u64()? as usize,
            version: read("version")?.as_u64()?,
            current_line: read("line")?.as_u64()? as usize,
        })
    })();
    if context.is_none() {
        warn!(target: "sync.demux", "context_ill_typed");
    }
    context
}

fn decode_lines(value: Option<&Value>) -> Option<Vec<String>> {
    let Some(items) = value.and_then(Value::as_array) else {
        warn!(target: "sync.demux", "lines_missing_or_not_array");
        return None;
    };
    let lines: Option<Vec<String>> = items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect();
    if lines.is_none() {
        warn!(target: "sync.demux", "lines_ill_typed");
    }
    lines
}
