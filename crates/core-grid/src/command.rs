//! Redraw command decoding.
//!
//! The redraw notification carries a batch: an array of entries, each
//! `[name, tuple, tuple, ...]` where every tuple is one invocation of that
//! command. Dispatch is a closed enum decoded once here at the protocol
//! boundary; the interpreter never sees strings. Unknown command names and
//! ill-typed tuples are logged at warn and skipped; the protocol grows
//! commands over time and a single odd entry must not poison the batch.

use crate::cell::{CellFlags, Color};
use core_wire::Value;
use tracing::warn;

/// Editor mode as reported by mode-change commands. `Other` keeps unknown
/// modes flowing through without loss (forward compatible, like command
/// names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorMode {
    Normal,
    Insert,
    Visual,
    Replace,
    CommandLine,
    Other(String),
}

impl EditorMode {
    pub fn from_name(name: &str) -> Self {
        match name {
            "normal" => EditorMode::Normal,
            "insert" => EditorMode::Insert,
            "visual" => EditorMode::Visual,
            "replace" => EditorMode::Replace,
            "cmdline_normal" | "cmdline" => EditorMode::CommandLine,
            other => EditorMode::Other(other.to_string()),
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, EditorMode::Insert)
    }
}

/// Attribute state set by highlight-set; tags every subsequent put.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightAttrs {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub flags: CellFlags,
}

impl HighlightAttrs {
    /// Decode from the wire map. Absent keys reset to default; the editor
    /// sends the complete attribute state each time, not a delta.
    fn from_map(map: &Value) -> Self {
        let mut attrs = HighlightAttrs::default();
        attrs.fg = map
            .map_get("foreground")
            .and_then(Value::as_u64)
            .map(|n| Color(n as u32));
        attrs.bg = map
            .map_get("background")
            .and_then(Value::as_u64)
            .map(|n| Color(n as u32));
        let mut flag = |key: &str, bit: CellFlags| {
            if map.map_get(key).and_then(Value::as_bool).unwrap_or(false) {
                attrs.flags |= bit;
            }
        };
        flag("bold", CellFlags::BOLD);
        flag("italic", CellFlags::ITALIC);
        flag("underline", CellFlags::UNDERLINE);
        flag("reverse", CellFlags::REVERSE);
        flag("undercurl", CellFlags::UNDERCURL);
        attrs
    }
}

/// One completion-menu item (surfaced to chrome, never rendered here).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupItem {
    pub word: String,
    pub kind: String,
    pub menu: String,
    pub info: String,
}

/// One decoded grid-mutation action.
#[derive(Debug, Clone, PartialEq)]
pub enum RedrawCommand {
    CursorGoto { row: u16, col: u16 },
    Put { glyphs: Vec<String> },
    SetScrollRegion { top: u16, bottom: u16, left: u16, right: u16 },
    Scroll { count: i64 },
    HighlightSet { attrs: HighlightAttrs },
    Resize { cols: u16, rows: u16 },
    EolClear,
    Clear,
    UpdateBg { color: Color },
    UpdateFg { color: Color },
    ModeChange { mode: EditorMode },
    PopupMenuShow { items: Vec<PopupItem>, selected: i64, row: u16, col: u16 },
    /// Command name this core does not (yet) understand. Logged and skipped
    /// by the interpreter.
    Unknown { name: String },
}

/// Decode a full redraw batch. Entries that fail to decode are skipped with
/// a warning; the rest of the batch still applies, in array order.
pub fn decode_batch(args: &[Value]) -> Vec<RedrawCommand> {
    let mut commands = Vec::new();
    for entry in args {
        decode_entry(entry, &mut commands);
    }
    commands
}

/// Decode one `[name, tuple...]` entry, appending its commands in order.
pub fn decode_entry(entry: &Value, out: &mut Vec<RedrawCommand>) {
    let Some(items) = entry.as_array() else {
        warn!(target: "redraw.decode", "batch entry is not an array");
        return;
    };
    let Some(name) = items.first().and_then(Value::as_str) else {
        warn!(target: "redraw.decode", "batch entry missing command name");
        return;
    };
    let tuples = &items[1..];
    // `put` tuples are consecutive single glyphs; merge them into one action
    // so the interpreter advances the cursor across the whole run. A bare
    // entry is an empty run: nothing to write, nothing to warn about.
    if name == "put" {
        if tuples.is_empty() {
            return;
        }
        let mut glyphs = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            match tuple.as_array().and_then(|t| t.first()).and_then(Value::as_str) {
                Some(glyph) => glyphs.push(glyph.to_string()),
                None => warn!(target: "redraw.decode", "put tuple missing glyph"),
            }
        }
        out.push(RedrawCommand::Put { glyphs });
        return;
    }
    if tuples.is_empty() {
        // Argument-free commands arrive as a bare [name].
        push_command(name, &[], out);
        return;
    }
    for tuple in tuples {
        match tuple.as_array() {
            Some(args) => push_command(name, args, out),
            None => warn!(target: "redraw.decode", command = name, "tuple is not an array"),
        }
    }
}

fn push_command(name: &str, args: &[Value], out: &mut Vec<RedrawCommand>) {
    let decoded = match name {
        "cursor_goto" => arg_u16(args, 0)
            .zip(arg_u16(args, 1))
            .map(|(row, col)| RedrawCommand::CursorGoto { row, col }),
        "set_scroll_region" => match (
            arg_u16(args, 0),
            arg_u16(args, 1),
            arg_u16(args, 2),
            arg_u16(args, 3),
        ) {
            (Some(top), Some(bottom), Some(left), Some(right)) => {
                Some(RedrawCommand::SetScrollRegion { top, bottom, left, right })
            }
            _ => None,
        },
        "scroll" => args
            .first()
            .and_then(Value::as_i64)
            .map(|count| RedrawCommand::Scroll { count }),
        "highlight_set" => args.first().map(|map| RedrawCommand::HighlightSet {
            attrs: HighlightAttrs::from_map(map),
        }),
        "resize" => arg_u16(args, 0)
            .zip(arg_u16(args, 1))
            .map(|(cols, rows)| RedrawCommand::Resize { cols, rows }),
        "eol_clear" => Some(RedrawCommand::EolClear),
        "clear" => Some(RedrawCommand::Clear),
        "update_bg" => arg_color(args).map(|color| RedrawCommand::UpdateBg { color }),
        "update_fg" => arg_color(args).map(|color| RedrawCommand::UpdateFg { color }),
        "mode_change" => args.first().and_then(Value::as_str).map(|mode| {
            RedrawCommand::ModeChange {
                mode: EditorMode::from_name(mode),
            }
        }),
        "popupmenu_show" => decode_popupmenu(args),
        other => {
            out.push(RedrawCommand::Unknown {
                name: other.to_string(),
            });
            return;
        }
    };
    match decoded {
        Some(cmd) => out.push(cmd),
        None => warn!(target: "redraw.decode", command = name, "ill-typed arguments, skipped"),
    }
}

fn decode_popupmenu(args: &[Value]) -> Option<RedrawCommand> {
    let raw_items = args.first()?.as_array()?;
    let mut items = Vec::with_capacity(raw_items.len());
    for raw in raw_items {
        let fields = raw.as_array()?;
        let field = |i: usize| -> String {
            fields
                .get(i)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        items.push(PopupItem {
            word: field(0),
            kind: field(1),
            menu: field(2),
            info: field(3),
        });
    }
    Some(RedrawCommand::PopupMenuShow {
        items,
        selected: args.get(1).and_then(Value::as_i64).unwrap_or(-1),
        row: arg_u16(args, 2)?,
        col: arg_u16(args, 3)?,
    })
}

fn arg_u16(args: &[Value], index: usize) -> Option<u16> {
    args.get(index)
        .and_then(Value::as_u64)
        .and_then(|n| u16::try_from(n).ok())
}

fn arg_color(args: &[Value]) -> Option<Color> {
    // The editor sends -1 for "unset"; map it to plain black/white defaults
    // upstream by skipping the update entirely.
    match args.first().and_then(Value::as_i64) {
        Some(n) if n >= 0 => Some(Color(n as u32)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(parts: Vec<Value>) -> Value {
        Value::Array(parts)
    }

    fn tuple(parts: Vec<Value>) -> Value {
        Value::Array(parts)
    }

    #[test]
    fn put_run_merges_into_one_command() {
        let batch = vec![entry(vec![
            Value::from("put"),
            tuple(vec![Value::from("H")]),
            tuple(vec![Value::from("i")]),
        ])];
        let cmds = decode_batch(&batch);
        assert_eq!(
            cmds,
            vec![RedrawCommand::Put {
                glyphs: vec!["H".into(), "i".into()]
            }]
        );
    }

    #[test]
    fn multiple_tuples_expand_in_order() {
        let batch = vec![entry(vec![
            Value::from("cursor_goto"),
            tuple(vec![Value::Int(1), Value::Int(2)]),
            tuple(vec![Value::Int(3), Value::Int(4)]),
        ])];
        let cmds = decode_batch(&batch);
        assert_eq!(
            cmds,
            vec![
                RedrawCommand::CursorGoto { row: 1, col: 2 },
                RedrawCommand::CursorGoto { row: 3, col: 4 },
            ]
        );
    }

    #[test]
    fn bare_put_entry_is_an_empty_run_not_unknown() {
        let batch = vec![entry(vec![Value::from("put")])];
        assert_eq!(decode_batch(&batch), vec![], "no command and no Unknown");
    }

    #[test]
    fn unknown_commands_surface_as_unknown() {
        let batch = vec![entry(vec![
            Value::from("win_viewport"),
            tuple(vec![Value::Int(1)]),
        ])];
        let cmds = decode_batch(&batch);
        assert_eq!(
            cmds,
            vec![RedrawCommand::Unknown {
                name: "win_viewport".into()
            }]
        );
    }

    #[test]
    fn ill_typed_tuple_is_skipped_without_poisoning_batch() {
        let batch = vec![
            entry(vec![Value::from("scroll"), tuple(vec![Value::from("NaN")])]),
            entry(vec![Value::from("clear")]),
        ];
        let cmds = decode_batch(&batch);
        assert_eq!(cmds, vec![RedrawCommand::Clear]);
    }

    #[test]
    fn highlight_decoding_full_state() {
        let map = Value::Map(vec![
            (Value::from("foreground"), Value::Int(0x00ff00)),
            (Value::from("bold"), Value::Bool(true)),
            (Value::from("undercurl"), Value::Bool(true)),
        ]);
        let batch = vec![entry(vec![Value::from("highlight_set"), tuple(vec![map])])];
        let cmds = decode_batch(&batch);
        let RedrawCommand::HighlightSet { attrs } = &cmds[0] else {
            panic!("expected highlight set, got {cmds:?}");
        };
        assert_eq!(attrs.fg, Some(Color(0x00ff00)));
        assert_eq!(attrs.bg, None);
        assert_eq!(attrs.flags, CellFlags::BOLD | CellFlags::UNDERCURL);
    }

    #[test]
    fn mode_change_maps_known_and_unknown_names() {
        assert_eq!(EditorMode::from_name("insert"), EditorMode::Insert);
        assert_eq!(
            EditorMode::from_name("terminal"),
            EditorMode::Other("terminal".into())
        );
        assert!(EditorMode::Insert.is_insert());
    }

    #[test]
    fn popupmenu_show_decodes_items() {
        let items = Value::Array(vec![Value::Array(vec![
            Value::from("word"),
            Value::from("kind"),
        ])]);
        let batch = vec![entry(vec![
            Value::from("popupmenu_show"),
            tuple(vec![items, Value::Int(0), Value::Int(4), Value::Int(7)]),
        ])];
        let cmds = decode_batch(&batch);
        let RedrawCommand::PopupMenuShow { items, selected, row, col } = &cmds[0] else {
            panic!("expected popupmenu, got {cmds:?}");
        };
        assert_eq!(items[0].word, "word");
        assert_eq!(items[0].info, "");
        assert_eq!((*selected, *row, *col), (0, 4, 7));
    }
}
