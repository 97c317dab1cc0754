//! Typed wrappers over the raw request surface.
//!
//! Each wrapper owns the argument encoding and the response-shape checks for
//! one editor operation, so the rest of the workspace never touches `Value`
//! plumbing for routine calls.

use crate::{Session, SessionError};
use core_wire::Value;

impl Session {
    /// UI attach handshake: advertise grid dimensions before redraw traffic
    /// begins.
    pub async fn attach_ui(&self, cols: u16, rows: u16) -> Result<(), SessionError> {
        self.request(
            "attach",
            vec![
                Value::Int(i64::from(cols)),
                Value::Int(i64::from(rows)),
                Value::Map(Vec::new()),
            ],
        )
        .await
        .map(|_| ())
    }

    /// Ask the editor to adopt new grid dimensions (font or window change).
    pub async fn ui_try_resize(&self, cols: u16, rows: u16) -> Result<(), SessionError> {
        self.request(
            "ui_try_resize",
            vec![Value::Int(i64::from(cols)), Value::Int(i64::from(rows))],
        )
        .await
        .map(|_| ())
    }

    /// Feed raw key input; returns how many bytes the editor consumed.
    pub async fn input(&self, keys: &str) -> Result<u64, SessionError> {
        let result = self.request("input", vec![Value::from(keys)]).await?;
        result
            .as_u64()
            .ok_or(SessionError::BadResponse("input count not an integer"))
    }

    /// Execute an ex-style command, discarding its output.
    pub async fn command(&self, command: &str) -> Result<(), SessionError> {
        self.request("command", vec![Value::from(command)])
            .await
            .map(|_| ())
    }

    /// Evaluate an expression in the editor, returning the raw value.
    pub async fn eval(&self, expression: &str) -> Result<Value, SessionError> {
        self.request("eval", vec![Value::from(expression)]).await
    }

    /// Full contents of the currently focused buffer, one string per line.
    pub async fn current_buffer_lines(&self) -> Result<Vec<String>, SessionError> {
        let result = self.request("buffer_get_contents", Vec::new()).await?;
        let items = result
            .as_array()
            .ok_or(SessionError::BadResponse("buffer contents not an array"))?;
        items
            .iter()
            .map(|line| {
                line.as_str()
                    .map(str::to_string)
                    .ok_or(SessionError::BadResponse("buffer line not a string"))
            })
            .collect()
    }

    /// Cursor position in the focused window as `(row, col)`, one-based rows
    /// per the editor's convention.
    pub async fn window_cursor(&self) -> Result<(u64, u64), SessionError> {
        let result = self.request("window_get_cursor", Vec::new()).await?;
        let pair = result
            .as_array()
            .ok_or(SessionError::BadResponse("cursor not an array"))?;
        match pair {
            [row, col] => {
                let row = row
                    .as_u64()
                    .ok_or(SessionError::BadResponse("cursor row not an integer"))?;
                let col = col
                    .as_u64()
                    .ok_or(SessionError::BadResponse("cursor col not an integer"))?;
                Ok((row, col))
            }
            _ => Err(SessionError::BadResponse("cursor is not a pair")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_wire::{FrameDecoder, Message};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex, split};

    #[tokio::test]
    async fn buffer_lines_round_trip_through_the_typed_wrapper() {
        let (client, mut server) = duplex(4096);
        let session = Session::new();
        let (reader, writer) = split(client);
        session.attach(reader, writer);

        let peer = async {
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 4096];
            let id = loop {
                let n = server.read(&mut buf).await.expect("read");
                decoder.extend(&buf[..n]);
                if let Some(Message::Request { id, method, .. }) =
                    decoder.next_frame().expect("frame")
                {
                    assert_eq!(method, "buffer_get_contents");
                    break id;
                }
            };
            let mut frame = Vec::new();
            Message::Response {
                id,
                result: Ok(Value::Array(vec![
                    Value::from("fn main() {"),
                    Value::from("}"),
                ])),
            }
            .encode(&mut frame);
            server.write_all(&frame).await.expect("write");
        };
        let (lines, ()) = tokio::join!(session.current_buffer_lines(), peer);
        assert_eq!(lines.expect("lines"), vec!["fn main() {", "}"]);
    }

    #[tokio::test]
    async fn malformed_cursor_response_is_a_typed_error() {
        let (client, mut server) = duplex(4096);
        let session = Session::new();
        let (reader, writer) = split(client);
        session.attach(reader, writer);

        let peer = async {
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 4096];
            let id = loop {
                let n = server.read(&mut buf).await.expect("read");
                decoder.extend(&buf[..n]);
                if let Some(Message::Request { id, .. }) = decoder.next_frame().expect("frame") {
                    break id;
                }
            };
            let mut frame = Vec::new();
            Message::Response {
                id,
                result: Ok(Value::from("not a pair")),
            }
            .encode(&mut frame);
            server.write_all(&frame).await.expect("write");
        };
        let (cursor, ()) = tokio::join!(session.window_cursor(), peer);
        assert!(matches!(cursor, Err(SessionError::BadResponse(_))));
    }
}
