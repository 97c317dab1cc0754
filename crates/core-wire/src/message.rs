//! Protocol envelope: request / response / notification.
//!
//! Framed on the wire as a top-level array whose first element is the kind
//! discriminant, mirroring the peer's RPC convention:
//!
//! * `[0, id, method, args]` - request
//! * `[1, id, error, result]` - response (`error` nil on success)
//! * `[2, method, args]` - notification
//!
//! Shape validation happens here so `core-session` only ever sees well-formed
//! messages; anything else is a `WireError::BadFrameShape`.

use crate::codec::encode_value;
use crate::value::Value;
use crate::WireError;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request {
        id: u32,
        method: String,
        args: Vec<Value>,
    },
    Response {
        id: u32,
        /// `Err` carries the peer's error payload verbatim.
        result: Result<Value, Value>,
    },
    Notification {
        method: String,
        args: Vec<Value>,
    },
}

const KIND_REQUEST: i64 = 0;
const KIND_RESPONSE: i64 = 1;
const KIND_NOTIFICATION: i64 = 2;

impl Message {
    /// Append this message's wire encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let envelope = match self {
            Message::Request { id, method, args } => Value::Array(vec![
                Value::Int(KIND_REQUEST),
                Value::from(*id),
                Value::from(method.as_str()),
                Value::Array(args.clone()),
            ]),
            Message::Response { id, result } => {
                let (error, payload) = match result {
                    Ok(v) => (Value::Nil, v.clone()),
                    Err(e) => (e.clone(), Value::Nil),
                };
                Value::Array(vec![
                    Value::Int(KIND_RESPONSE),
                    Value::from(*id),
                    error,
                    payload,
                ])
            }
            Message::Notification { method, args } => Value::Array(vec![
                Value::Int(KIND_NOTIFICATION),
                Value::from(method.as_str()),
                Value::Array(args.clone()),
            ]),
        };
        encode_value(out, &envelope);
    }

    /// Interpret a decoded `Value` as a protocol message.
    pub fn from_value(value: Value) -> Result<Self, WireError> {
        let Value::Array(mut items) = value else {
            return Err(WireError::BadFrameShape("top-level value is not an array"));
        };
        let kind = items
            .first()
            .and_then(Value::as_i64)
            .ok_or(WireError::BadFrameShape("missing kind discriminant"))?;
        match kind {
            KIND_REQUEST => {
                if items.len() != 4 {
                    return Err(WireError::BadFrameShape("request arity != 4"));
                }
                let args = take_args(items.pop().ok_or(WireError::BadFrameShape("arity"))?)?;
                let method = take_method(items.pop().ok_or(WireError::BadFrameShape("arity"))?)?;
                let id = take_id(&items[1])?;
                Ok(Message::Request { id, method, args })
            }
            KIND_RESPONSE => {
                if items.len() != 4 {
                    return Err(WireError::BadFrameShape("response arity != 4"));
                }
                let payload = items.pop().ok_or(WireError::BadFrameShape("arity"))?;
                let error = items.pop().ok_or(WireError::BadFrameShape("arity"))?;
                let id = take_id(&items[1])?;
                let result = if error.is_nil() {
                    Ok(payload)
                } else {
                    Err(error)
                };
                Ok(Message::Response { id, result })
            }
            KIND_NOTIFICATION => {
                if items.len() != 3 {
                    return Err(WireError::BadFrameShape("notification arity != 3"));
                }
                let args = take_args(items.pop().ok_or(WireError::BadFrameShape("arity"))?)?;
                let method = take_method(items.pop().ok_or(WireError::BadFrameShape("arity"))?)?;
                Ok(Message::Notification { method, args })
            }
            _ => Err(WireError::BadFrameShape("unknown kind discriminant")),
        }
    }
}

fn take_id(value: &Value) -> Result<u32, WireError> {
    value
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(WireError::BadFrameShape("id is not a u32"))
}

fn take_method(value: Value) -> Result<String, WireError> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(WireError::BadFrameShape("method is not a string")),
    }
}

fn take_args(value: Value) -> Result<Vec<Value>, WireError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(WireError::BadFrameShape("args is not an array")),
    }
}
