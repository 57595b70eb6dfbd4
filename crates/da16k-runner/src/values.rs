//! `KEY=VALUE` telemetry arguments.

use da16k_comm::{Message, TupleValue};

use crate::error::{RunnerError, RunnerResult};

/// Infer a tuple value from command-line text.
///
/// `true`/`false` become booleans, finite numbers become doubles, anything
/// else is sent as a string.
pub fn infer_value(text: &str) -> TupleValue {
    match text {
        "true" => TupleValue::Bool(true),
        "false" => TupleValue::Bool(false),
        _ => match text.parse::<f64>() {
            Ok(number) if number.is_finite() => TupleValue::Float64(number),
            _ => TupleValue::String(text.to_string()),
        },
    }
}

/// Split one `KEY=VALUE` argument.
pub fn parse_assignment(arg: &str) -> RunnerResult<(String, TupleValue)> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| RunnerError::InvalidValue(format!("expected KEY=VALUE, got '{arg}'")))?;
    if key.is_empty() {
        return Err(RunnerError::InvalidValue(format!("empty key in '{arg}'")));
    }
    if key.contains(',') {
        return Err(RunnerError::InvalidValue(format!("key '{key}' contains a comma")));
    }
    let value = infer_value(value);
    if let TupleValue::String(text) = &value {
        if text.contains(',') {
            return Err(RunnerError::InvalidValue(format!("value '{text}' contains a comma")));
        }
    }
    Ok((key.to_string(), value))
}

/// Build a telemetry message from `KEY=VALUE` arguments, in order.
pub fn build_message<S: AsRef<str>>(args: &[S]) -> RunnerResult<Message> {
    let mut msg = Message::new();
    for arg in args {
        let (key, value) = parse_assignment(arg.as_ref())?;
        msg.add(&key, value)?;
    }
    Ok(msg)
}
