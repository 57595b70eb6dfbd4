//! Telemetry messages.
//!
//! A [`Message`] is an ordered list of typed key/value tuples sent to the
//! cloud with [`Da16k::send_msg`](crate::Da16k::send_msg). Keys and string
//! values are owned copies; the message can be sent any number of times and
//! frees everything when dropped.

use std::borrow::Cow;

use da16k_at::{bool_to_hex, f32_to_hex, f64_to_hex, AtError, AtResult};
use tracing::{debug, error};

/// Number of tuple slots added each time a message runs out of room.
pub const CAPACITY_STEP: usize = 10;

// ============================================================================
// Tuples
// ============================================================================

/// Value of one telemetry tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleValue {
    String(String),
    Bool(bool),
    Float32(f32),
    Float64(f64),
}

impl TupleValue {
    /// Type tag sent in front of the tuple.
    pub fn type_tag(&self) -> u8 {
        match self {
            TupleValue::String(_) => 0,
            TupleValue::Bool(_) => 1,
            TupleValue::Float32(_) => 2,
            TupleValue::Float64(_) => 3,
        }
    }

    /// Wire form of the value: strings verbatim, scalars as big-endian hex.
    pub fn encoded(&self) -> Cow<'_, str> {
        match self {
            TupleValue::String(s) => Cow::Borrowed(s),
            TupleValue::Bool(b) => Cow::Owned(bool_to_hex(*b)),
            TupleValue::Float32(v) => Cow::Owned(f32_to_hex(*v)),
            TupleValue::Float64(v) => Cow::Owned(f64_to_hex(*v)),
        }
    }
}

impl From<&str> for TupleValue {
    fn from(value: &str) -> Self {
        TupleValue::String(value.to_string())
    }
}

impl From<String> for TupleValue {
    fn from(value: String) -> Self {
        TupleValue::String(value)
    }
}

impl From<bool> for TupleValue {
    fn from(value: bool) -> Self {
        TupleValue::Bool(value)
    }
}

impl From<f32> for TupleValue {
    fn from(value: f32) -> Self {
        TupleValue::Float32(value)
    }
}

impl From<f64> for TupleValue {
    fn from(value: f64) -> Self {
        TupleValue::Float64(value)
    }
}

/// One key/value pair of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTuple {
    pub key: String,
    pub value: TupleValue,
}

impl MessageTuple {
    pub fn new(key: impl Into<String>, value: impl Into<TupleValue>) -> Self {
        MessageTuple {
            key: key.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// Message
// ============================================================================

/// Ordered collection of telemetry tuples.
///
/// Capacity starts at zero and grows by [`CAPACITY_STEP`] slots when full.
/// A failed growth reports [`AtError::OutOfMemory`] and leaves the message
/// exactly as it was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    tuples: Vec<MessageTuple>,
    capacity: usize,
    capacity_limit: Option<usize>,
}

impl Message {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty message that refuses to grow past `limit` slots.
    ///
    /// Growth beyond the limit fails with [`AtError::OutOfMemory`], which
    /// models a constrained heap.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Message {
            capacity_limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Number of slots available before the next growth.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn tuples(&self) -> &[MessageTuple] {
        &self.tuples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageTuple> {
        self.tuples.iter()
    }

    /// Append a tuple, copying `key`.
    pub fn add(&mut self, key: &str, value: TupleValue) -> AtResult<()> {
        let key = try_copy(key)?;
        if self.tuples.len() == self.capacity {
            self.grow()?;
        }
        self.tuples.push(MessageTuple { key, value });
        Ok(())
    }

    /// Append a string tuple.
    pub fn add_str(&mut self, key: &str, value: &str) -> AtResult<()> {
        let value = try_copy(value)?;
        self.add(key, TupleValue::String(value))
    }

    /// Append a boolean tuple.
    pub fn add_bool(&mut self, key: &str, value: bool) -> AtResult<()> {
        self.add(key, TupleValue::Bool(value))
    }

    /// Append a double-precision number tuple.
    pub fn add_num(&mut self, key: &str, value: f64) -> AtResult<()> {
        self.add(key, TupleValue::Float64(value))
    }

    /// Append a single-precision number tuple.
    pub fn add_f32(&mut self, key: &str, value: f32) -> AtResult<()> {
        self.add(key, TupleValue::Float32(value))
    }

    fn grow(&mut self) -> AtResult<()> {
        let new_capacity = self.capacity + CAPACITY_STEP;
        debug!("Message capacity {} reached, growing to {}", self.capacity, new_capacity);

        if self.capacity_limit.is_some_and(|limit| new_capacity > limit) {
            error!("Out of memory: message limited to {:?} tuples", self.capacity_limit);
            return Err(AtError::OutOfMemory);
        }

        let additional = new_capacity - self.tuples.len();
        if self.tuples.try_reserve_exact(additional).is_err() {
            error!("Out of memory growing message to {} tuples", new_capacity);
            return Err(AtError::OutOfMemory);
        }

        self.capacity = new_capacity;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Message {
    type Item = &'a MessageTuple;
    type IntoIter = std::slice::Iter<'a, MessageTuple>;

    fn into_iter(self) -> Self::IntoIter {
        self.tuples.iter()
    }
}

fn try_copy(text: &str) -> AtResult<String> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(text.len())
        .map_err(|_| AtError::OutOfMemory)?;
    owned.push_str(text);
    Ok(owned)
}
