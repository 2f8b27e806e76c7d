use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Event topic identifier, e.g. `"Application.tick/10!"`.
pub type Topic = Arc<str>;

/// Arguments carried by a published event.
///
/// Positional values keep their order; named values are looked up by key.
/// Producers and consumers of a topic agree on the shape by convention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Positional arguments
    #[serde(default)]
    pub args: Vec<Value>,
    /// Named arguments
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl Payload {
    /// Empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a named argument, replacing any previous value under `name`.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// True when there are neither positional nor named arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

/// A single delivery as seen by a subscriber.
///
/// Cloning is cheap; all deliveries of one publish share the same payload.
#[derive(Debug, Clone)]
pub struct Event {
    topic: Topic,
    payload: Arc<Payload>,
}

impl Event {
    pub(crate) fn new(topic: Topic, payload: Payload) -> Self {
        Self {
            topic,
            payload: Arc::new(payload),
        }
    }

    /// Topic this event was published on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub(crate) fn shared_topic(&self) -> Topic {
        self.topic.clone()
    }

    /// Full payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.payload.args
    }

    /// Positional argument at `index`.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.payload.args.get(index)
    }

    /// Named argument `name`.
    #[must_use]
    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.payload.kwargs.get(name)
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            topic: &'a str,
            #[serde(flatten)]
            payload: &'a Payload,
        }

        Wire {
            topic: &self.topic,
            payload: &self.payload,
        }
        .serialize(serializer)
    }
}
