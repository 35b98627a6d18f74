use docwire_frame::DocumentSink;
use docwire_value::Event;

use crate::args::MethodArgs;
use crate::error::Result;
use crate::key::MethodKey;

/// Caller side of an interface: each call becomes one data document
/// holding one event.
///
/// Interfaces wrap a `MethodWriter` in a proxy struct whose methods forward
/// here with their method key and argument tuple.
#[derive(Debug)]
pub struct MethodWriter<S> {
    sink: S,
    calls: u64,
}

impl<S: DocumentSink> MethodWriter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, calls: 0 }
    }

    /// Write a call of `key` with `args`.
    pub fn call<A: MethodArgs>(&mut self, key: &MethodKey, args: A) -> Result<()> {
        let event = Event::new(key.event_key(), args.to_payload());
        self.sink
            .write_document(false, std::slice::from_ref(&event))?;
        self.calls += 1;
        tracing::trace!(method = %key, arity = A::ARITY, "method call written");
        Ok(())
    }

    /// Write a metadata document. Method readers skip these.
    pub fn write_meta(&mut self, events: &[Event]) -> Result<()> {
        self.sink.write_document(true, events)?;
        Ok(())
    }

    /// Calls written so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }
}
