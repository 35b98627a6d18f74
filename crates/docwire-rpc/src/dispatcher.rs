//! Dispatch tables mapping method keys to handlers.

use std::collections::HashMap;
use std::fmt;

use docwire_value::{Event, EventKey, ValueIn, WireError};

use crate::args::FromArgs;
use crate::error::{DispatchError, Result};
use crate::key::MethodKey;

/// A callable that decodes its arguments from one event value and applies
/// them to a target.
///
/// Implemented for `Fn(&mut T, A, B, ..)` closures of up to four arguments,
/// where every argument is [`FromValue`](docwire_value::FromValue). `Args` is
/// only there to keep the closure impls apart.
pub trait Handler<T, Args>: Send + Sync + 'static {
    fn call(&self, target: &mut T, input: ValueIn<'_>) -> std::result::Result<(), WireError>;
}

macro_rules! impl_handler {
    ($($arg:ident),*) => {
        impl<T, F, $($arg,)*> Handler<T, ($($arg,)*)> for F
        where
            F: Fn(&mut T, $($arg),*) + Send + Sync + 'static,
            ($($arg,)*): FromArgs,
        {
            #[allow(non_snake_case)]
            fn call(
                &self,
                target: &mut T,
                input: ValueIn<'_>,
            ) -> std::result::Result<(), WireError> {
                let ($($arg,)*) = <($($arg,)*) as FromArgs>::from_payload(input)?;
                (self)(target, $($arg),*);
                Ok(())
            }
        }
    };
}

impl_handler!();
impl_handler!(A);
impl_handler!(A, B);
impl_handler!(A, B, C);
impl_handler!(A, B, C, D);

type BoxedHandler<T> =
    Box<dyn Fn(&mut T, ValueIn<'_>) -> std::result::Result<(), WireError> + Send + Sync>;

struct Method<T> {
    key: MethodKey,
    handler: BoxedHandler<T>,
}

/// Outcome of routing one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched<'a> {
    /// The handler for this method ran.
    Invoked(&'a MethodKey),
    /// No method matches the event key.
    Unknown,
}

/// The method table of one interface, built once and shared by readers.
pub struct Dispatcher<T> {
    methods: Vec<Method<T>>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl<T: 'static> Dispatcher<T> {
    pub fn new() -> Self {
        Self {
            methods: Vec::new(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register `handler` for `key`.
    ///
    /// A second registration of the same name or id is rejected.
    pub fn on<Args, H>(mut self, key: impl Into<MethodKey>, handler: H) -> Result<Self>
    where
        Args: 'static,
        H: Handler<T, Args>,
    {
        let key = key.into();
        if self.by_name.contains_key(key.name())
            || key.id().is_some_and(|id| self.by_id.contains_key(&id))
        {
            return Err(DispatchError::DuplicateMethod(key.to_string()));
        }

        let slot = self.methods.len();
        self.by_name.insert(key.name().to_string(), slot);
        if let Some(id) = key.id() {
            self.by_id.insert(id, slot);
        }
        self.methods.push(Method {
            key,
            handler: Box::new(move |target: &mut T, input: ValueIn<'_>| {
                handler.call(target, input)
            }),
        });
        Ok(self)
    }
}

impl<T> Dispatcher<T> {
    /// Resolve an event key: numeric ids against method ids, names against
    /// method names.
    pub fn lookup(&self, key: &EventKey) -> Option<&MethodKey> {
        self.slot(key).map(|slot| &self.methods[slot].key)
    }

    /// Decode `event`'s value and invoke the matching handler on `target`.
    pub fn dispatch(&self, target: &mut T, event: &Event) -> Result<Dispatched<'_>> {
        let Some(slot) = self.slot(&event.key) else {
            return Ok(Dispatched::Unknown);
        };
        let method = &self.methods[slot];
        (method.handler)(target, event.value_in())?;
        Ok(Dispatched::Invoked(&method.key))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered methods in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodKey> {
        self.methods.iter().map(|method| &method.key)
    }

    fn slot(&self, key: &EventKey) -> Option<usize> {
        match key {
            EventKey::Id(id) => self.by_id.get(id).copied(),
            EventKey::Name(name) => self.by_name.get(name.as_str()).copied(),
        }
    }
}

impl<T: 'static> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.methods()).finish()
    }
}
