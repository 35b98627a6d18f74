//! Per-document extractors and their combinators.
//!
//! An extractor turns one document into a value or "nothing this round".
//! Long and double extractors signal nothing with [`NO_LONG`] and
//! [`NO_DOUBLE`]; object extractors use `None`. Every combinator passes
//! nothing through untouched and never calls its function on it.
//!
//! Any `Fn(&ReadSession, u64) -> Result<_>` closure is an extractor of the
//! matching kind.

use docwire_frame::ReadSession;
use docwire_value::{EventKey, FromValue, ValueIn};

use crate::error::Result;
use crate::sentinel::{is_no_double, is_no_long, NO_DOUBLE, NO_LONG};

/// Extracts an `i64`, or [`NO_LONG`].
pub trait LongExtractor: Send + Sync {
    fn extract_long(&self, session: &ReadSession, index: u64) -> Result<i64>;

    fn map<F>(self, f: F) -> impl LongExtractor
    where
        Self: Sized,
        F: Fn(i64) -> i64 + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<i64> {
            let value = self.extract_long(session, index)?;
            Ok(if is_no_long(value) { NO_LONG } else { f(value) })
        }
    }

    fn map_to_obj<T, F>(self, f: F) -> impl Extractor<T>
    where
        Self: Sized,
        F: Fn(i64) -> T + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<Option<T>> {
            let value = self.extract_long(session, index)?;
            Ok((!is_no_long(value)).then(|| f(value)))
        }
    }

    fn map_to_double<F>(self, f: F) -> impl DoubleExtractor
    where
        Self: Sized,
        F: Fn(i64) -> f64 + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<f64> {
            let value = self.extract_long(session, index)?;
            Ok(if is_no_long(value) { NO_DOUBLE } else { f(value) })
        }
    }

    fn filter<P>(self, predicate: P) -> impl LongExtractor
    where
        Self: Sized,
        P: Fn(i64) -> bool + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<i64> {
            let value = self.extract_long(session, index)?;
            Ok(if is_no_long(value) || !predicate(value) { NO_LONG } else { value })
        }
    }
}

impl<F> LongExtractor for F
where
    F: Fn(&ReadSession, u64) -> Result<i64> + Send + Sync,
{
    fn extract_long(&self, session: &ReadSession, index: u64) -> Result<i64> {
        self(session, index)
    }
}

/// Extracts an `f64`, or [`NO_DOUBLE`].
pub trait DoubleExtractor: Send + Sync {
    fn extract_double(&self, session: &ReadSession, index: u64) -> Result<f64>;

    fn map<F>(self, f: F) -> impl DoubleExtractor
    where
        Self: Sized,
        F: Fn(f64) -> f64 + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<f64> {
            let value = self.extract_double(session, index)?;
            Ok(if is_no_double(value) { NO_DOUBLE } else { f(value) })
        }
    }

    fn map_to_obj<T, F>(self, f: F) -> impl Extractor<T>
    where
        Self: Sized,
        F: Fn(f64) -> T + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<Option<T>> {
            let value = self.extract_double(session, index)?;
            Ok((!is_no_double(value)).then(|| f(value)))
        }
    }

    fn map_to_long<F>(self, f: F) -> impl LongExtractor
    where
        Self: Sized,
        F: Fn(f64) -> i64 + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<i64> {
            let value = self.extract_double(session, index)?;
            Ok(if is_no_double(value) { NO_LONG } else { f(value) })
        }
    }

    fn filter<P>(self, predicate: P) -> impl DoubleExtractor
    where
        Self: Sized,
        P: Fn(f64) -> bool + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<f64> {
            let value = self.extract_double(session, index)?;
            Ok(if is_no_double(value) || !predicate(value) { NO_DOUBLE } else { value })
        }
    }
}

impl<F> DoubleExtractor for F
where
    F: Fn(&ReadSession, u64) -> Result<f64> + Send + Sync,
{
    fn extract_double(&self, session: &ReadSession, index: u64) -> Result<f64> {
        self(session, index)
    }
}

/// Extracts a `T`, or `None`.
pub trait Extractor<T>: Send + Sync {
    fn extract(&self, session: &ReadSession, index: u64) -> Result<Option<T>>;

    fn map<U, F>(self, f: F) -> impl Extractor<U>
    where
        Self: Sized,
        F: Fn(T) -> U + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<Option<U>> {
            Ok(self.extract(session, index)?.map(&f))
        }
    }

    fn map_to_long<F>(self, f: F) -> impl LongExtractor
    where
        Self: Sized,
        F: Fn(T) -> i64 + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<i64> {
            Ok(self.extract(session, index)?.map_or(NO_LONG, &f))
        }
    }

    fn map_to_double<F>(self, f: F) -> impl DoubleExtractor
    where
        Self: Sized,
        F: Fn(T) -> f64 + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<f64> {
            Ok(self.extract(session, index)?.map_or(NO_DOUBLE, &f))
        }
    }

    fn filter<P>(self, predicate: P) -> impl Extractor<T>
    where
        Self: Sized,
        P: Fn(&T) -> bool + Send + Sync,
    {
        move |session: &ReadSession, index: u64| -> Result<Option<T>> {
            Ok(self.extract(session, index)?.filter(&predicate))
        }
    }
}

impl<T, F> Extractor<T> for F
where
    F: Fn(&ReadSession, u64) -> Result<Option<T>> + Send + Sync,
{
    fn extract(&self, session: &ReadSession, index: u64) -> Result<Option<T>> {
        self(session, index)
    }
}

/// The first event named `key`, read as an `i64`. Missing or null gives
/// [`NO_LONG`].
pub fn long_field(key: impl Into<EventKey>) -> impl LongExtractor {
    let key = key.into();
    move |session: &ReadSession, _index: u64| -> Result<i64> {
        match session.find(&key)? {
            Some(value) if !value.is_null() => Ok(ValueIn::new(&value).int64()?),
            _ => Ok(NO_LONG),
        }
    }
}

/// The first event named `key`, read as an `f64`. Missing or null gives
/// [`NO_DOUBLE`].
pub fn double_field(key: impl Into<EventKey>) -> impl DoubleExtractor {
    let key = key.into();
    move |session: &ReadSession, _index: u64| -> Result<f64> {
        match session.find(&key)? {
            Some(value) if !value.is_null() => Ok(ValueIn::new(&value).float64()?),
            _ => Ok(NO_DOUBLE),
        }
    }
}

/// The first event named `key`, read as a `T`.
pub fn field<T: FromValue>(key: impl Into<EventKey>) -> impl Extractor<T> {
    let key = key.into();
    move |session: &ReadSession, _index: u64| -> Result<Option<T>> {
        match session.find(&key)? {
            Some(value) if !value.is_null() => Ok(Some(ValueIn::new(&value).read()?)),
            _ => Ok(None),
        }
    }
}

/// The value of the document's first event, whatever its key.
pub fn first_value<T: FromValue>() -> impl Extractor<T> {
    |session: &ReadSession, _index: u64| -> Result<Option<T>> {
        let mut cursor = session.clone();
        cursor.rewind();
        match cursor.read_event()? {
            Some(event) if !event.value.is_null() => Ok(Some(event.value_in().read()?)),
            _ => Ok(None),
        }
    }
}

/// The document's logical index.
pub fn document_index() -> impl LongExtractor {
    |_session: &ReadSession, index: u64| -> Result<i64> {
        Ok(i64::try_from(index).unwrap_or(NO_LONG))
    }
}

/// Only data documents; metadata yields nothing.
pub fn data_only<T>(extractor: impl Extractor<T>) -> impl Extractor<T> {
    move |session: &ReadSession, index: u64| -> Result<Option<T>> {
        if session.is_meta_data() {
            return Ok(None);
        }
        extractor.extract(session, index)
    }
}
