//! The event grammar carried by every stream.
//!
//! An observation delivers zero or more [`Event::Next`] values followed by at
//! most one terminal event ([`Event::Error`] or [`Event::Completed`]). Nothing
//! is delivered after a terminal event.

/// Bound shared by every value, error, and accumulator flowing through a
/// stream: streams are observed and re-emitted across threads.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}

/// One step of an observation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event<T, E> {
    Next(T),
    Error(E),
    Completed,
}

impl<T, E> Event<T, E> {
    /// `true` for [`Event::Error`] and [`Event::Completed`].
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    #[must_use]
    pub fn is_next(&self) -> bool {
        matches!(self, Self::Next(_))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Next(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Next(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Error(error) => Some(error),
            _ => None,
        }
    }

    /// Transform the payload of a `Next`, keeping terminal events as-is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U, E> {
        match self {
            Self::Next(value) => Event::Next(f(value)),
            Self::Error(error) => Event::Error(error),
            Self::Completed => Event::Completed,
        }
    }

    pub fn map_error<F>(self, f: impl FnOnce(E) -> F) -> Event<T, F> {
        match self {
            Self::Next(value) => Event::Next(value),
            Self::Error(error) => Event::Error(f(error)),
            Self::Completed => Event::Completed,
        }
    }
}
