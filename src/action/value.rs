use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Type-erased payload produced by an action's work.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Result value of an [`Action`](super::Action), optionally annotated with the attempt that
/// produced it.
///
/// Results coming out of [`Action::call`](super::Action::call) are always annotated exactly
/// once. Caller-built values may be nested arbitrarily deep; [`unwrap_nested`](Self::unwrap_nested)
/// recovers the innermost payload either way.
#[derive(Clone)]
pub enum ActionValue {
    /// The caller-supplied payload
    Plain(Payload),

    /// A value tagged with the attempt number at which it was produced
    Attempted {
        value: Option<Box<ActionValue>>,
        attempt: u32,
    },
}

/// Payload of actions built from a plain side-effecting closure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placeholder;

/// Failure to unwrap an [`ActionValue`].
///
/// This is a bookkeeping failure: it means a caller built an annotated value without a
/// payload, or asked for the wrong payload type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnwrapError {
    #[error("attempt {attempt} carries no value")]
    MissingValue { attempt: u32 },

    #[error("value is not a `{expected}`")]
    TypeMismatch { expected: &'static str },
}

impl ActionValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::Plain(Arc::new(value))
    }

    pub fn placeholder() -> Self {
        Self::new(Placeholder)
    }

    /// Annotate an already-unwrapped payload with `attempt`.
    pub fn with_attempt(self, attempt: u32) -> Self {
        Self::Attempted {
            value: Some(Box::new(self)),
            attempt,
        }
    }

    /// An annotation with no payload; unwrapping it fails.
    pub fn empty(attempt: u32) -> Self {
        Self::Attempted {
            value: None,
            attempt,
        }
    }

    /// Attempt number of the outermost annotation, `None` for a plain value.
    pub fn attempt_count(&self) -> Option<u32> {
        match self {
            Self::Plain(_) => None,
            Self::Attempted { attempt, .. } => Some(*attempt),
        }
    }

    /// Strip every annotation layer and return the innermost payload.
    ///
    /// A plain value comes back unchanged.
    pub fn unwrap_nested(self) -> Result<ActionValue, UnwrapError> {
        let mut current = self;
        loop {
            current = match current {
                Self::Attempted {
                    value: Some(inner), ..
                } => *inner,
                Self::Attempted {
                    value: None,
                    attempt,
                } => return Err(UnwrapError::MissingValue { attempt }),
                plain @ Self::Plain(_) => return Ok(plain),
            };
        }
    }

    /// Borrow the innermost payload.
    pub fn payload(&self) -> Result<&Payload, UnwrapError> {
        let mut current = self;
        loop {
            match current {
                Self::Plain(payload) => return Ok(payload),
                Self::Attempted {
                    value: Some(inner), ..
                } => current = inner.as_ref(),
                Self::Attempted {
                    value: None,
                    attempt,
                } => return Err(UnwrapError::MissingValue { attempt: *attempt }),
            }
        }
    }

    /// Borrow the innermost payload as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Result<&T, UnwrapError> {
        self.payload()?
            .downcast_ref::<T>()
            .ok_or(UnwrapError::TypeMismatch {
                expected: type_name::<T>(),
            })
    }

    /// Re-annotate with `attempt`, dropping any existing annotation layers first.
    pub(crate) fn annotate(self, attempt: u32) -> Self {
        match self.unwrap_nested() {
            Ok(inner) => inner.with_attempt(attempt),
            Err(_) => Self::empty(attempt),
        }
    }
}

impl fmt::Debug for ActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain(..)"),
            Self::Attempted { value, attempt } => f
                .debug_struct("Attempted")
                .field("value", value)
                .field("attempt", attempt)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_unwraps_unchanged() {
        let value = ActionValue::new("done");
        assert_eq!(value.attempt_count(), None);

        let unwrapped = value.unwrap_nested().unwrap();
        assert_eq!(*unwrapped.downcast_ref::<&str>().unwrap(), "done");
        assert_eq!(unwrapped.attempt_count(), None);
    }

    #[test]
    fn test_nested_value_unwraps_to_innermost() {
        let mut value = ActionValue::new(7_u64);
        for attempt in 0..5 {
            value = value.with_attempt(attempt);
        }

        assert_eq!(value.attempt_count(), Some(4));
        assert_eq!(*value.downcast_ref::<u64>().unwrap(), 7);

        let unwrapped = value.unwrap_nested().unwrap();
        assert!(matches!(unwrapped, ActionValue::Plain(_)));
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let value = ActionValue::empty(2).with_attempt(3);

        assert_eq!(
            value.clone().unwrap_nested().unwrap_err(),
            UnwrapError::MissingValue { attempt: 2 }
        );
        assert!(value.payload().is_err());
    }

    #[test]
    fn test_type_mismatch() {
        let value = ActionValue::new(1_i32);
        let error = value.downcast_ref::<String>().unwrap_err();
        assert!(matches!(error, UnwrapError::TypeMismatch { .. }));
    }

    #[test]
    fn test_annotate_replaces_existing_layers() {
        let value = ActionValue::new("x").with_attempt(1).with_attempt(2).annotate(9);

        assert_eq!(value.attempt_count(), Some(9));
        match &value {
            ActionValue::Attempted {
                value: Some(inner), ..
            } => assert!(matches!(**inner, ActionValue::Plain(_))),
            other => panic!("unexpected shape: {:?}", other),
        }
    }
}
