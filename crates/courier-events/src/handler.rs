//! Handler abstraction and typed closure adapters.
//!
//! Every registration stores a [`Callback`]: a shared [`Handler`] that is
//! invoked with the published [`Args`]. Plain closures and functions with up
//! to eight parameters become handlers through [`IntoHandler`]; each
//! parameter is matched against the argument at the same position by exact
//! type.

use std::any::{Any, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::args::Args;
use crate::error::{BusError, BusResult, MismatchReason};

/// Something that can be invoked with a published argument list.
pub trait Handler: Send + Sync + 'static {
    /// Invoke the handler.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ArgumentMismatch`] if `args` do not fit.
    fn call(&self, args: &Args) -> BusResult<()>;

    /// Check whether `args` fit this handler without invoking it.
    ///
    /// The bus calls this on the publisher's thread before scheduling, so an
    /// incompatible publish never reaches an async task.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::ArgumentMismatch`] describing the first mismatch.
    fn accepts(&self, args: &Args) -> BusResult<()> {
        let _ = args;
        Ok(())
    }

    /// Name used in logs and failure reports.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Shared, cloneable handle to a [`Handler`].
///
/// Clones compare equal under [`Callback::ptr_eq`], which is what
/// [`EventBus::unsubscribe_callback`](crate::EventBus::unsubscribe_callback)
/// matches on.
#[derive(Clone)]
pub struct Callback(Arc<dyn Handler>);

impl Callback {
    /// Wrap a handler.
    pub fn new<H: Handler>(handler: H) -> Self {
        Self(Arc::new(handler))
    }

    /// Wrap an already shared handler.
    #[must_use]
    pub fn from_arc(handler: Arc<dyn Handler>) -> Self {
        Self(handler)
    }

    /// Build a callback from a closure, function or handler.
    pub fn from_fn<M, H: IntoHandler<M>>(handler: H) -> Self {
        handler.into_callback()
    }

    /// Give this callback a readable name for logs.
    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Self {
        Self::new(Named {
            inner: self,
            name: name.into(),
        })
    }

    /// Whether both handles point at the same handler.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub(crate) fn accepts(&self, args: &Args) -> BusResult<()> {
        self.0.accepts(args)
    }

    pub(crate) fn call(&self, args: &Args) -> BusResult<()> {
        self.0.call(args)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback").field(&self.name()).finish()
    }
}

struct Named {
    inner: Callback,
    name: String,
}

impl Handler for Named {
    fn call(&self, args: &Args) -> BusResult<()> {
        self.inner.call(args)
    }

    fn accepts(&self, args: &Args) -> BusResult<()> {
        self.inner.accepts(args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Conversion into a [`Callback`].
///
/// `Marker` only disambiguates the blanket implementations; callers never
/// name it.
pub trait IntoHandler<Marker>: Sized {
    /// Convert into a callback.
    fn into_callback(self) -> Callback;
}

#[doc(hidden)]
pub struct HandlerMarker;

#[doc(hidden)]
pub struct CallbackMarker;

#[doc(hidden)]
pub struct SharedMarker;

impl<H: Handler> IntoHandler<HandlerMarker> for H {
    fn into_callback(self) -> Callback {
        Callback::new(self)
    }
}

impl IntoHandler<CallbackMarker> for Callback {
    fn into_callback(self) -> Callback {
        self
    }
}

impl IntoHandler<SharedMarker> for Arc<dyn Handler> {
    fn into_callback(self) -> Callback {
        Callback::from_arc(self)
    }
}

/// Handler adapter for a typed function.
pub struct FnHandler<F, Params> {
    f: F,
    name: &'static str,
    _params: PhantomData<fn(Params)>,
}

fn check_arity(handler: &str, expected: usize, args: &Args) -> BusResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(BusError::ArgumentMismatch {
            handler: handler.to_owned(),
            reason: MismatchReason::Arity {
                expected,
                found: args.len(),
            },
        })
    }
}

fn param<'a, T: Any>(handler: &str, args: &'a Args, position: usize) -> BusResult<&'a T> {
    let Some(arg) = args.get(position) else {
        return Err(BusError::ArgumentMismatch {
            handler: handler.to_owned(),
            reason: MismatchReason::Arity {
                expected: position.saturating_add(1),
                found: args.len(),
            },
        });
    };
    arg.downcast_ref::<T>()
        .ok_or_else(|| BusError::ArgumentMismatch {
            handler: handler.to_owned(),
            reason: MismatchReason::Type {
                position,
                expected: type_name::<T>(),
                found: arg.type_name(),
            },
        })
}

macro_rules! impl_fn_handler {
    ($arity:expr; $($P:ident => $pos:tt),*) => {
        impl<F, $($P),*> Handler for FnHandler<F, ($($P,)*)>
        where
            F: Fn($($P),*) + Send + Sync + 'static,
            $($P: Clone + Send + Sync + 'static,)*
        {
            fn call(&self, args: &Args) -> BusResult<()> {
                check_arity(self.name, $arity, args)?;
                $(
                    #[allow(non_snake_case)]
                    let $P = param::<$P>(self.name, args, $pos)?.clone();
                )*
                (self.f)($($P),*);
                Ok(())
            }

            fn accepts(&self, args: &Args) -> BusResult<()> {
                check_arity(self.name, $arity, args)?;
                $(
                    param::<$P>(self.name, args, $pos)?;
                )*
                Ok(())
            }

            fn name(&self) -> &str {
                self.name
            }
        }

        impl<F, $($P),*> IntoHandler<fn($($P),*)> for F
        where
            F: Fn($($P),*) + Send + Sync + 'static,
            $($P: Clone + Send + Sync + 'static,)*
        {
            fn into_callback(self) -> Callback {
                Callback::new(FnHandler::<F, ($($P,)*)> {
                    f: self,
                    name: type_name::<F>(),
                    _params: PhantomData,
                })
            }
        }
    };
}

impl_fn_handler!(0;);
impl_fn_handler!(1; A1 => 0);
impl_fn_handler!(2; A1 => 0, A2 => 1);
impl_fn_handler!(3; A1 => 0, A2 => 1, A3 => 2);
impl_fn_handler!(4; A1 => 0, A2 => 1, A3 => 2, A4 => 3);
impl_fn_handler!(5; A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4);
impl_fn_handler!(6; A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5);
impl_fn_handler!(7; A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6);
impl_fn_handler!(8; A1 => 0, A2 => 1, A3 => 2, A4 => 3, A5 => 4, A6 => 5, A7 => 6, A8 => 7);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::IntoArgs;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_typed_closure_receives_arguments() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let callback = Callback::from_fn(move |n: i32, s: String| {
            *seen_clone.lock().unwrap() = Some((n, s));
        });

        callback.call(&(1_i32, "a".to_string()).into_args()).unwrap();

        assert_eq!(*seen.lock().unwrap(), Some((1, "a".to_string())));
    }

    #[test]
    fn test_arity_mismatch() {
        let callback = Callback::from_fn(|_n: i32| {});
        let err = callback.accepts(&().into_args()).unwrap_err();
        assert!(matches!(
            err,
            BusError::ArgumentMismatch {
                reason: MismatchReason::Arity {
                    expected: 1,
                    found: 0
                },
                ..
            }
        ));
    }

    #[test]
    fn test_type_mismatch_reports_position() {
        let callback = Callback::from_fn(|_n: i32, _s: String| {});
        let err = callback.call(&(1_i32, 2_i32).into_args()).unwrap_err();
        match err {
            BusError::ArgumentMismatch {
                reason:
                    MismatchReason::Type {
                        position,
                        expected,
                        found,
                    },
                ..
            } => {
                assert_eq!(position, 1);
                assert_eq!(found, "i32");
                assert!(expected.ends_with("String"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_arity_handler() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let callback = Callback::from_fn(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        callback.call(&Args::new()).unwrap();
        assert!(callback.call(&(1_u8,).into_args()).is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_custom_handler_and_naming() {
        struct Echo;
        impl Handler for Echo {
            fn call(&self, _args: &Args) -> BusResult<()> {
                Ok(())
            }

            fn name(&self) -> &str {
                "echo"
            }
        }

        let callback = Callback::from_fn(Echo);
        assert_eq!(callback.name(), "echo");
        assert!(callback.accepts(&(1, 2, 3).into_args()).is_ok());

        let renamed = callback.named("audit-echo");
        assert_eq!(renamed.name(), "audit-echo");
    }

    #[test]
    fn test_ptr_eq_tracks_clones_not_behavior() {
        let a = Callback::from_fn(|| {});
        let b = a.clone();
        let c = Callback::from_fn(|| {});

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }
}
