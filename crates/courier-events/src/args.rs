//! Dynamically typed publish arguments.

use std::any::{Any, type_name};
use std::fmt;

/// One published value with its static type name.
pub struct Arg {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Arg {
    /// Wrap a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Name of the wrapped value's type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Whether the value is a `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arg").field("type", &self.type_name).finish()
    }
}

/// Ordered argument list handed to every handler of a publish.
#[derive(Debug, Default)]
pub struct Args(Vec<Arg>);

impl Args {
    /// Empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a value, builder style.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    /// Append a value.
    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.0.push(Arg::new(value));
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Argument at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.0.get(index)
    }

    /// Iterate over the arguments in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.0.iter()
    }

    /// Type names of all arguments, in order.
    #[must_use]
    pub fn type_names(&self) -> Vec<&'static str> {
        self.0.iter().map(Arg::type_name).collect()
    }
}

impl From<Vec<Arg>> for Args {
    fn from(args: Vec<Arg>) -> Self {
        Self(args)
    }
}

impl FromIterator<Arg> for Args {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Args {
    type Item = &'a Arg;
    type IntoIter = std::slice::Iter<'a, Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Conversion into a publish argument list.
///
/// Implemented for `()`, tuples up to eight elements, [`Args`] and
/// `Vec<Arg>`. A single value is published as a one-element tuple: `(value,)`.
pub trait IntoArgs {
    /// Convert into [`Args`].
    fn into_args(self) -> Args;
}

impl IntoArgs for Args {
    fn into_args(self) -> Args {
        self
    }
}

impl IntoArgs for Vec<Arg> {
    fn into_args(self) -> Args {
        Args(self)
    }
}

impl IntoArgs for () {
    fn into_args(self) -> Args {
        Args::new()
    }
}

macro_rules! impl_into_args_for_tuple {
    ($($T:ident),+) => {
        impl<$($T: Any + Send + Sync),+> IntoArgs for ($($T,)+) {
            #[allow(non_snake_case)]
            fn into_args(self) -> Args {
                let ($($T,)+) = self;
                Args(vec![$(Arg::new($T)),+])
            }
        }
    };
}

impl_into_args_for_tuple!(A1);
impl_into_args_for_tuple!(A1, A2);
impl_into_args_for_tuple!(A1, A2, A3);
impl_into_args_for_tuple!(A1, A2, A3, A4);
impl_into_args_for_tuple!(A1, A2, A3, A4, A5);
impl_into_args_for_tuple!(A1, A2, A3, A4, A5, A6);
impl_into_args_for_tuple!(A1, A2, A3, A4, A5, A6, A7);
impl_into_args_for_tuple!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Build an [`Args`] list from expressions.
///
/// ```rust
/// use courier_events::args;
///
/// let args = args![1_u32, "two", 3.0_f64];
/// assert_eq!(args.len(), 3);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        $crate::Args::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::Args::from(vec![$($crate::Arg::new($value)),+])
    };
}
