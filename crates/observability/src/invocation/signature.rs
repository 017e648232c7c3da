use core::fmt;

/// Static description of an intercepted method: where it is declared and what it is called.
///
/// Built once per method (usually with [`method_signature!`](crate::method_signature)),
/// never per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    module_path: &'static str,
    type_name: &'static str,
    method_name: &'static str,
}

impl MethodSignature {
    /// # Panics
    ///
    /// Panics (at compile time in const contexts) if `type_name` or
    /// `method_name` is empty.
    pub const fn new(
        module_path: &'static str,
        type_name: &'static str,
        method_name: &'static str,
    ) -> Self {
        assert!(!type_name.is_empty(), "declaring type name must not be empty");
        assert!(!method_name.is_empty(), "method name must not be empty");
        Self {
            module_path,
            type_name,
            method_name,
        }
    }

    /// Module path of the declaring type, e.g. `forgeerp_services::order`.
    pub const fn module_path(&self) -> &'static str {
        self.module_path
    }

    /// Simple (unqualified) name of the declaring type.
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub const fn method_name(&self) -> &'static str {
        self.method_name
    }
}

/// `Type::method`, the form used in every invocation record.
impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.method_name)
    }
}

/// Build a [`MethodSignature`] for `Type::method` declared in the current module.
///
/// ```
/// use forgeerp_observability::method_signature;
///
/// let sig = method_signature!(OrderService::process);
/// assert_eq!(sig.type_name(), "OrderService");
/// assert_eq!(sig.method_name(), "process");
/// assert_eq!(sig.module_path(), module_path!());
/// ```
#[macro_export]
macro_rules! method_signature {
    ($ty:ident :: $method:ident) => {
        $crate::invocation::MethodSignature::new(
            ::core::module_path!(),
            ::core::stringify!($ty),
            ::core::stringify!($method),
        )
    };
}

/// Like [`method_signature!`](crate::method_signature), but fails to compile
/// unless `Type::method` resolves to an associated function in scope, so the
/// logged names cannot drift from the real ones.
///
/// ```
/// use forgeerp_observability::checked_method_signature;
///
/// struct OrderService;
///
/// impl OrderService {
///     fn process(&self) {}
/// }
///
/// let sig = checked_method_signature!(OrderService::process);
/// assert_eq!(sig.to_string(), "OrderService::process");
/// ```
///
/// ```compile_fail
/// use forgeerp_observability::checked_method_signature;
///
/// struct OrderService;
///
/// impl OrderService {
///     fn process(&self) {}
/// }
///
/// let sig = checked_method_signature!(OrdrService::process);
/// ```
#[macro_export]
macro_rules! checked_method_signature {
    ($ty:ident :: $method:ident) => {{
        let _ = $ty::$method;
        $crate::method_signature!($ty::$method)
    }};
}
