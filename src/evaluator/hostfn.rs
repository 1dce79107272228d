use crate::Error;
use crate::ast::Value;
use std::rc::Rc;

// Adapter layer that turns strongly-typed Rust functions into the erased
// `HostFn` the `php` form calls. Hosts normally go through
// `Environment::register_host_function`; the traits are public so the
// bounds on that method can be named.

/// Canonical erased host function type.
///
/// Host functions receive ownership of the single evaluated argument.
pub type HostFn = dyn Fn(Value) -> Result<Value, Error>;

/// Converts the evaluated argument into a strongly-typed parameter.
///
/// `Param<'a>` is the type the host function sees; it may borrow from the
/// argument slot (as `&str` does) or take it by value.
pub trait FromParam {
    type Param<'a>;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        Ok(std::mem::replace(value, Value::Nil))
    }
}

impl FromParam for i64 {
    type Param<'a> = i64;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        i64::try_from(std::mem::replace(value, Value::Nil))
    }
}

/// Truthiness of the argument; never fails
impl FromParam for bool {
    type Param<'a> = bool;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        Ok(value.is_truthy())
    }
}

impl FromParam for String {
    type Param<'a> = String;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        String::try_from(std::mem::replace(value, Value::Nil))
    }
}

impl FromParam for &str {
    type Param<'a> = &'a str;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        if let Value::String(s) = value {
            Ok(s.as_str())
        } else {
            Err(Error::TypeError(format!(
                "expected string, got {}",
                value.type_name()
            )))
        }
    }
}

/// Normalizes what a host function returns into `Result<Value, Error>`.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        Ok(self.into())
    }
}

/// Conversion of a typed Rust function or closure into a [`HostFn`].
///
/// `Args` is `(A,)` for a one-parameter function or `()` for one that ignores
/// its argument.
pub trait IntoHostFunction<Args> {
    fn into_host_fn(self) -> Rc<HostFn>;
}

impl<F, A, R> IntoHostFunction<(A,)> for F
where
    A: FromParam,
    F: for<'a> Fn(<A as FromParam>::Param<'a>) -> R + 'static,
    R: IntoValueResult,
{
    fn into_host_fn(self) -> Rc<HostFn> {
        Rc::new(move |mut arg: Value| {
            let param: <A as FromParam>::Param<'_> = <A as FromParam>::from_arg(&mut arg)?;
            let result: R = (self)(param);
            result.into_value_result()
        })
    }
}

impl<F, R> IntoHostFunction<()> for F
where
    F: Fn() -> R + 'static,
    R: IntoValueResult,
{
    fn into_host_fn(self) -> Rc<HostFn> {
        Rc::new(move |_arg: Value| {
            let result: R = (self)();
            result.into_value_result()
        })
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    fn host<Args, F: IntoHostFunction<Args>>(f: F) -> Rc<HostFn> {
        f.into_host_fn()
    }

    #[test]
    fn test_typed_parameters() {
        let double = host::<(i64,), _>(|n: i64| n * 2);
        assert_eq!(double(Value::Number(21)).unwrap(), Value::Number(42));
        assert!(matches!(
            double(Value::from("21")),
            Err(Error::TypeError(_))
        ));

        let length = host::<(&str,), _>(|s: &str| s.chars().count() as i64);
        assert_eq!(length(Value::from("héllo")).unwrap(), Value::Number(5));
        assert!(matches!(length(Value::Nil), Err(Error::TypeError(_))));

        let shout = host::<(String,), _>(|s: String| s.to_uppercase());
        assert_eq!(shout(Value::from("hi")).unwrap(), Value::from("HI"));

        let negate = host::<(bool,), _>(|b: bool| !b);
        assert_eq!(negate(Value::Number(0)).unwrap(), Value::Number(1));
        assert_eq!(negate(Value::from("x")).unwrap(), Value::Number(0));

        let identity = host::<(Value,), _>(|v: Value| v);
        let list = Value::from(vec![1, 2]);
        assert_eq!(identity(list.clone()).unwrap(), list);
    }

    #[test]
    fn test_return_conversions() {
        let unit = host::<(Value,), _>(|_v: Value| ());
        assert_eq!(unit(Value::Number(1)).unwrap(), Value::Nil);

        let fallible = host::<(i64,), _>(|n: i64| {
            if n < 0 {
                Err(Error::HostError("negative".into()))
            } else {
                Ok(n + 1)
            }
        });
        assert_eq!(fallible(Value::Number(1)).unwrap(), Value::Number(2));
        assert_eq!(
            fallible(Value::Number(-1)),
            Err(Error::HostError("negative".into()))
        );

        let constant = host::<(), _>(|| "fixed");
        assert_eq!(constant(Value::Nil).unwrap(), Value::from("fixed"));
    }
}
