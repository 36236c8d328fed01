//! Backend contract and backend configuration.

use std::collections::BTreeMap;
use std::fmt;

use super::function::Tier;
use super::problem::Problem;
use super::result::SolverResult;

/// A solver backend.
///
/// Backends are constructed by a [`Registry`](crate::Registry) factory from a
/// [`Config`] and invoked at most once per dispatch. The problem is read-only
/// for the backend; everything it wants to report goes into the returned
/// [`SolverResult`]. Solve-time failures are part of that value, they are
/// never raised as panics and never retried.
pub trait Backend {
    /// Name of the backend.
    fn name(&self) -> &str;

    /// The weakest function tier this backend needs from the problem.
    ///
    /// The dispatch layer verifies the cost and every constraint against this
    /// tier before [`solve`](Backend::solve) is invoked.
    fn required_tier(&self) -> Tier;

    /// Runs the backend on the problem.
    fn solve(&mut self, problem: &Problem) -> SolverResult;
}

/// A configuration value (see [`Config`]).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A boolean flag.
    Bool(bool),
    /// An integer parameter.
    Int(i64),
    /// A floating-point parameter.
    Float(f64),
    /// A string parameter.
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{}", value),
            Value::Int(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Str(value) => write!(f, "{}", value),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// Named parameters handed over to a backend factory.
///
/// The dispatch layer stores and forwards the parameters without interpreting
/// them. Each backend reads the keys it understands through the typed getters
/// and is expected to warn about keys it does not know. The getters are
/// strict about types; an integer stored under a key is not returned by
/// [`get_float`](Config::get_float).
///
/// ```rust
/// use karush::Config;
///
/// let config = Config::new()
///     .with("max_outer", 30)
///     .with("feasibility_tolerance", 1e-8);
///
/// assert_eq!(config.get_int("max_outer"), Some(30));
/// assert_eq!(config.get_float("max_outer"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: BTreeMap<String, Value>,
}

impl Config {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, consuming and returning the configuration.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Adds a parameter in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Gets a parameter of any type.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Gets a boolean parameter.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(Value::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// Gets an integer parameter.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(Value::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Gets a floating-point parameter.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(Value::Float(value)) => Some(*value),
            _ => None,
        }
    }

    /// Gets a string parameter.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(Value::Str(value)) => Some(value),
            _ => None,
        }
    }

    /// Iterates over the parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Gets the number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Determines whether the configuration has no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_are_strict() {
        let config = Config::new()
            .with("verbose", true)
            .with("iters", 100)
            .with("tol", 1e-6)
            .with("inner", "nelder-mead");

        assert_eq!(config.get_bool("verbose"), Some(true));
        assert_eq!(config.get_int("iters"), Some(100));
        assert_eq!(config.get_float("tol"), Some(1e-6));
        assert_eq!(config.get_str("inner"), Some("nelder-mead"));

        assert_eq!(config.get_float("iters"), None);
        assert_eq!(config.get_int("tol"), None);
        assert_eq!(config.get_bool("missing"), None);
    }

    #[test]
    fn iteration_in_key_order() {
        let mut config = Config::new();
        config.set("b", 2);
        config.set("a", 1);
        config.set("c", 3);

        let keys: Vec<_> = config.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(config.len(), 3);
        assert!(!config.is_empty());
    }

    #[test]
    fn overwriting_a_key() {
        let config = Config::new().with("tol", 1e-6).with("tol", 1e-8);

        assert_eq!(config.get_float("tol"), Some(1e-8));
        assert_eq!(config.len(), 1);
    }
}
