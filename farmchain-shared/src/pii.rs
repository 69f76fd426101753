use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a settlement address (or any other identifying value) so it never
/// leaks through `Debug`/`Display` in log macros. Serialization keeps the
/// real value because API responses and persisted documents need it.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn inner(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Masked(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_logs_but_not_json() {
        let address = Masked("0xabc123".to_string());
        assert_eq!(format!("{:?}", address), "********");
        assert_eq!(format!("{}", address), "********");
        assert_eq!(serde_json::to_string(&address).unwrap(), "\"0xabc123\"");
    }
}
