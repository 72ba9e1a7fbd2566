use crate::core::error::{Error, Result};

/// Named string values, extensible until finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumerationType {
    values: Vec<String>,
    finalized: bool,
}

impl EnumerationType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value. Duplicates are ignored; a finalized enumeration accepts nothing.
    pub fn add_value(&mut self, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        if self.finalized {
            return Err(Error::invalid_state(format!(
                "Cannot add {} to a finalized enumeration",
                value
            )));
        }
        if !self.values.contains(&value) {
            self.values.push(value);
        }
        Ok(())
    }

    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// All possible values. An open enumeration may gain more, so strict callers
    /// ask for an error instead of a partial answer.
    pub fn values(&self, fail_on_non_finalized: bool) -> Result<&[String]> {
        if fail_on_non_finalized && !self.finalized {
            return Err(Error::invalid_state("Enumeration is not finalized; its values are open"));
        }
        Ok(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn finalized_enumeration_is_closed() {
        let mut colours = EnumerationType::new();
        for value in ["RED", "GREEN", "BLUE"] {
            colours.add_value(value).unwrap();
        }
        colours.finalize();

        let err = colours.add_value("PINK").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidState);
        assert_eq!(colours.values(true).unwrap(), ["RED", "GREEN", "BLUE"]);
        assert_eq!(colours.values(false).unwrap().len(), 3);
    }

    #[test]
    fn open_enumeration_fails_strict_iteration() {
        let mut sizes = EnumerationType::new();
        sizes.add_value("S").unwrap();
        sizes.add_value("S").unwrap();

        assert!(sizes.values(true).is_err());
        assert_eq!(sizes.values(false).unwrap(), ["S"]);
    }
}
