//! Bracketed response codes (`[READ-ONLY]`, `[UIDNEXT 4392]`, ...).

use super::Attribute;

/// A response code from the `[...]` section of a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseCode {
    /// Upper-cased code name.
    pub name: String,
    /// Code arguments.
    ///
    /// Scalar arguments are upper-cased, list arguments keep their case.
    /// `REFERRAL` keeps its URL verbatim.
    pub args: Vec<Attribute>,
}

impl ResponseCode {
    /// Creates a response code.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Attribute>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            args,
        }
    }

    /// Returns true if the code has the given name.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Returns the scalar arguments as text.
    ///
    /// For `[PERMANENTFLAGS (\Seen \*)]` the list members are returned.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        let mut out = Vec::new();
        for arg in &self.args {
            match arg {
                Attribute::List(items) => out.extend(items.iter().filter_map(|i| {
                    i.value().map(std::borrow::Cow::into_owned)
                })),
                other => out.extend(other.value().map(std::borrow::Cow::into_owned)),
            }
        }
        out
    }

    /// Returns the first argument as a number.
    #[must_use]
    pub fn number(&self) -> Option<u64> {
        self.args.first().and_then(Attribute::as_number)
    }

    /// Returns the first argument as text.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.args
            .first()
            .and_then(|a| a.value().map(std::borrow::Cow::into_owned))
    }

    /// Returns the capability list carried by a `[CAPABILITY ...]` code.
    #[must_use]
    pub fn capabilities(&self) -> Option<Vec<String>> {
        if !self.is("CAPABILITY") {
            return None;
        }
        Some(
            self.values()
                .into_iter()
                .map(|c| c.trim().to_ascii_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_code() {
        let code = ResponseCode::new(
            "capability",
            vec![Attribute::atom("IMAP4REV1"), Attribute::atom("IDLE")],
        );
        assert!(code.is("CAPABILITY"));
        assert_eq!(
            code.capabilities().unwrap(),
            vec!["IMAP4REV1".to_string(), "IDLE".to_string()]
        );
    }

    #[test]
    fn test_list_values() {
        let code = ResponseCode::new(
            "PERMANENTFLAGS",
            vec![Attribute::list(vec![
                Attribute::atom("\\Seen"),
                Attribute::atom("\\*"),
            ])],
        );
        assert_eq!(code.values(), vec!["\\Seen", "\\*"]);
        assert!(code.capabilities().is_none());
    }

    #[test]
    fn test_number() {
        let code = ResponseCode::new("UIDNEXT", vec![Attribute::atom("4392")]);
        assert_eq!(code.number(), Some(4392));
        assert_eq!(code.text().as_deref(), Some("4392"));
    }
}
