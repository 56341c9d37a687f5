//! Session state machine.

use std::collections::BTreeMap;
use std::fmt;

/// IMAP session state (RFC 3501 section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// Waiting for the server greeting.
    #[default]
    Connecting,
    /// Greeting received, not logged in yet.
    NotAuthenticated,
    /// Logged in, no mailbox selected.
    Authenticated,
    /// A mailbox is selected.
    Selected,
    /// LOGOUT was issued.
    Logout,
}

impl State {
    /// Returns true once LOGIN or AUTHENTICATE succeeded.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::NotAuthenticated => "not authenticated",
            Self::Authenticated => "authenticated",
            Self::Selected => "selected",
            Self::Logout => "logout",
        };
        f.write_str(name)
    }
}

/// Mutable session data shared by the public handle and the connection
/// callbacks.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub state: State,
    pub capability: Vec<String>,
    pub server_id: Option<BTreeMap<String, String>>,
    pub authenticated: bool,
    pub selected_mailbox: Option<String>,
}

impl SessionState {
    /// Moves to `new`. Leaving [`State::Selected`] returns the path of the
    /// mailbox that was open.
    pub fn change_state(&mut self, new: State) -> Option<String> {
        if new == self.state {
            return None;
        }

        let closed = if self.state == State::Selected {
            self.selected_mailbox.take()
        } else {
            None
        };
        self.state = new;
        closed
    }

    /// Returns true if the server advertised `capability`.
    pub fn has_capability(&self, capability: &str) -> bool {
        let wanted = capability.trim().to_ascii_uppercase();
        self.capability.iter().any(|c| *c == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_state_is_noop() {
        let mut state = SessionState {
            state: State::Selected,
            selected_mailbox: Some("INBOX".into()),
            ..SessionState::default()
        };
        assert_eq!(state.change_state(State::Selected), None);
        assert_eq!(state.selected_mailbox.as_deref(), Some("INBOX"));
    }

    #[test]
    fn test_leaving_selected_closes_mailbox() {
        let mut state = SessionState {
            state: State::Selected,
            selected_mailbox: Some("INBOX".into()),
            ..SessionState::default()
        };
        assert_eq!(state.change_state(State::Logout).as_deref(), Some("INBOX"));
        assert_eq!(state.selected_mailbox, None);
        assert_eq!(state.state, State::Logout);
    }

    #[test]
    fn test_has_capability_ignores_case() {
        let state = SessionState {
            capability: vec!["IMAP4REV1".into(), "IDLE".into()],
            ..SessionState::default()
        };
        assert!(state.has_capability("idle"));
        assert!(state.has_capability(" IMAP4rev1 "));
        assert!(!state.has_capability("MOVE"));
    }

    #[test]
    fn test_authenticated_states() {
        assert!(State::Selected.is_authenticated());
        assert!(!State::NotAuthenticated.is_authenticated());
        assert_eq!(State::NotAuthenticated.to_string(), "not authenticated");
    }
}
