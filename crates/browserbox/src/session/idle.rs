//! IDLE (RFC 2177) and NOOP cycling.
//!
//! Once the connection has been quiet for a while the session either opens
//! an IDLE, ended with `DONE` after [`Timeouts::idle`](crate::Timeouts), or
//! sends a NOOP after [`Timeouts::noop`](crate::Timeouts). Completing either
//! command makes the connection quiet again, which restarts the cycle.
//! Every other command ends the cycle first.

use browserbox_imap::ExecOptions;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::BrowserBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum IdleMode {
    #[default]
    None,
    Idle,
    Noop,
}

#[derive(Debug, Default)]
pub(super) struct IdleState {
    pub mode: IdleMode,
    pub timer: Option<JoinHandle<()>>,
}

impl IdleState {
    /// Stops the timer and forgets the mode.
    pub fn reset(&mut self) -> IdleMode {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        std::mem::take(&mut self.mode)
    }
}

impl BrowserBox {
    /// Starts IDLE if the server supports it, otherwise schedules a NOOP.
    pub(super) fn enter_idle(&self) {
        let mut idle = self.shared.lock_idle();
        if idle.mode != IdleMode::None {
            return;
        }

        let mode = if self.has_capability("IDLE") {
            IdleMode::Idle
        } else {
            IdleMode::Noop
        };
        tracing::debug!(session = %self.session_id(), ?mode, "Entering idle");
        idle.mode = mode;

        let weak = self.downgrade();
        let timeouts = &self.shared.config.timeouts;
        let timer = if mode == IdleMode::Idle {
            drop(self.client.exec("IDLE", ExecOptions::default()));
            let after = timeouts.idle;
            tokio::spawn(
                async move {
                    tokio::time::sleep(after).await;
                    if let Some(session) = weak.upgrade()
                        && session.leave_idle(IdleMode::Idle)
                    {
                        tracing::debug!(session = %session.session_id(), "Sending idle DONE");
                        session.client.send_raw("DONE\r\n");
                    }
                }
                .in_current_span(),
            )
        } else {
            let after = timeouts.noop;
            tokio::spawn(
                async move {
                    tokio::time::sleep(after).await;
                    if let Some(session) = weak.upgrade()
                        && session.leave_idle(IdleMode::Noop)
                    {
                        let response = session.client.exec("NOOP", ExecOptions::default()).await;
                        if let Err(e) = response {
                            tracing::debug!(session = %session.session_id(), error = %e, "NOOP failed");
                        }
                    }
                }
                .in_current_span(),
            )
        };
        idle.timer = Some(timer);
    }

    /// Ends IDLE or cancels the pending NOOP.
    pub(super) fn break_idle(&self) {
        let mode = self.shared.lock_idle().reset();
        match mode {
            IdleMode::None => return,
            IdleMode::Idle => {
                tracing::debug!(session = %self.session_id(), "Sending idle DONE");
                self.client.send_raw("DONE\r\n");
            }
            IdleMode::Noop => {}
        }
        tracing::debug!(session = %self.session_id(), "Idle terminated");
    }

    /// Called by the timer task itself, so the timer is detached rather
    /// than aborted. Returns false if the cycle was already broken.
    fn leave_idle(&self, expected: IdleMode) -> bool {
        let mut idle = self.shared.lock_idle();
        if idle.mode != expected {
            return false;
        }
        idle.mode = IdleMode::None;
        idle.timer = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reset_aborts_timer() {
        let timer = tokio::spawn(std::future::pending::<()>());
        let mut state = IdleState {
            mode: IdleMode::Idle,
            timer: Some(timer),
        };

        assert_eq!(state.reset(), IdleMode::Idle);
        assert_eq!(state.mode, IdleMode::None);
        assert!(state.timer.is_none());
        assert_eq!(state.reset(), IdleMode::None);
    }
}
