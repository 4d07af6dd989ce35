//! Services State Machine
//!
//! Merges the advertising state and the web-server state into one
//! [`ServicesState`]. The two subsystems never change together, so a mixed
//! combination shows up on every start and every stop; the previous unified
//! state decides which direction that mixed combination belongs to.
//!
//! ```text
//!  advertising   web server    previous        next
//!  ----------------------------------------------------------
//!  Failure(e)    *             *               Error(e)
//!  *             error(e)      *               Error(e)
//!  Stopped       not ready     *               Stopped
//!  Started       ready         *               Started
//!  mixed         mixed         Started         Stopping
//!  mixed         mixed         Stopping        Stopping
//!  mixed         mixed         Starting        Starting
//!  mixed         mixed         Stopped/Error   Starting
//! ```

use crate::domain::models::{AdvertisingState, ServicesState, WebServerState};

/// Pure reducer: identical inputs always produce the identical result.
pub fn next_state(
    previous: &ServicesState,
    advertising: &AdvertisingState,
    web_server: &WebServerState,
) -> ServicesState {
    if let AdvertisingState::Failure(reason) = advertising {
        return ServicesState::Error(reason.clone());
    }
    if let Some(reason) = &web_server.error {
        return ServicesState::Error(reason.clone());
    }

    match (advertising, web_server.is_ready) {
        (AdvertisingState::Stopped, false) => ServicesState::Stopped,
        (AdvertisingState::Started, true) => ServicesState::Started,
        _ => match previous {
            ServicesState::Started | ServicesState::Stopping => ServicesState::Stopping,
            ServicesState::Starting | ServicesState::Stopped | ServicesState::Error(_) => {
                ServicesState::Starting
            }
        },
    }
}

/// Subsystems that must still be told to stop after one half went down on
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeStop {
    pub advertising: bool,
    pub web_server: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: ServicesState,
    pub cascade: Option<CascadeStop>,
}

/// Owner of the one mutable cell the reducer needs.
///
/// Must be driven from a single task; it is deliberately not `Sync`-shared.
#[derive(Debug, Default)]
pub struct ServicesStateMachine {
    previous: ServicesState,
}

impl ServicesStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &ServicesState {
        &self.previous
    }

    /// Feed the latest subsystem states and remember the result.
    ///
    /// The first result of `Stopping` after any other state carries a
    /// [`CascadeStop`] for whichever half is still up.
    pub fn advance(
        &mut self,
        advertising: &AdvertisingState,
        web_server: &WebServerState,
    ) -> Transition {
        let state = next_state(&self.previous, advertising, web_server);

        let cascade = if state == ServicesState::Stopping && self.previous != ServicesState::Stopping
        {
            Some(CascadeStop {
                advertising: *advertising == AdvertisingState::Started,
                web_server: web_server.is_ready,
            })
        } else {
            None
        };

        self.previous = state.clone();
        Transition { state, cascade }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::BridgeError;

    fn web(is_ready: bool) -> WebServerState {
        WebServerState {
            is_ready,
            error: None,
        }
    }

    fn all_previous() -> Vec<ServicesState> {
        vec![
            ServicesState::Starting,
            ServicesState::Started,
            ServicesState::Stopping,
            ServicesState::Stopped,
            ServicesState::Error(BridgeError::HardwareDisabled),
        ]
    }

    fn all_advertising() -> Vec<AdvertisingState> {
        vec![
            AdvertisingState::Started,
            AdvertisingState::Stopped,
            AdvertisingState::Failure(BridgeError::AdvertisingFailure("radio".into())),
        ]
    }

    fn all_web() -> Vec<WebServerState> {
        vec![
            web(true),
            web(false),
            WebServerState::failed(BridgeError::WebServerBindFailure("port".into())),
        ]
    }

    #[test]
    fn test_exhaustive_table() {
        for previous in all_previous() {
            for advertising in all_advertising() {
                for web_server in all_web() {
                    let first = next_state(&previous, &advertising, &web_server);
                    let second = next_state(&previous, &advertising, &web_server);
                    assert_eq!(first, second);

                    let expected = if let AdvertisingState::Failure(e) = &advertising {
                        ServicesState::Error(e.clone())
                    } else if let Some(e) = &web_server.error {
                        ServicesState::Error(e.clone())
                    } else if advertising == AdvertisingState::Stopped && !web_server.is_ready {
                        ServicesState::Stopped
                    } else if advertising == AdvertisingState::Started && web_server.is_ready {
                        ServicesState::Started
                    } else if matches!(previous, ServicesState::Started | ServicesState::Stopping)
                    {
                        ServicesState::Stopping
                    } else {
                        ServicesState::Starting
                    };
                    assert_eq!(
                        first, expected,
                        "prev={:?} adv={:?} web={:?}",
                        previous, advertising, web_server
                    );
                }
            }
        }
    }

    #[test]
    fn test_partial_start_is_starting() {
        let next = next_state(&ServicesState::Stopped, &AdvertisingState::Started, &web(false));
        assert_eq!(next, ServicesState::Starting);

        let next = next_state(&ServicesState::Stopped, &AdvertisingState::Stopped, &web(true));
        assert_eq!(next, ServicesState::Starting);
    }

    #[test]
    fn test_both_up_is_started() {
        let next = next_state(&ServicesState::Starting, &AdvertisingState::Started, &web(true));
        assert_eq!(next, ServicesState::Started);
    }

    #[test]
    fn test_transitions_are_sticky() {
        let next = next_state(&ServicesState::Stopping, &AdvertisingState::Started, &web(false));
        assert_eq!(next, ServicesState::Stopping);

        let next = next_state(&ServicesState::Starting, &AdvertisingState::Stopped, &web(true));
        assert_eq!(next, ServicesState::Starting);
    }

    #[test]
    fn test_advertising_failure_wins() {
        let failure = BridgeError::AdvertisingFailure("aborted".into());
        for previous in all_previous() {
            for web_server in all_web() {
                let next = next_state(
                    &previous,
                    &AdvertisingState::Failure(failure.clone()),
                    &web_server,
                );
                assert_eq!(next, ServicesState::Error(failure.clone()));
            }
        }
    }

    #[test]
    fn test_web_error_when_advertising_healthy() {
        let bind = BridgeError::WebServerBindFailure("in use".into());
        let next = next_state(
            &ServicesState::Starting,
            &AdvertisingState::Started,
            &WebServerState::failed(bind.clone()),
        );
        assert_eq!(next, ServicesState::Error(bind));
    }

    #[test]
    fn test_stopping_cascades_once() {
        let mut machine = ServicesStateMachine::new();
        machine.advance(&AdvertisingState::Started, &web(false));
        let started = machine.advance(&AdvertisingState::Started, &web(true));
        assert_eq!(started.state, ServicesState::Started);
        assert!(started.cascade.is_none());

        let stopping = machine.advance(&AdvertisingState::Stopped, &web(true));
        assert_eq!(stopping.state, ServicesState::Stopping);
        assert_eq!(
            stopping.cascade,
            Some(CascadeStop {
                advertising: false,
                web_server: true,
            })
        );

        let again = machine.advance(&AdvertisingState::Stopped, &web(true));
        assert_eq!(again.state, ServicesState::Stopping);
        assert!(again.cascade.is_none());

        let stopped = machine.advance(&AdvertisingState::Stopped, &web(false));
        assert_eq!(stopped.state, ServicesState::Stopped);
        assert!(stopped.cascade.is_none());
        assert_eq!(machine.current(), &ServicesState::Stopped);
    }

    #[test]
    fn test_cascade_names_advertising_when_web_went_first() {
        let mut machine = ServicesStateMachine::new();
        machine.advance(&AdvertisingState::Started, &web(true));
        machine.advance(&AdvertisingState::Started, &web(true));

        let stopping = machine.advance(&AdvertisingState::Started, &web(false));
        assert_eq!(
            stopping.cascade,
            Some(CascadeStop {
                advertising: true,
                web_server: false,
            })
        );
    }
}
