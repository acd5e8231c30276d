use rust_fsm::*;

state_machine! {
    request_flow(Idle)

    Idle(Submit) => Sending,

    Sending(Succeed) => Succeeded,
    Sending(TimeOut) => TimedOut,
    Sending(Fail) => Errored,

    Succeeded(Settle) => Idle,
    TimedOut(Settle) => Idle,
    Errored(Settle) => Idle
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Sending,
    Succeeded,
    Failed(FailureKind),
}

impl RequestState {
    pub fn is_pending(self) -> bool {
        matches!(self, RequestState::Sending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestEvent {
    Submit,
    Succeed,
    TimeOut,
    Fail,
    Settle,
}

fn to_machine_state(state: RequestState) -> request_flow::State {
    match state {
        RequestState::Idle => request_flow::State::Idle,
        RequestState::Sending => request_flow::State::Sending,
        RequestState::Succeeded => request_flow::State::Succeeded,
        RequestState::Failed(FailureKind::Timeout) => request_flow::State::TimedOut,
        RequestState::Failed(FailureKind::Error) => request_flow::State::Errored,
    }
}

fn from_machine_state(state: &request_flow::State) -> RequestState {
    match state {
        request_flow::State::Idle => RequestState::Idle,
        request_flow::State::Sending => RequestState::Sending,
        request_flow::State::Succeeded => RequestState::Succeeded,
        request_flow::State::TimedOut => RequestState::Failed(FailureKind::Timeout),
        request_flow::State::Errored => RequestState::Failed(FailureKind::Error),
    }
}

pub fn transition(current: RequestState, event: RequestEvent) -> Option<RequestState> {
    let mut machine = request_flow::StateMachine::from_state(to_machine_state(current));
    let input = match event {
        RequestEvent::Submit => request_flow::Input::Submit,
        RequestEvent::Succeed => request_flow::Input::Succeed,
        RequestEvent::TimeOut => request_flow::Input::TimeOut,
        RequestEvent::Fail => request_flow::Input::Fail,
        RequestEvent::Settle => request_flow::Input::Settle,
    };
    machine.consume(&input).ok()?;
    Some(from_machine_state(machine.state()))
}

/// Lifecycle of the single in-flight request a chat session may own.
#[derive(Debug)]
pub struct RequestLifecycle {
    state: RequestState,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self {
            state: RequestState::Idle,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Applies `event`; on an illegal transition the state is left as is.
    pub fn apply(&mut self, event: RequestEvent) -> bool {
        match transition(self.state, event) {
            Some(next) => {
                tracing::trace!(from = ?self.state, to = ?next, ?event, "request state");
                self.state = next;
                true
            }
            None => false,
        }
    }
}

impl Default for RequestLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
