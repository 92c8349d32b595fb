/// Activation state of an interactive session.
///
/// A session is constructed directly into `Initialized` (construction is the
/// `UNINITIALIZED -> INITIALIZED` transition); `execute_step` moves it through
/// `Running` and leaves it `Idle`; `close` is terminal and idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initialized,
    Running,
    Idle,
    Closed,
}

impl SessionState {
    /// Whether the engine handle behind the session is still live.
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }

    /// Whether a run command may be issued from this state.
    pub fn can_execute(&self) -> bool {
        matches!(self, SessionState::Initialized | SessionState::Idle)
    }
}
