/// User-facing events emitted by a live session.
///
/// These are advisory: none of them aborts the session. They replace the
/// ambient process-wide logger with an object threaded explicitly through the
/// driver's constructor; embedding applications decide how to surface them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The current cell is skewed; the engine will run in the slower
    /// triclinic mode.
    SkewedCell,
    /// The engine reported an abnormal completion status for the last run.
    AbnormalTermination { status: String },
    /// `collect` was called without a prior `execute_step`; the fetched
    /// values may be stale.
    FetchBeforeRun,
    /// A run command finished normally at the given engine step count.
    StepFinished { step: u64 },
    Message(String),
}

pub type MonitorCallback = Box<dyn Fn(SessionEvent) + Send + Sync>;

/// Event sink threaded through the session driver.
#[derive(Default)]
pub struct SessionMonitor {
    callback: Option<MonitorCallback>,
}

impl SessionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: MonitorCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: SessionEvent) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}
