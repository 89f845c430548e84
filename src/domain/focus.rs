use crate::domain::models::{Task, TargetType};
use serde::Serialize;

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_BREAK_MINUTES: u32 = 5;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FocusPhase {
    Idle,
    Work,
    Break,
}

impl FocusPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Work => "work",
            Self::Break => "break",
        }
    }
}

/// What a single clock tick did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The session was not running; nothing changed.
    Skipped,
    /// One second consumed, countdown still in progress.
    Counting,
    /// The work phase just finished. Carries what the check-in dispatch
    /// needs; the phase change itself has already happened and is not
    /// conditional on that dispatch succeeding.
    WorkComplete {
        work_minutes: u32,
        task_id: Option<i64>,
    },
    /// The break phase just finished; the session is parked at the start of
    /// the next work phase, not running.
    BreakComplete,
}

/// The focus-session countdown state machine: idle -> work -> break -> work.
///
/// Fields are private so every mutation goes through one named operation;
/// the one-way "time task overrides duration" rule lives in [`bind_task`]
/// and nowhere else.
///
/// [`bind_task`]: FocusSession::bind_task
#[derive(Debug, Clone)]
pub struct FocusSession {
    phase: FocusPhase,
    remaining_seconds: u32,
    work_minutes: u32,
    break_minutes: u32,
    bound_task_id: Option<i64>,
    running: bool,
}

impl Default for FocusSession {
    fn default() -> Self {
        Self::with_durations(DEFAULT_WORK_MINUTES, DEFAULT_BREAK_MINUTES)
    }
}

impl FocusSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_durations(work_minutes: u32, break_minutes: u32) -> Self {
        let work_minutes = work_minutes.max(1);
        let break_minutes = break_minutes.max(1);
        Self {
            phase: FocusPhase::Idle,
            remaining_seconds: work_minutes.saturating_mul(60),
            work_minutes,
            break_minutes,
            bound_task_id: None,
            running: false,
        }
    }

    pub fn phase(&self) -> FocusPhase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn work_minutes(&self) -> u32 {
        self.work_minutes
    }

    pub fn bound_task_id(&self) -> Option<i64> {
        self.bound_task_id
    }

    pub fn running(&self) -> bool {
        self.running
    }

    /// Starts or resumes the countdown. From idle this enters the work
    /// phase; from a paused work or break phase it resumes with the
    /// remaining time untouched. Calling it while already running changes
    /// nothing.
    pub fn start(&mut self) {
        if self.phase == FocusPhase::Idle {
            self.phase = FocusPhase::Work;
        }
        self.running = true;
    }

    /// Stops the countdown in place, preserving `remaining_seconds` exactly.
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Returns the session to idle with a full work countdown. Keeps the
    /// configured duration and task binding.
    pub fn reset(&mut self) {
        self.phase = FocusPhase::Idle;
        self.running = false;
        self.remaining_seconds = self.work_minutes.saturating_mul(60);
    }

    /// Consumes one clock second. The tick that brings the counter to zero
    /// fires the phase transition in the same call, so the counter never
    /// sits at zero between ticks and never underflows.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running || self.phase == FocusPhase::Idle {
            return TickOutcome::Skipped;
        }
        if self.remaining_seconds > 0 {
            self.remaining_seconds -= 1;
        }
        if self.remaining_seconds > 0 {
            return TickOutcome::Counting;
        }

        match self.phase {
            FocusPhase::Work => {
                self.phase = FocusPhase::Break;
                self.remaining_seconds = self.break_minutes.saturating_mul(60);
                self.running = false;
                TickOutcome::WorkComplete {
                    work_minutes: self.work_minutes,
                    task_id: self.bound_task_id,
                }
            }
            FocusPhase::Break => {
                self.phase = FocusPhase::Work;
                self.remaining_seconds = self.work_minutes.saturating_mul(60);
                self.running = false;
                TickOutcome::BreakComplete
            }
            FocusPhase::Idle => TickOutcome::Skipped,
        }
    }

    /// Changes the configured work duration. Only allowed while idle; the
    /// pending countdown follows the new duration immediately.
    pub fn set_work_minutes(&mut self, minutes: u32) -> Result<(), String> {
        if self.phase != FocusPhase::Idle {
            return Err("work duration can only change while idle".to_string());
        }
        if minutes == 0 {
            return Err("work duration must be >= 1 minute".to_string());
        }
        self.work_minutes = minutes;
        self.remaining_seconds = minutes.saturating_mul(60);
        Ok(())
    }

    /// Binds (or unbinds, with `None`) the session to a task. A no-op unless
    /// idle: rebinding mid-session would corrupt the countdown, so the
    /// caller has to reset first. Binding a time-target task overrides the
    /// configured duration; the reverse direction never happens.
    ///
    /// Returns whether the binding was applied.
    pub fn bind_task(&mut self, task: Option<&Task>) -> bool {
        if self.phase != FocusPhase::Idle {
            return false;
        }
        self.bound_task_id = task.map(|task| task.id);
        if let Some(task) = task {
            if task.target_type == TargetType::Time && task.target_value > 0 {
                self.work_minutes = task.target_value;
                self.remaining_seconds = task.target_value.saturating_mul(60);
            }
        }
        true
    }
}

/// Formats a second count as MM:SS for display.
pub fn format_mm_ss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn time_task(id: i64, target_value: u32) -> Task {
        Task {
            id,
            title: "Deep reading".to_string(),
            description: None,
            target_type: TargetType::Time,
            target_value,
            created_at: fixed_time("2026-03-02T08:00:00Z"),
            progress: 0,
            is_completed: false,
        }
    }

    fn count_task(id: i64) -> Task {
        Task {
            id,
            title: "Drink water".to_string(),
            description: None,
            target_type: TargetType::Count,
            target_value: 3,
            created_at: fixed_time("2026-03-02T08:00:00Z"),
            progress: 0,
            is_completed: false,
        }
    }

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    #[test]
    fn new_session_is_idle_with_full_work_countdown() {
        let session = FocusSession::new();
        assert_eq!(session.phase(), FocusPhase::Idle);
        assert!(!session.running());
        assert_eq!(session.remaining_seconds(), 25 * 60);
        assert_eq!(session.work_minutes(), 25);
    }

    #[test]
    fn start_from_idle_enters_work() {
        let mut session = FocusSession::new();
        session.start();
        assert_eq!(session.phase(), FocusPhase::Work);
        assert!(session.running());
        assert_eq!(session.remaining_seconds(), 1500);
    }

    #[test]
    fn full_work_countdown_completes_exactly_once_into_break() {
        let mut session = FocusSession::new();
        session.start();

        let mut completions = 0;
        for _ in 0..1500 {
            if let TickOutcome::WorkComplete {
                work_minutes,
                task_id,
            } = session.tick()
            {
                completions += 1;
                assert_eq!(work_minutes, 25);
                assert_eq!(task_id, None);
            }
        }

        assert_eq!(completions, 1);
        assert_eq!(session.phase(), FocusPhase::Break);
        assert_eq!(session.remaining_seconds(), 300);
        assert!(!session.running());
    }

    #[test]
    fn break_countdown_parks_at_next_work_phase() {
        let mut session = FocusSession::new();
        session.start();
        for _ in 0..1500 {
            session.tick();
        }
        session.start();
        assert_eq!(session.phase(), FocusPhase::Break);

        let mut outcome = TickOutcome::Counting;
        for _ in 0..300 {
            outcome = session.tick();
        }
        assert_eq!(outcome, TickOutcome::BreakComplete);
        assert_eq!(session.phase(), FocusPhase::Work);
        assert_eq!(session.remaining_seconds(), 1500);
        assert!(!session.running());
    }

    #[test]
    fn pause_preserves_remaining_seconds_exactly() {
        let mut session = FocusSession::new();
        session.start();
        for _ in 0..100 {
            session.tick();
        }
        assert_eq!(session.remaining_seconds(), 1400);

        session.pause();
        assert_eq!(session.tick(), TickOutcome::Skipped);
        assert_eq!(session.tick(), TickOutcome::Skipped);
        assert_eq!(session.remaining_seconds(), 1400);

        session.start();
        assert_eq!(session.phase(), FocusPhase::Work);
        assert_eq!(session.tick(), TickOutcome::Counting);
        assert_eq!(session.remaining_seconds(), 1399);
    }

    #[test]
    fn binding_time_task_overrides_duration_while_idle() {
        let mut session = FocusSession::new();
        let task = time_task(3, 10);
        assert!(session.bind_task(Some(&task)));
        assert_eq!(session.bound_task_id(), Some(3));
        assert_eq!(session.work_minutes(), 10);
        assert_eq!(session.remaining_seconds(), 600);
    }

    #[test]
    fn binding_is_a_noop_while_working() {
        let mut session = FocusSession::new();
        session.start();
        let task = time_task(3, 10);
        assert!(!session.bind_task(Some(&task)));
        assert_eq!(session.bound_task_id(), None);
        assert_eq!(session.work_minutes(), 25);
        assert_eq!(session.remaining_seconds(), 1500);
    }

    #[test]
    fn binding_count_task_keeps_duration() {
        let mut session = FocusSession::new();
        let task = count_task(9);
        assert!(session.bind_task(Some(&task)));
        assert_eq!(session.bound_task_id(), Some(9));
        assert_eq!(session.work_minutes(), 25);
    }

    #[test]
    fn unbinding_keeps_duration() {
        let mut session = FocusSession::new();
        session.bind_task(Some(&time_task(3, 10)));
        assert!(session.bind_task(None));
        assert_eq!(session.bound_task_id(), None);
        assert_eq!(session.work_minutes(), 10);
    }

    #[test]
    fn work_completion_reports_bound_task() {
        let mut session = FocusSession::new();
        session.bind_task(Some(&time_task(3, 1)));
        session.start();
        let mut last = TickOutcome::Counting;
        for _ in 0..60 {
            last = session.tick();
        }
        assert_eq!(
            last,
            TickOutcome::WorkComplete {
                work_minutes: 1,
                task_id: Some(3),
            }
        );
    }

    #[test]
    fn set_work_minutes_rejected_unless_idle() {
        let mut session = FocusSession::new();
        session.start();
        assert!(session.set_work_minutes(30).is_err());
        assert_eq!(session.work_minutes(), 25);

        session.reset();
        session.set_work_minutes(30).expect("idle session");
        assert_eq!(session.work_minutes(), 30);
        assert_eq!(session.remaining_seconds(), 1800);
        assert!(session.set_work_minutes(0).is_err());
    }

    #[test]
    fn reset_returns_to_idle_from_any_phase() {
        let mut session = FocusSession::new();
        session.start();
        for _ in 0..42 {
            session.tick();
        }
        session.reset();
        assert_eq!(session.phase(), FocusPhase::Idle);
        assert!(!session.running());
        assert_eq!(session.remaining_seconds(), 1500);

        session.start();
        for _ in 0..1500 {
            session.tick();
        }
        assert_eq!(session.phase(), FocusPhase::Break);
        session.reset();
        assert_eq!(session.phase(), FocusPhase::Idle);
        assert_eq!(session.remaining_seconds(), 1500);
    }

    #[test]
    fn format_mm_ss_pads_both_fields() {
        assert_eq!(format_mm_ss(1500), "25:00");
        assert_eq!(format_mm_ss(65), "01:05");
        assert_eq!(format_mm_ss(9), "00:09");
        assert_eq!(format_mm_ss(0), "00:00");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Start,
        Pause,
        Reset,
        Tick,
        SetMinutes(u32),
        BindTime(u32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            1 => Just(Op::Start),
            1 => Just(Op::Pause),
            1 => Just(Op::Reset),
            5 => Just(Op::Tick),
            1 => (1u32..120).prop_map(Op::SetMinutes),
            1 => (1u32..120).prop_map(Op::BindTime),
        ]
    }

    proptest! {
        #[test]
        fn remaining_seconds_stays_in_bounds(ops in prop::collection::vec(arb_op(), 0..400)) {
            let mut session = FocusSession::new();
            for op in ops {
                let before = session.remaining_seconds();
                let was_running = session.running();
                match op {
                    Op::Start => session.start(),
                    Op::Pause => session.pause(),
                    Op::Reset => session.reset(),
                    Op::Tick => {
                        let outcome = session.tick();
                        if !was_running {
                            prop_assert_eq!(outcome, TickOutcome::Skipped);
                            prop_assert_eq!(session.remaining_seconds(), before);
                        }
                    }
                    Op::SetMinutes(minutes) => {
                        let _ = session.set_work_minutes(minutes);
                    }
                    Op::BindTime(minutes) => {
                        session.bind_task(Some(&time_task(1, minutes)));
                    }
                }
                let ceiling = session.work_minutes().max(DEFAULT_BREAK_MINUTES) * 60;
                prop_assert!(session.remaining_seconds() <= ceiling);
                if session.phase() != FocusPhase::Idle {
                    prop_assert!(session.remaining_seconds() > 0);
                }
            }
        }
    }
}
