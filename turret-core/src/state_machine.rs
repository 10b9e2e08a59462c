//! Safety + State Machine (C9): the top-level mode controller. Represented
//! the way `connection::ConnectionState`/`ConnectionManager` represent radar
//! link state — an enum plus a manager exposing one guarded method per
//! legal transition, each returning the side effects to apply rather than
//! performing them directly.

use crate::detection::DetectionClass;
use crate::tracking::TrackingOutcome;

/// Top-level operating mode (§3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMode {
    Init,
    Search,
    Track,
    Deterring,
    /// Entered only momentarily: the human-safety response sets `mode` back
    /// to `Search` within the same tick (§4.9 "any → SAFE... set mode=SEARCH").
    /// Kept as a distinct value so callers/telemetry can observe that the
    /// last transition was a safety interrupt rather than a normal one.
    Safe,
    Shutdown,
}

/// One action the caller must carry out as a result of a transition. The
/// state machine only decides *that* these happen, never performs them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SideEffect {
    FinishPendingMoves,
    ResetTrackingController,
    ResetSearchController,
    LaserOn,
    LaserOff,
    /// Aim to the bird's estimated ground distance and start the perimeter
    /// pattern there; the caller combines this with C8/C3 to build the
    /// actual corner positions.
    PatternStart { distance_m: f32 },
    PatternStop,
    BlockingAbsoluteNeutral,
    CloseTransport,
}

/// Tuning bundle: confirm/lost hysteresis counts, confidence gates, the
/// deterrence distance window, debounce, and the re-centering threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateMachineConfig {
    pub bird_confidence_gate: f32,
    pub human_confidence_gate: f32,
    pub confirm_ticks: u32,
    pub distance_min: f32,
    pub distance_max: f32,
    pub debounce_ms: u64,
    pub re_center_error_px: f32,
    /// Open question: gate the TRACK→DETERRING transition on IMU roll
    /// freshness. Default off; when on, `TickInput::roll_fresh` must be
    /// true to enter DETERRING.
    pub require_roll_fresh: bool,
}

/// Everything the state machine needs to evaluate on a single tick. The
/// caller (the engine) assembles this from the vision, tracking, distance,
/// and IMU components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    pub detection_class: DetectionClass,
    pub detection_confidence: f32,
    /// Present only while in TRACK/DETERRING; `None` while searching.
    pub tracking: Option<TrackingOutcome>,
    pub tracking_lost: bool,
    /// Ground distance to the bbox bottom row, via C2; only needed to
    /// evaluate the TRACK→DETERRING transition.
    pub ground_distance: Option<f32>,
    pub roll_fresh: bool,
    /// Set by the caller once the external controller reports the active
    /// pattern has completed one full perimeter loop.
    pub pattern_cycle_complete: bool,
}

impl TickInput {
    fn is_bird(&self, gate: f32) -> bool {
        self.detection_class == DetectionClass::Bird && self.detection_confidence >= gate
    }

    fn is_human(&self, gate: f32) -> bool {
        self.detection_class == DetectionClass::Human && self.detection_confidence >= gate
    }
}

/// Guarded state machine: every `pub` method corresponds to exactly one row
/// of the transition table and returns the side effects the caller must
/// apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyStateMachine {
    mode: SystemMode,
    confirm_count: u32,
    debounce_until_ms: Option<u64>,
}

impl Default for SafetyStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyStateMachine {
    pub fn new() -> Self {
        SafetyStateMachine {
            mode: SystemMode::Init,
            confirm_count: 0,
            debounce_until_ms: None,
        }
    }

    pub fn mode(&self) -> SystemMode {
        self.mode
    }

    /// INIT → SEARCH: call once the motion controller has homed and the
    /// blocking neutral-seating move has completed.
    pub fn complete_init(&mut self) -> Vec<SideEffect> {
        if self.mode == SystemMode::Init {
            self.mode = SystemMode::Search;
            vec![SideEffect::ResetSearchController]
        } else {
            Vec::new()
        }
    }

    /// Operator `R` (resume): any mode but SHUTDOWN → SEARCH, unconditionally.
    /// Used after an operator pause, which forces the laser/pattern off but
    /// otherwise leaves `mode` untouched (§11).
    pub fn resume_to_search(&mut self) -> Vec<SideEffect> {
        if self.mode == SystemMode::Shutdown {
            return Vec::new();
        }
        let was_deterring = self.mode == SystemMode::Deterring;
        self.mode = SystemMode::Search;
        self.confirm_count = 0;
        self.debounce_until_ms = None;
        let mut effects = Vec::new();
        if was_deterring {
            effects.push(SideEffect::PatternStop);
        }
        effects.push(SideEffect::ResetSearchController);
        effects
    }

    /// One tick of evaluation. `now_ms` is a monotonic clock reading shared
    /// across ticks, used only for the DETERRING debounce window.
    pub fn tick(&mut self, input: &TickInput, now_ms: u64, config: &StateMachineConfig) -> Vec<SideEffect> {
        if self.mode == SystemMode::Shutdown {
            return Vec::new();
        }

        // any → SAFE takes priority over every other rule.
        if input.is_human(config.human_confidence_gate) {
            let mut effects = Vec::new();
            if self.mode == SystemMode::Deterring {
                effects.push(SideEffect::PatternStop);
            }
            effects.push(SideEffect::LaserOff);
            self.confirm_count = 0;
            self.debounce_until_ms = None;
            self.mode = SystemMode::Search;
            let _ = SystemMode::Safe; // observed only as a momentary classification, not stored
            return effects;
        }

        match self.mode {
            SystemMode::Init | SystemMode::Shutdown | SystemMode::Safe => Vec::new(),
            SystemMode::Search => self.tick_search(input, config),
            SystemMode::Track => self.tick_track(input, now_ms, config),
            SystemMode::Deterring => self.tick_deterring(input, now_ms, config),
        }
    }

    fn tick_search(&mut self, input: &TickInput, config: &StateMachineConfig) -> Vec<SideEffect> {
        if input.is_bird(config.bird_confidence_gate) {
            self.confirm_count += 1;
        } else {
            self.confirm_count = 0;
        }

        if self.confirm_count >= config.confirm_ticks {
            self.confirm_count = 0;
            self.mode = SystemMode::Track;
            return vec![
                SideEffect::FinishPendingMoves,
                SideEffect::ResetTrackingController,
            ];
        }

        Vec::new()
    }

    fn tick_track(&mut self, input: &TickInput, now_ms: u64, config: &StateMachineConfig) -> Vec<SideEffect> {
        if input.tracking_lost {
            self.confirm_count = 0;
            self.mode = SystemMode::Search;
            return vec![SideEffect::LaserOff, SideEffect::ResetSearchController];
        }

        let Some(tracking) = input.tracking else {
            return Vec::new();
        };
        if !tracking.target_locked {
            return Vec::new();
        }

        let Some(distance) = input.ground_distance else {
            return Vec::new();
        };
        if distance < config.distance_min || distance > config.distance_max {
            return Vec::new();
        }
        if config.require_roll_fresh && !input.roll_fresh {
            return Vec::new();
        }

        self.mode = SystemMode::Deterring;
        self.debounce_until_ms = Some(now_ms + config.debounce_ms);
        vec![SideEffect::LaserOn, SideEffect::PatternStart { distance_m: distance }]
    }

    /// DETERRING exits two ways (§4.9): back to TRACK once the debounce
    /// window has passed, the controller reports a completed pattern cycle,
    /// and the bird has drifted off center; or straight to SEARCH the moment
    /// tracking reports the bird lost entirely, regardless of debounce or
    /// cycle state, since there is nothing left to deter.
    fn tick_deterring(&mut self, input: &TickInput, now_ms: u64, config: &StateMachineConfig) -> Vec<SideEffect> {
        if input.tracking_lost {
            self.confirm_count = 0;
            self.debounce_until_ms = None;
            self.mode = SystemMode::Search;
            return vec![
                SideEffect::PatternStop,
                SideEffect::LaserOff,
                SideEffect::ResetSearchController,
            ];
        }

        let debounce_expired = match self.debounce_until_ms {
            Some(until) => now_ms >= until,
            None => true,
        };
        let re_centered_drifted = input
            .tracking
            .map(|t| t.error_px.abs() > config.re_center_error_px)
            .unwrap_or(false);

        if debounce_expired && input.pattern_cycle_complete && re_centered_drifted {
            self.mode = SystemMode::Track;
            self.debounce_until_ms = None;
            return vec![SideEffect::PatternStop, SideEffect::LaserOff];
        }

        Vec::new()
    }

    /// any → SHUTDOWN: always succeeds, regardless of prior mode.
    pub fn shutdown(&mut self) -> Vec<SideEffect> {
        let was_deterring = self.mode == SystemMode::Deterring;
        self.mode = SystemMode::Shutdown;
        let mut effects = Vec::new();
        if was_deterring {
            effects.push(SideEffect::PatternStop);
        }
        effects.push(SideEffect::LaserOff);
        effects.push(SideEffect::BlockingAbsoluteNeutral);
        effects.push(SideEffect::CloseTransport);
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StateMachineConfig {
        StateMachineConfig {
            bird_confidence_gate: 0.7,
            human_confidence_gate: 0.6,
            confirm_ticks: 3,
            distance_min: 1.0,
            distance_max: 20.0,
            debounce_ms: 2000,
            re_center_error_px: 50.0,
            require_roll_fresh: false,
        }
    }

    fn bird_input(locked: bool, distance: Option<f32>) -> TickInput {
        TickInput {
            detection_class: DetectionClass::Bird,
            detection_confidence: 0.9,
            tracking: Some(TrackingOutcome {
                should_move: !locked,
                delta_z: 0.0,
                error_px: if locked { 0.0 } else { 100.0 },
                target_locked: locked,
            }),
            tracking_lost: false,
            ground_distance: distance,
            roll_fresh: true,
            pattern_cycle_complete: false,
        }
    }

    fn no_detection() -> TickInput {
        TickInput {
            detection_class: DetectionClass::None,
            detection_confidence: 0.0,
            tracking: None,
            tracking_lost: false,
            ground_distance: None,
            roll_fresh: true,
            pattern_cycle_complete: false,
        }
    }

    #[test]
    fn init_to_search_only_once() {
        let mut sm = SafetyStateMachine::new();
        assert_eq!(sm.mode(), SystemMode::Init);
        let effects = sm.complete_init();
        assert_eq!(sm.mode(), SystemMode::Search);
        assert_eq!(effects, vec![SideEffect::ResetSearchController]);
        assert!(sm.complete_init().is_empty());
    }

    #[test]
    fn search_to_track_requires_n_confirm_consecutive_ticks() {
        let cfg = config();
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();

        assert!(sm.tick(&bird_input(false, None), 0, &cfg).is_empty());
        assert_eq!(sm.mode(), SystemMode::Search);
        assert!(sm.tick(&bird_input(false, None), 0, &cfg).is_empty());
        assert_eq!(sm.mode(), SystemMode::Search);
        let effects = sm.tick(&bird_input(false, None), 0, &cfg);
        assert_eq!(sm.mode(), SystemMode::Track);
        assert!(effects.contains(&SideEffect::FinishPendingMoves));
        assert!(effects.contains(&SideEffect::ResetTrackingController));
    }

    #[test]
    fn losing_the_bird_resets_the_confirm_counter() {
        let cfg = config();
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        sm.tick(&bird_input(false, None), 0, &cfg);
        sm.tick(&no_detection(), 0, &cfg);
        sm.tick(&bird_input(false, None), 0, &cfg);
        sm.tick(&bird_input(false, None), 0, &cfg);
        assert_eq!(sm.mode(), SystemMode::Search);
    }

    #[test]
    fn track_to_deterring_needs_locked_target_and_distance_in_window() {
        let cfg = config();
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        for _ in 0..3 {
            sm.tick(&bird_input(false, None), 0, &cfg);
        }
        assert_eq!(sm.mode(), SystemMode::Track);

        // locked but out of distance window: stays in TRACK
        let effects = sm.tick(&bird_input(true, Some(50.0)), 1000, &cfg);
        assert_eq!(sm.mode(), SystemMode::Track);
        assert!(effects.is_empty());

        // locked and in window: DETERRING
        let effects = sm.tick(&bird_input(true, Some(5.0)), 1000, &cfg);
        assert_eq!(sm.mode(), SystemMode::Deterring);
        assert!(effects.contains(&SideEffect::LaserOn));
        assert!(effects.iter().any(|e| matches!(e, SideEffect::PatternStart { distance_m } if *distance_m == 5.0)));
    }

    #[test]
    fn deterring_exits_only_after_debounce_cycle_and_recentering_drift() {
        let cfg = config();
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        for _ in 0..3 {
            sm.tick(&bird_input(false, None), 0, &cfg);
        }
        sm.tick(&bird_input(true, Some(5.0)), 0, &cfg);
        assert_eq!(sm.mode(), SystemMode::Deterring);

        // debounce not expired yet
        let mut still_deterring = bird_input(true, Some(5.0));
        still_deterring.pattern_cycle_complete = true;
        still_deterring.tracking = Some(TrackingOutcome {
            should_move: true,
            delta_z: 0.0,
            error_px: 100.0,
            target_locked: true,
        });
        let effects = sm.tick(&still_deterring, 500, &cfg);
        assert_eq!(sm.mode(), SystemMode::Deterring);
        assert!(effects.is_empty());

        // debounce expired, cycle complete, drifted off center: back to TRACK
        let effects = sm.tick(&still_deterring, 3000, &cfg);
        assert_eq!(sm.mode(), SystemMode::Track);
        assert!(effects.contains(&SideEffect::PatternStop));
        assert!(effects.contains(&SideEffect::LaserOff));
    }

    #[test]
    fn losing_the_target_exits_deterring_to_search_regardless_of_debounce_or_cycle() {
        let cfg = config();
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        for _ in 0..3 {
            sm.tick(&bird_input(false, None), 0, &cfg);
        }
        sm.tick(&bird_input(true, Some(5.0)), 0, &cfg);
        assert_eq!(sm.mode(), SystemMode::Deterring);

        let mut lost = bird_input(true, Some(5.0));
        lost.tracking_lost = true;
        // still inside the debounce window and no pattern cycle reported
        let effects = sm.tick(&lost, 100, &cfg);
        assert_eq!(sm.mode(), SystemMode::Search);
        assert!(effects.contains(&SideEffect::PatternStop));
        assert!(effects.contains(&SideEffect::LaserOff));
        assert!(effects.contains(&SideEffect::ResetSearchController));
    }

    #[test]
    fn human_detection_interrupts_any_mode_to_search_with_laser_off() {
        let cfg = config();
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        for _ in 0..3 {
            sm.tick(&bird_input(false, None), 0, &cfg);
        }
        sm.tick(&bird_input(true, Some(5.0)), 0, &cfg);
        assert_eq!(sm.mode(), SystemMode::Deterring);

        let human = TickInput {
            detection_class: DetectionClass::Human,
            detection_confidence: 0.9,
            tracking: None,
            tracking_lost: false,
            ground_distance: None,
            roll_fresh: true,
            pattern_cycle_complete: false,
        };
        let effects = sm.tick(&human, 100, &cfg);
        assert_eq!(sm.mode(), SystemMode::Search);
        assert!(effects.contains(&SideEffect::PatternStop));
        assert!(effects.contains(&SideEffect::LaserOff));
    }

    #[test]
    fn resume_forces_search_from_deterring_and_stops_the_pattern() {
        let cfg = config();
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        for _ in 0..3 {
            sm.tick(&bird_input(false, None), 0, &cfg);
        }
        sm.tick(&bird_input(true, Some(5.0)), 0, &cfg);
        assert_eq!(sm.mode(), SystemMode::Deterring);

        let effects = sm.resume_to_search();
        assert_eq!(sm.mode(), SystemMode::Search);
        assert!(effects.contains(&SideEffect::PatternStop));
        assert!(effects.contains(&SideEffect::ResetSearchController));
    }

    #[test]
    fn resume_is_a_no_op_after_shutdown() {
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        sm.shutdown();
        assert!(sm.resume_to_search().is_empty());
        assert_eq!(sm.mode(), SystemMode::Shutdown);
    }

    #[test]
    fn shutdown_always_succeeds_and_cleans_up_pattern() {
        let cfg = config();
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        for _ in 0..3 {
            sm.tick(&bird_input(false, None), 0, &cfg);
        }
        sm.tick(&bird_input(true, Some(5.0)), 0, &cfg);
        assert_eq!(sm.mode(), SystemMode::Deterring);

        let effects = sm.shutdown();
        assert_eq!(sm.mode(), SystemMode::Shutdown);
        assert!(effects.contains(&SideEffect::PatternStop));
        assert!(effects.contains(&SideEffect::LaserOff));
        assert!(effects.contains(&SideEffect::BlockingAbsoluteNeutral));
        assert!(effects.contains(&SideEffect::CloseTransport));

        assert!(sm.tick(&bird_input(true, Some(5.0)), 9999, &cfg).is_empty());
    }

    #[test]
    fn roll_freshness_gate_blocks_deterring_when_required_and_stale() {
        let mut cfg = config();
        cfg.require_roll_fresh = true;
        let mut sm = SafetyStateMachine::new();
        sm.complete_init();
        for _ in 0..3 {
            sm.tick(&bird_input(false, None), 0, &cfg);
        }
        let mut stale = bird_input(true, Some(5.0));
        stale.roll_fresh = false;
        let effects = sm.tick(&stale, 0, &cfg);
        assert_eq!(sm.mode(), SystemMode::Track);
        assert!(effects.is_empty());
    }
}
