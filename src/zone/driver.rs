//! Shrink driver: advances the zone through the phase table once per tick

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::authority::{AuthoritativeState, AuthorityToken, Replicate};
use super::phase::ZoneSettings;
use super::state::{ZoneSnapshot, ZoneState};
use super::timer::{Tick, TickRate, TickTimer};

/// Zone changes worth telling observers about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ZoneEvent {
    /// A phase began shrinking toward a new circle
    PhaseStarted {
        index: u32,
        target_center: Vec2,
        target_radius: f32,
        duration_secs: f32,
    },

    /// A phase reached its target circle
    PhaseCompleted {
        index: u32,
        center: Vec2,
        radius: f32,
    },

    /// Every phase is done; the zone is final
    SequenceCompleted { center: Vec2, radius: f32 },
}

/// Start and target of the phase in progress (authority-local, not replicated)
#[derive(Debug, Clone, Copy)]
struct PhasePlan {
    duration_secs: f32,
    /// Tick the shrink started on and how many ticks it spans
    started: Tick,
    span_ticks: u64,
    start_radius: f32,
    target_radius: f32,
    start_center: Vec2,
    target_center: Vec2,
}

impl PhasePlan {
    fn settled(center: Vec2, radius: f32) -> Self {
        Self {
            duration_secs: 0.0,
            started: Tick(0),
            span_ticks: 0,
            start_radius: radius,
            target_radius: radius,
            start_center: center,
            target_center: center,
        }
    }
}

/// Authoritative zone simulation. Constructing one requires an
/// [`AuthorityToken`], so observers have no way to mutate the zone.
pub struct ShrinkDriver {
    token: AuthorityToken,
    settings: ZoneSettings,
    rate: TickRate,
    state: AuthoritativeState<ZoneState>,
    plan: PhasePlan,
    rng: ChaCha8Rng,
    sequence_reported: bool,
}

impl ShrinkDriver {
    pub fn new(token: AuthorityToken, settings: ZoneSettings, rate: TickRate, seed: u64) -> Self {
        let state = ZoneState::new(settings.initial_center, settings.initial_radius);
        let plan = PhasePlan::settled(state.center, state.radius);

        Self {
            token,
            settings,
            rate,
            state: AuthoritativeState::new(state),
            plan,
            rng: ChaCha8Rng::seed_from_u64(seed),
            sequence_reported: false,
        }
    }

    /// Advance the zone to tick `now`. Ticks may be skipped; the zone is
    /// recomputed from the absolute phase timer.
    pub fn step(&mut self, now: Tick) -> Vec<ZoneEvent> {
        let mut events = Vec::new();

        if self.state.read().phase_timer.is_running() {
            self.advance_phase(now);

            if !self.state.read().phase_timer.expired(now) {
                return events;
            }
            self.complete_phase(&mut events);
        }

        while self.needs_next_phase() {
            self.begin_next_phase(now, &mut events);

            if self.state.read().phase_timer.is_running() {
                return events;
            }
        }

        if !self.sequence_reported {
            self.finalize(&mut events);
        }

        events
    }

    /// Whether another phase is waiting to start. Pure; false once terminal.
    pub fn needs_next_phase(&self) -> bool {
        let state = self.state.read();
        !state.phase_timer.is_running()
            && ((state.active_phase_index + 1) as usize) < self.settings.phases.len()
    }

    pub fn has_completed_all_phases(&self) -> bool {
        let state = self.state.read();
        self.settings.phases.is_empty()
            || (state.active_phase_index >= self.settings.phases.len() as i32 - 1
                && !state.phase_timer.is_running())
    }

    pub fn current_center(&self) -> Vec2 {
        self.state.read().center
    }

    pub fn current_radius(&self) -> f32 {
        self.state.read().radius
    }

    pub fn state(&self) -> &ZoneState {
        self.state.read()
    }

    pub fn settings(&self) -> &ZoneSettings {
        &self.settings
    }

    pub fn rate(&self) -> TickRate {
        self.rate
    }

    /// Number of writes applied to the zone so far
    pub fn version(&self) -> u64 {
        self.state.version()
    }

    fn begin_next_phase(&mut self, now: Tick, events: &mut Vec<ZoneEvent>) {
        let next_index = self.state.read().active_phase_index + 1;
        let Some(phase) = self.settings.phases.get(next_index as usize).copied() else {
            return;
        };

        let start_center = self.state.read().center;
        let start_radius = self.state.read().radius;
        let target_radius = phase.target_radius.min(start_radius).max(0.0);
        let target_center = if self.settings.randomize_center {
            random_contained_center(&mut self.rng, start_center, start_radius, target_radius)
        } else {
            start_center
        };

        self.plan = PhasePlan {
            duration_secs: phase.duration_secs.max(0.0),
            started: now,
            span_ticks: 0,
            start_radius,
            target_radius,
            start_center,
            target_center,
        };

        self.state.modify(&self.token, |state| {
            state.active_phase_index = next_index;
        });

        debug!(
            phase = next_index,
            start_radius,
            target_radius,
            duration_secs = self.plan.duration_secs,
            "Zone phase starting"
        );

        events.push(ZoneEvent::PhaseStarted {
            index: next_index as u32,
            target_center,
            target_radius,
            duration_secs: self.plan.duration_secs,
        });

        if self.plan.duration_secs <= f32::EPSILON || approximately(start_radius, target_radius) {
            self.complete_phase(events);
            return;
        }

        let timer = TickTimer::from_seconds(now, self.rate, self.plan.duration_secs);
        self.plan.span_ticks = timer.remaining_ticks(now).unwrap_or(0);
        self.state.modify(&self.token, |state| {
            state.phase_timer = timer;
        });
    }

    fn advance_phase(&mut self, now: Tick) {
        let plan = self.plan;
        // Measured in ticks so that unbounded durations stay finite
        let normalized = if plan.span_ticks == 0 {
            1.0
        } else {
            let elapsed = now.0.saturating_sub(plan.started.0);
            (elapsed as f64 / plan.span_ticks as f64).clamp(0.0, 1.0) as f32
        };

        let radius = (plan.start_radius + (plan.target_radius - plan.start_radius) * normalized)
            .min(plan.start_radius)
            .max(plan.target_radius);
        let center = plan.start_center.lerp(plan.target_center, normalized);

        self.state.modify(&self.token, |state| {
            state.radius = radius;
            state.center = center;
        });
    }

    fn complete_phase(&mut self, events: &mut Vec<ZoneEvent>) {
        let target_center = self.plan.target_center;
        let target_radius = self.plan.target_radius;

        let index = self.state.modify(&self.token, |state| {
            state.radius = target_radius;
            state.center = target_center;
            state.phase_timer = TickTimer::NONE;
            state.active_phase_index
        });
        self.plan = PhasePlan::settled(target_center, target_radius);

        debug!(phase = index, radius = target_radius, "Zone phase complete");

        events.push(ZoneEvent::PhaseCompleted {
            index: index.max(0) as u32,
            center: target_center,
            radius: target_radius,
        });
    }

    fn finalize(&mut self, events: &mut Vec<ZoneEvent>) {
        let center = self.plan.target_center;
        let radius = self.plan.target_radius;

        self.state.modify(&self.token, |state| {
            state.radius = radius;
            state.center = center;
        });
        self.sequence_reported = true;

        debug!(radius, "Zone sequence complete");
        events.push(ZoneEvent::SequenceCompleted { center, radius });
    }
}

impl Replicate for ShrinkDriver {
    type Snapshot = ZoneSnapshot;

    fn snapshot(&self, now: Tick) -> ZoneSnapshot {
        ZoneSnapshot::capture(
            self.state.read(),
            now,
            self.rate,
            self.has_completed_all_phases(),
        )
    }
}

/// Uniform point in the disk of radius `current - target` around `center`,
/// so a circle of `target` radius there stays inside the current circle.
fn random_contained_center(
    rng: &mut ChaCha8Rng,
    center: Vec2,
    current_radius: f32,
    target_radius: f32,
) -> Vec2 {
    let max_offset = (current_radius - target_radius).max(0.0);
    if max_offset <= f32::EPSILON {
        return center;
    }

    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let distance = max_offset * rng.gen::<f32>().sqrt();
    center + Vec2::from_angle(angle) * distance
}

fn approximately(a: f32, b: f32) -> bool {
    (a - b).abs() < (1e-6 * a.abs().max(b.abs())).max(f32::EPSILON * 8.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::authority::SessionRole;
    use crate::zone::phase::{Phase, PhaseTable};

    fn driver(settings: ZoneSettings, tps: u32) -> ShrinkDriver {
        let token = SessionRole::Server.claim_authority().unwrap();
        ShrinkDriver::new(token, settings, TickRate::new(tps), 7)
    }

    fn run(driver: &mut ShrinkDriver, ticks: std::ops::RangeInclusive<u64>) -> Vec<ZoneEvent> {
        ticks.flat_map(|t| driver.step(Tick(t))).collect()
    }

    fn default_fixed() -> ZoneSettings {
        ZoneSettings::new(60.0, false, PhaseTable::default())
    }

    #[test]
    fn three_phase_scenario_at_fifty_ms_ticks() {
        let mut zone = driver(default_fixed(), 20);

        // tick 0 starts the first phase, tick 600 is t = 30s
        run(&mut zone, 0..=600);
        assert!((zone.current_radius() - 50.0).abs() < 1e-3);

        run(&mut zone, 601..=1200);
        assert!((zone.current_radius() - 40.0).abs() < 1e-3);
        assert_eq!(zone.current_center(), Vec2::ZERO);
        assert!(!zone.has_completed_all_phases());

        run(&mut zone, 1201..=3600);
        assert_eq!(zone.current_radius(), 10.0);
        assert_eq!(zone.current_center(), Vec2::ZERO);
        assert!(zone.has_completed_all_phases());
        assert!(!zone.needs_next_phase());
    }

    #[test]
    fn radius_snaps_exactly_to_each_target() {
        let mut zone = driver(ZoneSettings::new(60.0, true, PhaseTable::default()), 20);
        let events = run(&mut zone, 0..=3600);

        let completed: Vec<f32> = events
            .iter()
            .filter_map(|e| match e {
                ZoneEvent::PhaseCompleted { radius, .. } => Some(*radius),
                _ => None,
            })
            .collect();

        assert_eq!(completed, vec![40.0, 25.0, 10.0]);
        assert_eq!(zone.current_radius(), 10.0);
        assert!(matches!(
            events.last(),
            Some(ZoneEvent::SequenceCompleted { radius, .. }) if *radius == 10.0
        ));
    }

    #[test]
    fn zero_duration_phase_snaps_on_first_tick() {
        let phases = PhaseTable::new(vec![Phase::new(0.0, 20.0)]);
        let mut zone = driver(ZoneSettings::new(60.0, false, phases), 20);

        let events = zone.step(Tick(0));

        assert_eq!(zone.current_radius(), 20.0);
        assert!(zone.has_completed_all_phases());
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ZoneEvent::PhaseStarted { index: 0, .. }));
        assert!(matches!(events[1], ZoneEvent::PhaseCompleted { index: 0, .. }));
        assert!(matches!(events[2], ZoneEvent::SequenceCompleted { .. }));
    }

    #[test]
    fn larger_target_never_grows_the_zone() {
        let phases = PhaseTable::new(vec![Phase::new(10.0, 80.0)]);
        let settings = ZoneSettings::new(50.0, true, phases).with_center(Vec2::new(5.0, -5.0));
        let mut zone = driver(settings, 20);

        zone.step(Tick(0));

        assert_eq!(zone.current_radius(), 50.0);
        assert_eq!(zone.current_center(), Vec2::new(5.0, -5.0));
        assert!(zone.has_completed_all_phases());
    }

    #[test]
    fn zero_target_collapses_to_a_point() {
        let phases = PhaseTable::new(vec![Phase::new(1.0, 0.0)]);
        let mut zone = driver(ZoneSettings::new(30.0, true, phases), 20);

        run(&mut zone, 0..=20);

        assert_eq!(zone.current_radius(), 0.0);
        assert!(zone.has_completed_all_phases());
    }

    #[test]
    fn empty_table_is_already_complete() {
        let mut zone = driver(ZoneSettings::new(60.0, false, PhaseTable::empty()), 20);
        assert!(zone.has_completed_all_phases());
        assert!(!zone.needs_next_phase());

        let events = zone.step(Tick(0));
        assert_eq!(zone.current_radius(), 60.0);
        assert!(matches!(events.as_slice(), [ZoneEvent::SequenceCompleted { .. }]));
    }

    #[test]
    fn terminal_driver_is_a_no_op() {
        let mut zone = driver(default_fixed(), 20);
        run(&mut zone, 0..=3600);

        let version = zone.version();
        let state = zone.state().clone();

        for t in 3601..3700 {
            assert!(!zone.needs_next_phase());
            assert!(zone.step(Tick(t)).is_empty());
        }

        assert_eq!(zone.version(), version);
        assert_eq!(zone.state(), &state);
    }

    #[test]
    fn enormous_phase_keeps_shrinking_slowly() {
        let phases = PhaseTable::new(vec![Phase::new(1.0, 50.0), Phase::new(1e30, 10.0)]);
        let mut zone = driver(ZoneSettings::new(60.0, false, phases), 20);

        run(&mut zone, 0..=25);

        assert_eq!(zone.state().active_phase_index, 1);
        assert!(zone.state().phase_timer.is_running());
        assert!(!zone.has_completed_all_phases());
        assert!((zone.current_radius() - 50.0).abs() < 1e-3);
        assert!(zone.current_center().is_finite());
        assert!(zone.snapshot(Tick(25)).phase_remaining_secs > 1e9);
    }

    #[test]
    fn infinite_phase_never_expires() {
        let phases = PhaseTable::parse("1:50,inf:10").unwrap();
        let mut zone = driver(ZoneSettings::new(60.0, false, phases), 20);

        run(&mut zone, 0..=25);
        zone.step(Tick(1_000_000));

        assert_eq!(zone.state().active_phase_index, 1);
        assert!(zone.state().phase_timer.is_running());
        assert!(zone.current_radius().is_finite());
        assert!(zone.current_radius() <= 50.0 && zone.current_radius() > 49.9);
    }

    #[test]
    fn skipped_ticks_catch_up_from_absolute_time() {
        let mut zone = driver(default_fixed(), 20);
        zone.step(Tick(0));

        zone.step(Tick(600));
        assert!((zone.current_radius() - 50.0).abs() < 1e-3);

        // Jumping past the end completes phase one and starts phase two
        let events = zone.step(Tick(5000));
        assert_eq!(zone.current_radius(), 40.0);
        assert_eq!(zone.state().active_phase_index, 1);
        assert!(matches!(events[0], ZoneEvent::PhaseCompleted { index: 0, .. }));
        assert!(matches!(events[1], ZoneEvent::PhaseStarted { index: 1, .. }));
    }

    #[test]
    fn same_seed_reproduces_the_zone() {
        let settings = ZoneSettings::new(60.0, true, PhaseTable::default());
        let mut a = driver(settings.clone(), 20);
        let mut b = driver(settings, 20);

        run(&mut a, 0..=3600);
        run(&mut b, 0..=3600);

        assert_eq!(a.current_center(), b.current_center());
    }

    #[test]
    fn snapshot_reports_remaining_time() {
        let mut zone = driver(default_fixed(), 20);
        run(&mut zone, 0..=200);

        let snapshot = zone.snapshot(Tick(200));
        assert_eq!(snapshot.tick, 200);
        assert_eq!(snapshot.active_phase_index, 0);
        assert!((snapshot.phase_remaining_secs - 50.0).abs() < 1e-3);
        assert!(!snapshot.completed);
    }

    #[test]
    fn random_center_stays_inside_disk() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..1000 {
            let c = random_contained_center(&mut rng, Vec2::new(10.0, 10.0), 60.0, 40.0);
            assert!(c.distance(Vec2::new(10.0, 10.0)) <= 20.0 + 1e-4);
        }
        assert_eq!(
            random_contained_center(&mut rng, Vec2::ONE, 40.0, 40.0),
            Vec2::ONE
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn zone_only_shrinks_and_stays_nested(
                initial_radius in 0.0f32..200.0,
                raw_phases in proptest::collection::vec((0.0f32..20.0, 0.0f32..250.0), 0..5),
                tps in 5u32..60,
                randomize in proptest::bool::ANY,
                seed in any::<u64>(),
            ) {
                let phases = PhaseTable::new(
                    raw_phases.iter().map(|&(d, r)| Phase::new(d, r)).collect(),
                );
                let total_ticks: u64 = phases
                    .iter()
                    .map(|p| TickRate::new(tps).ticks_for(p.duration_secs))
                    .sum::<u64>()
                    + 2;

                let token = SessionRole::Server.claim_authority().unwrap();
                let mut zone = ShrinkDriver::new(
                    token,
                    ZoneSettings::new(initial_radius, randomize, phases),
                    TickRate::new(tps),
                    seed,
                );

                let mut prev_center = zone.current_center();
                let mut prev_radius = zone.current_radius();

                for t in 0..=total_ticks {
                    zone.step(Tick(t));
                    let center = zone.current_center();
                    let radius = zone.current_radius();

                    prop_assert!(
                        radius <= prev_radius,
                        "radius grew from {} to {} at tick {}",
                        prev_radius,
                        radius,
                        t
                    );
                    prop_assert!(
                        center.distance(prev_center) + radius <= prev_radius + 1e-3,
                        "circle escaped its predecessor at tick {}",
                        t
                    );

                    prev_center = center;
                    prev_radius = radius;
                }

                prop_assert!(zone.has_completed_all_phases());
            }
        }
    }
}
