//! Phase timeline and per-phase event content.
//!
//! A session runs through a fixed, ordered list of phases. The standard
//! timeline is defined in minutes (0.5, 2.5, 4, 6, 6.5, 8.5, 9) and kept here
//! in whole seconds:
//!
//! | Offset | Phase            | Payload                                   |
//! |--------|------------------|-------------------------------------------|
//! | 30     | `introduce`      | shuffled roster names                     |
//! | 150    | `keyword`        | random 1..=20 plus the second participant |
//! | 240    | `cupidTime`      | label                                     |
//! | 360    | `cam`            | label                                     |
//! | 390    | `drawingContest` | label plus random real in [0, 1234)       |
//! | 510    | `lastCupidTime`  | label                                     |
//! | 540    | `finish`         | label                                     |

use crate::errors::ScError;
use crate::models::Participant;

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;

/// Upper bound (inclusive) of the keyword number.
pub const KEYWORD_MAX: u8 = 20;

/// Upper bound (exclusive) of the drawing contest index.
pub const DRAWING_INDEX_MAX: f64 = 1234.0;

/// A named timeline milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Introduce,
    Keyword,
    CupidTime,
    Cam,
    DrawingContest,
    LastCupidTime,
    Finish,
}

impl Phase {
    /// Event name as seen by clients.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Phase::Introduce => "introduce",
            Phase::Keyword => "keyword",
            Phase::CupidTime => "cupidTime",
            Phase::Cam => "cam",
            Phase::DrawingContest => "drawingContest",
            Phase::LastCupidTime => "lastCupidTime",
            Phase::Finish => "finish",
        }
    }
}

/// Standard timeline, offsets in seconds from scheduler start.
const STANDARD_TIMELINE: [(u64, Phase); 7] = [
    (30, Phase::Introduce),
    (150, Phase::Keyword),
    (240, Phase::CupidTime),
    (360, Phase::Cam),
    (390, Phase::DrawingContest),
    (510, Phase::LastCupidTime),
    (540, Phase::Finish),
];

/// Ordered `(offset_seconds, phase)` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    entries: Vec<(u64, Phase)>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl Timeline {
    /// The standard seven-phase timeline.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            entries: STANDARD_TIMELINE.to_vec(),
        }
    }

    /// Build a custom timeline.
    ///
    /// Offsets must be non-zero and strictly increasing; an offset that is not
    /// greater than its predecessor could never be reached by the tick counter.
    pub fn new(entries: Vec<(u64, Phase)>) -> Result<Self, ScError> {
        let mut previous = 0;
        for &(offset, phase) in &entries {
            if offset <= previous {
                return Err(ScError::Config(format!(
                    "phase {} at offset {offset}s does not come after {previous}s",
                    phase.name()
                )));
            }
            previous = offset;
        }
        Ok(Self { entries })
    }

    #[must_use]
    pub fn entries(&self) -> &[(u64, Phase)] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tick-driven cursor over a [`Timeline`].
///
/// The cursor only moves forward: a phase is returned by exactly one tick.
#[derive(Debug, Clone)]
pub struct PhaseTimer {
    timeline: Timeline,
    cursor: usize,
    elapsed: u64,
}

impl PhaseTimer {
    #[must_use]
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            cursor: 0,
            elapsed: 0,
        }
    }

    /// Advance one tick. Returns the phase due at this tick, if any.
    pub fn tick(&mut self) -> Option<Phase> {
        if self.is_finished() {
            return None;
        }

        self.elapsed += 1;

        match self.timeline.entries.get(self.cursor) {
            Some(&(offset, phase)) if offset == self.elapsed => {
                self.cursor += 1;
                Some(phase)
            }
            _ => None,
        }
    }

    /// True once every phase has fired.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.timeline.len()
    }

    /// Ticks counted so far.
    #[must_use]
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Number of phases already fired.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

/// Resolved content of one phase broadcast.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseEvent {
    /// Roster names in one shuffled order, identical for every recipient.
    Introduce { names: Vec<String> },
    /// Random number plus the name at roster index 1.
    ///
    /// `second` is `None` when the roster has fewer than two members.
    Keyword { number: u8, second: Option<String> },
    /// Fixed label plus a random index into the client's keyword list.
    DrawingContest { label: String, index: f64 },
    /// Label-only phases.
    Generic { label: String },
}

impl PhaseEvent {
    /// Resolve the content for `phase` against a roster snapshot.
    pub fn resolve<R: Rng + ?Sized>(phase: Phase, roster: &[Participant], rng: &mut R) -> Self {
        match phase {
            Phase::Introduce => {
                let mut names: Vec<String> = roster.iter().map(|p| p.name.clone()).collect();
                names.shuffle(rng);
                PhaseEvent::Introduce { names }
            }
            Phase::Keyword => PhaseEvent::Keyword {
                number: rng.gen_range(1..=KEYWORD_MAX),
                second: roster.get(1).map(|p| p.name.clone()),
            },
            Phase::DrawingContest => PhaseEvent::DrawingContest {
                label: phase.name().to_string(),
                index: rng.gen_range(0.0..DRAWING_INDEX_MAX),
            },
            Phase::CupidTime | Phase::Cam | Phase::LastCupidTime | Phase::Finish => {
                PhaseEvent::Generic {
                    label: phase.name().to_string(),
                }
            }
        }
    }

    /// Event name sent to clients.
    #[must_use]
    pub fn event_name(&self) -> &str {
        match self {
            PhaseEvent::Introduce { .. } => Phase::Introduce.name(),
            PhaseEvent::Keyword { .. } => Phase::Keyword.name(),
            PhaseEvent::DrawingContest { label, .. } | PhaseEvent::Generic { label } => label,
        }
    }

    /// Wire payload. Shapes match what existing clients consume.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        match self {
            PhaseEvent::Introduce { names } => json!(names),
            PhaseEvent::Keyword { number, second } => json!({
                "message": number.to_string(),
                "getRandomParticipant": second,
            }),
            PhaseEvent::DrawingContest { label, index } => json!({
                "message": label,
                "keywordsIndex": index,
            }),
            PhaseEvent::Generic { label } => json!({ "message": label }),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::models::ConnectionHandle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn roster(names: &[&str]) -> Vec<Participant> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let (handle, _rx) = ConnectionHandle::new(format!("conn-{i}"), 1);
                Participant::new(*name, handle)
            })
            .collect()
    }

    fn fire_times(timeline: Timeline) -> Vec<(u64, Phase)> {
        let mut timer = PhaseTimer::new(timeline);
        let mut fired = Vec::new();
        for _ in 0..1000 {
            if let Some(phase) = timer.tick() {
                fired.push((timer.elapsed(), phase));
            }
        }
        fired
    }

    #[test]
    fn test_standard_timeline_fires_each_phase_once_at_offset() {
        let fired = fire_times(Timeline::standard());

        assert_eq!(
            fired,
            vec![
                (30, Phase::Introduce),
                (150, Phase::Keyword),
                (240, Phase::CupidTime),
                (360, Phase::Cam),
                (390, Phase::DrawingContest),
                (510, Phase::LastCupidTime),
                (540, Phase::Finish),
            ]
        );
    }

    #[test]
    fn test_timer_stops_counting_after_last_phase() {
        let mut timer = PhaseTimer::new(Timeline::standard());
        for _ in 0..540 {
            timer.tick();
        }
        assert!(timer.is_finished());
        assert_eq!(timer.cursor(), 7);

        assert_eq!(timer.tick(), None);
        assert_eq!(timer.elapsed(), 540);
    }

    #[test]
    fn test_timeline_rejects_unordered_offsets() {
        let result = Timeline::new(vec![(10, Phase::Introduce), (10, Phase::Keyword)]);
        assert!(matches!(result, Err(ScError::Config(_))));

        let result = Timeline::new(vec![(0, Phase::Introduce)]);
        assert!(matches!(result, Err(ScError::Config(_))));

        let timeline = Timeline::new(vec![(1, Phase::Introduce), (3, Phase::Finish)]).unwrap();
        assert_eq!(
            fire_times(timeline),
            vec![(1, Phase::Introduce), (3, Phase::Finish)]
        );
    }

    #[test]
    fn test_introduce_is_permutation_of_roster() {
        let members = roster(&["Alice", "Bob", "Carol", "Dave"]);
        let mut rng = StdRng::seed_from_u64(7);

        let PhaseEvent::Introduce { names } =
            PhaseEvent::resolve(Phase::Introduce, &members, &mut rng)
        else {
            panic!("expected introduce event");
        };

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, vec!["Alice", "Bob", "Carol", "Dave"]);
    }

    #[test]
    fn test_introduce_keeps_duplicate_names() {
        let members = roster(&["Alice", "Alice", "Bob"]);
        let mut rng = StdRng::seed_from_u64(1);

        let PhaseEvent::Introduce { mut names } =
            PhaseEvent::resolve(Phase::Introduce, &members, &mut rng)
        else {
            panic!("expected introduce event");
        };
        names.sort();
        assert_eq!(names, vec!["Alice", "Alice", "Bob"]);
    }

    #[test]
    fn test_introduce_order_varies_between_invocations() {
        let members = roster(&["A", "B", "C", "D", "E", "F"]);
        let mut rng = rand::thread_rng();

        let orders: Vec<Vec<String>> = (0..20)
            .map(|_| match PhaseEvent::resolve(Phase::Introduce, &members, &mut rng) {
                PhaseEvent::Introduce { names } => names,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();

        assert!(
            orders.iter().any(|order| order != &orders[0]),
            "20 shuffles of 6 names should not all agree"
        );
    }

    #[test]
    fn test_keyword_number_in_range_and_second_participant() {
        let members = roster(&["Alice", "Bob", "Carol"]);
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            match PhaseEvent::resolve(Phase::Keyword, &members, &mut rng) {
                PhaseEvent::Keyword { number, second } => {
                    assert!((1..=KEYWORD_MAX).contains(&number));
                    assert_eq!(second.as_deref(), Some("Bob"));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_keyword_with_single_participant_has_no_second() {
        let members = roster(&["Alice"]);
        let mut rng = StdRng::seed_from_u64(3);

        let event = PhaseEvent::resolve(Phase::Keyword, &members, &mut rng);
        let PhaseEvent::Keyword { number, second } = &event else {
            panic!("expected keyword event");
        };
        assert!((1..=KEYWORD_MAX).contains(number));
        assert!(second.is_none());

        let payload = event.payload();
        assert!(payload["getRandomParticipant"].is_null());
        assert_eq!(payload["message"], number.to_string());
    }

    #[test]
    fn test_drawing_contest_index_in_range() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            match PhaseEvent::resolve(Phase::DrawingContest, &[], &mut rng) {
                PhaseEvent::DrawingContest { label, index } => {
                    assert_eq!(label, "drawingContest");
                    assert!((0.0..DRAWING_INDEX_MAX).contains(&index));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_generic_phase_payloads() {
        let mut rng = StdRng::seed_from_u64(0);
        for phase in [
            Phase::CupidTime,
            Phase::Cam,
            Phase::LastCupidTime,
            Phase::Finish,
        ] {
            let event = PhaseEvent::resolve(phase, &[], &mut rng);
            assert_eq!(event.event_name(), phase.name());
            assert_eq!(event.payload(), json!({ "message": phase.name() }));
        }
    }

    #[test]
    fn test_payload_shapes() {
        let introduce = PhaseEvent::Introduce {
            names: vec!["Bob".to_string(), "Alice".to_string()],
        };
        assert_eq!(introduce.payload(), json!(["Bob", "Alice"]));
        assert_eq!(introduce.event_name(), "introduce");

        let keyword = PhaseEvent::Keyword {
            number: 12,
            second: Some("Bob".to_string()),
        };
        assert_eq!(
            keyword.payload(),
            json!({ "message": "12", "getRandomParticipant": "Bob" })
        );

        let drawing = PhaseEvent::DrawingContest {
            label: "drawingContest".to_string(),
            index: 42.5,
        };
        assert_eq!(
            drawing.payload(),
            json!({ "message": "drawingContest", "keywordsIndex": 42.5 })
        );
    }
}
