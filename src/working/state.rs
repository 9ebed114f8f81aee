use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::WorkingPeriod;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum MachineState {
    Idle,
    Running { since: DateTime<Utc> },
}

impl Default for MachineState {
    fn default() -> Self {
        MachineState::Idle
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    None,
    Started { at: DateTime<Utc> },
    Stopped { period: WorkingPeriod },
}

impl MachineState {
    /// Applies one time-ordered sample. Repeated active samples keep the
    /// original start; repeated inactive samples are no-ops.
    pub fn step(self, device_id: &str, active: bool, at: DateTime<Utc>) -> (MachineState, Transition) {
        match (self, active) {
            (MachineState::Idle, true) => (MachineState::Running { since: at }, Transition::Started { at }),
            (MachineState::Idle, false) => (MachineState::Idle, Transition::None),
            (MachineState::Running { since }, true) => (MachineState::Running { since }, Transition::None),
            (MachineState::Running { since }, false) => (
                MachineState::Idle,
                Transition::Stopped {
                    period: WorkingPeriod::closed(device_id, since, at),
                },
            ),
        }
    }

    /// Closes the stream: a running machine yields its ongoing period up to `now`.
    pub fn finish(self, device_id: &str, now: DateTime<Utc>) -> Option<WorkingPeriod> {
        match self {
            MachineState::Idle => None,
            MachineState::Running { since } => Some(WorkingPeriod::ongoing(device_id, since, now)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn transitions() {
        let t0 = Utc.with_ymd_and_hms(2024, 4, 4, 6, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(90);

        let (state, event) = MachineState::default().step("d", false, t0);
        assert_eq!((state, event), (MachineState::Idle, Transition::None));

        let (state, event) = state.step("d", true, t0);
        assert_eq!(state, MachineState::Running { since: t0 });
        assert_eq!(event, Transition::Started { at: t0 });

        let (state, event) = state.step("d", true, t0 + Duration::minutes(5));
        assert_eq!(state, MachineState::Running { since: t0 });
        assert_eq!(event, Transition::None);

        let (state, event) = state.step("d", false, t1);
        assert_eq!(state, MachineState::Idle);
        match event {
            Transition::Stopped { period } => {
                assert_eq!(period.start, t0);
                assert_eq!(period.end, t1);
                assert_eq!(period.duration_hours, 1.5);
                assert!(!period.ongoing);
            }
            other => panic!("expected Stopped, got {other:?}"),
        }
    }

    #[test]
    fn finish_only_emits_when_running() {
        let t0 = Utc.with_ymd_and_hms(2024, 4, 4, 6, 0, 0).unwrap();
        assert!(MachineState::Idle.finish("d", t0).is_none());
        let ongoing = MachineState::Running { since: t0 }
            .finish("d", t0 + Duration::hours(2))
            .unwrap();
        assert!(ongoing.ongoing);
        assert_eq!(ongoing.duration_hours, 2.0);
        assert_eq!(ongoing.closed_end(), None);
    }
}
