//! DST-aware timestamp sequence.
//!
//! The simulation advances on a uniform grid of *standard* (no-DST) instants.
//! The local wall-clock label of each instant is shifted by one hour while
//! daylight saving is active. The active state is found by scanning the switch
//! table in chronological order, so a fall-back switch produces a repeated
//! local hour and a spring-forward switch a skipped one.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// One entry of the DST switch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DstSwitch {
    /// Switch instant (standard time).
    pub at: NaiveDateTime,
    /// Whether DST is active after the switch.
    pub dst: bool,
}

impl DstSwitch {
    pub fn new(year: i32, month: u32, day: u32, hour: u32, dst: bool) -> Option<Self> {
        let at = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)?;
        Some(Self { at, dst })
    }
}

/// Central European switch dates 2019-2024 (02:00 standard time).
pub fn default_dst_switches() -> Vec<DstSwitch> {
    [
        (2019, 3, 31, true),
        (2019, 10, 27, false),
        (2020, 3, 29, true),
        (2020, 10, 25, false),
        (2021, 3, 28, true),
        (2021, 10, 31, false),
        (2022, 3, 27, true),
        (2022, 10, 30, false),
        (2023, 3, 26, true),
        (2023, 10, 29, false),
        (2024, 3, 31, true),
        (2024, 10, 27, false),
    ]
    .into_iter()
    .filter_map(|(y, m, d, dst)| DstSwitch::new(y, m, d, 2, dst))
    .collect()
}

/// One instant of the simulation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimTime {
    pub index: usize,
    /// Uniform grid instant without DST offset.
    pub standard: NaiveDateTime,
    /// Local wall-clock label.
    pub local: NaiveDateTime,
    pub dst: bool,
}

impl SimTime {
    /// Seconds elapsed since local midnight.
    pub fn seconds_of_day(&self) -> u32 {
        self.local.num_seconds_from_midnight()
    }

    /// Saturday or Sunday in local time.
    pub fn is_weekend(&self) -> bool {
        is_weekend(&self.local)
    }
}

pub fn is_weekend(t: &NaiveDateTime) -> bool {
    t.weekday().num_days_from_monday() > 4
}

/// DST state in effect at `t`: the last switch strictly before `t`.
///
/// Returns the DST flag and the index of that switch (`None` if `t` precedes
/// the whole table).
pub fn dst_state_at(t: NaiveDateTime, switches: &[DstSwitch]) -> (bool, Option<usize>) {
    let mut state = (false, None);
    for (idx, switch) in switches.iter().enumerate() {
        if t > switch.at {
            state = (switch.dst, Some(idx));
        }
    }
    state
}

/// The ordered sequence of simulation instants.
#[derive(Debug, Clone)]
pub struct Timeline {
    step_s: u32,
    times: Vec<SimTime>,
}

impl Timeline {
    /// Builds the sequence from local start/end labels.
    ///
    /// Length is `floor(duration / step) + 1`, where the duration is measured
    /// between the standard-time equivalents of `start` and `end`.
    pub fn build(
        start: NaiveDateTime,
        end: NaiveDateTime,
        step_s: u32,
        switches: &[DstSwitch],
    ) -> Result<Self, SetupError> {
        if step_s == 0 {
            return Err(SetupError::InvalidConfiguration(
                "timeline step must be positive".into(),
            ));
        }
        let hour = Duration::hours(1);
        let (start_dst, start_idx) = dst_state_at(start, switches);
        let (end_dst, _) = dst_state_at(end, switches);
        let start_std = if start_dst { start - hour } else { start };
        let end_std = if end_dst { end - hour } else { end };

        let duration_s = (end_std - start_std).num_seconds();
        if duration_s < 0 {
            return Err(SetupError::InvalidConfiguration(format!(
                "simulation end {end} precedes start {start}"
            )));
        }
        let steps = (duration_s / i64::from(step_s)) as usize + 1;

        let mut next = start_idx.map_or(0, |i| i + 1);
        let mut dst = start_dst;
        let mut times = Vec::with_capacity(steps);
        for index in 0..steps {
            let standard = start_std + Duration::seconds(index as i64 * i64::from(step_s));
            while next < switches.len() && standard >= switches[next].at {
                dst = switches[next].dst;
                next += 1;
            }
            let local = if dst { standard + hour } else { standard };
            times.push(SimTime {
                index,
                standard,
                local,
                dst,
            });
        }

        Ok(Self { step_s, times })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn step_s(&self) -> u32 {
        self.step_s
    }

    pub fn get(&self, index: usize) -> Option<&SimTime> {
        self.times.get(index)
    }

    pub fn times(&self) -> &[SimTime] {
        &self.times
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimTime> {
        self.times.iter()
    }
}
