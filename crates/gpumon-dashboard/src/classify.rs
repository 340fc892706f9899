//! Turns the producer's legality codes into display markers.
//!
//! Nothing here recomputes legality: `user_code` and `error_code` are taken as
//! delivered. The illegal-user list is advisory (username string matching on
//! the producer side) and only feeds the warning panel.

use serde::Serialize;

use gpumon_common::{BookingCode, ClusterSnapshot, UserSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMarker {
    Legal,
    Illegal,
}

impl UserMarker {
    pub fn for_session(session: &UserSession) -> Self {
        if session.is_illegal() {
            UserMarker::Illegal
        } else {
            UserMarker::Legal
        }
    }

    pub fn css_class(self) -> Option<&'static str> {
        match self {
            UserMarker::Legal => None,
            UserMarker::Illegal => Some("illegal_user"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingMarker {
    None,
    IllegalBooking,
    IllegalMaxGpu,
    IllegalMaxDay,
}

impl BookingMarker {
    /// Markers that denote a violation, in legend order.
    pub const VIOLATIONS: [BookingMarker; 3] = [
        BookingMarker::IllegalBooking,
        BookingMarker::IllegalMaxGpu,
        BookingMarker::IllegalMaxDay,
    ];

    pub fn css_class(self) -> Option<&'static str> {
        match self {
            BookingMarker::None => None,
            BookingMarker::IllegalBooking => Some("illegal_booking"),
            BookingMarker::IllegalMaxGpu => Some("illegal_maxgpu"),
            BookingMarker::IllegalMaxDay => Some("illegal_maxday"),
        }
    }

    pub fn legend(self) -> Option<&'static str> {
        match self {
            BookingMarker::None => None,
            BookingMarker::IllegalBooking => {
                Some("Invalid booking title(correct example: panda(cat))")
            }
            BookingMarker::IllegalMaxGpu => Some("Exceed maximum gpus(4)"),
            BookingMarker::IllegalMaxDay => Some("Exceed maximum days(3) per gpu"),
        }
    }
}

impl From<BookingCode> for BookingMarker {
    fn from(code: BookingCode) -> Self {
        match code {
            BookingCode::Ok => BookingMarker::None,
            BookingCode::IllegalTitle => BookingMarker::IllegalBooking,
            BookingCode::MaxGpuExceeded => BookingMarker::IllegalMaxGpu,
            BookingCode::MaxDayExceeded => BookingMarker::IllegalMaxDay,
        }
    }
}

/// Cluster-wide legality summary of one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Producer's `illegal_users`, de-duplicated, first occurrence wins.
    pub illegal_users: Vec<String>,
    /// Sessions carrying a nonzero `user_code`.
    pub illegal_sessions: usize,
    pub title_violations: usize,
    pub max_gpu_violations: usize,
    pub max_day_violations: usize,
}

impl Classification {
    pub fn violations(&self) -> usize {
        self.title_violations + self.max_gpu_violations + self.max_day_violations
    }
}

pub fn classify(snapshot: &ClusterSnapshot) -> Classification {
    let mut out = Classification::default();

    for name in &snapshot.illegal_users {
        if !out.illegal_users.contains(name) {
            out.illegal_users.push(name.clone());
        }
    }

    for gpu in snapshot.nodes.iter().flat_map(|n| &n.gpus) {
        out.illegal_sessions += gpu.users.iter().filter(|u| u.is_illegal()).count();

        // Calendars are only shown, and so only counted, while fresh.
        if !snapshot.calendar_status {
            continue;
        }
        let entries = gpu.calendar.iter().flatten().flatten();
        for entry in entries {
            match BookingMarker::from(entry.code) {
                BookingMarker::None => {}
                BookingMarker::IllegalBooking => out.title_violations += 1,
                BookingMarker::IllegalMaxGpu => out.max_gpu_violations += 1,
                BookingMarker::IllegalMaxDay => out.max_day_violations += 1,
            }
        }
    }

    out
}
