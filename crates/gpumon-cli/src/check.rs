use anyhow::{Context, Result};

use gpumon_common::booking::parse_roster;
use gpumon_common::{BookingPolicy, BookingReport, ClusterSnapshot, MicroBooking};

pub struct CheckOutcome {
    pub report: BookingReport,
    /// The input snapshot with calendars, user codes and `illegal_users`
    /// recomputed from `report`.
    pub snapshot: Option<ClusterSnapshot>,
}

pub fn check_bookings(
    bookings: &[u8],
    roster: Option<&str>,
    snapshot: Option<&[u8]>,
) -> Result<CheckOutcome> {
    let bookings = MicroBooking::parse_list(bookings)?;

    let mut policy = BookingPolicy::default();
    if let Some(text) = roster {
        policy = policy.with_roster(parse_roster(text));
    }

    tracing::debug!(bookings = bookings.len(), "checking bookings");
    let report = policy.check(bookings);

    let snapshot = match snapshot {
        Some(bytes) => {
            let mut snap = ClusterSnapshot::from_slice(bytes).context("decoding snapshot")?;
            report.apply(&mut snap);
            Some(snap)
        }
        None => None,
    };
    Ok(CheckOutcome { report, snapshot })
}
