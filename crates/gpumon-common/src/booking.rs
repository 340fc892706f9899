//! Booking policy used by the status producer to assign `error_code` and
//! `user_code`.
//!
//! Bookings are checked as micro-bookings: one row per title, GPU and day
//! offset. The rules, in precedence order:
//!
//! 1. the title must look like a username (and be on the roster, if any);
//! 2. one title may hold at most `max_gpus_per_owner` distinct GPUs;
//! 3. one title may hold one GPU for at most `max_days_per_gpu` days.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::snapshot::{BookingCode, BookingEntry, ClusterSnapshot, NodeHealth, UserSession};

pub const MAX_GPUS_PER_OWNER: usize = 4;
pub const MAX_DAYS_PER_GPU: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid booking list: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MicroBooking {
    pub title: String,
    pub who: String,
    pub hostname: String,
    pub index: u32,
    /// Offset from the first calendar day.
    pub day: usize,
}

impl MicroBooking {
    pub fn parse_list(bytes: &[u8]) -> Result<Vec<MicroBooking>, BookingError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Reads a roster file: one user per line, first whitespace-separated token.
pub fn parse_roster(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub max_gpus_per_owner: usize,
    pub max_days_per_gpu: usize,
    roster: Option<HashSet<String>>,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            max_gpus_per_owner: MAX_GPUS_PER_OWNER,
            max_days_per_gpu: MAX_DAYS_PER_GPU,
            roster: None,
        }
    }
}

impl BookingPolicy {
    pub fn with_roster(mut self, users: impl IntoIterator<Item = String>) -> Self {
        self.roster = Some(users.into_iter().collect());
        self
    }

    pub fn title_is_valid(&self, title: &str) -> bool {
        if title.is_empty()
            || title
                .chars()
                .any(|c| c.is_whitespace() || c == '(' || c == ')')
        {
            return false;
        }
        self.roster.as_ref().map_or(true, |r| r.contains(title))
    }

    pub fn check(&self, bookings: Vec<MicroBooking>) -> BookingReport {
        let mut gpus_by_title: BTreeMap<&str, BTreeSet<(&str, u32)>> = BTreeMap::new();
        let mut days_by_gpu: BTreeMap<(&str, &str, u32), BTreeSet<usize>> = BTreeMap::new();
        for b in &bookings {
            gpus_by_title
                .entry(b.title.as_str())
                .or_default()
                .insert((b.hostname.as_str(), b.index));
            days_by_gpu
                .entry((b.title.as_str(), b.hostname.as_str(), b.index))
                .or_default()
                .insert(b.day);
        }

        let codes: Vec<BookingCode> = bookings
            .iter()
            .map(|b| {
                if !self.title_is_valid(&b.title) {
                    return BookingCode::IllegalTitle;
                }
                let gpus = gpus_by_title.get(b.title.as_str()).map_or(0, |s| s.len());
                if gpus > self.max_gpus_per_owner {
                    return BookingCode::MaxGpuExceeded;
                }
                let days = days_by_gpu
                    .get(&(b.title.as_str(), b.hostname.as_str(), b.index))
                    .map_or(0, |s| s.len());
                if days > self.max_days_per_gpu {
                    return BookingCode::MaxDayExceeded;
                }
                BookingCode::Ok
            })
            .collect();

        let checked = bookings
            .into_iter()
            .zip(codes)
            .map(|(booking, code)| CheckedBooking { booking, code })
            .collect();
        BookingReport { bookings: checked }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckedBooking {
    #[serde(flatten)]
    pub booking: MicroBooking,
    pub code: BookingCode,
}

/// Outcome of [`BookingPolicy::check`].
#[derive(Debug, Clone, Default)]
pub struct BookingReport {
    bookings: Vec<CheckedBooking>,
}

impl BookingReport {
    pub fn bookings(&self) -> &[CheckedBooking] {
        &self.bookings
    }

    pub fn violations(&self) -> impl Iterator<Item = &CheckedBooking> {
        self.bookings.iter().filter(|b| b.code != BookingCode::Ok)
    }

    fn on_gpu<'a>(
        &'a self,
        hostname: &'a str,
        index: u32,
    ) -> impl Iterator<Item = &'a CheckedBooking> {
        self.bookings
            .iter()
            .filter(move |b| b.booking.hostname == hostname && b.booking.index == index)
    }

    /// Per-day booking lists for one GPU, `days` entries long.
    pub fn gpu_calendar(&self, hostname: &str, index: u32, days: usize) -> Vec<Vec<BookingEntry>> {
        let mut out = vec![Vec::new(); days];
        for b in self.on_gpu(hostname, index) {
            match out.get_mut(b.booking.day) {
                Some(slot) => slot.push(BookingEntry {
                    title: b.booking.title.clone(),
                    owner: b.booking.who.clone(),
                    code: b.code,
                }),
                None => tracing::debug!(
                    hostname,
                    index,
                    day = b.booking.day,
                    "booking outside calendar window"
                ),
            }
        }
        out
    }

    /// 0 when `username` occurs in a valid booking of this GPU for today.
    ///
    /// This is a plain substring match against `title + who`, not an identity
    /// check.
    pub fn user_code(&self, username: &str, hostname: &str, index: u32) -> i64 {
        let booked: String = self
            .on_gpu(hostname, index)
            .filter(|b| b.booking.day == 0 && b.code == BookingCode::Ok)
            .map(|b| format!("{}{} ", b.booking.title, b.booking.who))
            .collect();
        i64::from(!booked.contains(username))
    }

    pub fn classify_sessions(&self, hostname: &str, index: u32, sessions: &mut [UserSession]) {
        for s in sessions {
            s.legality_code = self.user_code(&s.username, hostname, index);
        }
    }

    /// Fills calendars and user codes of `snapshot` and rebuilds its
    /// `illegal_users` list.
    ///
    /// Nodes reported unreachable keep the user codes they arrived with.
    pub fn apply(&self, snapshot: &mut ClusterSnapshot) {
        let days = snapshot.dates().len();
        let calendar = snapshot.calendar_status;
        let mut illegal: Vec<String> = Vec::new();
        for node in &mut snapshot.nodes {
            let reachable = node.status != NodeHealth::Reachable(false);
            for gpu in &mut node.gpus {
                if calendar {
                    gpu.calendar = Some(self.gpu_calendar(&node.hostname, gpu.index, days));
                }
                if reachable {
                    self.classify_sessions(&node.hostname, gpu.index, &mut gpu.users);
                }
                for u in gpu.users.iter().filter(|u| u.is_illegal()) {
                    if !illegal.contains(&u.username) {
                        illegal.push(u.username.clone());
                    }
                }
            }
        }
        snapshot.illegal_users = illegal;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{GpuStatus, NodeStatus};

    fn mb(title: &str, who: &str, host: &str, index: u32, day: usize) -> MicroBooking {
        MicroBooking {
            title: title.to_string(),
            who: who.to_string(),
            hostname: host.to_string(),
            index,
            day,
        }
    }

    #[test]
    fn test_valid_booking() {
        let report = BookingPolicy::default().check(vec![mb("alice", "bob", "n1", 0, 0)]);
        assert_eq!(report.bookings()[0].code, BookingCode::Ok);
        assert_eq!(report.violations().count(), 0);
    }

    #[test]
    fn test_illegal_title() {
        let policy = BookingPolicy::default().with_roster(vec!["alice".to_string()]);
        let report = policy.check(vec![
            mb("alice", "bob", "n1", 0, 0),
            mb("mallory", "bob", "n1", 1, 0),
            mb("panda(cat)", "bob", "n1", 2, 0),
        ]);
        let codes: Vec<_> = report.bookings().iter().map(|b| b.code).collect();
        assert_eq!(
            codes,
            vec![BookingCode::Ok, BookingCode::IllegalTitle, BookingCode::IllegalTitle]
        );
    }

    #[test]
    fn test_max_gpu_exceeded() {
        let bookings: Vec<_> = (0..5).map(|i| mb("alice", "bob", "n1", i, 0)).collect();
        let report = BookingPolicy::default().check(bookings);
        assert!(report
            .bookings()
            .iter()
            .all(|b| b.code == BookingCode::MaxGpuExceeded));

        let bookings: Vec<_> = (0..4).map(|i| mb("alice", "bob", "n1", i, 0)).collect();
        let report = BookingPolicy::default().check(bookings);
        assert_eq!(report.violations().count(), 0);
    }

    #[test]
    fn test_max_day_exceeded_only_on_that_gpu() {
        let mut bookings: Vec<_> = (0..4).map(|d| mb("alice", "bob", "n1", 0, d)).collect();
        bookings.push(mb("alice", "bob", "n1", 1, 0));
        let report = BookingPolicy::default().check(bookings);
        let codes: Vec<_> = report.bookings().iter().map(|b| b.code).collect();
        assert_eq!(&codes[..4], &[BookingCode::MaxDayExceeded; 4]);
        assert_eq!(codes[4], BookingCode::Ok);
    }

    #[test]
    fn test_title_error_takes_precedence() {
        let bookings: Vec<_> = (0..5).map(|i| mb("bad title", "bob", "n1", i, 0)).collect();
        let report = BookingPolicy::default().check(bookings);
        assert!(report
            .bookings()
            .iter()
            .all(|b| b.code == BookingCode::IllegalTitle));
    }

    #[test]
    fn test_gpu_calendar_layout() {
        let report = BookingPolicy::default().check(vec![
            mb("alice", "bob", "n1", 0, 0),
            mb("carol", "bob", "n1", 0, 2),
            mb("alice", "bob", "n1", 1, 1),
            mb("dave", "bob", "n1", 0, 9),
        ]);
        let cal = report.gpu_calendar("n1", 0, 3);
        assert_eq!(cal.len(), 3);
        assert_eq!(cal[0][0].to_string(), "alice(bob)");
        assert!(cal[1].is_empty());
        assert_eq!(cal[2][0].title, "carol");
    }

    #[test]
    fn test_user_code_substring_match_today_only() {
        let report = BookingPolicy::default().check(vec![
            mb("alice", "bob", "n1", 0, 0),
            mb("carol", "bob", "n1", 0, 1),
        ]);
        assert_eq!(report.user_code("alice", "n1", 0), 0);
        assert_eq!(report.user_code("bob", "n1", 0), 0);
        assert_eq!(report.user_code("ali", "n1", 0), 0);
        assert_eq!(report.user_code("carol", "n1", 0), 1);
        assert_eq!(report.user_code("alice", "n1", 1), 1);
    }

    #[test]
    fn test_apply_fills_snapshot() {
        let report = BookingPolicy::default().check(vec![mb("alice", "bob", "n1", 0, 0)]);
        let mut snap = ClusterSnapshot {
            calendar_status: true,
            date_list: Some(vec!["d0".to_string(), "d1".to_string()]),
            nodes: vec![NodeStatus {
                hostname: "n1".to_string(),
                status: NodeHealth::Reachable(true),
                version: "A100".to_string(),
                ips: None,
                gpus: vec![GpuStatus {
                    index: 0,
                    used_memory: 1.0,
                    total_memory: 2.0,
                    utilization: 0.0,
                    users: vec![
                        UserSession { username: "alice".to_string(), legality_code: 0 },
                        UserSession { username: "eve".to_string(), legality_code: 0 },
                        UserSession { username: "eve".to_string(), legality_code: 0 },
                    ],
                    calendar: None,
                }],
            }],
            illegal_users: vec![],
        };
        report.apply(&mut snap);
        let gpu = &snap.nodes[0].gpus[0];
        assert_eq!(gpu.calendar.as_ref().unwrap().len(), 2);
        assert_eq!(gpu.users[0].legality_code, 0);
        assert_eq!(gpu.users[1].legality_code, 1);
        assert_eq!(snap.illegal_users, vec!["eve".to_string()]);
    }

    #[test]
    fn test_parse_roster_and_list() {
        assert_eq!(parse_roster("alice 1001\n\nbob\n"), vec!["alice", "bob"]);
        let list = MicroBooking::parse_list(
            br#"[{"title":"alice","who":"bob","hostname":"n1","index":0,"day":1}]"#,
        )
        .unwrap();
        assert_eq!(list[0].day, 1);
        assert!(MicroBooking::parse_list(b"{").is_err());
    }
}
