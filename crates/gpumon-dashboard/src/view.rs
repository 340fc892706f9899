//! The visual tree built from one snapshot.
//!
//! Every field is final display text or a marker; serializers (HTML, terminal)
//! only lay it out.

use serde::Serialize;

use crate::classify::{BookingMarker, UserMarker};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub header: HeaderRow,
    pub nodes: Vec<NodeView>,
    pub warning: WarningPanel,
}

impl DashboardView {
    pub fn gpu_lines(&self) -> impl Iterator<Item = &GpuLine> {
        self.nodes.iter().flat_map(|n| &n.gpus)
    }
}

/// Calendar day cells of the header row. Empty while the calendar is stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeaderRow {
    pub schedule_days: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub hostname: String,
    /// Value of the status indicator's `data-status` marker.
    pub status: String,
    pub version: String,
    pub addresses: Vec<AddressView>,
    pub gpus: Vec<GpuLine>,
}

impl NodeView {
    pub fn address_text(&self) -> String {
        self.addresses
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressView {
    pub address: String,
    pub label: String,
}

impl std::fmt::Display for AddressView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.address, self.label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuLine {
    pub index: u32,
    /// `"used/total"`.
    pub memory_text: String,
    /// `used / total * 100`, unclamped.
    pub memory_fill_percent: f64,
    /// `"<n> %"`.
    pub utilization_text: String,
    pub users: UserCell,
    /// `None` when no calendar column is shown for this GPU.
    pub schedule: Option<Vec<ScheduleSlot>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "users", rename_all = "snake_case")]
pub enum UserCell {
    Blank,
    Users(Vec<UserMark>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMark {
    pub username: String,
    pub marker: UserMarker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "bookings", rename_all = "snake_case")]
pub enum ScheduleSlot {
    Blank,
    Bookings(Vec<BookingMark>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingMark {
    /// `"title(owner)"`.
    pub text: String,
    pub marker: BookingMarker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarningPanel {
    pub illegal_users: Vec<String>,
    pub legend: Vec<LegendLine>,
}

impl WarningPanel {
    pub fn new(illegal_users: Vec<String>) -> Self {
        let legend = BookingMarker::VIOLATIONS
            .iter()
            .filter_map(|&marker| {
                marker.legend().map(|text| LegendLine {
                    marker,
                    text: text.to_string(),
                })
            })
            .collect();
        Self {
            illegal_users,
            legend,
        }
    }

    pub fn illegal_users_text(&self) -> String {
        self.illegal_users.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendLine {
    pub marker: BookingMarker,
    pub text: String,
}
