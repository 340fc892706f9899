use gpumon_common::{ClusterSnapshot, GpuStatus, NodeStatus};

use crate::classify::{classify, BookingMarker, Classification, UserMarker};
use crate::error::SnapshotError;
use crate::view::{
    AddressView, BookingMark, DashboardView, GpuLine, HeaderRow, NodeView, ScheduleSlot, UserCell,
    UserMark, WarningPanel,
};

/// Builds a fresh view tree for `snapshot`.
pub fn render(snapshot: &ClusterSnapshot) -> Result<DashboardView, SnapshotError> {
    render_view(snapshot, &classify(snapshot))
}

/// Builds a fresh view tree from a snapshot and its classification.
///
/// Nodes and GPUs keep snapshot order. Nothing is carried over from earlier
/// renders; an inconsistent snapshot yields an error and no view at all.
pub fn render_view(
    snapshot: &ClusterSnapshot,
    classification: &Classification,
) -> Result<DashboardView, SnapshotError> {
    validate(snapshot)?;

    let header = HeaderRow {
        schedule_days: if snapshot.calendar_status {
            snapshot.dates().to_vec()
        } else {
            Vec::new()
        },
    };

    let nodes = snapshot
        .nodes
        .iter()
        .map(|n| node_view(n, snapshot.calendar_status))
        .collect();

    Ok(DashboardView {
        header,
        nodes,
        warning: WarningPanel::new(classification.illegal_users.clone()),
    })
}

/// With a fresh calendar, every GPU calendar present must cover exactly the
/// dates in `date_list`.
pub fn validate(snapshot: &ClusterSnapshot) -> Result<(), SnapshotError> {
    if !snapshot.calendar_status {
        return Ok(());
    }
    let expected = snapshot.dates().len();
    for node in &snapshot.nodes {
        for gpu in &node.gpus {
            let Some(calendar) = &gpu.calendar else {
                continue;
            };
            if calendar.len() != expected {
                return Err(SnapshotError::CalendarLength {
                    hostname: node.hostname.clone(),
                    index: gpu.index,
                    expected,
                    actual: calendar.len(),
                });
            }
        }
    }
    Ok(())
}

fn node_view(node: &NodeStatus, calendar_status: bool) -> NodeView {
    let addresses = node
        .ips
        .iter()
        .flatten()
        .map(|ip| AddressView {
            address: ip.address().to_string(),
            label: ip.label().to_string(),
        })
        .collect();

    NodeView {
        hostname: node.hostname.clone(),
        status: node.status.marker().into_owned(),
        version: node.version.clone(),
        addresses,
        gpus: node
            .gpus
            .iter()
            .map(|g| gpu_line(g, calendar_status))
            .collect(),
    }
}

fn gpu_line(gpu: &GpuStatus, calendar_status: bool) -> GpuLine {
    let users = if gpu.users.is_empty() {
        UserCell::Blank
    } else {
        UserCell::Users(
            gpu.users
                .iter()
                .map(|u| UserMark {
                    username: u.username.clone(),
                    marker: UserMarker::for_session(u),
                })
                .collect(),
        )
    };

    let schedule = match (&gpu.calendar, calendar_status) {
        (Some(days), true) => Some(
            days.iter()
                .map(|bookings| {
                    if bookings.is_empty() {
                        ScheduleSlot::Blank
                    } else {
                        ScheduleSlot::Bookings(
                            bookings
                                .iter()
                                .map(|b| BookingMark {
                                    text: b.to_string(),
                                    marker: BookingMarker::from(b.code),
                                })
                                .collect(),
                        )
                    }
                })
                .collect(),
        ),
        _ => None,
    };

    GpuLine {
        index: gpu.index,
        memory_text: format!("{}/{}", gpu.used_memory, gpu.total_memory),
        memory_fill_percent: memory_fill_percent(gpu.used_memory, gpu.total_memory),
        utilization_text: format!("{} %", gpu.utilization),
        users,
        schedule,
    }
}

/// `used / total * 100`. Not clamped: over-committed memory overflows the
/// fill. A non-positive total has no meaningful ratio and shows empty.
pub fn memory_fill_percent(used: f64, total: f64) -> f64 {
    if total > 0.0 {
        used / total * 100.0
    } else {
        0.0
    }
}
