pub mod booking;
pub mod snapshot;

pub use booking::{BookingError, BookingPolicy, BookingReport, CheckedBooking, MicroBooking};
pub use snapshot::{
    BookingCode, BookingEntry, ClusterSnapshot, GpuStatus, IpEntry, NodeHealth, NodeStatus,
    UnknownBookingCode, UserSession,
};

pub mod telemetry;
