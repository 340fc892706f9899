pub mod assets;
pub mod classify;
pub mod error;
pub mod html;
pub mod poll;
pub mod render;
pub mod scroll;
pub mod source;
pub mod view;

pub use classify::{classify, BookingMarker, Classification, UserMarker};
pub use error::{FetchError, PollError, SnapshotError};
pub use poll::{Dashboard, PollConfig, PollState, PollStatus, Published};
pub use render::{render, render_view};
pub use scroll::{HeaderPosition, ScrollPin, ScrollState};
pub use source::{HttpStatusSource, StatusSource};
pub use view::DashboardView;
