use serde::{Deserialize, Serialize};

/// Scroll offset past which the header row is pinned to the top. Matches the
/// header's natural height in the reference layout.
pub const DEFAULT_PIN_THRESHOLD: f64 = 345.6;

pub const PINNED_CLASS: &str = "nav-at-top";

/// Inputs sampled on every scroll event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollState {
    pub scroll_top: f64,
    pub scroll_left: f64,
    /// Left margin of the page body the header normally sits in.
    pub header_left_margin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HeaderPosition {
    /// In normal flow, no positioning class or style.
    #[default]
    Unpinned,
    /// Fixed at the top, shifted horizontally to follow the page.
    Pinned { left: f64 },
}

impl HeaderPosition {
    pub fn is_pinned(&self) -> bool {
        matches!(self, HeaderPosition::Pinned { .. })
    }

    pub fn class(&self) -> Option<&'static str> {
        match self {
            HeaderPosition::Unpinned => None,
            HeaderPosition::Pinned { .. } => Some(PINNED_CLASS),
        }
    }

    pub fn style(&self) -> Option<String> {
        match self {
            HeaderPosition::Unpinned => None,
            HeaderPosition::Pinned { left } => Some(format!("left: {left}px")),
        }
    }
}

/// Sticky-header controller.
///
/// Stateless: the page reports each scroll sample and applies the returned
/// position.
#[derive(Debug, Clone, Copy)]
pub struct ScrollPin {
    threshold: f64,
}

impl Default for ScrollPin {
    fn default() -> Self {
        Self::new(DEFAULT_PIN_THRESHOLD)
    }
}

impl ScrollPin {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluate(&self, state: &ScrollState) -> HeaderPosition {
        if state.scroll_top <= self.threshold {
            HeaderPosition::Unpinned
        } else {
            HeaderPosition::Pinned {
                left: state.header_left_margin - state.scroll_left,
            }
        }
    }
}
