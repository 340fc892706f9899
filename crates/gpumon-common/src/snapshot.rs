use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One complete `/get-status` payload.
///
/// Produced once per poll and never merged with an earlier snapshot; the next
/// successful poll replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterSnapshot {
    /// Whether the producer currently has a fresh booking calendar.
    pub calendar_status: bool,

    /// Calendar day labels. `null` until the producer has fetched a calendar.
    #[serde(default)]
    pub date_list: Option<Vec<String>>,

    #[serde(rename = "Nodes")]
    pub nodes: Vec<NodeStatus>,

    /// Display-only list of usernames running without a matching booking.
    pub illegal_users: Vec<String>,
}

impl ClusterSnapshot {
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn dates(&self) -> &[String] {
        self.date_list.as_deref().unwrap_or(&[])
    }

    pub fn gpu_count(&self) -> usize {
        self.nodes.iter().map(|n| n.gpus.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeStatus {
    pub hostname: String,
    pub status: NodeHealth,
    pub version: String,

    /// Absent on placeholder nodes that never reported.
    #[serde(default)]
    pub ips: Option<Vec<IpEntry>>,

    pub gpus: Vec<GpuStatus>,
}

/// Node health as reported by the producer.
///
/// Older producers send a bare boolean (reachable within the expiry window),
/// newer ones a label such as `"unknown"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum NodeHealth {
    Reachable(bool),
    Label(String),
}

impl NodeHealth {
    pub fn unknown() -> Self {
        NodeHealth::Label("unknown".to_string())
    }

    /// Value used for the `data-status` marker of the node indicator.
    pub fn marker(&self) -> Cow<'_, str> {
        match self {
            NodeHealth::Reachable(true) => Cow::Borrowed("true"),
            NodeHealth::Reachable(false) => Cow::Borrowed("false"),
            NodeHealth::Label(label) => Cow::Borrowed(label.as_str()),
        }
    }
}

impl Default for NodeHealth {
    fn default() -> Self {
        Self::unknown()
    }
}

/// `[interface, address]` pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpEntry(pub String, pub String);

impl IpEntry {
    pub fn label(&self) -> &str {
        &self.0
    }

    pub fn address(&self) -> &str {
        &self.1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpuStatus {
    pub index: u32,

    /// MiB in use.
    #[serde(rename = "use_mem")]
    pub used_memory: f64,

    /// MiB installed.
    #[serde(rename = "tot_mem")]
    pub total_memory: f64,

    /// Percent, 0-100.
    #[serde(rename = "utilize")]
    pub utilization: f64,

    pub users: Vec<UserSession>,

    /// One booking list per entry of `date_list`. Missing or `null` when the
    /// producer has no calendar for this GPU.
    #[serde(default)]
    pub calendar: Option<Vec<Vec<BookingEntry>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSession {
    pub username: String,

    /// 0 when the session matches a booking, anything else otherwise.
    #[serde(rename = "user_code")]
    pub legality_code: i64,
}

impl UserSession {
    pub fn is_illegal(&self) -> bool {
        self.legality_code != 0
    }
}

/// One reservation on one GPU for one day, sent as `[title, owner, error_code]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    from = "(String, String, BookingCode)",
    into = "(String, String, BookingCode)"
)]
pub struct BookingEntry {
    pub title: String,
    pub owner: String,
    pub code: BookingCode,
}

impl From<(String, String, BookingCode)> for BookingEntry {
    fn from((title, owner, code): (String, String, BookingCode)) -> Self {
        Self { title, owner, code }
    }
}

impl From<BookingEntry> for (String, String, BookingCode) {
    fn from(entry: BookingEntry) -> Self {
        (entry.title, entry.owner, entry.code)
    }
}

impl fmt::Display for BookingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.title, self.owner)
    }
}

/// Validity of a booking, assigned by the producer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum BookingCode {
    Ok = 0,
    IllegalTitle = 1,
    MaxGpuExceeded = 2,
    MaxDayExceeded = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown booking error code {0}")]
pub struct UnknownBookingCode(pub u8);

impl TryFrom<u8> for BookingCode {
    type Error = UnknownBookingCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BookingCode::Ok),
            1 => Ok(BookingCode::IllegalTitle),
            2 => Ok(BookingCode::MaxGpuExceeded),
            3 => Ok(BookingCode::MaxDayExceeded),
            other => Err(UnknownBookingCode(other)),
        }
    }
}

impl From<BookingCode> for u8 {
    fn from(code: BookingCode) -> Self {
        code as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_producer_payload() {
        let body = json!({
            "date_list": ["2024 03 01", "2024 03 02"],
            "calendar_status": true,
            "teamup_ids": ["ksx1"],
            "Nodes": [{
                "hostname": "next-asus-01",
                "last_update": "2024-03-01T10:00:00",
                "status": true,
                "version": "NVIDIA RTX 3090",
                "ips": [["eth0", "10.0.0.1"]],
                "gpus": [{
                    "index": 0,
                    "name": "NVIDIA RTX 3090",
                    "use_mem": 1024,
                    "tot_mem": 24576,
                    "utilize": 87,
                    "temp": 61,
                    "users": [{
                        "pid": 42, "username": "alice", "mem(MiB)": 1000,
                        "command": "python", "user_code": 0
                    }],
                    "calendar": [[["alice", "bob", 0]], []]
                }]
            }],
            "illegal_users": []
        });

        let snap: ClusterSnapshot = serde_json::from_value(body).unwrap();
        assert!(snap.calendar_status);
        assert_eq!(snap.dates().len(), 2);
        let node = &snap.nodes[0];
        assert_eq!(node.status, NodeHealth::Reachable(true));
        assert_eq!(node.ips.as_ref().unwrap()[0].address(), "10.0.0.1");
        assert_eq!(node.ips.as_ref().unwrap()[0].label(), "eth0");
        let gpu = &node.gpus[0];
        assert_eq!(gpu.used_memory, 1024.0);
        assert!(!gpu.users[0].is_illegal());
        let cal = gpu.calendar.as_ref().unwrap();
        assert_eq!(cal[0][0].to_string(), "alice(bob)");
        assert_eq!(cal[0][0].code, BookingCode::Ok);
        assert!(cal[1].is_empty());
    }

    #[test]
    fn test_null_date_list_and_placeholder_node() {
        let body = json!({
            "date_list": null,
            "calendar_status": false,
            "Nodes": [{
                "hostname": "next-gpu4",
                "status": false,
                "version": "",
                "gpus": [{"index": 0, "use_mem": 0, "tot_mem": 100, "utilize": 0, "users": []}]
            }],
            "illegal_users": []
        });

        let snap: ClusterSnapshot = serde_json::from_value(body).unwrap();
        assert!(snap.dates().is_empty());
        assert!(snap.nodes[0].ips.is_none());
        assert!(snap.nodes[0].gpus[0].calendar.is_none());
        assert_eq!(snap.nodes[0].status.marker(), "false");
    }

    #[test]
    fn test_string_status_label() {
        let status: NodeHealth = serde_json::from_value(json!("unknown")).unwrap();
        assert_eq!(status, NodeHealth::unknown());
        assert_eq!(status.marker(), "unknown");
    }

    #[test]
    fn test_unknown_booking_code_rejected() {
        let res: Result<BookingEntry, _> = serde_json::from_value(json!(["alice", "bob", 7]));
        assert!(res.is_err());
        let res: Result<BookingEntry, _> = serde_json::from_value(json!(["alice", "bob", 3]));
        assert_eq!(res.unwrap().code, BookingCode::MaxDayExceeded);
    }

    #[test]
    fn test_missing_gpus_is_malformed() {
        let body = json!({
            "calendar_status": false,
            "Nodes": [{"hostname": "a", "status": true, "version": ""}],
            "illegal_users": []
        });
        assert!(serde_json::from_value::<ClusterSnapshot>(body).is_err());
    }

    #[test]
    fn test_booking_entry_serializes_as_tuple() {
        let entry = BookingEntry {
            title: "panda".to_string(),
            owner: "cat".to_string(),
            code: BookingCode::IllegalTitle,
        };
        assert_eq!(serde_json::to_value(&entry).unwrap(), json!(["panda", "cat", 1]));
    }
}
