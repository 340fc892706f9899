//! HTML serialization of the view tree.
//!
//! Class names and attributes form the contract with the page stylesheet:
//! `#head-line`, `.node-line`, `.gpu-line`, `colum *` cells, and the
//! `illegal_*` marker spans.

use std::borrow::Cow;
use std::fmt::Write;

use crate::assets::{SCROLL_SCRIPT, STYLESHEET};
use crate::scroll::HeaderPosition;
use crate::view::{
    DashboardView, GpuLine, HeaderRow, NodeView, ScheduleSlot, UserCell, WarningPanel,
};

const NBSP: &str = "&nbsp;";
const FILL_COLOR: &str = "#99CC66";

pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn marked(text: &str, class: Option<&str>) -> String {
    match class {
        Some(class) => format!("<span class='{class}'>{}</span>", escape(text)),
        None => escape(text).into_owned(),
    }
}

/// CSS for the two-color memory bar.
pub fn memory_fill_style(percent: f64) -> String {
    format!(
        "background: linear-gradient(to right, {FILL_COLOR} {percent}%, white {percent}%, white)"
    )
}

pub fn render_header(header: &HeaderRow, position: &HeaderPosition) -> String {
    let mut out = String::from("<div id=\"head-line\"");
    if let Some(class) = position.class() {
        let _ = write!(out, " class=\"{class}\"");
    }
    if let Some(style) = position.style() {
        let _ = write!(out, " style=\"{style}\"");
    }
    out.push('>');
    for (class, label) in [
        ("node-name", "Node"),
        ("gpu-idx", "GPU"),
        ("memory", "Memory (MiB)"),
        ("utilize", "Util"),
        ("users", "Users"),
    ] {
        let _ = write!(out, "<div class=\"head colum {class}\">{label}</div>");
    }
    out.push_str("<div class=\"colum schedule\">");
    for day in &header.schedule_days {
        let _ = write!(
            out,
            "<div class=\"head colum schedule-day sample\">{}</div>",
            escape(day)
        );
    }
    out.push_str("</div></div>");
    out
}

pub fn render_nodes(view: &DashboardView) -> String {
    let mut out = String::from("<div id=\"content-status\">");
    for node in &view.nodes {
        out.push_str(&render_node(node));
    }
    out.push_str("</div>");
    out
}

fn render_node(node: &NodeView) -> String {
    let mut ips = String::new();
    for a in &node.addresses {
        let _ = write!(ips, "{}{}", escape(&a.to_string()), NBSP.repeat(4));
    }

    let mut out = String::new();
    let _ = write!(
        out,
        "<div class=\"node-line\"><div class=\"node-info\">\
         <div class=\"node-name\">{}</div>\
         <div class=\"node-status\" data-status=\"{}\"></div>\
         <div class=\"node-version\">{}</div>\
         <div class=\"node-ip\">{}</div></div><div class=\"gpu-list\">",
        escape(&node.hostname),
        escape(&node.status),
        escape(&node.version),
        ips,
    );
    for gpu in &node.gpus {
        let _ = write!(out, "<div>{}</div>", render_gpu_line(gpu));
    }
    out.push_str("</div></div>");
    out
}

pub fn render_gpu_line(gpu: &GpuLine) -> String {
    let mut out = String::from("<div class=\"gpu-line\">");
    let _ = write!(out, "<div class=\"colum gpu-idx\">{}</div>", gpu.index);
    let _ = write!(
        out,
        "<div class=\"colum memory\" style=\"{}\">{}</div>",
        memory_fill_style(gpu.memory_fill_percent),
        escape(&gpu.memory_text)
    );
    let _ = write!(
        out,
        "<div class=\"colum utilize\">{}</div>",
        escape(&gpu.utilization_text)
    );

    let users = match &gpu.users {
        UserCell::Blank => NBSP.to_string(),
        UserCell::Users(users) => {
            let joined = users
                .iter()
                .map(|u| marked(&u.username, u.marker.css_class()))
                .collect::<Vec<_>>()
                .join(" ");
            format!("<div>{joined}</div>")
        }
    };
    let _ = write!(out, "<div class=\"colum users\">{users}</div>");

    if let Some(slots) = &gpu.schedule {
        out.push_str("<div class=\"colum schedule\">");
        for slot in slots {
            let body = match slot {
                ScheduleSlot::Blank => NBSP.to_string(),
                ScheduleSlot::Bookings(bookings) => bookings
                    .iter()
                    .map(|b| marked(&b.text, b.marker.css_class()))
                    .collect::<Vec<_>>()
                    .join("<br>"),
            };
            let _ = write!(out, "<div class=\"colum schedule-day\">{body}</div>");
        }
        out.push_str("</div>");
    }

    out.push_str("</div>");
    out
}

pub fn render_warning(warning: &WarningPanel) -> String {
    let mut out = String::from("<div id=\"warning\">");
    let _ = write!(
        out,
        "<div><b>Users without booking (marked <span class='illegal_user'>orange</span>): </b>\
         <span class='blue'>{}</span> (by username string match)</div>",
        escape(&warning.illegal_users_text())
    );
    out.push_str("<div class=\"inline\">");
    for line in &warning.legend {
        let class = line.marker.css_class().unwrap_or_default();
        let _ = write!(
            out,
            "<div class=\"legend_line inline\"><div class=\"error_legend {class} inline\"></div>\
             <span>{}</span></div>",
            escape(&line.text)
        );
    }
    out.push_str("</div></div>");
    out
}

/// Page-level settings that are not part of the view tree.
#[derive(Debug, Clone, Default)]
pub struct PageOptions {
    pub header: HeaderPosition,
    /// Reload interval while auto-update is on.
    pub reload_secs: Option<u64>,
    pub polling: bool,
    pub status_line: Option<String>,
}

pub fn render_page(view: Option<&DashboardView>, opts: &PageOptions) -> String {
    let mut out =
        String::from("<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">");
    if let Some(secs) = opts.reload_secs {
        let _ = write!(out, "<meta http-equiv=\"refresh\" content=\"{secs}\">");
    }
    let _ = write!(
        out,
        "<title>GPU Cluster Status</title>\
         <link rel=\"stylesheet\" href=\"/web/{STYLESHEET}\">\
         <script src=\"/web/{SCROLL_SCRIPT}\" defer></script></head><body>"
    );

    out.push_str("<div id=\"controls\">");
    let (action, id, label) = if opts.polling {
        ("/stop-update", "stop-update", "Stop auto-update")
    } else {
        ("/auto-update", "auto-update", "Start auto-update")
    };
    for (action, id, label) in [("/refresh", "update", "Refresh"), (action, id, label)] {
        let _ = write!(
            out,
            "<form method=\"post\" action=\"{action}\"><button id=\"{id}\">{label}</button></form>"
        );
    }
    if let Some(line) = &opts.status_line {
        let _ = write!(out, "<span class=\"poll-status\">{}</span>", escape(line));
    }
    out.push_str("</div>");

    match view {
        Some(view) => {
            out.push_str(&render_header(&view.header, &opts.header));
            out.push_str(&render_nodes(view));
            out.push_str(&render_warning(&view.warning));
        }
        None => {
            out.push_str(&render_header(&HeaderRow::default(), &opts.header));
            out.push_str("<div id=\"content-status\"></div>");
        }
    }

    out.push_str("</body></html>\n");
    out
}
