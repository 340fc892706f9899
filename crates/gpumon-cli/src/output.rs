use std::fmt::Write;

use gpumon_common::{BookingCode, BookingReport};
use gpumon_dashboard::view::{DashboardView, GpuLine, ScheduleSlot, UserCell};
use gpumon_dashboard::{BookingMarker, UserMarker};

fn booking_tag(marker: BookingMarker) -> &'static str {
    match marker {
        BookingMarker::None => "",
        BookingMarker::IllegalBooking => " [title]",
        BookingMarker::IllegalMaxGpu => " [max-gpu]",
        BookingMarker::IllegalMaxDay => " [max-day]",
    }
}

fn users_text(users: &UserCell) -> String {
    match users {
        UserCell::Blank => "-".to_string(),
        UserCell::Users(users) => users
            .iter()
            .map(|u| match u.marker {
                UserMarker::Legal => u.username.clone(),
                UserMarker::Illegal => format!("!{}", u.username),
            })
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn schedule_lines(out: &mut String, days: &[String], gpu: &GpuLine) {
    let Some(slots) = &gpu.schedule else {
        return;
    };
    for (day, slot) in days.iter().zip(slots) {
        let ScheduleSlot::Bookings(bookings) = slot else {
            continue;
        };
        let text = bookings
            .iter()
            .map(|b| format!("{}{}", b.text, booking_tag(b.marker)))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "        {day}: {text}");
    }
}

pub fn format_view(view: &DashboardView) -> String {
    let mut out = String::from("\n=== GPU Cluster Status ===\n");

    if view.nodes.is_empty() {
        out.push_str("\n  (No nodes reported)\n");
    }
    for node in &view.nodes {
        let _ = writeln!(
            out,
            "\n[{}] status={} version={}",
            node.hostname, node.status, node.version
        );
        if !node.addresses.is_empty() {
            let _ = writeln!(out, "  {}", node.address_text());
        }
        let _ = writeln!(
            out,
            "  {:<5} {:<18} {:>7} {:>8}  {}",
            "GPU", "Memory (MiB)", "Fill", "Util", "Users"
        );
        for gpu in &node.gpus {
            let _ = writeln!(
                out,
                "  {:<5} {:<18} {:>6.0}% {:>8}  {}",
                gpu.index,
                gpu.memory_text,
                gpu.memory_fill_percent,
                gpu.utilization_text,
                users_text(&gpu.users)
            );
            schedule_lines(&mut out, &view.header.schedule_days, gpu);
        }
    }

    if !view.warning.illegal_users.is_empty() {
        let _ = writeln!(
            out,
            "\nUsers without booking: {}",
            view.warning.illegal_users_text()
        );
    }
    out
}

pub fn print_view(view: &DashboardView) {
    println!("{}", format_view(view));
}

fn code_text(code: BookingCode) -> &'static str {
    match code {
        BookingCode::Ok => "OK",
        BookingCode::IllegalTitle => "ILLEGAL_TITLE",
        BookingCode::MaxGpuExceeded => "MAX_GPU",
        BookingCode::MaxDayExceeded => "MAX_DAY",
    }
}

pub fn format_booking_report(report: &BookingReport) -> String {
    let mut out = String::from("\n=== Booking Check ===\n");
    let violations: Vec<_> = report.violations().collect();
    if violations.is_empty() {
        let _ = writeln!(out, "All {} bookings pass.", report.bookings().len());
        return out;
    }

    let _ = writeln!(
        out,
        "{:<20} {:<16} {:<20} {:<5} {:<4} {:<14}",
        "Title", "Who", "Host", "GPU", "Day", "Violation"
    );
    let _ = writeln!(out, "{:-<84}", "");
    for b in &violations {
        let _ = writeln!(
            out,
            "{:<20} {:<16} {:<20} {:<5} {:<4} {:<14}",
            b.booking.title,
            b.booking.who,
            b.booking.hostname,
            b.booking.index,
            b.booking.day,
            code_text(b.code)
        );
    }
    let _ = writeln!(
        out,
        "\n{} of {} bookings violate the rules.",
        violations.len(),
        report.bookings().len()
    );
    out
}
