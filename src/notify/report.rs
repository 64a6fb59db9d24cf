//! HTML call report — subject line and body for one processed call.
//!
//! Pure and deterministic: the same recipient and summary always render
//! the same report.

use std::fmt::Write as _;

use crate::pipeline::types::{CallSummary, CallerType, Recipient};
use crate::timefmt;

/// Subject and HTML body of a call report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailReport {
    pub subject: String,
    pub html: String,
}

/// Colors for one report variant.
struct Palette {
    header_gradient: &'static str,
    accent: &'static str,
    badge_background: &'static str,
    badge_text: &'static str,
}

const NEW_CLIENT_PALETTE: Palette = Palette {
    header_gradient: "linear-gradient(135deg, #ef4444 0%, #dc2626 100%)",
    accent: "#dc2626",
    badge_background: "#fee2e2",
    badge_text: "#dc2626",
};

const STANDARD_PALETTE: Palette = Palette {
    header_gradient: "linear-gradient(135deg, #667eea 0%, #764ba2 100%)",
    accent: "#667eea",
    badge_background: "#f0f3ff",
    badge_text: "#667eea",
};

/// Render the report for `summary`, addressed to `recipient`.
pub fn compose(recipient: &Recipient, summary: &CallSummary) -> EmailReport {
    EmailReport {
        subject: subject_line(summary),
        html: render_html(recipient, summary),
    }
}

/// Subject line, flagged for potential new clients.
///
/// The ` - M/D H:MM AM/PM` suffix appears only when both date and time
/// parse.
pub fn subject_line(summary: &CallSummary) -> String {
    let name = if summary.has_known_caller() {
        summary.caller_name.as_str()
    } else {
        "Unknown Caller"
    };

    let when = match (
        timefmt::format_date(&summary.date_of_call),
        timefmt::normalize_time(&summary.time_of_call),
    ) {
        (Some(date), Some(time)) => format!(" - {date} {time}"),
        _ => String::new(),
    };

    match summary.caller_type {
        CallerType::PotentialNewClient => format!("POTENTIAL NEW CLIENT - {name}{when}"),
        CallerType::Other => format!("New Call: {name} - General Inquiry{when}"),
        other => format!("New Call: {name} - {}{when}", other.label()),
    }
}

// ── Body ────────────────────────────────────────────────────────────

fn render_html(recipient: &Recipient, summary: &CallSummary) -> String {
    let new_client = summary.caller_type.is_potential_new_client();
    let palette = if new_client {
        &NEW_CLIENT_PALETTE
    } else {
        &STANDARD_PALETTE
    };
    let heading = if new_client {
        "POTENTIAL NEW CLIENT"
    } else {
        "New Call Received"
    };

    let mut html = String::with_capacity(4096);

    html.push_str(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n</head>\n\
         <body style=\"font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, \
         sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; \
         padding: 20px;\">\n",
    );

    let _ = write!(
        html,
        "<div style=\"background: {}; color: white; padding: 24px; border-radius: 8px 8px 0 0;\">\n\
         <h1 style=\"margin: 0; font-size: 22px;\">{heading}</h1>\n</div>\n\
         <div style=\"background: #ffffff; padding: 24px; border: 1px solid #e5e7eb; \
         border-top: none; border-radius: 0 0 8px 8px;\">\n",
        palette.header_gradient,
    );

    // Call information
    push_section_start(&mut html, palette, "Call Information");
    let date = timefmt::format_date(&summary.date_of_call)
        .unwrap_or_else(|| summary.date_of_call.clone());
    push_field(&mut html, "Date", &date);
    push_field(
        &mut html,
        "Time",
        &format!("{} (Pacific Time)", timefmt::format_time(&summary.time_of_call)),
    );
    html.push_str("</div>\n");

    // Caller information
    push_section_start(&mut html, palette, "Caller Information");
    push_field(&mut html, "Name", &summary.caller_name);
    push_field(&mut html, "Phone", &summary.caller_phone);
    let _ = write!(
        html,
        "<p style=\"margin: 4px 0;\"><strong>Type:</strong> \
         <span style=\"display: inline-block; background: {}; color: {}; padding: 2px 10px; \
         border-radius: 12px; font-size: 13px; font-weight: 600;\">{}</span></p>\n",
        palette.badge_background,
        palette.badge_text,
        escape_html(&summary.caller_type.label().to_uppercase()),
    );
    html.push_str("</div>\n");

    // Summary
    push_section_start(&mut html, palette, "Call Summary");
    let _ = writeln!(
        html,
        "<p style=\"margin: 4px 0; white-space: pre-wrap;\">{}</p>",
        escape_html(&summary.summary)
    );
    html.push_str("</div>\n");

    if !summary.action_items.is_empty() {
        html.push_str(
            "<div style=\"background: #fff8e6; border-left: 4px solid #ffc107; padding: 12px 16px; \
             margin: 16px 0; border-radius: 4px;\">\n\
             <h2 style=\"margin: 0 0 8px 0; font-size: 16px; color: #b7791f;\">Action Items</h2>\n\
             <ul style=\"margin: 0; padding-left: 20px;\">\n",
        );
        for item in &summary.action_items {
            let _ = writeln!(html, "<li>{}</li>", escape_html(item));
        }
        html.push_str("</ul>\n</div>\n");
    }

    if let Some(url) = &summary.recording_url {
        let _ = writeln!(
            html,
            "<p style=\"margin: 16px 0;\"><a href=\"{url}\" style=\"color: {};\">Listen to call recording</a></p>",
            palette.accent,
            url = escape_html(url),
        );
    }

    // Footer
    let _ = write!(
        html,
        "<div style=\"margin-top: 24px; padding-top: 12px; border-top: 1px solid #e5e7eb; \
         font-size: 12px; color: #6b7280;\">\n\
         <p style=\"margin: 2px 0;\">Processed: {}</p>\n\
         <p style=\"margin: 2px 0;\">Routed to: {} ({})</p>\n",
        escape_html(&timefmt::pacific_timestamp(summary.processed_at)),
        escape_html(&recipient.name),
        escape_html(&recipient.email),
    );
    if !recipient.cc_emails.is_empty() {
        let _ = writeln!(
            html,
            "<p style=\"margin: 2px 0;\">CC: {}</p>",
            escape_html(&recipient.cc_emails.join(", "))
        );
    }
    html.push_str("</div>\n</div>\n</body>\n</html>\n");

    html
}

fn push_section_start(html: &mut String, palette: &Palette, title: &str) {
    let _ = write!(
        html,
        "<div style=\"margin: 16px 0; padding: 12px 16px; border-left: 4px solid {}; \
         background: #f9fafb; border-radius: 4px;\">\n\
         <h2 style=\"margin: 0 0 8px 0; font-size: 16px; color: {};\">{title}</h2>\n",
        palette.accent, palette.accent,
    );
}

fn push_field(html: &mut String, label: &str, value: &str) {
    let _ = writeln!(
        html,
        "<p style=\"margin: 4px 0;\"><strong>{label}:</strong> {}</p>",
        escape_html(value)
    );
}

/// Escape text for interpolation into HTML content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
