//! Rendering notifications for each channel.

use serde_json::{json, Value};

use super::Notification;
use crate::models::DigestEntry;

/// Subject line for email delivery
pub fn subject(notification: &Notification) -> String {
    match notification {
        Notification::Digest(entries) => format!("Paper Digest: {} Papers", entries.len()),
        Notification::Status(_) => "Paper Digest: Status Update".to_string(),
    }
}

fn rating_color(rating: u8) -> &'static str {
    match rating {
        70.. => "#2e7d32",
        50..=69 => "#ef6c00",
        _ => "#c62828",
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn entry_html(entry: &DigestEntry) -> String {
    format!(
        r#"<div style="margin-bottom:24px;padding:16px;border:1px solid #ddd;border-radius:6px;">
<h2 style="margin:0 0 8px 0;font-size:18px;"><a href="{url}">{title}</a></h2>
<p style="margin:0 0 8px 0;color:#555;font-size:13px;">{authors} &middot; {date} &middot; {id}</p>
<p style="margin:0 0 8px 0;"><strong style="color:{color};">Rating: {rating}/100</strong> <span style="color:#777;">(selection score {score})</span></p>
<p style="margin:0 0 8px 0;"><strong>Summary:</strong> {summary}</p>
<p style="margin:0 0 8px 0;"><strong>Why this rating:</strong> {justification}</p>
<p style="margin:0;"><strong>Community:</strong> {community}</p>
</div>"#,
        url = escape_html(&entry.url),
        title = escape_html(&entry.title),
        authors = escape_html(&entry.authors),
        date = escape_html(&entry.publish_date),
        id = escape_html(&entry.paper_id),
        color = rating_color(entry.rating),
        rating = entry.rating,
        score = entry.selection_score,
        summary = escape_html(&entry.summary),
        justification = escape_html(&entry.rating_justification),
        community = escape_html(&entry.community_reputation),
    )
}

/// HTML body for email delivery
pub fn render_html(notification: &Notification) -> String {
    let body = match notification {
        Notification::Digest(entries) => {
            let cards: Vec<String> = entries.iter().map(entry_html).collect();
            format!(
                "<h1 style=\"font-size:22px;\">Paper Digest: {} papers</h1>\n{}",
                entries.len(),
                cards.join("\n")
            )
        }
        Notification::Status(message) => format!(
            "<h1 style=\"font-size:22px;\">Paper Digest</h1>\n<pre style=\"font-family:inherit;white-space:pre-wrap;\">{}</pre>",
            escape_html(message)
        ),
    };

    format!(
        "<html><body style=\"font-family:Arial,sans-serif;max-width:720px;margin:auto;\">\n{}\n</body></html>",
        body
    )
}

/// Plain-text rendering, used as the email alternative and webhook `text`
pub fn render_text(notification: &Notification) -> String {
    match notification {
        Notification::Digest(entries) => {
            let mut out = format!("Paper Digest: {} papers\n", entries.len());
            for (i, entry) in entries.iter().enumerate() {
                out.push_str(&format!(
                    "\n{}. {} ({}/100)\n   {}\n   {} | {}\n   Summary: {}\n   Rating: {}\n   Community: {}\n",
                    i + 1,
                    entry.title,
                    entry.rating,
                    entry.url,
                    entry.authors,
                    entry.publish_date,
                    entry.summary,
                    entry.rating_justification,
                    entry.community_reputation,
                ));
            }
            out
        }
        Notification::Status(message) => format!("Paper Digest status\n\n{}", message),
    }
}

/// JSON body for webhook delivery
///
/// The `text` field lets chat webhooks display the message as-is; structured
/// consumers read `papers`.
pub fn webhook_payload(notification: &Notification) -> Value {
    match notification {
        Notification::Digest(entries) => json!({
            "type": "paper_digest",
            "text": render_text(notification),
            "count": entries.len(),
            "papers": entries,
        }),
        Notification::Status(message) => json!({
            "type": "paper_digest_status",
            "text": render_text(notification),
            "message": message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(rating: u8) -> DigestEntry {
        DigestEntry {
            paper_id: "2401.00001".to_string(),
            title: "Agents <b>at</b> scale".to_string(),
            summary: "A summary.".to_string(),
            authors: "Ada Lovelace (Analytical Engines Ltd)".to_string(),
            publish_date: "2024-01-02".to_string(),
            rating,
            rating_justification: "Strong results.".to_string(),
            community_reputation: "Widely shared.".to_string(),
            url: "https://arxiv.org/abs/2401.00001".to_string(),
            selection_score: 82,
        }
    }

    #[test]
    fn test_subject() {
        assert_eq!(
            subject(&Notification::Digest(vec![entry(80), entry(60)])),
            "Paper Digest: 2 Papers"
        );
        assert_eq!(
            subject(&Notification::Status("x".to_string())),
            "Paper Digest: Status Update"
        );
    }

    #[test]
    fn test_html_escapes_and_colors() {
        let html = render_html(&Notification::Digest(vec![entry(75), entry(40)]));
        assert!(html.contains("Agents &lt;b&gt;at&lt;/b&gt; scale"));
        assert!(!html.contains("<b>at</b>"));
        assert!(html.contains("#2e7d32"));
        assert!(html.contains("#c62828"));
    }

    #[test]
    fn test_webhook_payload_digest() {
        let payload = webhook_payload(&Notification::Digest(vec![entry(80)]));
        assert_eq!(payload["type"], "paper_digest");
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["papers"][0]["paper_id"], "2401.00001");
        assert_eq!(payload["papers"][0]["rating"], 80);
        assert!(payload["text"].as_str().unwrap().contains("1. Agents"));
    }

    #[test]
    fn test_webhook_payload_status() {
        let payload = webhook_payload(&Notification::Status("Nothing today".to_string()));
        assert_eq!(payload["type"], "paper_digest_status");
        assert_eq!(payload["message"], "Nothing today");
    }
}
