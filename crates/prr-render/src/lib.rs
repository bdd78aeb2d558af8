//! Markdown rendering of review comments.
//!
//! Output is aimed at LLM consumption: one section per comment with
//! file/line/status metadata, the body and diff hunk in backtick fences
//! sized past any backtick run in the content, and everything
//! HTML-escaped since comment bodies are attacker-controlled.

use std::fmt::Write;

use prr_core::ReviewComment;

/// Escape HTML-special characters, including quotes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// A backtick fence one longer than the longest backtick run in `text`,
/// at least three backticks.
pub fn fence_for(text: &str) -> String {
    let mut longest = 0usize;
    let mut current = 0usize;
    for ch in text.chars() {
        if ch == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    "`".repeat(3.max(longest + 1))
}

/// Render comments as a markdown document.
pub fn comments_to_markdown(comments: &[ReviewComment]) -> String {
    let mut markdown = String::from("# Pull Request Review Comments\n\n");
    if comments.is_empty() {
        markdown.push_str("No comments found.\n");
        return markdown;
    }

    for comment in comments {
        let _ = write!(
            markdown,
            "## Review Comment by {}\n\n",
            escape_html(&comment.author_login)
        );
        let _ = writeln!(markdown, "**File:** `{}`", escape_html(&comment.file_path));
        // Line 0 marks a file-level comment.
        if comment.line == 0 {
            markdown.push_str("**Line:** N/A\n");
        } else {
            let _ = writeln!(markdown, "**Line:** {}", comment.line);
        }

        let mut status_parts: Vec<String> = Vec::new();
        if comment.is_resolved {
            let mut status = "✓ Resolved".to_string();
            if let Some(resolver) = comment.resolved_by.as_deref() {
                let _ = write!(status, " by {}", escape_html(resolver));
            }
            status_parts.push(status);
        } else {
            status_parts.push("○ Unresolved".to_string());
        }
        if comment.is_outdated {
            status_parts.push("⚠ Outdated".to_string());
        }
        let _ = writeln!(markdown, "**Status:** {}", status_parts.join(" | "));
        markdown.push('\n');

        let body = escape_html(&comment.body);
        let fence = fence_for(&body);
        let _ = write!(markdown, "**Comment:**\n{fence}\n{body}\n{fence}\n\n");

        if !comment.diff_hunk.is_empty() {
            let diff = escape_html(&comment.diff_hunk);
            let fence = fence_for(&diff);
            let _ = write!(markdown, "**Code Snippet:**\n{fence}diff\n{diff}\n{fence}\n\n");
        }
        markdown.push_str("---\n\n");
    }
    markdown
}
