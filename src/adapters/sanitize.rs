//! Log redaction for patient-identifying text.
//!
//! Interview logs mention patients and sessions. Formatted log lines are
//! passed through [`sanitize`] before reaching any sink, which replaces:
//! - `patient=...` / `name=...` structured fields
//! - session identifiers (UUIDs)
//! - email addresses and phone numbers
//!
//! Symptom and disease names are left intact; they are needed to debug the
//! models and do not identify anyone on their own.

use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

/// Longest line sanitized; anything beyond is cut.
///
/// Overridable via `SYMPTOMATIC_SANITIZE_MAX_BYTES`.
const MAX_LINE_BYTES: usize = 16 * 1024;

static LINE_LIMIT: OnceLock<usize> = OnceLock::new();

fn max_line_bytes() -> usize {
    *LINE_LIMIT.get_or_init(|| {
        std::env::var("SYMPTOMATIC_SANITIZE_MAX_BYTES")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(MAX_LINE_BYTES)
    })
}

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

struct Rules {
    any: RegexSet,
    rules: Vec<Rule>,
}

static RULES: OnceLock<Rules> = OnceLock::new();

fn rules() -> &'static Rules {
    RULES.get_or_init(|| {
        let table: [(&str, &str); 5] = [
            (
                r#"(?i)\b(patient|name)\s*[=:]\s*(?:"(?:[^"\\]|\\.)*"|\S+)"#,
                "$1=[REDACTED-NAME]",
            ),
            (
                r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
                "[REDACTED-ID]",
            ),
            (
                r"(?i)\b[a-z0-9._%+-]{1,64}@(?:[a-z0-9-]{1,63}\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
            (
                r"\+?\b\d{1,3}[-.\s]?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b",
                "[REDACTED-PHONE]",
            ),
            (r"\b\d{3}[-.\s]\d{3}[-.\s]\d{4}\b", "[REDACTED-PHONE]"),
        ];

        let patterns: Vec<&str> = table.iter().map(|(p, _)| *p).collect();
        let any = RegexSet::new(&patterns).expect("redaction patterns are valid");
        let rules = table
            .iter()
            .map(|(pattern, replacement)| Rule {
                regex: Regex::new(pattern).expect("redaction pattern is valid"),
                replacement,
            })
            .collect();
        Rules { any, rules }
    })
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact patient-identifying text.
#[must_use]
pub fn sanitize(input: &str) -> String {
    let (prefix, truncated) = truncate_to_char_boundary(input, max_line_bytes());
    let rules = rules();

    let mut out = prefix.to_string();
    for index in rules.any.matches(prefix).iter() {
        let rule = &rules.rules[index];
        out = rule.regex.replace_all(&out, rule.replacement).into_owned();
    }
    if truncated {
        out.push_str(" [TRUNCATED]");
        if input.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// A `tracing_subscriber` writer factory that sanitizes each log line.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

/// Line-buffering writer produced by [`SanitizingMakeWriter`].
pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&text).as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() > max_line_bytes() * 2 {
            // No newline in sight; emit what we have rather than grow forever.
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }
        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<W: std::io::Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_redacts_patient_fields() {
        let out = sanitize(r#"Interview started patient="Asha Rao" days=3"#);
        assert_eq!(out, "Interview started patient=[REDACTED-NAME] days=3");

        let out = sanitize("name: Ravi symptom=itching");
        assert_eq!(out, "name=[REDACTED-NAME] symptom=itching");
    }

    #[test]
    fn test_redacts_quoted_names_with_escapes() {
        let out = sanitize(r#"Interview started patient="Asha \"Ash\" Rao" days=3"#);
        assert_eq!(out, "Interview started patient=[REDACTED-NAME] days=3");
    }

    #[test]
    fn test_session_start_log_is_redacted() {
        use crate::domain::InterviewSession;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Shared(Arc<Mutex<Vec<u8>>>);

        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().expect("Should lock").extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let shared = Shared::default();
        let sink = shared.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(SanitizingMakeWriter::new(move || sink.clone()))
            .finish();

        let mut session = InterviewSession::new();
        tracing::subscriber::with_default(subscriber, || {
            session.begin("Asha Rao").expect("Should begin");
        });

        let bytes = shared.0.lock().expect("Should lock").clone();
        let text = String::from_utf8(bytes).expect("utf8");
        assert!(text.contains("Interview started"));
        assert!(text.contains("patient=[REDACTED-NAME]"));
        assert!(text.contains("session=[REDACTED-ID]"));
        assert!(!text.contains("Asha"));
    }

    #[test]
    fn test_redacts_session_ids() {
        let out = sanitize("session=3f2b8c1e-1a2b-4c3d-8e9f-0123456789ab restarted");
        assert_eq!(out, "session=[REDACTED-ID] restarted");
    }

    #[test]
    fn test_redacts_contact_details() {
        assert_eq!(sanitize("mail a.b@example.org"), "mail [REDACTED-EMAIL]");
        assert!(sanitize("call 555-123-4567").contains("[REDACTED-PHONE]"));
    }

    #[test]
    fn test_keeps_clinical_terms() {
        let line = "Triage: 2 symptoms over 4 days, score=5.33 -> SELF-CARE (skin_rash, itching)";
        assert_eq!(sanitize(line), line);
    }

    #[test]
    fn test_truncates_long_lines() {
        let long = "x".repeat(max_line_bytes() + 10);
        let out = sanitize(&long);
        assert!(out.ends_with("[TRUNCATED]"));
        assert!(out.len() < long.len());

        let line = format!("{long}\n");
        let out = sanitize(&line);
        assert!(out.ends_with(" [TRUNCATED]\n"));
        assert_eq!(out.matches('\n').count(), 1);
    }

    #[test]
    fn test_writer_keeps_long_lines_separate() {
        let mut sink = Vec::new();
        {
            let mut w = SanitizingWriter {
                inner: &mut sink,
                buffer: Vec::new(),
            };
            let long = "y".repeat(max_line_bytes() + 1);
            w.write_all(format!("{long}\nnext line\n").as_bytes())
                .expect("Should write");
        }
        let text = String::from_utf8(sink).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[TRUNCATED]"));
        assert_eq!(lines[1], "next line");
    }

    #[test]
    fn test_writer_sanitizes_whole_lines() {
        let mut sink = Vec::new();
        {
            let mut w = SanitizingWriter {
                inner: &mut sink,
                buffer: Vec::new(),
            };
            w.write_all(b"patient=Asha ").expect("Should write");
            w.write_all(b"confirmed itching\n").expect("Should write");
        }
        let text = String::from_utf8(sink).expect("utf8");
        assert_eq!(text, "patient=[REDACTED-NAME] confirmed itching\n");
    }
}
