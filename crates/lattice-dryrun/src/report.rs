//! Preview output.

use std::fmt;

use serde::Serialize;

/// Result of a dry run, shown as a tooltip or report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewReport {
    /// False when the preview could not be produced.
    pub available: bool,
    pub lines: Vec<String>,
    /// Why the preview is unavailable.
    pub reason: Option<String>,
}

impl PreviewReport {
    pub fn new(lines: Vec<String>) -> Self {
        Self {
            available: true,
            lines,
            reason: None,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            lines: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

impl fmt::Display for PreviewReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.available {
            return write!(
                f,
                "no preview available: {}",
                self.reason.as_deref().unwrap_or("unknown reason")
            );
        }
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_display() {
        let report = PreviewReport::unavailable("resource manager unreachable");
        assert!(!report.available);
        assert_eq!(report.to_string(), "no preview available: resource manager unreachable");
    }

    #[test]
    fn lines_display() {
        let mut report = PreviewReport::new(vec!["order o1 INFINITY: a b".into()]);
        report.push("colocation c1 INFINITY: a b");
        assert_eq!(report.to_string(), "order o1 INFINITY: a b\ncolocation c1 INFINITY: a b\n");
    }
}
