pub mod monitor;
pub mod parse;

use serde::Serialize;

/// What a subcommand did, printed to stderr once it returns.
#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{}: {}\n",
            self.command,
            if self.ok { "ok" } else { "failed" }
        );
        for detail in &self.details {
            out.push_str(&format!("  {detail}\n"));
        }
        for issue in &self.issues {
            out.push_str(&format!("  issue: {issue}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::CommandReport;

    #[test]
    fn issue_marks_report_failed() {
        let mut report = CommandReport::new("parse");
        report.detail("image=a.png");
        assert!(report.ok);
        report.issue("E_TRANSPORT: connection refused");
        assert!(!report.ok);
        assert_eq!(
            report.render(),
            "parse: failed\n  image=a.png\n  issue: E_TRANSPORT: connection refused\n"
        );
    }
}
