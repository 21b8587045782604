//! Report model and rendering.

use serde::Serialize;
use std::fmt::Write as _;

pub const RULE_WIDTH: usize = 50;

/// Marker printed in front of a report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Fail,
    /// GPU detail line.
    Gpu,
    /// Unmarked informational line.
    Info,
}

impl Status {
    fn marker(self) -> &'static str {
        match self {
            Status::Pass => "✅ ",
            Status::Fail => "❌ ",
            Status::Gpu => "🎮 ",
            Status::Info => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub status: Status,
    pub text: String,
}

impl Line {
    pub fn pass(text: impl Into<String>) -> Self {
        Self {
            status: Status::Pass,
            text: text.into(),
        }
    }

    pub fn fail(text: impl Into<String>) -> Self {
        Self {
            status: Status::Fail,
            text: text.into(),
        }
    }

    pub fn gpu(text: impl Into<String>) -> Self {
        Self {
            status: Status::Gpu,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            status: Status::Info,
            text: text.into(),
        }
    }
}

/// One section of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub icon: &'static str,
    pub title: &'static str,
    pub lines: Vec<Line>,
    /// Trailing `📊` count line, for sections with many items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub passed: bool,
}

impl Category {
    pub fn new(icon: &'static str, title: &'static str) -> Self {
        Self {
            icon,
            title,
            lines: Vec::new(),
            summary: None,
            passed: false,
        }
    }

    pub fn push(&mut self, line: Line) {
        self.lines.push(line);
    }
}

/// Whole report: the counted categories plus the informational
/// environment-variable section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub categories: Vec<Category>,
    pub environment: Category,
    pub passed: usize,
    pub total: usize,
}

impl Report {
    pub fn new(categories: Vec<Category>, environment: Category) -> Self {
        let passed = categories.iter().filter(|c| c.passed).count();
        let total = categories.len();
        Self {
            categories,
            environment,
            passed,
            total,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    /// `0` when every counted category passed, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }

    pub fn render_text(&self) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "🤖 AI Development Environment Test");
        let _ = writeln!(out, "{rule}");

        for (i, category) in self.categories.iter().chain([&self.environment]).enumerate() {
            if i > 0 {
                out.push('\n');
            }
            render_category(&mut out, category);
        }

        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(out, "📊 Test Summary");
        if self.all_passed() {
            let _ = writeln!(out, "   🎉 All tests passed! ({}/{})", self.passed, self.total);
            let _ = writeln!(out, "   🚀 Your AI development environment is ready!");
        } else {
            let _ = writeln!(out, "   ⚠️  Some tests failed ({}/{})", self.passed, self.total);
            let _ = writeln!(out, "   🔧 Please check the failed components above");
        }
        out
    }
}

fn render_category(out: &mut String, category: &Category) {
    let _ = writeln!(out, "{} {}", category.icon, category.title);
    for line in &category.lines {
        let _ = writeln!(out, "   {}{}", line.status.marker(), line.text);
    }
    if let Some(summary) = &category.summary {
        let _ = writeln!(out, "\n   📊 {summary}");
    }
}
