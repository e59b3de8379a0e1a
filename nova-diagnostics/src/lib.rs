//! Rust-quality diagnostics for the checker and codegen: spans, colored terminal output,
//! stable error codes, and "did you mean" suggestions.

use colored::Colorize;
use std::fmt;
use std::path::Path;

pub mod span_map;
pub use span_map::SpanMap;

/// Source code location. Independent of the parser's own `Span` type — the compiler is
/// responsible for translating a parse-tree span into one of these when it emits a diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Span {
    pub fn new(file: String, line: usize, column: usize, length: usize) -> Self {
        Self {
            file,
            line,
            column,
            length,
        }
    }

    pub fn from_file_and_offset(file: &str, source: &str, range: std::ops::Range<usize>) -> Self {
        let before = &source[..range.start];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len() + 1, |pos| before.len() - pos);
        let length = range.end.saturating_sub(range.start).max(1);

        Self {
            file: file.to_string(),
            line,
            column,
            length,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
            column: 0,
            length: 0,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self {
            file: path.display().to_string(),
            line: 0,
            column: 0,
            length: 0,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
    Info,
    Note,
    Help,
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorLevel::Error => write!(f, "{}", "error".red().bold()),
            ErrorLevel::Warning => write!(f, "{}", "warning".yellow().bold()),
            ErrorLevel::Info => write!(f, "{}", "info".blue().bold()),
            ErrorLevel::Note => write!(f, "{}", "note".cyan().bold()),
            ErrorLevel::Help => write!(f, "{}", "help".green().bold()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub code: String,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
    pub suggestion: Option<Suggestion>,
}

#[derive(Debug, Clone)]
pub struct Suggestion {
    pub message: String,
    pub replacement: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(level: ErrorLevel, code: &str, message: String, span: Span) -> Self {
        Self {
            level,
            code: code.to_string(),
            message,
            span,
            notes: Vec::new(),
            help: None,
            suggestion: None,
        }
    }

    pub fn error(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Error, code, message, span)
    }

    pub fn warning(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Warning, code, message, span)
    }

    pub fn info(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Info, code, message, span)
    }

    pub fn note(message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Note, "", message, span)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn with_suggestion(mut self, message: String, replacement: String, span: Span) -> Self {
        self.suggestion = Some(Suggestion {
            message,
            replacement,
            span,
        });
        self
    }

    pub fn format(&self, source_code: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        ));

        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));

        if let Some(snippet) = self.get_source_snippet(source_code) {
            output.push_str(&snippet);
        }

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        if let Some(suggestion) = &self.suggestion {
            output.push_str(&format!(
                " {} {}\n",
                "help:".green().bold(),
                suggestion.message
            ));
            if let Some(suggested_snippet) = self.get_suggestion_snippet(source_code) {
                output.push_str(&suggested_snippet);
            }
        }

        output
    }

    fn format_simple(&self) -> String {
        let mut output = format!(
            "{}[{}]: {}\n",
            self.level,
            self.code,
            self.message.bold()
        );
        output.push_str(&format!(
            " {} {}:{}:{}\n",
            "-->".cyan().bold(),
            self.span.file,
            self.span.line,
            self.span.column
        ));
        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }
        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }
        output
    }

    fn get_source_snippet(&self, source_code: &str) -> Option<String> {
        let lines: Vec<&str> = source_code.lines().collect();
        if self.span.line == 0 || self.span.line > lines.len() {
            return None;
        }
        let line = lines[self.span.line - 1];
        let width = self.span.line.to_string().len().max(2);

        let mut snippet = format!(" {}\n", " ".repeat(width + 1).cyan());
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>w$}", self.span.line, w = width).cyan().bold(),
            "|".cyan().bold(),
            line
        ));
        let padding = " ".repeat(width + 3 + self.span.column.saturating_sub(1));
        let underline = "^".repeat(self.span.length.max(1));
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(width + 1).cyan(),
            padding,
            underline.red().bold()
        ));
        Some(snippet)
    }

    fn get_suggestion_snippet(&self, source_code: &str) -> Option<String> {
        let suggestion = self.suggestion.as_ref()?;
        let lines: Vec<&str> = source_code.lines().collect();
        if suggestion.span.line == 0 || suggestion.span.line > lines.len() {
            return None;
        }
        let line = lines[suggestion.span.line - 1];
        let width = suggestion.span.line.to_string().len().max(2);
        let col = suggestion.span.column.saturating_sub(1);
        let before = line.get(..col).unwrap_or(line);
        let after = line.get(col + suggestion.span.length..).unwrap_or("");
        let modified = format!("{}{}{}", before, suggestion.replacement, after);

        let mut snippet = format!(
            " {} {}\n",
            format!("{:>w$}", suggestion.span.line, w = width).cyan().bold(),
            "| ".cyan().bold()
        );
        snippet.push_str(&format!(" {} {}\n", " ".repeat(width + 1).cyan(), modified));
        let padding = " ".repeat(width + 3 + col);
        let indicator = "+".repeat(suggestion.replacement.len());
        snippet.push_str(&format!(
            " {} {}{}\n",
            " ".repeat(width + 1).cyan(),
            padding,
            indicator.green().bold()
        ));
        Some(snippet)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

/// Diagnostic collection and reporting engine, one per compilation.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    warning_count: usize,
    info_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            ErrorLevel::Error => self.error_count += 1,
            ErrorLevel::Warning => self.warning_count += 1,
            ErrorLevel::Info => self.info_count += 1,
            _ => {}
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn emit_error(&mut self, code: &str, message: String, span: Span) {
        self.emit(Diagnostic::error(code, message, span));
    }

    pub fn emit_warning(&mut self, code: &str, message: String, span: Span) {
        self.emit(Diagnostic::warning(code, message, span));
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn print_all(&self, source_code: &str) {
        for diag in &self.diagnostics {
            eprintln!("{}", diag.format(source_code));
        }
    }

    pub fn print_summary(&self) {
        if self.error_count > 0 {
            eprintln!(
                "\n{}: {} error{} emitted",
                "error".red().bold(),
                self.error_count,
                if self.error_count == 1 { "" } else { "s" }
            );
        }
        if self.warning_count > 0 {
            eprintln!(
                "{}: {} warning{} emitted",
                "warning".yellow().bold(),
                self.warning_count,
                if self.warning_count == 1 { "" } else { "s" }
            );
        }
    }

    /// Export diagnostics as JSON for IDE/editor integration.
    pub fn to_json(&self) -> String {
        let mut json = String::from("{\"diagnostics\":[");
        for (i, diag) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                json.push(',');
            }
            let level_str = match diag.level {
                ErrorLevel::Error => "error",
                ErrorLevel::Warning => "warning",
                ErrorLevel::Info => "info",
                ErrorLevel::Note => "note",
                ErrorLevel::Help => "help",
            };
            json.push_str(&format!(
                "{{\"level\":\"{}\",\"code\":\"{}\",\"message\":\"{}\",\"file\":\"{}\",\"line\":{},\"column\":{},\"length\":{}}}",
                level_str,
                diag.code,
                diag.message.replace('"', "\\\""),
                diag.span.file,
                diag.span.line,
                diag.span.column,
                diag.span.length
            ));
        }
        json.push_str("]}");
        json
    }

    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.error_count = 0;
        self.warning_count = 0;
        self.info_count = 0;
    }
}

/// Checker-facing helpers for the diagnostic shapes the type checker emits most often.
impl DiagnosticEngine {
    pub fn type_mismatch(&mut self, expected: &str, found: &str, span: Span) {
        self.emit(
            Diagnostic::error(
                error_codes::TYPE_MISMATCH,
                "mismatched types".to_string(),
                span,
            )
            .with_note(format!("expected `{}`, found `{}`", expected, found)),
        );
    }

    pub fn undefined_name(&mut self, name: &str, span: Span, suggestions: Vec<String>) {
        let mut diag = Diagnostic::error(
            error_codes::UNDEFINED_NAME,
            format!("cannot find `{}` in this scope", name),
            span,
        );
        if !suggestions.is_empty() {
            diag = diag.with_help(format!("did you mean `{}`?", suggestions.join("`, `")));
        }
        self.emit(diag);
    }

    pub fn argument_count_mismatch(
        &mut self,
        fn_name: &str,
        expected: usize,
        found: usize,
        span: Span,
    ) {
        self.emit(
            Diagnostic::error(
                error_codes::ARGUMENT_COUNT,
                format!(
                    "this call takes {} argument{} but {} {} supplied",
                    expected,
                    if expected == 1 { "" } else { "s" },
                    found,
                    if found == 1 { "was" } else { "were" }
                ),
                span,
            )
            .with_note(format!("`{}` defined here", fn_name)),
        );
    }

    pub fn unused_variable(&mut self, name: &str, span: Span) {
        self.emit(
            Diagnostic::warning(
                error_codes::UNUSED_VARIABLE,
                format!("unused variable: `{}`", name),
                span.clone(),
            )
            .with_suggestion(
                "prefix with `_` to silence this warning".to_string(),
                format!("_{}", name),
                span,
            ),
        );
    }
}

/// Stable error codes. `T0xx` for name/structure errors the checker's earlier passes find,
/// `T1xx` for the main type-inference/unification pass, `T2xx` for trait and generic
/// resolution, `T3xx` for moves/Drop, `T5xx` for literal-range and arithmetic checks the
/// checker can prove at compile time.
pub mod error_codes {
    pub const MISSING_TYPE_ANNOTATION: &str = "T001";
    pub const UNDEFINED_NAME: &str = "T002";
    pub const UNDEFINED_TYPE: &str = "T003";
    pub const NO_SUCH_FIELD: &str = "T004";
    pub const NO_SUCH_METHOD: &str = "T005";
    pub const DUPLICATE_DEFINITION: &str = "T006";
    pub const PRIVATE_ACCESS: &str = "T007";
    pub const NON_EXHAUSTIVE_MATCH: &str = "T008";
    pub const UNREACHABLE_PATTERN: &str = "T009";
    pub const CANNOT_ASSIGN_IMMUTABLE: &str = "T013";
    pub const UNUSED_VARIABLE: &str = "T014";

    pub const TYPE_MISMATCH: &str = "T100";
    pub const ARGUMENT_COUNT: &str = "T101";
    pub const CANNOT_INFER: &str = "T102";
    pub const RECURSIVE_TYPE: &str = "T103";
    pub const INVALID_CAST: &str = "T104";

    pub const TRAIT_NOT_IMPLEMENTED: &str = "T200";
    pub const GENERIC_ARITY_MISMATCH: &str = "T201";
    pub const AMBIGUOUS_METHOD: &str = "T202";
    pub const CONFLICTING_IMPL: &str = "T203";

    pub const USE_AFTER_MOVE: &str = "T300";
    pub const DOUBLE_DROP: &str = "T301";
    pub const BORROW_WHILE_MOVED: &str = "T302";

    pub const NEGATIVE_TO_UNSIGNED: &str = "T050";
    pub const INTEGER_LITERAL_OUT_OF_RANGE: &str = "T051";
    pub const DIVISION_BY_ZERO_LITERAL: &str = "T052";
}

/// "Did you mean?" suggestion matching, using Levenshtein edit distance.
pub mod fuzzy {
    use strsim::levenshtein;

    /// A candidate is suggested when its edit distance from `target` is at most 2, or at
    /// most a third of `target`'s length for longer identifiers.
    pub fn find_similar_names(target: &str, candidates: &[String], max_suggestions: usize) -> Vec<String> {
        let threshold = (target.len() / 3).max(2);

        let mut scored: Vec<(String, usize)> = candidates
            .iter()
            .map(|candidate| (candidate.clone(), levenshtein(target, candidate)))
            .filter(|(_, distance)| *distance <= threshold)
            .collect();

        scored.sort_by_key(|(_, distance)| *distance);
        scored
            .into_iter()
            .take(max_suggestions)
            .map(|(name, _)| name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_error_with_source_snippet() {
        let source = "fn main(): i32 {\n    let x: u8 = -1;\n    return 0;\n}";
        let span = Span::new("test.nova".to_string(), 2, 18, 2);
        let diag = Diagnostic::error(
            error_codes::NEGATIVE_TO_UNSIGNED,
            "cannot assign negative literal to unsigned type `u8`".to_string(),
            span,
        )
        .with_note("`u8` cannot represent negative values".to_string());

        let formatted = diag.format(source);
        assert!(formatted.contains("error[T050]"));
        assert!(formatted.contains("test.nova:2:18"));
    }

    #[test]
    fn fuzzy_match_picks_close_names_by_edit_distance() {
        let candidates = vec!["length".to_string(), "lenght".to_string(), "width".to_string()];
        let suggestions = fuzzy::find_similar_names("lenght", &candidates, 2);
        assert!(suggestions.contains(&"length".to_string()));
        assert!(!suggestions.contains(&"width".to_string()));
    }
}
