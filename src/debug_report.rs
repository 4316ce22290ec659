use patch_rules::{ApplyReport, RuleSpec, VerdictSummary};

mod ansi {
    const RESET: &str = "\x1b[0m";
    const DIM: &str = "\x1b[2m";
    const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    const GRAY: &str = "\x1b[90m";

    /// ANSI styling that collapses to plain text when color is off.
    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        fn wrap(&self, code: &str, s: &str) -> String {
            if self.enabled { format!("{code}{s}{RESET}") } else { s.to_string() }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            self.wrap(color, s.as_ref())
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            self.wrap(BOLD, s.as_ref())
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            self.wrap(DIM, s.as_ref())
        }

        pub fn banner(&self, title: &str) -> String {
            self.wrap(GRAY, &format!("━━━ {title} ━━━"))
        }

        /// `✓` in green for allowed paths, `✗` in red for denied ones.
        pub fn verdict_mark(&self, allowed: bool) -> String {
            if allowed { self.wrap(GREEN, "✓") } else { self.wrap(RED, "✗") }
        }
    }
}

pub fn print_report(rules: &[RuleSpec], report: &ApplyReport, color: bool) {
    let palette = ansi::Palette::new(color);
    let outcome = &report.outcome;
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Applying {} rule(s)", rules.len()), ansi::CYAN)));

    println!("\n{}", palette.banner("Rules"));
    print_rules(rules, &palette);

    println!("\n{}", palette.banner("Verdicts"));
    if report.verdicts.is_empty() {
        println!("{}", palette.dim("  New document has no leaf values"));
    }
    for verdict in &report.verdicts {
        println!("  {}", fmt_verdict(verdict, &palette));
    }

    if !outcome.errors.is_empty() {
        println!("\n{}", palette.banner("Errors"));
        for (path, message) in &outcome.errors {
            println!("  {} {}", palette.paint(display_path(path), ansi::YELLOW), palette.paint(message, ansi::RED));
        }
    }

    println!("\n{}", palette.banner("Result"));
    println!(
        "  {}  │  written: {}  │  denied: {}",
        if outcome.fully_patched {
            palette.bold(palette.paint("✓ fully patched", ansi::GREEN))
        } else {
            palette.bold(palette.paint("✗ partially patched", ansi::YELLOW))
        },
        palette.paint(outcome.success_paths.len().to_string(), ansi::GREEN),
        palette.paint(outcome.denied_paths.len().to_string(), ansi::RED),
    );
    match serde_json::to_string_pretty(&outcome.patched_document) {
        Ok(rendered) => {
            for line in rendered.lines() {
                println!("  {line}");
            }
        }
        Err(err) => println!("  {}", palette.paint(format!("failed to render document: {err}"), ansi::RED)),
    }

    let metrics = &report.metrics;
    println!("\n{}", palette.banner("Timing"));
    println!(
        "  Total: {}  │  Enumerate: {}  │  Resolve: {}  │  Patch: {}",
        palette.paint(format!("{:?}", metrics.total), ansi::GREEN),
        palette.paint(format!("{:?}", metrics.enumerate), ansi::CYAN),
        palette.paint(format!("{:?}", metrics.resolve), ansi::CYAN),
        palette.dim(format!("{:?}", metrics.patch)),
    );
    println!(
        "  {}",
        palette.dim(format!("{} leaf path(s), {} verdict(s)", metrics.leaf_paths, metrics.verdicts))
    );
    println!();
}

fn print_rules(rules: &[RuleSpec], palette: &ansi::Palette) {
    if rules.is_empty() {
        println!("{}", palette.dim("  No rules: every path is denied"));
        return;
    }

    for (idx, rule) in rules.iter().enumerate() {
        let mut tags = Vec::new();
        if rule.denies() {
            tags.push("deny");
        }
        if rule.dedupe() {
            tags.push("unique");
        } else if rule.whole_replace() {
            tags.push("replace");
        }

        println!(
            "  {} {} {}",
            palette.dim(format!("[{idx}]")),
            palette.paint(rule.source(), ansi::BLUE),
            palette.dim(if tags.is_empty() { String::new() } else { format!("│ {}", tags.join(", ")) }),
        );
    }
}

fn fmt_verdict(verdict: &VerdictSummary, palette: &ansi::Palette) -> String {
    let mark = palette.verdict_mark(verdict.allowed);
    let source = match &verdict.rule {
        Some(rule) => palette.paint(rule, ansi::CYAN),
        None => palette.dim("default deny"),
    };
    format!("{} {} {} {}", mark, palette.paint(display_path(&verdict.path), ansi::YELLOW), palette.dim("│"), source)
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

#[cfg(test)]
mod tests {
    use super::ansi::Palette;
    use super::*;

    #[test]
    fn palette_is_plain_without_color() {
        let palette = Palette::new(false);
        assert_eq!(palette.banner("Rules"), "━━━ Rules ━━━");
        assert_eq!(palette.verdict_mark(true), "✓");
        assert_eq!(palette.verdict_mark(false), "✗");
        assert_eq!(palette.paint("x", ansi::RED), "x");
    }

    #[test]
    fn palette_wraps_in_ansi_codes() {
        let palette = Palette::new(true);
        assert_eq!(palette.verdict_mark(false), "\x1b[31m✗\x1b[0m");
        assert_eq!(palette.bold("x"), "\x1b[1mx\x1b[0m");
    }

    #[test]
    fn verdict_lines_name_the_deciding_rule() {
        let palette = Palette::new(false);
        let allowed = VerdictSummary { path: "user.name".into(), allowed: true, rule: Some("user.*".into()) };
        let denied = VerdictSummary { path: String::new(), allowed: false, rule: None };

        assert_eq!(fmt_verdict(&allowed, &palette), "✓ user.name │ user.*");
        assert_eq!(fmt_verdict(&denied, &palette), "✗ <root> │ default deny");
    }
}
