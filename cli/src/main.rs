//! ieeefmt CLI - IEEE manuscript checking and formatting tool

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use ieeefmt::{
    ComplianceReport, CorrectorConfig, ExportFormat, ExportOptions, Ieeefmt, Issue, ParseOptions,
    RuleSet, SectionId, SectionType, Severity, UserEdit, UserOverrides,
};

#[derive(Parser)]
#[command(name = "ieeefmt")]
#[command(author = "ieeefmt contributors")]
#[command(version)]
#[command(about = "Check and format manuscripts against IEEE conference rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report issues and the compliance score
    Check {
        /// Input manuscript (JSON, Markdown, text or DOCX)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Rule set file (TOML or JSON)
        #[arg(long, value_name = "FILE")]
        ruleset: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Correct, format and export a manuscript
    #[command(alias = "fmt")]
    Format {
        /// Input manuscript (JSON, Markdown, text or DOCX)
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (json, markdown, text, docx, pdf); defaults to the
        /// output extension, then markdown
        #[arg(long, value_name = "FORMAT")]
        to: Option<ExportFormat>,

        /// Rule set file (TOML or JSON)
        #[arg(long, value_name = "FILE")]
        ruleset: Option<PathBuf>,

        /// Include the change log in the output
        #[arg(long)]
        annotate: bool,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        /// Skip a formatting rule by id
        #[arg(long = "disable-rule", value_name = "RULE")]
        disabled_rules: Vec<String>,

        #[command(flatten)]
        edits: EditArgs,

        #[command(flatten)]
        ai: AiArgs,
    },

    /// Show the detected document structure
    Info {
        /// Input manuscript
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Print a rule set as TOML
    Rules {
        /// Rule set file to validate and print (built-in rules if omitted)
        #[arg(long, value_name = "FILE")]
        ruleset: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

/// User edits applied before formatting.
#[derive(Args, Default)]
struct EditArgs {
    /// Replace the title
    #[arg(long)]
    title: Option<String>,

    /// Replace the author list (repeatable)
    #[arg(long = "author", value_name = "NAME")]
    authors: Vec<String>,

    /// Replace the affiliation list (repeatable)
    #[arg(long = "affiliation", value_name = "TEXT")]
    affiliations: Vec<String>,

    /// Replace the keywords (repeatable)
    #[arg(long = "keyword", value_name = "TERM")]
    keywords: Vec<String>,

    /// Change a section's type, e.g. `s3=results`
    #[arg(long, value_name = "ID=TYPE", value_parser = parse_reclassify)]
    reclassify: Vec<(SectionId, SectionType)>,

    /// Pin the section order, e.g. `s0,s2,s1`
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    lock_order: Vec<SectionId>,
}

/// Grammar correction settings.
#[derive(Args, Default)]
struct AiArgs {
    /// Run grammar correction through the configured service
    #[arg(long)]
    correct: bool,

    /// Grammar service endpoint
    #[arg(long, env = "IEEEFMT_AI_ENDPOINT", value_name = "URL")]
    ai_endpoint: Option<String>,

    /// Grammar service timeout in seconds
    #[arg(long, default_value = "10", value_name = "SECS")]
    ai_timeout: u64,
}

fn parse_reclassify(value: &str) -> Result<(SectionId, SectionType), String> {
    let (id, kind) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=TYPE, got '{}'", value))?;
    Ok((id.parse()?, kind.parse()?))
}

impl EditArgs {
    fn to_edits(&self) -> Vec<UserEdit> {
        let mut edits = Vec::new();
        if let Some(title) = &self.title {
            edits.push(UserEdit::SetTitle {
                title: title.clone(),
            });
        }
        if !self.authors.is_empty() {
            edits.push(UserEdit::SetAuthors {
                authors: self.authors.clone(),
            });
        }
        if !self.affiliations.is_empty() {
            edits.push(UserEdit::SetAffiliations {
                affiliations: self.affiliations.clone(),
            });
        }
        if !self.keywords.is_empty() {
            edits.push(UserEdit::SetKeywords {
                keywords: self.keywords.clone(),
            });
        }
        for (section, kind) in &self.reclassify {
            edits.push(UserEdit::ReclassifySection {
                section: *section,
                kind: *kind,
            });
        }
        if !self.lock_order.is_empty() {
            edits.push(UserEdit::LockSectionOrder {
                order: self.lock_order.clone(),
            });
        }
        edits
    }
}

impl AiArgs {
    fn config(&self) -> CorrectorConfig {
        let mut config = CorrectorConfig::new()
            .enabled(self.correct)
            .with_timeout(std::time::Duration::from_secs(self.ai_timeout));
        if let Some(endpoint) = &self.ai_endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        config
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            input,
            ruleset,
            json,
        } => cmd_check(&input, ruleset.as_deref(), json),
        Commands::Format {
            input,
            output,
            to,
            ruleset,
            annotate,
            compact,
            disabled_rules,
            edits,
            ai,
        } => cmd_format(FormatArgs {
            input: &input,
            output: output.as_deref(),
            to,
            ruleset: ruleset.as_deref(),
            annotate,
            compact,
            disabled_rules,
            edits: edits.to_edits(),
            corrector: ai.config(),
        }),
        Commands::Info { input } => cmd_info(&input),
        Commands::Rules { ruleset } => cmd_rules(ruleset.as_deref()),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_rules(path: Option<&Path>) -> ieeefmt::Result<RuleSet> {
    match path {
        Some(path) => {
            let rules = RuleSet::load(path)?;
            debug!("Loaded rule set {} {} from {}", rules.name, rules.version, path.display());
            Ok(rules)
        }
        None => Ok(RuleSet::default()),
    }
}

fn session_id(input: &Path) -> String {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let id: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if id.is_empty() {
        "manuscript".to_string()
    } else {
        id
    }
}

fn cmd_check(
    input: &Path,
    ruleset: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let rules = load_rules(ruleset)?;
    let options = ParseOptions::new().lenient();
    let doc = ieeefmt::ManuscriptParser::open_with_options(input, options)?.parse()?;
    let report = ieeefmt::score_with(&doc, &rules);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Issues".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    if report.issues.is_empty() {
        println!("{}", "No issues found".green());
    }
    for issue in &report.issues {
        print_issue(issue);
    }
    println!();
    print_report(&report);
    Ok(())
}

struct FormatArgs<'a> {
    input: &'a Path,
    output: Option<&'a Path>,
    to: Option<ExportFormat>,
    ruleset: Option<&'a Path>,
    annotate: bool,
    compact: bool,
    disabled_rules: Vec<String>,
    edits: Vec<UserEdit>,
    corrector: CorrectorConfig,
}

fn cmd_format(args: FormatArgs<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let format = output_format(args.to, args.output);
    if format.is_binary() && args.output.is_none() {
        return Err(format!("{} output needs --output", format.name().to_uppercase()).into());
    }

    let pb = ProgressBar::new(4);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("Parsing manuscript...");
    let builder = Ieeefmt::new()
        .lenient()
        .with_rules(load_rules(args.ruleset)?)
        .with_corrector(args.corrector);
    let overrides = args
        .disabled_rules
        .iter()
        .fold(UserOverrides::new(), |o, id| o.with_disabled_rule(id.clone()));
    let mut session = builder
        .open_session(session_id(args.input), args.input)?
        .with_overrides(overrides);
    pb.inc(1);

    pb.set_message("Applying edits...");
    for edit in &args.edits {
        session.apply_edit(edit)?;
        debug!("Applied edit {}", edit.name());
    }
    pb.inc(1);

    pb.set_message("Correcting and formatting...");
    let result = session.process()?;
    pb.inc(1);

    pb.set_message("Exporting...");
    let options = ExportOptions::new(format)
        .with_pretty(!args.compact)
        .with_annotations(args.annotate);
    let bytes = session.export(&options)?;
    pb.inc(1);
    pb.finish_and_clear();

    match args.output {
        Some(path) => {
            fs::write(path, &bytes)?;
            eprintln!("{} {}", "Saved to".green(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.write_all(b"\n")?;
        }
    }

    eprintln!(
        "{} {} change(s), {} issue(s) before, {} after",
        "Formatted:".green().bold(),
        result.changes.end - result.changes.start,
        result.issues_before.len(),
        result.report.issues.len()
    );
    for warning in &result.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning);
    }
    for issue in result.formatting.unfixable() {
        eprintln!("{} {}", "unfixable:".red(), issue.message);
    }
    eprintln!(
        "{} {}",
        "Score:".bold(),
        score_text(result.report.overall, result.report.is_compliant())
    );
    Ok(())
}

fn output_format(to: Option<ExportFormat>, output: Option<&Path>) -> ExportFormat {
    to.or_else(|| {
        let ext = output?.extension()?.to_str()?;
        ext.parse().ok()
    })
    .unwrap_or(ExportFormat::Markdown)
}

fn cmd_info(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let format = ieeefmt::detect_format_from_path(input)?;
    let options = ParseOptions::new().lenient();
    let doc = ieeefmt::ManuscriptParser::open_with_options(input, options)?.parse()?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), format.name());
    if let Some(ref title) = doc.metadata.title {
        println!("{}: {}", "Title".bold(), title);
    }
    if !doc.metadata.authors.is_empty() {
        println!("{}: {}", "Authors".bold(), doc.metadata.authors.join(", "));
    }
    for affiliation in &doc.metadata.affiliations {
        println!("{}: {}", "Affiliation".bold(), affiliation);
    }
    if !doc.metadata.keywords.is_empty() {
        println!("{}: {}", "Keywords".bold(), doc.metadata.keywords.join(", "));
    }

    println!();
    println!("{}", "Sections".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for section in &doc.sections {
        let kind = if section.kind == SectionType::Uncategorized {
            section.kind.name().yellow()
        } else {
            section.kind.name().normal()
        };
        println!(
            "  {:>4} {:<18} {:>4.0}%  {}",
            section.id.to_string().dimmed(),
            kind,
            section.confidence * 100.0,
            section.heading_text()
        );
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Words".bold(), doc.word_count());
    println!("{}: {}", "Sections".bold(), doc.section_count());
    println!("{}: {}", "References".bold(), doc.bibliography.entries.len());

    Ok(())
}

fn cmd_rules(ruleset: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let rules = load_rules(ruleset)?;
    rules.validate()?;
    print!("{}", rules.to_toml_string()?);
    Ok(())
}

fn print_issue(issue: &Issue) {
    let severity = match issue.severity {
        Severity::High => issue.severity.name().red().bold(),
        Severity::Medium => issue.severity.name().yellow(),
        Severity::Low => issue.severity.name().dimmed(),
    };
    let fix = if issue.fixable { "fixable".green() } else { "manual".red() };
    println!(
        "  {:<6} {:<10} {:<8} {}: {}",
        severity,
        issue.category.name(),
        fix,
        issue.location,
        issue.message
    );
}

fn print_report(report: &ComplianceReport) {
    println!("{}", "Compliance".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {} {}", "Rule set".bold(), report.rule_set, report.rule_set_version);
    println!("{}: {:.2}", "Structural".bold(), report.categories.structural);
    println!("{}: {:.2}", "Stylistic".bold(), report.categories.stylistic);
    println!("{}: {:.2}", "Citation".bold(), report.categories.citation);
    println!(
        "{}: {} high, {} medium, {} low",
        "Issues".bold(),
        report.counts.high,
        report.counts.medium,
        report.counts.low
    );
    println!(
        "{}: {}",
        "Overall".bold(),
        score_text(report.overall, report.is_compliant())
    );
}

fn score_text(score: f64, compliant: bool) -> colored::ColoredString {
    let text = format!("{:.2}", score);
    if compliant {
        text.green().bold()
    } else if score >= 50.0 {
        text.yellow().bold()
    } else {
        text.red().bold()
    }
}

fn cmd_version() {
    println!("{} {}", "ieeefmt".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("IEEE manuscript checking and formatting tool");
    println!();
    let rules = RuleSet::default();
    println!("Built-in rules: {} {}", rules.name, rules.version.dimmed());
    println!("License: MIT");
}
