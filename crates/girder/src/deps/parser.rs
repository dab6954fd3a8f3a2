//! Reading and regenerating the dependency section of an item body.
//!
//! Parsing is a tolerant line scan. A *label line* is any line whose text,
//! once markdown emphasis, heading hashes and surrounding whitespace are
//! removed, reads `blocked by` or `blocks` (case-insensitive, trailing colon
//! optional). The list under a label runs until the next heading, the next
//! label, a wave line or the end of the body. List entries start with `-`,
//! `*` or `+`, optionally followed by a `[ ]`/`[x]` checkbox; the first token
//! after the marker is the reference and the rest of the line is a note.
//! Entries whose token is not a reference are skipped, and a body without a
//! section yields empty lists rather than an error.

use super::{BlockingRef, DependencySection};
use crate::domain::{IssueRef, RepoSlug};

/// Heading that opens the generated section.
pub const SECTION_HEADING: &str = "## Dependencies";

const BLOCKED_BY_LABEL: &str = "**Blocked by:**";
const BLOCKS_LABEL: &str = "**Blocks:**";
const WAVE_LABEL: &str = "**Wave:**";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    BlockedBy,
    Blocks,
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Label(ListKind),
    Wave(Option<u32>),
    Heading,
    Entry { checked: bool, rest: &'a str },
    Other,
}

/// Markdown heading level of `line`, if it is a heading.
fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let rest = &trimmed[level..];
    (rest.is_empty() || rest.starts_with(' ')).then_some(level)
}

/// Strip heading hashes, emphasis markers and whitespace, then lower-case.
fn normalize(line: &str) -> String {
    line.trim()
        .trim_start_matches('#')
        .chars()
        .filter(|c| !matches!(c, '*' | '_'))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

fn classify(line: &str) -> Line<'_> {
    let normalized = normalize(line);
    match normalized.trim_end_matches(':').trim_end() {
        "blocked by" => return Line::Label(ListKind::BlockedBy),
        "blocks" => return Line::Label(ListKind::Blocks),
        _ => {}
    }

    if let Some(rest) = normalized.strip_prefix("wave")
        && let Some(value) = rest.trim_start().strip_prefix(':')
    {
        return Line::Wave(value.trim().parse().ok());
    }

    if heading_level(line).is_some() {
        return Line::Heading;
    }

    let trimmed = line.trim_start();
    let Some(after_marker) = ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
    else {
        return Line::Other;
    };

    let after_marker = after_marker.trim_start();
    for (checkbox, checked) in [("[ ]", false), ("[x]", true), ("[X]", true)] {
        if let Some(rest) = after_marker.strip_prefix(checkbox) {
            return Line::Entry {
                checked,
                rest: rest.trim(),
            };
        }
    }
    Line::Entry {
        checked: false,
        rest: after_marker.trim(),
    }
}

fn parse_entry(checked: bool, rest: &str, default_repo: &RepoSlug) -> Option<BlockingRef> {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let token = parts
        .next()?
        .trim_end_matches([',', ';', ':', '.', ')'])
        .trim_start_matches('(');
    let note = parts.next().unwrap_or_default().trim();

    match IssueRef::parse(token, default_repo) {
        Ok(target) => Some(BlockingRef {
            target,
            checked,
            note: note.to_string(),
        }),
        Err(e) => {
            tracing::debug!(token, error = %e, "Skipping unparseable dependency entry");
            None
        }
    }
}

/// Parse both dependency lists and the wave of `body`.
///
/// Bare references (`#12`, `12`) resolve against `default_repo`. When a list
/// label appears more than once, the entries accumulate; the first valid
/// wave line wins.
pub fn parse_section(body: &str, default_repo: &RepoSlug) -> DependencySection {
    let mut section = DependencySection::default();
    let mut current = None;

    for line in body.lines() {
        match classify(line) {
            Line::Label(kind) => current = Some(kind),
            Line::Wave(wave) => {
                if section.wave.is_none() {
                    section.wave = wave;
                }
                current = None;
            }
            Line::Heading => current = None,
            Line::Entry { checked, rest } => {
                let Some(kind) = current else { continue };
                if let Some(entry) = parse_entry(checked, rest, default_repo) {
                    match kind {
                        ListKind::BlockedBy => section.blocked_by.push(entry),
                        ListKind::Blocks => section.blocks.push(entry),
                    }
                }
            }
            Line::Other => {}
        }
    }

    section
}

/// Entries of the "Blocked by" list of `body`.
pub fn parse_blocking(body: &str, default_repo: &RepoSlug) -> Vec<BlockingRef> {
    parse_section(body, default_repo).blocked_by
}

/// Entries of the "Blocks" list of `body`.
pub fn parse_blocks(body: &str, default_repo: &RepoSlug) -> Vec<BlockingRef> {
    parse_section(body, default_repo).blocks
}

fn render_list(out: &mut String, label: &str, entries: &[BlockingRef]) {
    out.push_str("\n\n");
    out.push_str(label);
    for entry in entries {
        let mark = if entry.checked { 'x' } else { ' ' };
        out.push_str(&format!("\n- [{mark}] {}", entry.target));
        if !entry.note.is_empty() {
            out.push(' ');
            out.push_str(&entry.note);
        }
    }
}

/// Render `section` in the canonical text form, ending with a newline.
///
/// Entries are written in the order given; empty lists and an unset wave
/// are omitted.
pub fn render_section(section: &DependencySection) -> String {
    let mut out = String::from(SECTION_HEADING);
    if !section.blocked_by.is_empty() {
        render_list(&mut out, BLOCKED_BY_LABEL, &section.blocked_by);
    }
    if !section.blocks.is_empty() {
        render_list(&mut out, BLOCKS_LABEL, &section.blocks);
    }
    if let Some(wave) = section.wave {
        out.push_str(&format!("\n\n{WAVE_LABEL} {wave}"));
    }
    out.push('\n');
    out
}

fn is_section_heading(line: &str) -> bool {
    heading_level(line) == Some(2)
        && line.trim_start()[2..]
            .trim()
            .eq_ignore_ascii_case("dependencies")
}

/// Line range of the existing dependency section: from its heading to the
/// next heading of level 2 or less.
fn section_span(lines: &[&str]) -> Option<(usize, usize)> {
    let start = lines.iter().position(|line| is_section_heading(line))?;
    let end = lines[start + 1..]
        .iter()
        .position(|line| heading_level(line).is_some_and(|level| level <= 2))
        .map_or(lines.len(), |offset| start + 1 + offset);
    Some((start, end))
}

/// Mark label lines, their entries and wave lines outside `span`.
///
/// These are exactly the lines [`parse_section`] reads outside the
/// generated section, so dropping them after a merge loses nothing.
fn legacy_lines(lines: &[&str], span: Option<(usize, usize)>) -> Vec<bool> {
    let mut legacy = vec![false; lines.len()];
    let mut in_list = false;
    for (index, line) in lines.iter().enumerate() {
        if span.is_some_and(|(start, end)| (start..end).contains(&index)) {
            in_list = false;
            continue;
        }
        match classify(line) {
            Line::Label(_) => {
                legacy[index] = true;
                in_list = true;
            }
            Line::Wave(Some(_)) => {
                legacy[index] = true;
                in_list = false;
            }
            Line::Wave(None) | Line::Heading => in_list = false,
            Line::Entry { .. } => legacy[index] = in_list,
            Line::Other => {}
        }
    }
    legacy
}

/// Keep unmarked lines, without doubling blank lines where marked ones were.
fn without_legacy<'a>(lines: &[&'a str], legacy: &[bool]) -> Vec<&'a str> {
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut after_removal = false;
    for (&line, &drop) in lines.iter().zip(legacy) {
        if drop {
            after_removal = true;
            continue;
        }
        let blank = line.trim().is_empty();
        if blank && after_removal && kept.last().is_none_or(|last| last.trim().is_empty()) {
            continue;
        }
        if !blank {
            after_removal = false;
        }
        kept.push(line);
    }
    kept
}

fn push_lines(out: &mut String, lines: &[&str], newline: &str) {
    for line in lines {
        out.push_str(line);
        out.push_str(newline);
    }
}

/// Splice `section` into `body`.
///
/// An existing section (from its heading to the next heading of level 2 or
/// less) is replaced in place; otherwise the section is appended after a
/// blank line. Dependency lists and wave lines found outside the section
/// are removed, since the caller merged them into `section`. An empty
/// section removes the existing one. CRLF bodies stay CRLF. Applying the
/// same section twice gives the same text as applying it once.
pub fn upsert_section(body: &str, section: &DependencySection) -> String {
    let newline = if body.contains("\r\n") { "\r\n" } else { "\n" };
    let lines: Vec<&str> = body.lines().collect();
    let rendered = (!section.is_empty()).then(|| {
        let text = render_section(section);
        if newline == "\n" {
            text
        } else {
            text.replace('\n', newline)
        }
    });

    let span = section_span(&lines);
    let legacy = legacy_lines(&lines, span);
    let has_legacy = legacy.contains(&true);

    let Some((start, end)) = span else {
        if rendered.is_none() && !has_legacy {
            return body.to_string();
        }
        let mut text = String::with_capacity(body.len());
        push_lines(&mut text, &without_legacy(&lines, &legacy), newline);
        return match rendered {
            Some(rendered) if text.trim().is_empty() => rendered,
            Some(rendered) => format!("{}{newline}{newline}{rendered}", text.trim_end()),
            None => text,
        };
    };

    let before = without_legacy(&lines[..start], &legacy[..start]);
    let after = without_legacy(&lines[end..], &legacy[end..]);

    let mut out = String::with_capacity(body.len());
    push_lines(&mut out, &before, newline);
    match rendered {
        Some(rendered) => {
            out.push_str(&rendered);
            if !after.is_empty() {
                out.push_str(newline);
            }
        }
        None if after.is_empty() => {
            let kept = out.trim_end().len();
            out.truncate(kept);
            if !out.is_empty() {
                out.push_str(newline);
            }
        }
        None => {}
    }
    push_lines(&mut out, &after, newline);
    out
}
