// Template Rendering
// Parameter substitution, provenance headers, and checkpoint-directive
// injection over line-oriented "name = value" input decks. The template is
// treated as opaque text; a small line tokenizer replaces the first matching
// assignment token per line, so no pattern engine is involved.

use crate::matrix::ParameterCombination;
use crate::naming::format_value;

/// First line of every rendered case file.
pub const HEADER_MARKER: &str = "# === parameter study case ===";

/// Assignment key that binds a coupled sub-app input filename.
const SUB_APP_KEY: &str = "input_files";

/// Locate the numeric value token of a `name = <number>` assignment in one
/// line. Returns the byte range of the token. The name must sit on an
/// identifier boundary so `Gf` never matches inside `Gfx`.
fn locate_assignment(line: &str, name: &str) -> Option<(usize, usize)> {
    let mut search = 0;
    while let Some(pos) = line[search..].find(name) {
        let at = search + pos;
        let boundary_before = line[..at]
            .chars()
            .last()
            .map(|c| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(true);
        let after = &line[at + name.len()..];
        let at_equals = after.trim_start_matches([' ', '\t']);
        if boundary_before && at_equals.starts_with('=') {
            let value = at_equals[1..].trim_start_matches([' ', '\t']);
            let token_len = value
                .find(|c: char| {
                    !c.is_ascii_digit() && !matches!(c, '.' | 'e' | 'E' | '+' | '-')
                })
                .unwrap_or(value.len());
            let token = &value[..token_len];
            if token_len > 0 && token.chars().any(|c| c.is_ascii_digit()) {
                let start = line.len() - value.len();
                return Some((start, start + token_len));
            }
        }
        search = at + name.len();
    }
    None
}

/// Replace the first `name = <number>` assignment in a line, keeping
/// everything around the value token (indentation, spacing, trailing
/// comments) untouched.
fn replace_assignment(line: &str, name: &str, formatted: &str) -> Option<String> {
    let (start, end) = locate_assignment(line, name)?;
    let mut result = String::with_capacity(line.len() + formatted.len());
    result.push_str(&line[..start]);
    result.push_str(formatted);
    result.push_str(&line[end..]);
    Some(result)
}

fn map_lines(text: &str, mut f: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let (content, newline) = match line.strip_suffix('\n') {
            Some(content) => (content, "\n"),
            None => (line, ""),
        };
        match f(content) {
            Some(replaced) => out.push_str(&replaced),
            None => out.push_str(content),
        }
        out.push_str(newline);
    }
    out
}

/// Substitute every bound parameter into the template body. Substitution is
/// line-scoped: at most one replacement per parameter per line, never across
/// line boundaries.
pub fn substitute_parameters(text: &str, combination: &ParameterCombination) -> String {
    map_lines(text, |line| {
        let mut current: Option<String> = None;
        for (name, value) in combination.iter() {
            let subject = current.as_deref().unwrap_or(line);
            if let Some(replaced) = replace_assignment(subject, name, &format_value(value)) {
                current = Some(replaced);
            }
        }
        current
    })
}

/// Rewrite the quoted value of the fixed `input_files` key to the given
/// sub-case filename, so the rendered main always references the sibling that
/// is actually materialized next to it.
pub fn rewrite_subapp_reference(text: &str, sub_file_name: &str) -> String {
    map_lines(text, |line| {
        let at = line.find(SUB_APP_KEY)?;
        let boundary_before = line[..at]
            .chars()
            .last()
            .map(|c| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(true);
        if !boundary_before {
            return None;
        }
        let after = &line[at + SUB_APP_KEY.len()..];
        let at_equals = after.trim_start_matches([' ', '\t']);
        if !at_equals.starts_with('=') {
            return None;
        }
        let value = at_equals[1..].trim_start_matches([' ', '\t']);
        let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let close = value[1..].find(quote)? + 1;

        let value_start = line.len() - value.len();
        let mut result = String::with_capacity(line.len());
        result.push_str(&line[..value_start + 1]);
        result.push_str(sub_file_name);
        result.push_str(&line[value_start + close..]);
        Some(result)
    })
}

fn checkpoint_directive(interval: u32, num_files: u32, wall_seconds: u32) -> String {
    format!(
        "  [my_checkpoint]\n    type = Checkpoint\n    time_step_interval = {}\n    num_files = {}\n    wall_time_interval = {}\n  []",
        interval, num_files, wall_seconds
    )
}

/// Insert a checkpoint directive as the first child of the `[Outputs]` block,
/// appending a fresh block when the template has none. Reapplying to text that
/// already carries a checkpoint directive is a no-op.
pub fn add_checkpoint(text: &str, interval: u32, num_files: u32, wall_seconds: u32) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let directive = checkpoint_directive(interval, num_files, wall_seconds);

    if let Some(start) = lines.iter().position(|l| l.trim() == "[Outputs]") {
        // Walk to the block's closing "[]", tracking nested sub-blocks.
        let mut depth = 1usize;
        let mut end = lines.len();
        for (i, line) in lines.iter().enumerate().skip(start + 1) {
            let trimmed = line.trim();
            if trimmed == "[]" {
                depth -= 1;
                if depth == 0 {
                    end = i;
                    break;
                }
            } else if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() > 2 {
                depth += 1;
            }
        }

        if lines[start + 1..end]
            .iter()
            .any(|l| l.trim() == "type = Checkpoint")
        {
            return text.to_string();
        }

        let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 8);
        out.extend_from_slice(&lines[..=start]);
        out.extend(directive.lines());
        out.extend_from_slice(&lines[start + 1..]);
        let mut joined = out.join("\n");
        if text.ends_with('\n') {
            joined.push('\n');
        }
        joined
    } else {
        let mut out = text.to_string();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("\n[Outputs]\n");
        out.push_str(&directive);
        out.push_str("\n[]\n");
        out
    }
}

/// Extract the value of an `end_time = <number>` assignment anywhere in the
/// template. Absence is not an error.
pub fn extract_end_time(text: &str) -> Option<f64> {
    for line in text.lines() {
        if let Some((start, end)) = locate_assignment(line, "end_time") {
            if let Ok(value) = line[start..end].parse::<f64>() {
                return Some(value);
            }
        }
    }
    None
}

/// Provenance header prepended to every rendered case file: marker line, one
/// `name: value` line per parameter, the optional end time, and the generation
/// timestamp.
pub fn render_header(combination: &ParameterCombination, end_time: Option<f64>) -> String {
    let mut header = String::new();
    header.push_str(HEADER_MARKER);
    header.push('\n');
    for (name, value) in combination.iter() {
        header.push_str(&format!("# {}: {}\n", name, format_value(value)));
    }
    if let Some(end_time) = end_time {
        header.push_str(&format!("# end_time = {}\n", format_value(end_time)));
    }
    let now = jiff::Zoned::now().strftime("%Y-%m-%d %H:%M:%S");
    header.push_str(&format!("# generated: {}\n\n", now));
    header
}

/// Render one case file: header, then the body with parameters substituted
/// and, in coupled mode, the sub-app reference rewritten. The caller applies
/// [`add_checkpoint`] to the template once, before rendering any case.
pub fn render_case(
    text: &str,
    combination: &ParameterCombination,
    end_time: Option<f64>,
    sub_file_name: Option<&str>,
) -> String {
    let mut body = substitute_parameters(text, combination);
    if let Some(sub) = sub_file_name {
        body = rewrite_subapp_reference(&body, sub);
    }
    let mut rendered = render_header(combination, end_time);
    rendered.push_str(&body);
    rendered
}
