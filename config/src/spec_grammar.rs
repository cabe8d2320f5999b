// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Component-specifier grammar: a comma-separated list of `Name` or
//! `Name(opt1,opt2,...)` items, either typed inline or read from a file.
//! `#` introduces a comment outside of quotes; quotes (`'`/`"`) suppress
//! comment scanning so a `#` inside an option string is taken literally.

use crate::ConfigError;
use std::fs;

/// One parsed item of a component specifier: the component name and its
/// (possibly empty) option list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    pub name: String,
    pub options: Vec<String>,
}

impl ComponentSpec {
    /// Re-serialise in canonical `Name(opt1,opt2)` form (or bare `Name` when
    /// there are no options), the round-trip form used by property 13.
    #[must_use]
    pub fn to_canonical(&self) -> String {
        if self.options.is_empty() {
            self.name.clone()
        } else {
            format!("{}({})", self.name, self.options.join(","))
        }
    }
}

/// Parse a workload stack specifier, either a literal spec string or the
/// path to a file containing one spec per line.
///
/// Mirrors `ComponentInjectionProcess::ParseComponents`: if `input` names a
/// readable file, its contents (with end-of-line comments stripped and a
/// comma auto-inserted between lines when the author forgot one) are parsed
/// instead of `input` itself.
pub fn parse_component_stack(input: &str) -> Result<Vec<ComponentSpec>, ConfigError> {
    let from_file = components_string_from_file(input);
    let effective = from_file.as_deref().unwrap_or(input);
    parse_components_from_string(effective)
}

/// Read and flatten a components file into a single comma-joined spec
/// string, or `None` if `path` cannot be opened (in which case the caller
/// should treat `path` as an inline spec string instead).
fn components_string_from_file(path: &str) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let mut out = String::new();
    for raw_line in contents.lines() {
        let cleaned = rm_eol_spaces_comments(raw_line);
        let trimmed = cleaned.trim_start();
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() && !out.ends_with(',') {
            out.push(',');
        }
        out.push_str(trimmed);
    }
    Some(out)
}

/// Strip a trailing `#`-comment (outside quotes) and trailing whitespace
/// from a single line.
fn rm_eol_spaces_comments(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut cut = line.len();
    for (idx, ch) in line.char_indices() {
        match ch {
            '\'' | '"' => match quote {
                Some(q) if q == ch => quote = None,
                Some(_) => {}
                None => quote = Some(ch),
            },
            '#' if quote.is_none() => {
                cut = idx;
                break;
            }
            _ => {}
        }
    }
    line[..cut].trim_end()
}

fn parse_components_from_string(s: &str) -> Result<Vec<ComponentSpec>, ConfigError> {
    comma_split_top_level(s)
        .into_iter()
        .map(|piece| parse_one_component(&piece))
        .collect()
}

fn parse_one_component(spec: &str) -> Result<ComponentSpec, ConfigError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(ConfigError::MalformedSpecifier {
            spec: spec.to_owned(),
        });
    }
    let Some(lp) = spec.find('(') else {
        return Ok(ComponentSpec {
            name: spec.to_owned(),
            options: Vec::new(),
        });
    };
    let Some(rp) = spec.rfind(')') else {
        return Err(ConfigError::MalformedSpecifier {
            spec: spec.to_owned(),
        });
    };
    if rp < lp {
        return Err(ConfigError::MalformedSpecifier {
            spec: spec.to_owned(),
        });
    }
    let name = spec[..lp].to_owned();
    let inner = &spec[lp + 1..rp];
    let options = if inner.trim().is_empty() {
        Vec::new()
    } else {
        comma_split_top_level(inner)
            .into_iter()
            .map(|s| s.trim().to_owned())
            .collect()
    };
    Ok(ComponentSpec { name, options })
}

/// Split on commas at paren-depth 0 and outside quotes, so
/// `"Mppn(4),trace(get,eject)"` splits into two items, not four.
fn comma_split_top_level(s: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (idx, ch) in s.char_indices() {
        match ch {
            '\'' | '"' => match quote {
                Some(q) if q == ch => quote = None,
                Some(_) => {}
                None => quote = Some(ch),
            },
            '(' if quote.is_none() => depth += 1,
            ')' if quote.is_none() => depth -= 1,
            ',' if quote.is_none() && depth == 0 => {
                items.push(s[start..idx].to_owned());
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push(s[start..].to_owned());
    items
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_bare_and_parenthesised_names() {
        let parsed = parse_component_stack("random,Mppn(4),trace(get,eject)").unwrap();
        assert_eq!(
            parsed,
            vec![
                ComponentSpec {
                    name: "random".into(),
                    options: vec![],
                },
                ComponentSpec {
                    name: "Mppn".into(),
                    options: vec!["4".into()],
                },
                ComponentSpec {
                    name: "trace".into(),
                    options: vec!["get".into(), "eject".into()],
                },
            ]
        );
    }

    #[test]
    fn strips_hash_comments_outside_quotes() {
        let stripped = rm_eol_spaces_comments("random # inline comment");
        assert_eq!(stripped, "random");
        let kept = rm_eol_spaces_comments("trace('#literal')");
        assert_eq!(kept, "trace('#literal')");
    }

    #[test]
    fn canonical_round_trip() {
        let spec = "SWM(randperm),Mppn(4),trace(get,eject)";
        let parsed = parse_component_stack(spec).unwrap();
        let rejoined = parsed
            .iter()
            .map(ComponentSpec::to_canonical)
            .collect::<Vec<_>>()
            .join(",");
        let reparsed = parse_component_stack(&rejoined).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn malformed_specifier_unmatched_paren() {
        let err = parse_component_stack("Mppn(4").unwrap_err();
        assert_eq!(
            err,
            ConfigError::MalformedSpecifier {
                spec: "Mppn(4".into()
            }
        );
    }
}
