//! Parsers for `VBoxManage` output.
//!
//! Kept free of process handling so they can be tested against captured
//! output.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::vm::{VmDetails, VmEntry, VmState};

/// Format of `VMStateChangeTime`, always UTC.
const STATE_CHANGE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// `"<name>" {<uuid>}`; the greedy name group makes the last brace group the UUID.
fn list_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^"(?P<name>.*)"\s+\{(?P<uuid>[^{}]+)\}$"#).expect("Invalid regex pattern")
    })
}

/// Parse the output of `VBoxManage list vms` or `VBoxManage list runningvms`.
///
/// # Errors
///
/// Returns [`Error::MalformedOutput`] if a non-blank line is not of the form
/// `"<name>" {<uuid>}`.
pub fn parse_vm_list(command: &str, output: &str) -> Result<Vec<VmEntry>> {
    let re = list_line_regex();
    let mut entries = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let caps = re
            .captures(line)
            .ok_or_else(|| Error::malformed(command, format!("unrecognized line: {line}")))?;
        entries.push(VmEntry::new(&caps["name"], caps["uuid"].trim()));
    }

    trace!(count = entries.len(), command, "Parsed VM listing");
    Ok(entries)
}

/// Parse `key=value` lines of `showvminfo --machinereadable` output.
///
/// Keys and values may be double-quoted. A quoted value may span several
/// lines. `\"`, `\\` and `\n` inside quotes are unescaped. Lines without `=`
/// are skipped. A repeated key keeps its last value.
#[must_use]
pub fn parse_machine_readable(output: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut record = String::new();

    for line in output.lines() {
        if !record.is_empty() {
            record.push('\n');
        }
        record.push_str(line.trim_end_matches('\r'));
        if has_open_quote(&record) {
            continue;
        }
        insert_record(&mut properties, &record);
        record.clear();
    }

    // Unterminated quote at end of output
    if !record.is_empty() {
        insert_record(&mut properties, &record);
    }

    properties
}

fn insert_record(properties: &mut BTreeMap<String, String>, record: &str) {
    if let Some((key, value)) = split_key_value(record) {
        properties.insert(unquote(key.trim()), unquote(value.trim()));
    }
}

fn has_open_quote(text: &str) -> bool {
    let mut open = false;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if open => {
                chars.next();
            }
            '"' => open = !open,
            _ => {}
        }
    }
    open
}

/// Byte offset of the unescaped `"` closing a quoted string that starts
/// right after the opening quote.
fn closing_quote(quoted: &str) -> Option<usize> {
    let mut chars = quoted.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '"' => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split on the first `=` that is not inside a quoted key.
fn split_key_value(record: &str) -> Option<(&str, &str)> {
    if let Some(rest) = record.strip_prefix('"') {
        let close = closing_quote(rest)?;
        let value = rest[close + 1..].strip_prefix('=')?;
        return Some((&record[..close + 2], value));
    }
    record.split_once('=')
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next @ ('"' | '\\')) => out.push(next),
                Some('n') => out.push('\n'),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse a `VMStateChangeTime` value.
#[must_use]
pub fn parse_state_change_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), STATE_CHANGE_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

impl VmDetails {
    /// Build details from parsed machine-readable properties.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedOutput`] if the `VMState` property is missing.
    pub fn from_properties(command: &str, properties: &BTreeMap<String, String>) -> Result<Self> {
        let state = properties
            .get("VMState")
            .map(|s| VmState::parse(s))
            .ok_or_else(|| Error::malformed(command, "missing VMState property"))?;

        let state_changed_at = properties.get("VMStateChangeTime").and_then(|raw| {
            let parsed = parse_state_change_time(raw);
            if parsed.is_none() {
                debug!(value = %raw, "Unparseable VMStateChangeTime");
            }
            parsed
        });

        let memory_mb = parse_number(properties, "memory");
        let cpus = parse_number(properties, "cpus");

        let os_type = properties
            .get("ostype")
            .filter(|s| !s.is_empty())
            .cloned();

        let groups = properties
            .get("groups")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            state,
            state_changed_at,
            os_type,
            memory_mb,
            cpus,
            groups,
        })
    }
}

fn parse_number<T: std::str::FromStr>(properties: &BTreeMap<String, String>, key: &str) -> Option<T> {
    let raw = properties.get(key)?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        debug!(key, value = %raw, "Unparseable numeric property");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const LIST_VMS: &str = r#""Ubuntu Server" {2b9a3c1e-5f6d-4e7a-8b9c-0d1e2f3a4b5c}
"win10" {7f1c2d3e-4a5b-6c7d-8e9f-0a1b2c3d4e5f}
"<inaccessible>" {aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee}
"#;

    const SHOWVMINFO: &str = r#"name="Ubuntu Server"
groups="/,/servers"
ostype="Ubuntu (64-bit)"
UUID="2b9a3c1e-5f6d-4e7a-8b9c-0d1e2f3a4b5c"
memory=2048
vram=16
cpus=2
VMState="running"
VMStateChangeTime="2024-01-15T10:22:31.123000000"
"storagecontrollername0"="SATA"
description="a \"quoted\" word and a \\ backslash"
"#;

    #[test]
    fn test_parse_vm_list() {
        let entries = parse_vm_list("VBoxManage list vms", LIST_VMS).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0],
            VmEntry::new("Ubuntu Server", "2b9a3c1e-5f6d-4e7a-8b9c-0d1e2f3a4b5c")
        );
        assert_eq!(entries[1].name, "win10");
        assert_eq!(entries[2].name, "<inaccessible>");
    }

    #[test]
    fn test_parse_vm_list_empty() {
        assert!(parse_vm_list("VBoxManage list vms", "").unwrap().is_empty());
        assert!(parse_vm_list("VBoxManage list vms", "\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_vm_list_name_with_braces_and_quotes() {
        let output = "\"odd \"name\" {x}\" {11111111-2222-3333-4444-555555555555}\r\n";
        let entries = parse_vm_list("VBoxManage list vms", output).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "odd \"name\" {x}");
        assert_eq!(entries[0].uuid, "11111111-2222-3333-4444-555555555555");
    }

    #[test]
    fn test_parse_vm_list_rejects_garbage() {
        let err = parse_vm_list("VBoxManage list vms", "\"ok\" {1}\nnot a vm line\n").unwrap_err();
        assert!(matches!(err, Error::MalformedOutput { .. }));
        assert!(err.to_string().contains("not a vm line"));
    }

    #[test]
    fn test_parse_machine_readable() {
        let props = parse_machine_readable(SHOWVMINFO);
        assert_eq!(props["name"], "Ubuntu Server");
        assert_eq!(props["memory"], "2048");
        assert_eq!(props["VMState"], "running");
        assert_eq!(props["storagecontrollername0"], "SATA");
        assert_eq!(props["description"], "a \"quoted\" word and a \\ backslash");
    }

    #[test]
    fn test_parse_machine_readable_skips_lines_without_equals() {
        let props = parse_machine_readable("garbage\nkey=value\n\n");
        assert_eq!(props.len(), 1);
        assert_eq!(props["key"], "value");
    }

    #[test]
    fn test_parse_machine_readable_last_value_wins() {
        let props = parse_machine_readable("a=\"1\"\na=\"2\"\n");
        assert_eq!(props["a"], "2");
    }

    #[test]
    fn test_parse_machine_readable_value_with_equals() {
        let props = parse_machine_readable("\"key=odd\"=\"x=y\"\nplain=a=b\n");
        assert_eq!(props["key=odd"], "x=y");
        assert_eq!(props["plain"], "a=b");
    }

    #[test]
    fn test_parse_machine_readable_multiline_value() {
        let props = parse_machine_readable("description=\"l1\nl2=inj\"\nmemory=1024\n");
        assert_eq!(props.len(), 2);
        assert_eq!(props["description"], "l1\nl2=inj");
        assert_eq!(props["memory"], "1024");
    }

    #[test]
    fn test_parse_machine_readable_escapes() {
        let props = parse_machine_readable(
            "\"a\\\"b\"=\"v\"\nnote=\"x\\ny \\\"z\\\" \\\\ \\t\"\n",
        );
        assert_eq!(props["a\"b"], "v");
        assert_eq!(props["note"], "x\ny \"z\" \\ \\t");
    }

    #[test]
    fn test_parse_state_change_time() {
        let time = parse_state_change_time("2024-01-15T10:22:31.123000000").unwrap();
        assert_eq!(time.year(), 2024);
        assert_eq!(time.month(), 1);
        assert_eq!(time.hour(), 10);
        assert_eq!(time.second(), 31);

        assert!(parse_state_change_time("2024-01-15T10:22:31").is_some());
        assert!(parse_state_change_time("yesterday").is_none());
    }

    #[test]
    fn test_details_from_properties() {
        let props = parse_machine_readable(SHOWVMINFO);
        let details = VmDetails::from_properties("showvminfo", &props).unwrap();
        assert_eq!(details.state, VmState::Running);
        assert_eq!(details.os_type.as_deref(), Some("Ubuntu (64-bit)"));
        assert_eq!(details.memory_mb, Some(2048));
        assert_eq!(details.cpus, Some(2));
        assert_eq!(details.groups, vec!["/".to_string(), "/servers".to_string()]);
        assert!(details.state_changed_at.is_some());
    }

    #[test]
    fn test_details_tolerates_bad_numbers() {
        let props = parse_machine_readable("VMState=\"poweroff\"\nmemory=lots\ncpus=\nVMStateChangeTime=\"?\"\n");
        let details = VmDetails::from_properties("showvminfo", &props).unwrap();
        assert_eq!(details.state, VmState::PoweredOff);
        assert!(details.memory_mb.is_none());
        assert!(details.cpus.is_none());
        assert!(details.state_changed_at.is_none());
    }

    #[test]
    fn test_details_requires_state() {
        let props = parse_machine_readable("name=\"x\"\n");
        let err = VmDetails::from_properties("showvminfo", &props).unwrap_err();
        assert!(err.to_string().contains("VMState"));
    }
}
