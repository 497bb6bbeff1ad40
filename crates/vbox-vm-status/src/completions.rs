//! Shell completion scripts.
//!
//! The bash script is generated from the clap command definition so that
//! subcommands and flags never drift from the real CLI. VM names are looked
//! up at completion time by running `<bin> list`.

use std::fmt::Write as _;

use clap::builder::ValueHint;
use clap::{Arg, Command, ValueEnum};

/// Value name marking a positional argument that takes VM names.
pub const VM_VALUE_NAME: &str = "VM";

/// Shells completion scripts can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// GNU bash
    Bash,
}

/// Generate a completion script for `shell`.
#[must_use]
pub fn generate(shell: Shell, cmd: &Command) -> String {
    match shell {
        Shell::Bash => bash_completion(cmd),
    }
}

/// One command in the tree, keyed by its space-separated subcommand path.
#[derive(Debug)]
struct Node<'a> {
    path: String,
    cmd: &'a Command,
}

fn collect_nodes<'a>(cmd: &'a Command, path: String, nodes: &mut Vec<Node<'a>>) {
    // clap's generated `help` subcommand is completed by name only
    for sub in cmd.get_subcommands().filter(|sub| sub.get_name() != "help") {
        let child = if path.is_empty() {
            sub.get_name().to_string()
        } else {
            format!("{path} {}", sub.get_name())
        };
        collect_nodes(sub, child, nodes);
    }
    nodes.push(Node { path, cmd });
}

fn flags(arg: &Arg) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(long) = arg.get_long() {
        out.push(format!("--{long}"));
    }
    if let Some(short) = arg.get_short() {
        out.push(format!("-{short}"));
    }
    out
}

fn possible_values(arg: &Arg) -> Vec<String> {
    arg.get_possible_values()
        .iter()
        .filter(|value| !value.is_hide_set())
        .map(|value| value.get_name().to_string())
        .collect()
}

fn takes_vm_names(arg: &Arg) -> bool {
    arg.is_positional()
        && arg
            .get_value_names()
            .is_some_and(|names| names.iter().any(|name| name.as_str() == VM_VALUE_NAME))
}

fn function_name(bin: &str) -> String {
    let sanitized: String = bin
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("_{sanitized}")
}

/// Generate the bash completion script for `cmd`.
#[must_use]
pub fn bash_completion(cmd: &Command) -> String {
    // Possible values, help flags and global propagation only exist once built
    let mut cmd = cmd.clone();
    cmd.build();
    let cmd = &cmd;

    let bin = cmd.get_name();
    let func = function_name(bin);

    let mut nodes = Vec::new();
    collect_nodes(cmd, String::new(), &mut nodes);

    let global_flags: Vec<String> = cmd
        .get_arguments()
        .filter(|arg| arg.is_global_set())
        .flat_map(flags)
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "# bash completion for {bin}");
    let _ = writeln!(out, "# generated by `{bin} completions bash`");
    out.push('\n');

    // VM names, newline separated, escaped for the command line
    let _ = writeln!(out, "{func}_vms() {{");
    out.push_str("    local cur=\"$1\" name\n");
    out.push_str("    local IFS=$'\\n'\n");
    let _ = writeln!(out, "    local -a names=($({bin} list 2>/dev/null))");
    out.push_str("    for name in \"${names[@]}\"; do\n");
    out.push_str("        if [[ \"$name\" == \"$cur\"* ]]; then\n");
    out.push_str("            COMPREPLY+=(\"$(printf '%q' \"$name\")\")\n");
    out.push_str("        fi\n");
    out.push_str("    done\n");
    out.push_str("}\n\n");

    let _ = writeln!(out, "{func}() {{");
    out.push_str("    local cur=\"${COMP_WORDS[COMP_CWORD]}\"\n");
    out.push_str("    local prev=\"${COMP_WORDS[COMP_CWORD-1]}\"\n");
    out.push_str("    local path=\"\" word i\n");
    out.push_str("    COMPREPLY=()\n\n");

    // Options that take a value, keyed by path since short flags differ per subcommand
    let value_options: Vec<(String, &Arg)> = nodes
        .iter()
        .flat_map(|node| {
            node.cmd
                .get_arguments()
                .filter(|arg| !arg.is_positional() && arg.get_action().takes_values())
                .map(move |arg| {
                    let pattern = flags(arg)
                        .iter()
                        .map(|flag| format!("\"{}:{flag}\"", node.path))
                        .collect::<Vec<_>>()
                        .join("|");
                    (pattern, arg)
                })
        })
        .filter(|(pattern, _)| !pattern.is_empty())
        .collect();

    // Walk the words typed so far to find the subcommand path
    out.push_str("    for ((i = 1; i < COMP_CWORD; i++)); do\n");
    out.push_str("        word=\"${COMP_WORDS[i]}\"\n");
    out.push_str("        case \"${path}:${word}\" in\n");
    for (pattern, _) in &value_options {
        let _ = writeln!(out, "            {pattern}) ((i++)); continue ;;");
    }
    for node in nodes.iter().filter(|n| !n.path.is_empty()) {
        let (parent, name) = node
            .path
            .rsplit_once(' ')
            .unwrap_or(("", node.path.as_str()));
        let _ = writeln!(
            out,
            "            \"{parent}:{name}\") path=\"{}\" ;;",
            node.path
        );
    }
    out.push_str("        esac\n");
    out.push_str("    done\n\n");

    // Option values
    out.push_str("    case \"${path}:${prev}\" in\n");
    for (pattern, arg) in &value_options {
        let values = possible_values(arg);
        let body = if !values.is_empty() {
            format!(
                "COMPREPLY=($(compgen -W \"{}\" -- \"$cur\"))",
                values.join(" ")
            )
        } else if matches!(
            arg.get_value_hint(),
            ValueHint::FilePath | ValueHint::AnyPath
        ) {
            "COMPREPLY=($(compgen -f -- \"$cur\"))".to_string()
        } else {
            ":".to_string()
        };
        let _ = writeln!(out, "        {pattern}) {body}; return 0 ;;");
    }
    out.push_str("    esac\n\n");

    // Words per subcommand path
    out.push_str("    case \"$path\" in\n");
    for node in &nodes {
        let mut words: Vec<String> = node
            .cmd
            .get_subcommands()
            .map(|sub| sub.get_name().to_string())
            .collect();
        let mut wants_vms = false;
        for arg in node.cmd.get_arguments() {
            if arg.is_positional() {
                wants_vms |= takes_vm_names(arg);
                words.extend(possible_values(arg));
            } else if !arg.is_global_set() {
                words.extend(flags(arg));
            }
        }
        words.extend(global_flags.iter().cloned());

        let _ = writeln!(out, "        \"{}\")", node.path);
        if wants_vms {
            out.push_str("            if [[ \"$cur\" != -* ]]; then\n");
            let _ = writeln!(out, "                {func}_vms \"$cur\"");
            out.push_str("                return 0\n");
            out.push_str("            fi\n");
        }
        let _ = writeln!(
            out,
            "            COMPREPLY=($(compgen -W \"{}\" -- \"$cur\"))",
            words.join(" ")
        );
        out.push_str("            ;;\n");
    }
    out.push_str("    esac\n");
    out.push_str("}\n\n");

    let _ = writeln!(out, "complete -F {func} {bin}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ArgAction;

    fn sample_command() -> Command {
        Command::new("vmtool")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .global(true)
                    .value_hint(ValueHint::FilePath),
            )
            .subcommand(
                Command::new("status")
                    .arg(
                        Arg::new("format")
                            .long("format")
                            .value_parser(["plain", "json"]),
                    )
                    .arg(
                        Arg::new("running")
                            .long("running")
                            .action(ArgAction::SetTrue),
                    )
                    .arg(
                        Arg::new("names")
                            .value_name(VM_VALUE_NAME)
                            .num_args(0..),
                    ),
            )
            .subcommand(
                Command::new("config")
                    .subcommand(Command::new("show"))
                    .subcommand(Command::new("path")),
            )
    }

    #[test]
    fn test_function_name() {
        assert_eq!(function_name("vbox-vm-status"), "_vbox_vm_status");
    }

    #[test]
    fn test_script_registers_completion() {
        let script = bash_completion(&sample_command());
        assert!(script.starts_with("# bash completion for vmtool"));
        assert!(script.trim_end().ends_with("complete -F _vmtool vmtool"));
    }

    #[test]
    fn test_script_tracks_subcommand_paths() {
        let script = bash_completion(&sample_command());
        assert!(script.contains("\":status\") path=\"status\" ;;"));
        assert!(script.contains("\"config:show\") path=\"config show\" ;;"));
    }

    #[test]
    fn test_script_completes_option_values() {
        let script = bash_completion(&sample_command());
        assert!(script.contains(
            "\"status:--format\") COMPREPLY=($(compgen -W \"plain json\" -- \"$cur\")); return 0 ;;"
        ));
        assert!(script.contains(
            "\":--config\"|\":-c\") COMPREPLY=($(compgen -f -- \"$cur\")); return 0 ;;"
        ));
        assert!(script.contains("\"config show:--config\"|\"config show:-c\")"));
        assert!(!script.contains("--running\")"));
    }

    /// The `compgen -W` word list emitted for a subcommand path.
    fn words_for(script: &str, path: &str) -> Vec<String> {
        let marker = format!("        \"{path}\")\n");
        let start = script.find(&marker).unwrap() + marker.len();
        let rest = &script[start..];
        let list = rest.find("compgen -W \"").unwrap() + "compgen -W \"".len();
        let end = rest[list..].find('"').unwrap();
        rest[list..list + end]
            .split_whitespace()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_script_skips_option_values_when_walking() {
        let script = bash_completion(&sample_command());
        let walk_start = script.find("case \"${path}:${word}\" in").unwrap();
        let walk = &script[walk_start..walk_start + script[walk_start..].find("esac").unwrap()];

        // `vmtool -c list status` must not treat the file `list` as a subcommand
        assert!(walk.contains("\":--config\"|\":-c\") ((i++)); continue ;;"));
        assert!(walk.contains("\"status:--format\") ((i++)); continue ;;"));
        assert!(walk.find("\":-c\")").unwrap() < walk.find("\":status\")").unwrap());
        assert!(!walk.contains("--running"));
    }

    #[test]
    fn test_script_words_per_path() {
        let script = bash_completion(&sample_command());

        let root = words_for(&script, "");
        for word in ["status", "config", "--config", "-c", "--help"] {
            assert!(root.contains(&word.to_string()), "root is missing {word}");
        }
        assert!(!root.contains(&"--running".to_string()));

        let status = words_for(&script, "status");
        for word in ["--format", "--running", "--config", "-c", "--help"] {
            assert!(status.contains(&word.to_string()), "status is missing {word}");
        }
        assert_eq!(
            status.iter().filter(|w| *w == "--config").count(),
            1,
            "global flags are listed once"
        );

        let config = words_for(&script, "config");
        assert!(config.contains(&"show".to_string()));
        assert!(config.contains(&"path".to_string()));
        assert!(words_for(&script, "config show").contains(&"--config".to_string()));
    }

    #[test]
    fn test_script_completes_vm_names() {
        let script = bash_completion(&sample_command());
        assert!(script.contains("_vmtool_vms() {"));
        assert!(script.contains("vmtool list 2>/dev/null"));
        assert!(script.contains("_vmtool_vms \"$cur\""));
    }

    #[test]
    fn test_generate_bash() {
        let cmd = sample_command();
        assert_eq!(generate(Shell::Bash, &cmd), bash_completion(&cmd));
    }
}
