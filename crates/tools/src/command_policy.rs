//! Shell Command Policy
//!
//! The `execute_command` tool runs child processes directly (no shell), and
//! this module decides what it will run: the base command must be on the
//! allow-list, and no argument may carry shell metacharacters or a
//! path-traversal sequence. This is a mitigation, not isolation.

/// Base commands workers may execute.
const ALLOWED_COMMANDS: &[&str] = &[
    // package managers / runtimes
    "node", "npm", "npx", "yarn", "pnpm", "deno", "bun",
    "python", "python3", "pip", "pip3", "pytest",
    "cargo", "rustc", "go", "tsc",
    // version control
    "git",
    // build helpers
    "make",
    // basic file utilities
    "ls", "cat", "head", "tail", "wc", "mkdir", "touch", "cp", "mv",
    "grep", "find", "diff", "echo", "which", "pwd",
];

const SHELL_METACHARACTERS: &[char] = &[
    ';', '|', '&', '`', '$', '>', '<', '(', ')', '{', '}', '\n', '\r',
];

/// Validate a command line and split it into program + arguments.
///
/// Whitespace splitting is intentional: quoting would require a shell, and
/// the policy exists precisely to avoid one.
pub fn validate_command(command: &str) -> Result<Vec<String>, String> {
    let parts: Vec<String> = command.split_whitespace().map(|s| s.to_string()).collect();
    let Some(program) = parts.first() else {
        return Err("Empty command".to_string());
    };

    // The base command may be given as a path; judge the basename.
    let base = program.rsplit('/').next().unwrap_or(program);
    if !ALLOWED_COMMANDS.contains(&base) {
        return Err(format!(
            "Command '{}' is not on the allow-list. Allowed: {}",
            base,
            ALLOWED_COMMANDS.join(", ")
        ));
    }

    if let Some(bad) = command.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
        return Err(format!(
            "Command contains forbidden shell metacharacter '{}'",
            bad
        ));
    }

    for part in &parts {
        if part.contains("..") {
            return Err(format!(
                "Argument '{}' contains a path-traversal sequence",
                part
            ));
        }
    }

    Ok(parts)
}
