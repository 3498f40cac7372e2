use crate::platform::Platform;

/// Full prompt asking for a standalone bash script for `task` on `platform`.
pub fn script_prompt(task: &str, platform: Platform) -> String {
    format!(
        r#"You are a DevOps assistant. The user is using: {platform}

Given this user request:

"{task}"

Provide a clean, production-ready pure bash script that can be saved and executed independently.

Requirements:
- Tailor the script to the detected OS: {platform}
- Output only the shell script (no markdown, no formatting, no extra text).
- Start the script with `#!/bin/bash`.
- Include `set -e` for fail-fast behavior.
- The script must be fully non-interactive; do not include any commands that pause for input.
- Use proper flags for silent/automatic execution (`-y`, `--yes`, `--noconfirm`, etc.).
- Include logging (`echo`) for key steps.
- Check if the script is run as root or with sudo.
- Do not return explanations, comments, or markdown, only the final bash script content.
"#
    )
}

/// Full prompt asking for bare command lines, one per line.
pub fn command_list_prompt(task: &str, platform: Platform) -> String {
    format!(
        r#"You are a DevOps assistant. The user is using: {platform}

Given this user request:

"{task}"

Write only the shell commands necessary to do this on {platform}, one per line.
Do NOT wrap the output in triple backticks, markdown, or quotes.
No explanations, no comments.
"#
    )
}

/// Full prompt asking for a single command that fixes `error`.
pub fn error_fixer_prompt(error: &str) -> String {
    format!(
        r#"You're a Linux troubleshooting expert.
Given this command error:

{error}

Suggest a corrected shell command to fix the problem. Only return the command.
"#
    )
}

/// Task text after the operator asked for a change.
pub fn revision_task(task: &str, correction: &str) -> String {
    format!("{task}\nModify it like this: {correction}")
}

/// Task text after a failed attempt. `error` is expected to be truncated already.
pub fn correction_task(task: &str, error: &str, previous_script: &str) -> String {
    format!(
        "{task}\n\
         The previous script failed with this error:\n{error}\n\
         Here was the previous script:\n{previous_script}\n\
         Please generate a corrected bash script to achieve the goal."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_prompt_mentions_platform_and_task() {
        let prompt = script_prompt("install nginx", Platform::Ubuntu);
        assert!(prompt.contains("The user is using: Ubuntu"));
        assert!(prompt.contains("\"install nginx\""));
        assert!(prompt.contains("set -e"));
    }

    #[test]
    fn test_command_list_prompt() {
        let prompt = command_list_prompt("install git", Platform::Fedora);
        assert!(prompt.contains("on Fedora, one per line"));
        assert!(prompt.contains("\"install git\""));
    }

    #[test]
    fn test_revision_task() {
        assert_eq!(
            revision_task("install nginx", "use the mainline repo"),
            "install nginx\nModify it like this: use the mainline repo"
        );
    }

    #[test]
    fn test_correction_task_layout() {
        let task = correction_task("install nginx", "E: boom", "#!/bin/bash\napt install nginx");
        let lines: Vec<&str> = task.lines().collect();
        assert_eq!(lines[0], "install nginx");
        assert_eq!(lines[1], "The previous script failed with this error:");
        assert_eq!(lines[2], "E: boom");
        assert_eq!(lines[3], "Here was the previous script:");
        assert_eq!(lines[4], "#!/bin/bash");
        assert_eq!(
            lines.last(),
            Some(&"Please generate a corrected bash script to achieve the goal.")
        );
    }

    #[test]
    fn test_error_fixer_prompt() {
        let prompt = error_fixer_prompt("bash: nginx: command not found");
        assert!(prompt.contains("bash: nginx: command not found"));
        assert!(prompt.contains("Only return the command."));
    }
}
