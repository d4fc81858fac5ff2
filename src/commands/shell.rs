//! Shell functions that export KUBECONFIG after a login

use crate::error::{LoginError, Result};
use std::env;

const FUNCTION_NAME: &str = "kubectl_login";

/// Shell function wrapping `program` for `shell`
pub fn init_script(shell: &str, program: &str) -> Result<String> {
    let program = shell_words::quote(program);
    match shell {
        "bash" | "zsh" => Ok(format!(
            r#"# kubectl-login shell integration
{name}() {{
    local __kl_config
    __kl_config="$({program} "$@")" || return $?
    if [ -f "$__kl_config" ]; then
        export KUBECONFIG="$__kl_config"
    elif [ -n "$__kl_config" ]; then
        printf '%s\n' "$__kl_config"
    fi
}}
"#,
            name = FUNCTION_NAME,
            program = program
        )),
        "fish" => Ok(format!(
            r#"# kubectl-login shell integration
function {name}
    set -l __kl_config ({program} $argv)
    or return $status
    if test -f "$__kl_config"
        set -gx KUBECONFIG $__kl_config
    else if test -n "$__kl_config"
        printf '%s\n' $__kl_config
    end
end
"#,
            name = FUNCTION_NAME,
            program = program
        )),
        other => Err(LoginError::Other(format!(
            "unsupported shell '{}'. shell-init supports: bash, zsh, fish",
            other
        ))),
    }
}

pub fn run(shell: &str) -> Result<()> {
    let program = env::current_exe()
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "kubectl-login".to_string());
    print!("{}", init_script(shell, &program)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bash_script_exports_kubeconfig() {
        let script = init_script("bash", "/usr/local/bin/kubectl-login").unwrap();
        assert!(script.contains("kubectl_login() {"));
        assert!(script.contains("\"$(/usr/local/bin/kubectl-login \"$@\")\""));
        assert!(script.contains("export KUBECONFIG=\"$__kl_config\""));
        assert_eq!(script, init_script("zsh", "/usr/local/bin/kubectl-login").unwrap());
    }

    #[test]
    fn test_fish_script() {
        let script = init_script("fish", "kubectl-login").unwrap();
        assert!(script.contains("function kubectl_login"));
        assert!(script.contains("(kubectl-login $argv)"));
        assert!(script.contains("set -gx KUBECONFIG $__kl_config"));
    }

    #[test]
    fn test_program_path_is_quoted() {
        let script = init_script("bash", "/opt/my tools/kubectl-login").unwrap();
        assert!(script.contains("'/opt/my tools/kubectl-login' \"$@\""));
    }

    #[test]
    fn test_unsupported_shell() {
        assert!(init_script("powershell", "kubectl-login").is_err());
    }
}
