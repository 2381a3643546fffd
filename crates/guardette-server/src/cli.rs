//! Command-line arguments.

use std::path::PathBuf;

use crate::error::{ServerError, ServerResult};

/// Parsed options for a server run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    /// Policy file, overriding `GUARDETTE_POLICY_PATH`.
    pub policy: Option<PathBuf>,
    /// `.env` file priming the environment.
    pub env_file: Option<PathBuf>,
    /// Reload the policy when the file changes.
    pub watch: bool,
}

/// What the invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the gateway.
    Run(Args),
    /// Print usage.
    Help,
    /// Print the version.
    Version,
}

impl Command {
    /// Parses arguments, excluding the program name.
    pub fn parse_from<I>(args: I) -> ServerResult<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut parsed = Args::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--policy" | "-p" => parsed.policy = Some(value(&arg, args.next())?.into()),
                "--env-file" | "-e" => parsed.env_file = Some(value(&arg, args.next())?.into()),
                "--watch" | "-w" => parsed.watch = true,
                "--help" | "-h" => return Ok(Self::Help),
                "--version" | "-V" => return Ok(Self::Version),
                other => {
                    return Err(ServerError::Usage(format!(
                        "unknown argument: {other}\nUse --help for usage information"
                    )))
                }
            }
        }

        Ok(Self::Run(parsed))
    }

    /// Parses the process arguments.
    pub fn from_env() -> ServerResult<Self> {
        Self::parse_from(std::env::args().skip(1))
    }
}

fn value(flag: &str, next: Option<String>) -> ServerResult<String> {
    next.filter(|v| !v.starts_with('-'))
        .ok_or_else(|| ServerError::Usage(format!("{flag} requires a value")))
}

/// Usage text.
pub const HELP: &str = r"Guardette - policy-driven privacy gateway

USAGE:
    guardette-server [OPTIONS]

OPTIONS:
    -p, --policy <PATH>      Policy file (.yml, .yaml or .json)
    -e, --env-file <PATH>    Load configuration from a .env file
    -w, --watch              Reload the policy when the file changes
    -h, --help               Print help information
    -V, --version            Print version information

ENVIRONMENT VARIABLES:
    CLIENT_SECRET                         Shared secret callers send in Authorization
    SECRET_MANAGER                        default | aws_secret_manager
    PSEUDONYMIZE_SALT                     Salt for pseudonymize_email
    PSEUDONYMIZE_EMAIL_DOMAINS_ALLOWLIST  Comma-separated domains left untouched
    PROXY_CLIENT_TIMEOUT_SECS             Upstream timeout (default: 30)
    SECRET_MANAGER_CACHE_TTL_SECS         Secret cache TTL (default: 300)
    GUARDETTE_POLICY_PATH                 Policy file (default: .guardette/policy.yml)
    GUARDETTE_LISTEN_ADDR                 Listen address (default: 0.0.0.0:8080)
    GUARDETTE_WATCH_POLICY                Reload the policy on change (default: false)
    LOG_LEVEL                             Log filter (default: info)
    LOG_FORMAT                            json | pretty (default: json)
";

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerResult<Command> {
        Command::parse_from(args.iter().map(|a| (*a).to_string()))
    }

    #[test]
    fn test_defaults() {
        assert_eq!(parse(&[]).unwrap(), Command::Run(Args::default()));
    }

    #[test]
    fn test_all_options() {
        let command = parse(&["--policy", "p.yml", "-e", ".env.local", "--watch"]).unwrap();
        assert_eq!(
            command,
            Command::Run(Args {
                policy: Some("p.yml".into()),
                env_file: Some(".env.local".into()),
                watch: true,
            })
        );
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse(&["--watch", "-h"]).unwrap(), Command::Help);
        assert_eq!(parse(&["--version"]).unwrap(), Command::Version);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse(&["--policy"]), Err(ServerError::Usage(_))));
        assert!(matches!(parse(&["--policy", "--watch"]), Err(ServerError::Usage(_))));
        assert!(matches!(parse(&["--frobnicate"]), Err(ServerError::Usage(_))));
    }
}
