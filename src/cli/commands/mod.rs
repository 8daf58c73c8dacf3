pub mod duration;
mod logging;
mod rotate;
mod server;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    ColorChoice, Command,
};

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("turnhttp")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(server::command())
        .subcommand(rotate::command());

    logging::with_args(command)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SOURCE_VARS: [&str; 11] = [
        "TURNHTTP_SECRET",
        "TURNHTTP_SECRET_URL",
        "TURNHTTP_SECRET_PREFIX",
        "TURNHTTP_SERVERS",
        "TURNHTTP_SERVERS_URL",
        "TURNHTTP_SERVERS_KEY",
        "TURNHTTP_HOSTS",
        "TURNHTTP_HOSTS_URL",
        "TURNHTTP_HOSTS_KEY",
        "TURNHTTP_REDIS",
        "TURNHTTP_LOG_LEVEL",
    ];

    // Pin every source variable so the host environment cannot leak in.
    fn vars(set: &[(&'static str, &'static str)]) -> Vec<(&'static str, Option<&'static str>)> {
        let mut vars: Vec<_> = SOURCE_VARS
            .iter()
            .filter(|key| !set.iter().any(|(name, _)| name == *key))
            .map(|key| (*key, None))
            .collect();
        vars.extend(set.iter().map(|(key, value)| (*key, Some(*value))));
        vars
    }

    fn server_matches(args: &[&str]) -> Result<clap::ArgMatches, clap::Error> {
        let mut argv = vec!["turnhttp", "server"];
        argv.extend_from_slice(args);
        new()
            .try_get_matches_from(argv)
            .map(|matches| matches.subcommand_matches("server").cloned().unwrap())
    }

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "turnhttp");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_server_defaults() {
        temp_env::with_vars(vars(&[]), || {
            let matches = server_matches(&["--secret", "s3cr3t", "--servers", "10.0.0.1"]).unwrap();

            assert_eq!(matches.get_one::<u16>("port").copied(), Some(8080));
            assert_eq!(
                matches.get_one::<Duration>("ttl").copied(),
                Some(Duration::from_secs(86_400))
            );
            assert_eq!(
                matches.get_one::<Duration>("rate").copied(),
                Some(Duration::from_secs(30))
            );
            assert_eq!(
                matches.get_one::<String>("secret").cloned(),
                Some("s3cr3t".to_string())
            );
            assert!(matches.get_one::<String>("hosts").is_none());
        });
    }

    #[test]
    fn test_server_env() {
        temp_env::with_vars(
            vars(&[
                ("TURNHTTP_PORT", "3000"),
                ("TURNHTTP_TTL", "1h30m"),
                ("TURNHTTP_SECRET_URL", "http://config.local/secret"),
                ("TURNHTTP_SERVERS", "10.0.0.1,10.0.0.2"),
                ("TURNHTTP_HOSTS", "https://app.example.com"),
            ]),
            || {
                let matches = server_matches(&[]).unwrap();
                assert_eq!(matches.get_one::<u16>("port").copied(), Some(3000));
                assert_eq!(
                    matches.get_one::<Duration>("ttl").copied(),
                    Some(Duration::from_secs(5_400))
                );
                assert_eq!(
                    matches.get_one::<String>("secret-url").cloned(),
                    Some("http://config.local/secret".to_string())
                );
            },
        );
    }

    #[test]
    fn test_server_requires_one_secret_source() {
        temp_env::with_vars(vars(&[]), || {
            assert!(server_matches(&["--servers", "10.0.0.1"]).is_err());
            assert!(server_matches(&[
                "--secret",
                "a",
                "--secret-url",
                "http://config.local/secret",
                "--servers",
                "10.0.0.1",
            ])
            .is_err());
        });
    }

    #[test]
    fn test_server_requires_one_relay_source() {
        temp_env::with_vars(vars(&[]), || {
            assert!(server_matches(&["--secret", "a"]).is_err());
            assert!(server_matches(&[
                "--secret",
                "a",
                "--servers",
                "10.0.0.1",
                "--servers-url",
                "http://config.local/servers",
            ])
            .is_err());
        });
    }

    #[test]
    fn test_server_origin_sources_conflict() {
        temp_env::with_vars(vars(&[]), || {
            assert!(server_matches(&[
                "--secret",
                "a",
                "--servers",
                "10.0.0.1",
                "--hosts",
                "https://a.example",
                "--hosts-url",
                "http://config.local/hosts",
            ])
            .is_err());
        });
    }

    #[test]
    fn test_store_keys_require_redis() {
        temp_env::with_vars(vars(&[]), || {
            assert!(server_matches(&["--secret-prefix", "turn/secret", "--servers", "10.0.0.1"])
                .is_err());
            assert!(server_matches(&[
                "--secret-prefix",
                "turn/secret",
                "--servers-key",
                "turn/servers",
                "--redis",
                "redis://127.0.0.1/0",
            ])
            .is_ok());
        });
    }

    #[test]
    fn test_server_rejects_bad_durations() {
        temp_env::with_vars(vars(&[]), || {
            for ttl in ["0s", "1.5h", "abc"] {
                assert!(
                    server_matches(&["--secret", "a", "--servers", "10.0.0.1", "--ttl", ttl])
                        .is_err(),
                    "{ttl} should be rejected"
                );
            }
        });
    }

    #[test]
    fn test_rotate_defaults() {
        temp_env::with_vars(vars(&[]), || {
            let matches = new()
                .try_get_matches_from(["turnhttp", "rotate", "--redis", "redis://127.0.0.1/0"])
                .unwrap();
            let matches = matches.subcommand_matches("rotate").unwrap();

            assert_eq!(
                matches.get_one::<String>("secret-prefix").cloned(),
                Some("turn/secret".to_string())
            );
            assert_eq!(
                matches.get_one::<Duration>("rotation-period").copied(),
                Some(Duration::from_secs(86_400))
            );
            assert_eq!(matches.get_one::<u16>("secret-length").copied(), Some(15));
        });
    }

    #[test]
    fn test_rotate_requires_redis() {
        temp_env::with_vars(vars(&[]), || {
            assert!(new().try_get_matches_from(["turnhttp", "rotate"]).is_err());
        });
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars(vars(&[("TURNHTTP_LOG_LEVEL", level)]), || {
                let matches = server_matches(&["--secret", "a", "--servers", "10.0.0.1"]).unwrap();
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5 {
            temp_env::with_vars(vars(&[]), || {
                let flag = format!("-{}", "v".repeat(index));
                let mut args = vec!["--secret", "a", "--servers", "10.0.0.1"];
                if index > 0 {
                    args.push(flag.as_str());
                }

                let matches = server_matches(&args).unwrap();
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
