use crate::cli::commands::duration::validator_duration;
use clap::{Arg, ArgGroup, Command};

pub fn command() -> Command {
    let command = Command::new("server")
        .about("Serve TURN REST credentials over HTTP")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("TURNHTTP_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("ttl")
                .long("ttl")
                .help("Lifetime of issued credentials, e.g. 24h or 1h30m")
                .default_value("24h")
                .env("TURNHTTP_TTL")
                .value_parser(validator_duration()),
        )
        .arg(
            Arg::new("rate")
                .long("rate")
                .help("Refresh interval for values loaded from a URL or the key-value store")
                .default_value("30s")
                .env("TURNHTTP_RATE")
                .value_parser(validator_duration()),
        )
        .arg(
            Arg::new("redis")
                .long("redis")
                .help("Key-value store URL, example: redis://127.0.0.1:6379/0")
                .env("TURNHTTP_REDIS"),
        );

    let command = with_secret_args(command);
    let command = with_relay_args(command);
    with_origin_args(command)
}

fn with_secret_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("secret")
                .long("secret")
                .help("Static shared secret")
                .env("TURNHTTP_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new("secret-url")
                .long("secret-url")
                .help("URL returning the shared secret as a JSON string")
                .env("TURNHTTP_SECRET_URL"),
        )
        .arg(
            Arg::new("secret-prefix")
                .long("secret-prefix")
                .help("Key prefix of rotated secrets in the key-value store")
                .env("TURNHTTP_SECRET_PREFIX")
                .requires("redis"),
        )
        .arg(
            Arg::new("rotation-period")
                .long("rotation-period")
                .help("Rotation period of secrets stored under --secret-prefix")
                .default_value("24h")
                .env("TURNHTTP_ROTATION_PERIOD")
                .value_parser(validator_duration()),
        )
        .group(
            ArgGroup::new("secret-source")
                .args(["secret", "secret-url", "secret-prefix"])
                .required(true),
        )
}

fn with_relay_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("servers")
                .long("servers")
                .help("Comma separated relay IPs or TURN URIs")
                .env("TURNHTTP_SERVERS"),
        )
        .arg(
            Arg::new("servers-url")
                .long("servers-url")
                .help("URL returning the relays as a JSON array")
                .env("TURNHTTP_SERVERS_URL"),
        )
        .arg(
            Arg::new("servers-key")
                .long("servers-key")
                .help("Key-value store set holding the relays")
                .env("TURNHTTP_SERVERS_KEY")
                .requires("redis"),
        )
        .group(
            ArgGroup::new("relay-source")
                .args(["servers", "servers-url", "servers-key"])
                .required(true),
        )
}

fn with_origin_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("hosts")
                .long("hosts")
                .help("Comma separated allowed origins, when unset only requests without an Origin header are served")
                .env("TURNHTTP_HOSTS"),
        )
        .arg(
            Arg::new("hosts-url")
                .long("hosts-url")
                .help("URL returning the allowed origins as a JSON array")
                .env("TURNHTTP_HOSTS_URL"),
        )
        .arg(
            Arg::new("hosts-key")
                .long("hosts-key")
                .help("Key-value store set holding the allowed origins")
                .env("TURNHTTP_HOSTS_KEY")
                .requires("redis"),
        )
        .group(ArgGroup::new("origin-source").args(["hosts", "hosts-url", "hosts-key"]))
}
