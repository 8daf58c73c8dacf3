use crate::cli::commands::duration::validator_duration;
use clap::{Arg, Command};

pub fn command() -> Command {
    Command::new("rotate")
        .about("Write a new shared secret to the key-value store every rotation period")
        .arg(
            Arg::new("redis")
                .long("redis")
                .help("Key-value store URL, example: redis://127.0.0.1:6379/0")
                .env("TURNHTTP_REDIS")
                .required(true),
        )
        .arg(
            Arg::new("secret-prefix")
                .long("secret-prefix")
                .help("Key prefix of rotated secrets")
                .default_value("turn/secret")
                .env("TURNHTTP_SECRET_PREFIX"),
        )
        .arg(
            Arg::new("rotation-period")
                .long("rotation-period")
                .help("Interval between new secrets, each one lives for two periods")
                .default_value("24h")
                .env("TURNHTTP_ROTATION_PERIOD")
                .value_parser(validator_duration()),
        )
        .arg(
            Arg::new("secret-length")
                .long("secret-length")
                .help("Length of generated secrets")
                .default_value("15")
                .env("TURNHTTP_SECRET_LENGTH")
                .value_parser(clap::value_parser!(u16).range(8..=256)),
        )
}
