use crate::cli::actions::{
    rotate,
    server::{self, ListArg, SecretArg},
    Action,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("server", sub)) => server_args(sub).map(Action::Server),
        Some(("rotate", sub)) => rotate_args(sub).map(Action::Rotate),
        _ => Err(anyhow!("missing subcommand, expected server or rotate")),
    }
}

fn server_args(matches: &ArgMatches) -> Result<server::Args> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let secret = if let Some(secret) = matches.get_one::<String>("secret") {
        if secret.is_empty() {
            bail!("--secret must not be empty");
        }
        SecretArg::Static(SecretString::from(secret.clone()))
    } else if let Some(url) = matches.get_one::<String>("secret-url") {
        SecretArg::Url(parse_url(url, "--secret-url")?)
    } else if let Some(prefix) = matches.get_one::<String>("secret-prefix") {
        SecretArg::Prefix(prefix.clone())
    } else {
        bail!("one of --secret, --secret-url or --secret-prefix is required");
    };

    let relays = list_arg(matches, "servers")?
        .context("one of --servers, --servers-url or --servers-key is required")?;
    if matches!(&relays, ListArg::Static(servers) if servers.is_empty()) {
        bail!("--servers must list at least one relay");
    }

    Ok(server::Args {
        port,
        ttl: duration(matches, "ttl")?,
        rate: duration(matches, "rate")?,
        rotation_period: duration(matches, "rotation-period")?,
        redis: matches.get_one::<String>("redis").cloned(),
        secret,
        relays,
        origins: list_arg(matches, "hosts")?,
    })
}

fn rotate_args(matches: &ArgMatches) -> Result<rotate::Args> {
    Ok(rotate::Args {
        redis: matches
            .get_one::<String>("redis")
            .cloned()
            .context("missing required argument: --redis")?,
        prefix: matches
            .get_one::<String>("secret-prefix")
            .cloned()
            .unwrap_or_else(|| "turn/secret".to_string()),
        rotation_period: duration(matches, "rotation-period")?,
        secret_length: matches
            .get_one::<u16>("secret-length")
            .map_or(15, |length| usize::from(*length)),
    })
}

fn duration(matches: &ArgMatches, name: &str) -> Result<Duration> {
    matches
        .get_one::<Duration>(name)
        .copied()
        .with_context(|| format!("missing required argument: --{name}"))
}

// `name`, `name-url` and `name-key` are mutually exclusive, enforced by clap.
fn list_arg(matches: &ArgMatches, name: &str) -> Result<Option<ListArg>> {
    if let Some(list) = matches.get_one::<String>(name) {
        return Ok(Some(ListArg::Static(crate::turn::config::split_list(list))));
    }

    let url_arg = format!("{name}-url");
    if let Some(url) = matches.get_one::<String>(&url_arg) {
        return parse_url(url, &format!("--{url_arg}")).map(|url| Some(ListArg::Url(url)));
    }

    Ok(matches
        .get_one::<String>(&format!("{name}-key"))
        .map(|key| ListArg::Key(key.clone())))
}

fn parse_url(url: &str, arg: &str) -> Result<Url> {
    let parsed = Url::parse(url).with_context(|| format!("invalid {arg}: {url}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("invalid {arg}: {url}, expected an http(s) URL");
    }
    Ok(parsed)
}
