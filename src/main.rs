use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, CommandFactory, Parser};
use service_probe::{LogFormat, Probe, ProbeConfig, ProbeStatus, probe_version};

const MAX_ARG_LEN: usize = 255;

const LONG_ABOUT: &str = "\
Simplest possible solution to check service availability.

The host is resolved first; if that fails, probe fails. Then probe tries to
connect as many times as --retry says, waiting --timeout seconds between
tries. Exits 0 when the service is available and 1 otherwise.

Don't use the 0.0.0.0 address.";

const AFTER_HELP: &str = "\
Examples:
  probe --service=http localhost
  probe --port=8080 localhost
  probe --timeout=3 --retry=5 --service=https example.com";

#[derive(Parser, Debug)]
#[command(name = "probe", version = probe_version(), about = "Check whether a TCP service accepts connections")]
#[command(long_about = LONG_ABOUT, after_help = AFTER_HELP)]
#[command(disable_version_flag = true)]
#[command(group(ArgGroup::new("target").args(["service", "port"])))]
struct Cli {
    /// Host name or IPv4 address to connect to
    #[arg(value_name = "HOST")]
    host: String,

    /// Service to connect to, looked up in the services database
    #[arg(short = 's', long = "service")]
    service: Option<String>,

    /// Port to connect to
    #[arg(short = 'p', long = "port", value_parser = clap::value_parser!(u16).range(1..))]
    port: Option<u16>,

    /// Retry count
    #[arg(short = 'r', long = "retry", value_parser = clap::value_parser!(u32).range(1..))]
    retry: Option<u32>,

    /// Seconds to wait between retries
    #[arg(short = 't', long = "timeout")]
    timeout: Option<u64>,

    /// Per-attempt connect timeout in milliseconds, 0 for the OS default
    #[arg(long = "connect-timeout")]
    connect_timeout: Option<u64>,

    /// Transport protocol name
    #[arg(long = "protocol", default_value = "tcp")]
    protocol: String,

    /// JSON config file, overrides $PROBE_CONFIG
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    _version: Option<bool>,
}

/// Which of the four resolution paths a command line selects.
enum Target<'a> {
    Ip(&'a str),
    Host(&'a str),
}

#[derive(Debug, PartialEq)]
enum Via<'a> {
    Port(u16),
    Service(&'a str),
}

impl Cli {
    /// `--service` and `--port` exclude each other; one of them is required.
    fn via(&self) -> Result<Via<'_>, clap::Error> {
        match (self.service.as_deref(), self.port) {
            (Some(service), _) => Ok(Via::Service(service)),
            (None, Some(port)) => Ok(Via::Port(port)),
            (None, None) => Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "Not enough arguments: one of --service or --port is required",
            )),
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let via = match cli.via() {
        Ok(via) => via,
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, via) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("probe: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, via: Via<'_>) -> Result<ExitCode> {
    check_lengths(cli)?;

    let config = load_config(cli)?;
    init_tracing(&config)?;
    tracing::debug!(?config, host = %cli.host, "starting");

    let retry_count = cli.retry.unwrap_or(config.retry_count);
    let retry_delay_secs = cli.timeout.unwrap_or(config.retry_delay_secs);
    let mut probe = Probe::system(config).context("setting up probe")?;
    probe.configure(retry_count, retry_delay_secs);

    let target = if looks_like_ipv4(&cli.host) {
        Target::Ip(&cli.host)
    } else {
        Target::Host(&cli.host)
    };
    let protocol = Some(cli.protocol.as_str());
    let status = match (&target, &via) {
        (Target::Ip(ip), Via::Service(service)) => probe.ipv4_service(ip, service, protocol),
        (Target::Ip(ip), Via::Port(port)) => probe.ipv4_port(ip, *port, protocol),
        (Target::Host(host), Via::Service(service)) => probe.host_service(host, service, protocol),
        (Target::Host(host), Via::Port(port)) => probe.host_port(host, *port, protocol),
    }?;

    report(status, &target, &via, &cli.protocol);

    Ok(if status.is_available() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check_lengths(cli: &Cli) -> Result<()> {
    if cli.host.len() > MAX_ARG_LEN {
        anyhow::bail!("Host value is too long. Use only {MAX_ARG_LEN} characters at max.");
    }
    let options = [cli.service.as_deref(), Some(cli.protocol.as_str())];
    if options.iter().flatten().any(|value| value.len() > MAX_ARG_LEN) {
        anyhow::bail!("Option value is too long. Use only {MAX_ARG_LEN} characters at max.");
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ProbeConfig> {
    let mut config = match &cli.config {
        Some(path) => ProbeConfig::from_file(path)?,
        None => ProbeConfig::load()?,
    };
    config.validate()?;

    if let Some(connect_timeout) = cli.connect_timeout {
        config.connect_timeout_ms = connect_timeout;
    }
    Ok(config)
}

fn init_tracing(config: &ProbeConfig) -> Result<()> {
    let log_level = config.get_tracing_level()?;
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("service_probe={}", log_level.as_str().to_lowercase()).parse()?)
        .add_directive(format!("probe={}", log_level.as_str().to_lowercase()).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

/// Four dot-separated digit groups, whether or not each is in range.
fn looks_like_ipv4(host: &str) -> bool {
    let parts: Vec<&str> = host.split('.').collect();
    parts.len() == 4
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 3 && p.bytes().all(|b| b.is_ascii_digit()))
}

fn report(status: ProbeStatus, target: &Target<'_>, via: &Via<'_>, protocol: &str) {
    let text = message(status, target, via, protocol);
    if status.is_available() {
        println!("{text}");
    } else {
        eprintln!("{text}");
    }
}

fn message(status: ProbeStatus, target: &Target<'_>, via: &Via<'_>, protocol: &str) -> String {
    let (kind, name) = match target {
        Target::Ip(ip) => ("ip", *ip),
        Target::Host(host) => ("host", *host),
    };
    let subject = match via {
        Via::Port(port) => format!("Port \"{port}\""),
        Via::Service(service) => format!("Service \"{service}\""),
    };

    match status {
        ProbeStatus::Available => format!("{subject} on {kind} \"{name}\" is available."),
        ProbeStatus::Unavailable => format!("{subject} on {kind} \"{name}\" is unavailable."),
        ProbeStatus::UnknownHost => format!("Lookup for host \"{name}\" is failed."),
        ProbeStatus::InvalidIp => format!("IP \"{name}\" is invalid."),
        ProbeStatus::UnknownService => format!("{subject} is not well known"),
        ProbeStatus::UnknownProtocol => format!("Protocol \"{protocol}\" is unknown."),
    }
}
