use anyhow::{Context, Result, bail};
use clap::Parser;
use intercall::http::is_failed_http_code;
use intercall::{ClientConfig, HttpPostClient, PostClient, PostResponse};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// intercall - POST client for service-to-service calls
///
/// Sends a single POST request and prints the response body.
/// Connection refusals and deadline overruns are reported as
/// integration errors.
///
/// Examples:
///   intercall post http://billing:8080/charge -H 'Content-Type: application/json' -d '{"id":1}'
#[derive(Parser, Debug)]
#[command(author, version = env!("INTERCALL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Timeout used when a call does not set one (also via INTERCALL_DEFAULT_TIMEOUT_MS)
    #[arg(
        long = "default-timeout-ms",
        env = "INTERCALL_DEFAULT_TIMEOUT_MS",
        value_name = "MS",
        value_parser = clap::value_parser!(u64).range(1..),
        global = true
    )]
    pub default_timeout_ms: Option<u64>,

    /// Connect timeout (also via INTERCALL_CONNECT_TIMEOUT_MS)
    #[arg(
        long = "connect-timeout-ms",
        env = "INTERCALL_CONNECT_TIMEOUT_MS",
        value_name = "MS",
        global = true
    )]
    pub connect_timeout_ms: Option<u64>,

    /// User-Agent header sent with every request (also via INTERCALL_USER_AGENT)
    #[arg(
        long = "user-agent",
        env = "INTERCALL_USER_AGENT",
        value_name = "AGENT",
        global = true
    )]
    pub user_agent: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send a POST request
    Post(PostArgs),
}

#[derive(clap::Args, Debug)]
pub struct PostArgs {
    /// Destination URL
    #[arg(value_name = "URL")]
    pub url: String,

    /// Request header in 'Name: value' form (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Request body
    #[arg(short = 'd', long = "data", value_name = "BODY", conflicts_with = "data_file")]
    pub data: Option<String>,

    /// Read the request body from a file
    #[arg(long = "data-file", value_name = "PATH")]
    pub data_file: Option<PathBuf>,

    /// Timeout for this call; 0 uses the default timeout
    #[arg(long = "timeout-ms", value_name = "MS", default_value_t = 0)]
    pub timeout_ms: u64,

    /// Print status and body as JSON
    #[arg(long)]
    pub json: bool,

    /// Exit with an error when the response status is not 2xx
    #[arg(long)]
    pub fail: bool,
}

#[derive(Serialize)]
struct JsonOutput {
    status: u16,
    body: String,
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("Invalid header '{}'. Expected 'Name: value'.", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid header '{}'. Header name is empty.", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn build_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::default();
    if let Some(ms) = cli.default_timeout_ms {
        config = config.with_default_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = cli.connect_timeout_ms {
        config = config.with_connect_timeout(Duration::from_millis(ms));
    }
    if let Some(agent) = &cli.user_agent {
        config = config.with_user_agent(agent.clone());
    }
    config
}

fn read_body(args: &PostArgs) -> Result<Vec<u8>> {
    if let Some(path) = &args.data_file {
        return std::fs::read(path)
            .with_context(|| format!("Failed to read request body from {:?}", path));
    }
    Ok(args.data.clone().unwrap_or_default().into_bytes())
}

fn print_response(response: &PostResponse, json: bool) -> Result<()> {
    if json {
        let output = JsonOutput {
            status: response.status.as_u16(),
            body: String::from_utf8_lossy(&response.body).into_owned(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        eprintln!("HTTP {}", response.status);
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&response.body)?;
        stdout.flush()?;
    }
    Ok(())
}

async fn post(config: ClientConfig, args: PostArgs) -> Result<()> {
    let client = HttpPostClient::from_config(&config)?;
    let headers: HashMap<String, String> = args.headers.iter().cloned().collect();
    let body = read_body(&args)?;

    let response = client
        .post(
            &args.url,
            &headers,
            body,
            Duration::from_millis(args.timeout_ms),
        )
        .await?;

    print_response(&response, args.json)?;

    if args.fail && is_failed_http_code(response.status) {
        bail!("Server returned HTTP {}", response.status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let config = build_config(&cli);

    match cli.command {
        Commands::Post(args) => post(config, args).await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_post_parsing() {
        let cli = Cli::try_parse_from([
            "intercall",
            "post",
            "http://localhost/charge",
            "-H",
            "Content-Type: application/json",
            "-H",
            "X-Request-Id:abc",
            "-d",
            "{}",
        ])
        .unwrap();

        let Commands::Post(args) = cli.command;
        assert_eq!(args.url, "http://localhost/charge");
        assert_eq!(
            args.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Request-Id".to_string(), "abc".to_string()),
            ]
        );
        assert_eq!(args.data.as_deref(), Some("{}"));
        assert_eq!(args.timeout_ms, 0);
        assert!(!args.json);
        assert!(!args.fail);
    }

    #[test]
    fn test_cli_global_options_parsing() {
        let cli = Cli::try_parse_from([
            "intercall",
            "--default-timeout-ms",
            "1500",
            "post",
            "http://localhost/",
            "--connect-timeout-ms",
            "200",
            "--user-agent",
            "billing",
        ])
        .unwrap();

        let config = build_config(&cli);
        assert_eq!(config.default_timeout, Duration::from_millis(1500));
        assert_eq!(config.connect_timeout, Duration::from_millis(200));
        assert_eq!(config.user_agent, "billing");
    }

    #[test]
    fn test_cli_rejects_zero_default_timeout() {
        let result = Cli::try_parse_from([
            "intercall",
            "--default-timeout-ms",
            "0",
            "post",
            "http://localhost/",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_malformed_header() {
        let result = Cli::try_parse_from(["intercall", "post", "http://localhost/", "-H", "nocolon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_data_conflicts_with_data_file() {
        let result = Cli::try_parse_from([
            "intercall",
            "post",
            "http://localhost/",
            "-d",
            "x",
            "--data-file",
            "body.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["intercall", "http://localhost/"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_header_trims_whitespace() {
        assert_eq!(
            parse_header("  Accept :  text/plain ").unwrap(),
            ("Accept".to_string(), "text/plain".to_string())
        );
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_read_body_defaults_to_empty() {
        let cli = Cli::try_parse_from(["intercall", "post", "http://localhost/"]).unwrap();
        let Commands::Post(args) = cli.command;
        assert!(read_body(&args).unwrap().is_empty());
    }
}
