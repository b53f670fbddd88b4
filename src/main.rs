use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

use waypoint::config::Config;
use waypoint::http::HttpClient;
use waypoint::http::request::{Method, Request, RequestBuilder};
use waypoint::support::time::deadline_after;

#[derive(Parser)]
#[command(name = "waypoint")]
#[command(about = "Fetch a URL over HTTP/1.1, optionally through TLS", long_about = None)]
#[command(version)]
struct Cli {
    /// http:// or https:// URL to fetch
    url: String,

    /// Send BODY with a POST instead of issuing a GET
    #[arg(short, long, value_name = "BODY")]
    data: Option<String>,

    /// Extra request header, as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Overrides client.deadline_ms from the config
    #[arg(long, env = "WAYPOINT_DEADLINE_MS")]
    deadline_ms: Option<u64>,
}

fn build_request(url: &Url, data: Option<String>, headers: &[String]) -> Result<Request> {
    let use_ssl = match url.scheme() {
        "http" => false,
        "https" => true,
        other => bail!("unsupported scheme {other:?}"),
    };

    let host = url.host_str().context("URL has no host")?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }

    let mut builder = RequestBuilder::new().host(host).path(path).use_ssl(use_ssl);
    for header in headers {
        let (key, value) = header
            .split_once(':')
            .with_context(|| format!("header {header:?} is not 'Name: value'"))?;
        builder = builder.header(key.trim(), value.trim());
    }
    if let Some(body) = data {
        builder = builder.method(Method::POST).body(Bytes::from(body));
    }

    builder.build().map_err(anyhow::Error::msg)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = Config::load()?;
    if let Some(ms) = cli.deadline_ms {
        cfg.client.deadline_ms = ms;
    }

    let url = Url::parse(&cli.url).with_context(|| format!("invalid URL {:?}", cli.url))?;
    let request = build_request(&url, cli.data, &cli.headers)?;
    let client = HttpClient::from_config(&cfg)?;

    let deadline = deadline_after(cfg.deadline());
    let response = tokio::select! {
        res = client.fetch(&request, deadline) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            None
        }
    };

    let Some(response) = response else {
        bail!("request to {} failed", url);
    };

    println!("{} {} {}", response.version, response.status, response.reason);
    for (key, value) in &response.headers {
        println!("{key}: {value}");
    }
    println!();
    println!("{}", response.text());

    Ok(())
}
