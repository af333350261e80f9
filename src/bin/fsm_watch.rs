use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use futures::StreamExt;
use serde_json::json;
use tracing::{info, warn};

use fieldservice_api::client::{FrameDecoder, FsmClient, SseFrame, WorkOrderEvent};

/// Tails the work order event stream.
#[derive(Debug, Parser)]
#[command(name = "fsm-watch", version, about)]
struct Args {
    /// Server root URL
    #[arg(long, env = "FSM_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,

    /// Log in with this email (needs --password)
    #[arg(long, env = "FSM_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "FSM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Use an existing bearer token instead of logging in
    #[arg(long, env = "FSM_TOKEN", hide_env_values = true, conflicts_with = "email")]
    token: Option<String>,

    /// Print one JSON object per frame
    #[arg(long)]
    json: bool,

    /// Seconds to wait before reopening a dropped stream
    #[arg(long, default_value_t = 3)]
    retry_secs: u64,
}

fn print_frame(frame: &SseFrame, as_json: bool) {
    if as_json {
        let data = serde_json::from_str::<serde_json::Value>(&frame.data)
            .unwrap_or_else(|_| json!(frame.data));
        println!(
            "{}",
            json!({ "event": frame.event, "id": frame.id, "data": data })
        );
        return;
    }

    let seq = frame.id.as_deref().unwrap_or("-");
    match WorkOrderEvent::from_frame(frame) {
        Ok(WorkOrderEvent::Created(order)) | Ok(WorkOrderEvent::Updated(order)) => println!(
            "[{}] {} {} \"{}\" status={} priority={} price={}",
            seq, frame.event, order.id, order.title, order.status, order.priority, order.price
        ),
        Ok(WorkOrderEvent::Deleted { id }) => println!("[{}] {} {}", seq, frame.event, id),
        Err(e) => println!("[{}] {} (unreadable: {})", seq, frame.event, e),
    }
}

async fn tail(client: &FsmClient, as_json: bool) -> anyhow::Result<()> {
    let mut stream = Box::pin(client.open_event_stream().await?);
    info!("event stream open");
    let mut decoder = FrameDecoder::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("event stream failed")?;
        for frame in decoder.push(&chunk) {
            print_frame(&frame, as_json);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fsm_watch=info,fieldservice_api=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut client = FsmClient::new(&args.base_url)?;
    match (&args.token, &args.email, &args.password) {
        (Some(token), _, _) => client = client.with_token(token.clone()),
        (None, Some(email), Some(password)) => {
            let token = client
                .login(email, password)
                .await
                .context("login failed")?;
            info!(user = %token.user.email, role = %token.user.role, "logged in");
        }
        _ => bail!("pass --token, or --email together with --password"),
    }

    let retry = Duration::from_secs(args.retry_secs);
    loop {
        tokio::select! {
            result = tail(&client, args.json) => match result {
                Ok(()) => warn!("event stream closed; reopening in {:?}", retry),
                Err(e) => warn!(error = %e, "event stream error; reopening in {:?}", retry),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(retry) => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
