use clap::Parser;
use linkshelf::config::{Cli, Command, Config};
use linkshelf::feed::{FeedSubscriber, JoinOutcome, tag_topic};
use linkshelf::model::{Bookmark, CHAT_EVENT, ChatMessage};
use linkshelf::render::{render_chat, render_event};
use linkshelf::submit::BookmarkSubmitter;
use serde_json::Value;
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // .env may feed ${VAR} references in the config file
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!("linkshelf starting");

    let cfg = Config::resolve(args.config_path.as_deref()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?args.config_path, "failed to load config file");
        std::process::exit(1);
    });

    let code = match args.command {
        Command::Submit {
            title,
            url,
            description,
            tags,
            private,
        } => {
            let bookmark = Bookmark::new(title, url)
                .with_description(description)
                .with_tags(tags)
                .with_public(!private);
            submit(&cfg, bookmark).await
        }
        Command::Watch { tag } => {
            let topic = tag.map(|t| tag_topic(&t)).unwrap_or_else(|| cfg.feed.topic.clone());
            watch(&cfg, &topic).await
        }
    };

    std::process::exit(code);
}

async fn submit(cfg: &Config, bookmark: Bookmark) -> i32 {
    let submitter = match BookmarkSubmitter::from_config(cfg) {
        Ok(submitter) => submitter,
        Err(e) => {
            tracing::error!(error = %e, "failed to build http client");
            return 1;
        }
    };

    let outcome = submitter.submit(&bookmark).await;
    println!("{}", outcome.status_message());

    if outcome.is_success() {
        tokio::time::sleep(submitter.dismiss_delay()).await;
        0
    } else {
        1
    }
}

enum Session {
    Cancelled,
    Rejected,
    Dropped,
}

async fn watch(cfg: &Config, topic: &str) -> i32 {
    let cancellation_token = CancellationToken::new();

    let ctrl_c_token = cancellation_token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl+c signal received, shutting down");
            ctrl_c_token.cancel();
        }
    });

    loop {
        match follow(cfg, topic, &cancellation_token).await {
            Session::Cancelled => return 0,
            Session::Rejected => return 1,
            Session::Dropped => {}
        }

        println!("Connection lost. Reconnecting...");
        tokio::select! {
            _ = tokio::time::sleep(cfg.feed.reconnect_delay()) => {}
            _ = cancellation_token.cancelled() => return 0,
        }
    }
}

async fn follow(cfg: &Config, topic: &str, cancellation_token: &CancellationToken) -> Session {
    let endpoint = cfg.socket_endpoint();
    let subscriber = FeedSubscriber::connect(&endpoint, topic, cfg.feed.heartbeat_interval());

    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber.forward_to(tx);
    subscriber.channel().on(CHAT_EVENT, print_chat);

    let joined = tokio::select! {
        result = subscriber.join() => result,
        _ = cancellation_token.cancelled() => return Session::Cancelled,
    };

    match joined {
        Ok(JoinOutcome::Joined(_)) => println!("Connected to {} for topic {}", endpoint, topic),
        Ok(JoinOutcome::Rejected(reason)) => {
            println!("Unable to join {}: {}", topic, reason);
            return Session::Rejected;
        }
        Err(e) => {
            tracing::warn!(error = %e, topic = %topic, "join did not complete");
            return Session::Dropped;
        }
    }

    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => println!("{}", render_event(&event)),
                None => return Session::Dropped,
            },
            _ = subscriber.socket().closed() => return Session::Dropped,
            _ = cancellation_token.cancelled() => return Session::Cancelled,
        }
    }
}

fn print_chat(payload: &Value) {
    match serde_json::from_value::<ChatMessage>(payload.clone()) {
        Ok(msg) => println!("{}", render_chat(&msg)),
        Err(e) => tracing::warn!(error = %e, "malformed chat message"),
    }
}
