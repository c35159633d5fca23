/*
techpulse - command line front-end
Chat with the TechPulse backend over a WebSocket, or query headlines and search results.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::Config;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use techpulse::article::Article;
use techpulse::backend::{HeadlinesQuery, HttpNewsBackend, NewsBackend};
use techpulse::chat::{
    ContextAttachment, FileHandoff, HandoffSlot, SessionController, WsTransportFactory,
};

#[derive(Parser, Debug)]
#[command(name = "techpulse", about = "TechPulse news client")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat session
    Chat {
        /// Fetch this article and attach it as context
        #[arg(long)]
        article_id: Option<String>,
    },
    /// Latest headlines
    Headlines {
        #[arg(long, default_value = "us")]
        country: String,
        #[arg(long, default_value = "technology")]
        category: String,
        #[arg(long, default_value_t = 6)]
        limit: usize,
    },
    /// Search news
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a single article
    Article {
        id: String,
        /// Hand the article to the next chat session
        #[arg(long)]
        handoff: bool,
    },
    /// Check whether the backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = load_config(args.config).await?;
    let backend = HttpNewsBackend::from_config(&config.backend)?;

    match args.command {
        Command::Chat { article_id } => run_chat(&config, &backend, article_id).await,
        Command::Headlines {
            country,
            category,
            limit,
        } => {
            let query = HeadlinesQuery {
                country: Some(country),
                category: Some(category),
                limit: Some(limit),
            };
            let articles = backend.get_headlines(&query).await?;
            print_articles(&articles);
            Ok(())
        }
        Command::Search { query, limit } => {
            let articles = backend.search_news(&query, limit).await?;
            print_articles(&articles);
            Ok(())
        }
        Command::Article { id, handoff } => {
            let article = backend.fetch_article(&id).await?;
            print_article(&article);
            if handoff {
                FileHandoff::in_dir(config.handoff.dir()).put(&article)?;
                println!("Article handed to the next chat session.");
            }
            Ok(())
        }
        Command::Health => {
            if backend.health_check().await {
                println!("backend: ok");
                Ok(())
            } else {
                anyhow::bail!("backend at {} is not available", config.backend.base_url)
            }
        }
    }
}

async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

async fn run_chat(
    config: &Config,
    backend: &HttpNewsBackend,
    article_id: Option<String>,
) -> Result<()> {
    let handoff = FileHandoff::in_dir(config.handoff.dir());
    let mut context = ContextAttachment::from_handoff(&handoff);
    if let Some(id) = article_id {
        let article = backend
            .fetch_article(&id)
            .await
            .with_context(|| format!("Failed to load article {}", id))?;
        context.capture(article);
    }

    let factory = Arc::new(WsTransportFactory::from_config(&config.chat));
    let mut session =
        SessionController::new(factory, config.backend.credential()).with_context(context);
    if let Some(welcome) = &config.chat.welcome_message {
        session = session.with_welcome_message(welcome.clone());
    }

    if let Some(article) = session.context().consume_for_next_send() {
        println!("Context: {}", article.title);
    }
    info!(session = %session.id(), "chat session started");
    println!("Commands: /connect /context /clear /quit");
    connect(&mut session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut rendered = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "/quit" => break,
                    "/connect" => connect(&mut session),
                    "/clear" => {
                        session.context_mut().clear();
                        println!("Context cleared.");
                    }
                    "/context" => match session.context().consume_for_next_send() {
                        Some(article) => print_article(article),
                        None => println!("No article context."),
                    },
                    text => {
                        if !session.send_with_context(text) && !text.is_empty() {
                            println!("(not connected, use /connect)");
                        }
                    }
                }
            }
            Some(event) = session.next_event() => {
                session.handle_event(event);
            }
        }

        for message in session.store().since(rendered) {
            println!("{}", message);
        }
        rendered = session.store().len();
    }

    session.teardown();
    Ok(())
}

fn connect(session: &mut SessionController) {
    match session.connect() {
        Ok(()) => println!("Status: {}", session.state()),
        Err(e) => println!("Status: failed to connect ({})", e),
    }
}

fn print_articles(articles: &[Article]) {
    if articles.is_empty() {
        println!("No articles found.");
        return;
    }
    for article in articles {
        println!("[{}] {}", article.id, article.title);
        if !article.url.is_empty() {
            println!("    {}", article.url);
        }
    }
}

fn print_article(article: &Article) {
    println!("{}", article.title);
    if !article.published_at.is_empty() {
        println!("Published: {}", article.published_at);
    }
    if !article.url.is_empty() {
        println!("{}", article.url);
    }
    println!();
    println!("{}", article.summary);
}
