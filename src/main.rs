use anyhow::Context;
use clap::Parser;

mod app;
mod auth;
mod bookmarks;
mod cli;
mod config;
mod enrich;
mod ids;
mod providers;
mod rag;
mod store;
#[cfg(test)]
mod tests;
mod web;

use app::AppFactory;
use bookmarks::parse_tags;
use config::Config;
use ids::OwnerId;
use rag::AskRequest;
use store::{CandidateStore, LocalStore, BOOKMARK_LIST_LIMIT};

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hypermemo=info".into());

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn owner_or_anon(owner: Option<String>, config: &Config) -> OwnerId {
    owner
        .map(OwnerId::from)
        .unwrap_or_else(|| OwnerId::from(config.auth.anon_owner.as_str()))
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = cli::Args::parse();

    let paths = AppFactory::get_paths()?;
    let mut config = AppFactory::create_config(&paths)?;

    match args.command {
        cli::Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.listen_addr.clone());
            let auth = AppFactory::create_authenticator(&config)?;
            let engine = AppFactory::create_engine(&config, &paths)?;

            web::start_daemon(web::SharedState::new(engine, auth), addr)
        }

        cli::Command::Ask {
            question,
            tags,
            owner,
            top_k,
        } => {
            if let Some(top_k) = top_k {
                config.query.top_k = top_k;
                config.query.candidate_count = config.query.candidate_count.max(top_k);
                config.validate()?;
            }

            let owner = owner_or_anon(owner, &config);
            let engine = AppFactory::create_engine(&config, &paths)?;
            let request = AskRequest {
                question,
                tags: tags.as_deref().map(parse_tags).unwrap_or_default(),
                scope: vec![],
            };

            let response = runtime()?
                .block_on(engine.ask(&owner, request))?
                .into_response();

            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }

        cli::Command::Tags { owner } => {
            let owner = owner_or_anon(owner, &config);
            let store = LocalStore::load(&paths.corpus_path)?;

            for tag in runtime()?.block_on(store.tags(&owner))? {
                println!("{tag}");
            }
            Ok(())
        }

        cli::Command::Bookmarks { owner } => {
            let owner = owner_or_anon(owner, &config);
            let store = LocalStore::load(&paths.corpus_path)?;

            let listed = runtime()?.block_on(store.list_bookmarks(&owner, BOOKMARK_LIST_LIMIT))?;
            println!("{}", serde_json::to_string_pretty(&listed)?);
            Ok(())
        }
    }
}
