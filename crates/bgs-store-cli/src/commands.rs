//! Subcommand implementations
//!
//! Every command writes one JSON object per line to `out`.

use std::io::Write;

use anyhow::Context;
use bgs_core::{GameId, RoomId, UserId};
use bgs_storage::{
    ApiErrorLog, ChatLog, DocumentStore, GameInfoStore, StoreConfig, provision_all,
};
use serde_json::{Value, json};
use tracing::info;

use crate::cli::{Command, GlobalArgs};

/// Effective configuration: the `--config` file (or defaults) with `--db` applied
pub fn resolve_config(global: &GlobalArgs) -> anyhow::Result<StoreConfig> {
    let mut config = match &global.config {
        Some(path) => {
            StoreConfig::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => StoreConfig::default(),
    };
    if let Some(db) = &global.db {
        config.db_path = db.clone();
    }
    Ok(config)
}

/// Open the database; only `provision` may create a new one
pub fn open_store(command: &Command, config: &StoreConfig) -> anyhow::Result<DocumentStore> {
    if *command != Command::Provision && !config.db_path.exists() {
        anyhow::bail!(
            "no database at {}; run `bgs-store provision` first",
            config.db_path.display()
        );
    }
    DocumentStore::open(config.storage())
        .with_context(|| format!("opening {}", config.db_path.display()))
}

pub fn run(
    command: &Command,
    store: &DocumentStore,
    config: &StoreConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match command {
        Command::Provision => provision(store, config, out),
        Command::Stats => stats(store, out),
        Command::Indexes { collection } => indexes(store, collection, out),
        Command::TailChat { room, limit } => tail_chat(store, room, *limit, out),
        Command::TailErrors { user, limit } => tail_errors(store, user, *limit, out),
        Command::LatestGame { game } => latest_game(store, game, out),
    }
}

fn write_line(out: &mut impl Write, value: &Value) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn provision(store: &DocumentStore, config: &StoreConfig, out: &mut impl Write) -> anyhow::Result<()> {
    provision_all(store, &config.capacities).context("provisioning collections")?;
    info!(path = %config.db_path.display(), "Store ready");
    stats(store, out)
}

fn stats(store: &DocumentStore, out: &mut impl Write) -> anyhow::Result<()> {
    for meta in store.list_collections()? {
        let stats = store.collection::<Value>(&meta.name)?.stats()?;
        write_line(
            out,
            &json!({
                "collection": meta.name,
                "capped": meta.options.capped,
                "size": meta.options.size,
                "max": meta.options.max,
                "count": stats.count,
                "bytes": stats.bytes,
                "evicted": stats.evicted,
            }),
        )?;
    }
    Ok(())
}

fn indexes(store: &DocumentStore, collection: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let meta = store
        .metadata(collection)
        .with_context(|| format!("collection {collection}"))?;
    for spec in &meta.indexes {
        let fields: Vec<Value> = spec
            .fields()
            .iter()
            .map(|f| json!({ "path": f.path, "order": f.order.as_i8() }))
            .collect();
        write_line(out, &json!({ "name": spec.name(), "fields": fields }))?;
    }
    Ok(())
}

fn tail_chat(store: &DocumentStore, room: &str, limit: usize, out: &mut impl Write) -> anyhow::Result<()> {
    let room = RoomId::new(room)?;
    for stored in ChatLog::open(store)?.recent_in_room(&room, limit)? {
        write_line(out, &json!({ "id": stored.id, "message": stored.document }))?;
    }
    Ok(())
}

fn tail_errors(store: &DocumentStore, user: &str, limit: usize, out: &mut impl Write) -> anyhow::Result<()> {
    let user = UserId::new(user)?;
    for stored in ApiErrorLog::open(store)?.recent_for_user(&user, limit)? {
        write_line(out, &json!({ "id": stored.id, "error": stored.document }))?;
    }
    Ok(())
}

fn latest_game(store: &DocumentStore, game: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let game = GameId::new(game)?;
    match GameInfoStore::open(store)?.latest(&game)? {
        Some(info) => write_line(out, &serde_json::to_value(info)?),
        None => anyhow::bail!("no published version of {game}"),
    }
}
