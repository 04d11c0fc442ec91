use std::path::Path;

use anyhow::{bail, Context as _};
use chatmark_fingerprint::{compute_fingerprint, FINGERPRINT_TEXT_LEN};
use chatmark_sdk::{
    parse_import, Annotation, Chatmark, ClearOutcome, CollectionKey, ImportDocument, Item,
    MarkerColor, ResolutionSummary,
};
use chatmark_store::StoreConfig;
use chatmark_types::scan_items;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli::*;

/// One message of a transcript file.
#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    role: String,
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedRow<'a> {
    id: &'a str,
    note: &'a str,
    tier: Option<chatmark_sdk::MatchTier>,
    ordinal: Option<u32>,
    missing: bool,
}

struct Context {
    chatmark: Chatmark,
    format: OutputFormat,
}

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).await?;
    debug!(store = %cli.store.display(), prefix = %config.key_prefix, "opening store");
    let ctx = Context {
        chatmark: Chatmark::open_file(&cli.store, &config)?,
        format: cli.format,
    };

    match cli.command {
        Command::Key(args) => cmd_key(&ctx, args),
        Command::List(_) => cmd_list(&ctx).await,
        Command::Show(args) => cmd_show(&ctx, args).await,
        Command::Annotate(args) => cmd_annotate(&ctx, args).await,
        Command::Resolve(args) => cmd_resolve(&ctx, args).await,
        Command::Export(args) => cmd_export(&ctx, args).await,
        Command::Import(args) => cmd_import(&ctx, args).await,
        Command::Delete(args) => cmd_delete(&ctx, args).await,
        Command::Clear(args) => cmd_clear(&ctx, args).await,
        Command::Fingerprint(args) => cmd_fingerprint(&ctx, args),
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let Some(path) = path else {
        return Ok(StoreConfig::default());
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = StoreConfig::from_toml_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

async fn read_transcript(path: &Path) -> anyhow::Result<Vec<Item>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading transcript {}", path.display()))?;
    let entries: Vec<TranscriptEntry> = serde_json::from_str(&text)
        .with_context(|| format!("transcript {} is not a [{{role, text}}] array", path.display()))?;
    Ok(scan_items(entries.into_iter().map(|e| (e.role, e.text))))
}

impl Context {
    /// Accept either a namespaced key or a page path.
    fn key(&self, input: &str) -> CollectionKey {
        if self.chatmark.store().keys().owns(input) {
            CollectionKey::new(input)
        } else {
            self.chatmark.key_for(input)
        }
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_annotation(a: &Annotation) {
    let tag = a
        .tag
        .as_deref()
        .map(|t| format!(" #{t}"))
        .unwrap_or_default();
    println!(
        "  {} [{}]{} {}",
        a.id.as_str().yellow(),
        a.color.as_str().cyan(),
        tag.magenta(),
        a.note
    );
    println!(
        "      {} {}",
        a.reference.role.dimmed(),
        a.reference.snippet().unwrap_or("").dimmed()
    );
}

fn cmd_key(ctx: &Context, args: KeyArgs) -> anyhow::Result<()> {
    let key = ctx.chatmark.key_for(&args.path);
    if ctx.json() {
        return print_json(&serde_json::json!({ "path": args.path, "key": key }));
    }
    println!("{}", key.as_str().bold());
    Ok(())
}

async fn cmd_list(ctx: &Context) -> anyhow::Result<()> {
    let summaries = ctx.chatmark.registry().summaries().await?;
    if ctx.json() {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No collections.");
        return Ok(());
    }
    for s in &summaries {
        let updated = s
            .last_updated
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".into());
        println!(
            "{}  {} annotations  {}",
            s.key.as_str().yellow(),
            s.count.to_string().bold(),
            updated.dimmed()
        );
    }
    Ok(())
}

async fn cmd_show(ctx: &Context, args: ShowArgs) -> anyhow::Result<()> {
    let key = ctx.key(&args.key);
    let session = ctx.chatmark.session(key.clone()).await?;
    if ctx.json() {
        return print_json(&session.annotations());
    }
    println!("{} ({} annotations)", key.as_str().bold(), session.len());
    for a in session.annotations() {
        print_annotation(a);
    }
    Ok(())
}

async fn cmd_annotate(ctx: &Context, args: AnnotateArgs) -> anyhow::Result<()> {
    let color: MarkerColor = args.color.parse()?;
    let items = read_transcript(&args.transcript).await?;
    let Some(item) = items.iter().find(|i| i.ordinal == args.ordinal) else {
        bail!(
            "transcript has {} items; ordinal {} is out of range",
            items.len(),
            args.ordinal
        );
    };

    let mut session = ctx.chatmark.session(ctx.key(&args.key)).await?;
    let (id, report) = session.annotate(item, args.note, args.tag, color).await?;
    if ctx.json() {
        return print_json(&serde_json::json!({
            "id": id,
            "key": report.key,
            "bytes": report.bytes,
            "overSoftLimit": report.over_soft_limit,
        }));
    }
    println!("{} Added {} to {}", "✓".green().bold(), id.as_str().yellow(), report.key);
    if report.over_soft_limit {
        println!("  {} collection is large; consider exporting and pruning", "!".yellow());
    }
    Ok(())
}

async fn cmd_resolve(ctx: &Context, args: ResolveArgs) -> anyhow::Result<()> {
    let items = read_transcript(&args.transcript).await?;
    let session = ctx.chatmark.session(ctx.key(&args.key)).await?;
    let resolved = session.resolve(&items);
    let summary = ResolutionSummary::from_tiers(resolved.iter().map(|r| r.tier));

    if ctx.json() {
        let rows: Vec<ResolvedRow<'_>> = resolved
            .iter()
            .map(|r| ResolvedRow {
                id: r.annotation.id.as_str(),
                note: &r.annotation.note,
                tier: r.tier,
                ordinal: r.item.map(|i| i.ordinal),
                missing: r.missing,
            })
            .collect();
        return print_json(&serde_json::json!({ "summary": summary, "annotations": rows }));
    }

    for r in &resolved {
        match (r.item, r.tier) {
            (Some(item), Some(tier)) => println!(
                "  {} -> #{} {} ({})",
                r.annotation.id.as_str().yellow(),
                item.ordinal,
                item.role.dimmed(),
                tier.to_string().cyan()
            ),
            _ => println!(
                "  {} -> {}",
                r.annotation.id.as_str().yellow(),
                "missing".red().bold()
            ),
        }
    }
    println!(
        "{} resolved, {} missing",
        (summary.total() - summary.missing).to_string().green(),
        summary.missing.to_string().red()
    );
    Ok(())
}

async fn cmd_export(ctx: &Context, args: ExportArgs) -> anyhow::Result<()> {
    let registry = ctx.chatmark.registry();
    let (text, count) = match &args.key {
        Some(k) => {
            let export = registry.export_one(&ctx.key(k)).await?;
            (serde_json::to_string_pretty(&export)?, export.markers.len())
        }
        None => {
            let bundle = registry.export_all().await?;
            (serde_json::to_string_pretty(&bundle)?, bundle.annotation_count())
        }
    };

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, text)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "{} Exported {} annotations to {}",
                "✓".green().bold(),
                count,
                path.display().to_string().bold()
            );
        }
        None => println!("{text}"),
    }
    Ok(())
}

async fn cmd_import(ctx: &Context, args: ImportArgs) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("reading {}", args.file.display()))?;
    let parsed = parse_import(&text)?;
    if let (ImportDocument::Bundle { .. }, Some(_)) = (&parsed.document, &args.into) {
        eprintln!("{} --into is ignored for multi-collection files", "!".yellow());
    }
    let target = args.into.as_deref().map(|k| ctx.key(k));
    let report = ctx.chatmark.registry().import(parsed, target.as_ref()).await?;

    if ctx.json() {
        return print_json(&report);
    }
    println!(
        "{} Imported {} annotations into {} collections",
        "✓".green().bold(),
        report.added.to_string().bold(),
        report.collections_changed.len()
    );
    if report.duplicates > 0 {
        println!("  {} already present", report.duplicates);
    }
    if report.skipped > 0 {
        println!("  {} incomplete records skipped", report.skipped.to_string().yellow());
    }
    for key in &report.over_soft_limit {
        println!("  {} {} is over the soft size limit", "!".yellow(), key);
    }
    Ok(())
}

async fn cmd_delete(ctx: &Context, args: DeleteArgs) -> anyhow::Result<()> {
    let registry = ctx.chatmark.registry();
    for input in &args.keys {
        let key = ctx.key(input);
        registry.delete(&key).await?;
        if !ctx.json() {
            println!("Deleted {}", key.as_str().yellow());
        }
    }
    if ctx.json() {
        let keys: Vec<CollectionKey> = args.keys.iter().map(|k| ctx.key(k)).collect();
        return print_json(&serde_json::json!({ "deleted": keys }));
    }
    Ok(())
}

async fn cmd_clear(ctx: &Context, args: ClearArgs) -> anyhow::Result<()> {
    if !args.yes {
        bail!("refusing to delete every collection without --yes");
    }
    let cleared = match ctx.chatmark.registry().clear_all().await? {
        ClearOutcome::NothingToClear => 0,
        ClearOutcome::Cleared { collections } => collections,
    };
    if ctx.json() {
        return print_json(&serde_json::json!({ "cleared": cleared }));
    }
    if cleared == 0 {
        println!("Nothing to clear.");
    } else {
        println!("{} Cleared {} collections", "✓".green().bold(), cleared);
    }
    Ok(())
}

fn cmd_fingerprint(ctx: &Context, args: FingerprintArgs) -> anyhow::Result<()> {
    let fp = compute_fingerprint(&args.role, &args.text);
    if ctx.json() {
        return print_json(&serde_json::json!({
            "role": args.role,
            "fingerprint": fp,
            "prefixLen": FINGERPRINT_TEXT_LEN,
        }));
    }
    println!("{}", fp.as_str().bold());
    Ok(())
}
