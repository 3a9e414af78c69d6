use std::fs;
use std::io;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use serde::Serialize;

use chainscript_ledger::{
    Block, BlockHash, ChainValidator, StoryId, StoryReader, StoryRegistry, StoryWriter,
    ValidationReport,
};
use chainscript_lineage::resolve_lineage;

use crate::cli::*;
use crate::config::load_config;
use crate::store::Store;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let store = Store::new(cli.store);
    if let Command::Init(args) = &cli.command {
        return cmd_init(&store, args);
    }

    let config = load_config(cli.config.as_deref())?;
    let registry = store.load(config)?;
    let out = Output(cli.format);

    match cli.command {
        Command::Init(_) => Ok(()),
        Command::CreateStory(args) => {
            cmd_create_story(&registry, &out, args)?;
            store.save(&registry)
        }
        Command::Submit(args) => {
            cmd_submit(&registry, &out, args)?;
            store.save(&registry)
        }
        Command::Verify(args) => {
            cmd_verify(&registry, &out, args)?;
            store.save(&registry)
        }
        Command::List => cmd_list(&registry, &out),
        Command::Chain(args) => cmd_chain(&registry, &out, args),
        Command::Pending(args) => cmd_pending(&registry, &out, args),
        Command::Text(args) => cmd_text(&registry, &out, args),
        Command::Validate(args) => cmd_validate(&registry, &out, args),
        Command::Lineage => cmd_lineage(&registry, &out),
    }
}

struct Output(OutputFormat);

impl Output {
    fn is_json(&self) -> bool {
        self.0 == OutputFormat::Json
    }

    fn json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn cmd_init(store: &Store, args: &InitArgs) -> anyhow::Result<()> {
    store.init(args.force)?;
    println!(
        "{} Initialized story store in {}",
        "✓".green().bold(),
        store.path().display().to_string().bold()
    );
    Ok(())
}

fn cmd_create_story(
    registry: &StoryRegistry,
    out: &Output,
    args: CreateStoryArgs,
) -> anyhow::Result<StoryId> {
    let parent_story = args
        .parent_story
        .as_deref()
        .map(|arg| resolve_story(registry, arg))
        .transpose()?;
    let parent_block = args
        .parent_block
        .as_deref()
        .map(|arg| resolve_finalized(registry, arg))
        .transpose()?;

    let id = registry.create_story(&args.title, parent_story, parent_block)?;
    let record = registry.get_story(&id)?;

    if out.is_json() {
        out.json(&record.summary())?;
    } else {
        println!("{} Created story {}", "✓".green().bold(), args.title.bold());
        println!("  Id: {}", id.to_string().cyan());
        if let Some(parent) = &record.parent_story_id {
            println!("  Parent story: {}", parent.to_string().cyan());
        }
        if let Some(point) = record.parent_block_hash {
            println!("  Branch point: {}", point.short_hex().yellow());
        }
    }
    Ok(id)
}

fn cmd_submit(registry: &StoryRegistry, out: &Output, args: SubmitArgs) -> anyhow::Result<Block> {
    let story = resolve_story(registry, &args.story)?;
    let branch_from = args
        .branch_from
        .as_deref()
        .map(|arg| resolve_finalized(registry, arg))
        .transpose()?;

    let passage = match &args.file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading passage from {}", path.display()))?,
        None => io::read_to_string(io::stdin()).context("reading passage from stdin")?,
    };

    let block = registry.submit_passage(&story, &passage, &args.author, branch_from)?;

    if out.is_json() {
        out.json(&block)?;
    } else {
        println!(
            "{} Passage submitted ({} words), awaiting {} verifications",
            "✓".green().bold(),
            block.word_count(),
            registry.config().verification_threshold
        );
        println!("  Block: {}", block.hash().to_hex().yellow());
    }
    Ok(block)
}

fn cmd_verify(registry: &StoryRegistry, out: &Output, args: VerifyArgs) -> anyhow::Result<()> {
    let story = resolve_story(registry, &args.story)?;
    let block = resolve_in_story(registry, &story, &args.block)?;
    let outcome = registry.verify_block(&story, &block, &args.verifier)?;

    if out.is_json() {
        return out.json(&outcome);
    }
    match outcome.index {
        Some(index) if outcome.finalized => println!(
            "{} Block {} finalized at index {}",
            "✓".green().bold(),
            block.short_hex().yellow(),
            index
        ),
        _ => println!(
            "{} Verification recorded for {} ({}/{})",
            "✓".green(),
            block.short_hex().yellow(),
            outcome.verification_count,
            registry.config().verification_threshold
        ),
    }
    Ok(())
}

fn cmd_list(registry: &StoryRegistry, out: &Output) -> anyhow::Result<()> {
    let summaries = registry.summaries()?;
    if out.is_json() {
        return out.json(&summaries);
    }
    if summaries.is_empty() {
        println!("No stories.");
    }
    for summary in &summaries {
        println!(
            "{}  {}  {} blocks, {} pending",
            summary.id.to_string().cyan(),
            summary.title.bold(),
            summary.chain_length,
            summary.pending_count
        );
    }
    Ok(())
}

fn cmd_chain(registry: &StoryRegistry, out: &Output, args: StoryArgs) -> anyhow::Result<()> {
    let story = resolve_story(registry, &args.story)?;
    let chain = registry.get_chain(&story)?;
    if out.is_json() {
        return out.json(&chain);
    }
    if chain.is_empty() {
        println!("No finalized blocks.");
    }
    for block in &chain {
        print_block(block);
    }
    Ok(())
}

fn cmd_pending(registry: &StoryRegistry, out: &Output, args: StoryArgs) -> anyhow::Result<()> {
    let story = resolve_story(registry, &args.story)?;
    let pending = registry.get_pending(&story)?;
    if out.is_json() {
        return out.json(&pending);
    }
    if pending.is_empty() {
        println!("No pending blocks.");
    }
    for block in &pending {
        print_block(block);
    }
    Ok(())
}

fn cmd_text(registry: &StoryRegistry, out: &Output, args: StoryArgs) -> anyhow::Result<()> {
    let story = resolve_story(registry, &args.story)?;
    let text = registry.story_text(&story)?;
    if out.is_json() {
        return out.json(&serde_json::json!({ "story_id": story, "text": text }));
    }
    println!("{text}");
    Ok(())
}

fn cmd_validate(registry: &StoryRegistry, out: &Output, args: ValidateArgs) -> anyhow::Result<()> {
    let reports = match &args.story {
        Some(arg) => {
            let story = resolve_story(registry, arg)?;
            vec![ChainValidator::validate_story(registry, &story)?]
        }
        None => registry.validate_all()?,
    };

    let digest = registry.snapshot()?.digest()?;
    if out.is_json() {
        let rows: Vec<_> = reports.iter().map(report_json).collect();
        out.json(&serde_json::json!({ "digest": digest, "stories": rows }))?;
    } else {
        for report in &reports {
            print_report(report);
        }
        println!("Store digest: {}", digest.to_hex().dimmed());
    }

    let failed = reports.iter().filter(|r| !r.is_valid()).count();
    if failed > 0 {
        bail!("integrity check failed for {failed} of {} stories", reports.len());
    }
    Ok(())
}

fn cmd_lineage(registry: &StoryRegistry, out: &Output) -> anyhow::Result<()> {
    let lineage = resolve_lineage(&registry.snapshot()?);
    if out.is_json() {
        return out.json(&lineage);
    }
    if lineage.is_empty() {
        println!("No stories.");
    }
    for (depth, node) in lineage.walk() {
        let marker = if depth == 0 { "*" } else { "└─" };
        println!(
            "{}{} {} {}",
            "  ".repeat(depth),
            marker,
            node.title.bold(),
            node.story_id.short_id().dimmed()
        );
    }
    for warning in &lineage.warnings {
        println!("{} {}", "!".yellow().bold(), warning.to_string().yellow());
    }
    Ok(())
}

fn print_block(block: &Block) {
    println!(
        "{} #{}  {}  by {}",
        block.hash().short_hex().yellow().bold(),
        block.index(),
        format!("{:?}", block.status()).to_lowercase().green(),
        block.author()
    );
    println!(
        "  {} words, {} verification(s), timestamp {}",
        block.word_count(),
        block.verification_count(),
        block.timestamp()
    );
}

fn print_report(report: &ValidationReport) {
    match &report.corruption {
        None => println!(
            "{} {} ({}): {} blocks valid",
            "✓".green().bold(),
            report.title.bold(),
            report.story_id.short_id(),
            report.chain_length
        ),
        Some(corruption) => println!(
            "{} {} ({}): {} at index {}",
            "✗".red().bold(),
            report.title.bold(),
            report.story_id.short_id(),
            corruption.reason.to_string().red(),
            corruption.at_index
        ),
    }
}

fn report_json(report: &ValidationReport) -> serde_json::Value {
    serde_json::json!({
        "story_id": report.story_id,
        "title": report.title,
        "chain_length": report.chain_length,
        "pending_count": report.pending_count,
        "valid": report.is_valid(),
        "corruption": report.corruption.as_ref().map(|c| serde_json::json!({
            "at_index": c.at_index,
            "reason": c.reason.to_string(),
        })),
    })
}

/// Full story id, or a prefix matching exactly one story.
fn resolve_story(registry: &StoryRegistry, arg: &str) -> anyhow::Result<StoryId> {
    if let Ok(id) = arg.parse::<StoryId>() {
        return Ok(id);
    }
    let ids = registry.story_ids()?;
    unique_match(ids.into_iter(), |id| id.to_string().starts_with(arg))
        .ok_or_else(|| anyhow!("no unique story matches `{arg}`"))
}

/// Block inside `story`, by full hash or unique prefix.
fn resolve_in_story(
    registry: &StoryRegistry,
    story: &StoryId,
    arg: &str,
) -> anyhow::Result<BlockHash> {
    if let Ok(hash) = arg.parse::<BlockHash>() {
        return Ok(hash);
    }
    let record = registry.get_story(story)?;
    let hashes = record.pending.keys().copied().chain(record.chain.iter().map(Block::hash));
    unique_match(hashes, |hash| hash.to_hex().starts_with(arg))
        .ok_or_else(|| anyhow!("no unique block in story {story} matches `{arg}`"))
}

/// Finalized block anywhere in the registry, by full hash or unique prefix.
fn resolve_finalized(registry: &StoryRegistry, arg: &str) -> anyhow::Result<BlockHash> {
    if let Ok(hash) = arg.parse::<BlockHash>() {
        return Ok(hash);
    }
    let index = registry.snapshot()?.hash_index();
    unique_match(index.into_keys(), |hash| hash.to_hex().starts_with(arg))
        .ok_or_else(|| anyhow!("no unique finalized block matches `{arg}`"))
}

fn unique_match<T>(candidates: impl Iterator<Item = T>, matches: impl Fn(&T) -> bool) -> Option<T> {
    let mut found = candidates.filter(|c| matches(c));
    let first = found.next()?;
    match found.next() {
        Some(_) => None,
        None => Some(first),
    }
}
