use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use strata_diff::{diff_graphs, GraphDiff, PropertyChange};
use strata_store::{
    BackingStore, Branch, RevisionInfo, RevisionInfoOptions, Store, StoreConfig,
    CONFIG_FILE_NAME,
};
use strata_types::{
    BranchId, Item, ItemGraph, ItemId, Metadata, PersistentRootId, RevisionId, RevisionNumber,
};

use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let dir = cli.store.as_path();
    match cli.command {
        Command::Init(args) => cmd_init(dir, args, format),
        Command::Roots => cmd_roots(dir, format),
        Command::Log(args) => cmd_log(dir, args, format),
        Command::Show(args) => cmd_show(dir, args, format),
        Command::Graph(args) => cmd_graph(dir, args, format),
        Command::Diff(args) => cmd_diff(dir, args, format),
        Command::Heads(args) => cmd_heads(dir, args, format),
        Command::Delete(args) => cmd_delete(dir, args),
        Command::Stats(args) => cmd_stats(dir, args, format),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(dir: &Path) -> anyhow::Result<Store> {
    let config = if dir.join(CONFIG_FILE_NAME).is_file() {
        StoreConfig::load(&dir.join(CONFIG_FILE_NAME))?
    } else {
        StoreConfig::default().with_create_if_missing(false)
    };
    Store::open(dir, config).with_context(|| format!("cannot open store at {}", dir.display()))
}

/// Open the persistent root named by `args`, or the only one.
fn open_root(dir: &Path, args: &RootArgs) -> anyhow::Result<(Store, Arc<BackingStore>)> {
    let store = open_store(dir)?;
    let roots = store.persistent_roots()?;
    let root = match &args.root {
        Some(text) => find_root(&roots, text)?,
        None => match roots.as_slice() {
            [only] => *only,
            [] => bail!("store at {} has no persistent roots", dir.display()),
            _ => bail!("store has {} persistent roots; pick one with --root", roots.len()),
        },
    };
    let backing = store.backing_store(root)?;
    debug!(root = %root, dir = %dir.display(), "persistent root selected");
    Ok((store, backing))
}

/// Match a full UUID or a unique prefix of one.
fn find_root(roots: &[PersistentRootId], text: &str) -> anyhow::Result<PersistentRootId> {
    let matches: Vec<_> = roots
        .iter()
        .filter(|root| root.to_string().starts_with(text))
        .collect();
    match matches.as_slice() {
        [only] => Ok(**only),
        [] => bail!("no persistent root matches {text}"),
        _ => bail!("{text} is ambiguous: {} roots match", matches.len()),
    }
}

fn parse_revision(backing: &BackingStore, text: &str) -> anyhow::Result<RevisionNumber> {
    if let Ok(number) = text.parse::<RevisionNumber>() {
        return Ok(number);
    }
    let uuid: RevisionId = text
        .parse()
        .with_context(|| format!("{text} is neither a revision number nor a revision id"))?;
    Ok(backing.revision_number(&uuid)?)
}

fn find_branch(backing: &BackingStore, text: &str) -> anyhow::Result<Branch> {
    let branches = backing.branches()?;
    branches
        .iter()
        .find(|b| b.name.as_deref() == Some(text))
        .or_else(|| branches.iter().find(|b| b.id.to_string().starts_with(text)))
        .cloned()
        .with_context(|| format!("no branch named {text}"))
}

// ----- init -----

#[derive(Serialize)]
struct InitReport {
    root: PersistentRootId,
    root_object: ItemId,
    branch: BranchId,
    revision: RevisionNumber,
}

fn cmd_init(dir: &Path, args: InitArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    let config = if config_path.is_file() {
        StoreConfig::load(&config_path)?
    } else {
        let config = StoreConfig::default().with_shared_connection(args.shared);
        fs::create_dir_all(dir)?;
        fs::write(&config_path, config.to_toml_string()?)?;
        config
    };
    let store = Store::open(dir, config)?;

    let root_object = ItemId::new();
    let branch = BranchId::new();
    let (backing, revision) = store.create_persistent_root(
        ItemGraph::from_items(root_object, [Item::new(root_object)]),
        branch,
        Metadata::Null,
    )?;
    backing.name_branch(branch, &args.branch)?;
    let report = InitReport {
        root: backing.persistent_root(),
        root_object,
        branch,
        revision,
    };
    store.close()?;

    if format == OutputFormat::Json {
        return print_json(&report);
    }
    println!(
        "{} Initialized Strata store in {}",
        "✓".green().bold(),
        dir.display().to_string().bold()
    );
    println!("  Persistent root: {}", report.root.to_string().cyan());
    println!("  Root object:     {}", report.root_object.to_string().cyan());
    println!("  Branch:          {}", args.branch.yellow());
    Ok(())
}

// ----- roots -----

#[derive(Serialize)]
struct RootSummary {
    root: PersistentRootId,
    root_object: Option<ItemId>,
    revisions: usize,
    branches: usize,
}

fn cmd_roots(dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_store(dir)?;
    let mut summaries = Vec::new();
    for root in store.persistent_roots()? {
        let backing = store.backing_store(root)?;
        summaries.push(RootSummary {
            root,
            root_object: backing.root_object().ok(),
            revisions: backing.revision_count()?,
            branches: backing.branches()?.len(),
        });
    }

    if format == OutputFormat::Json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("No persistent roots.");
    }
    for summary in &summaries {
        println!(
            "{}  {} revisions, {} branches, root object {}",
            summary.root.to_string().yellow(),
            summary.revisions,
            summary.branches,
            summary
                .root_object
                .map(|id| id.short_id())
                .unwrap_or_else(|| "-".into())
                .cyan()
        );
    }
    Ok(())
}

// ----- log / show -----

fn cmd_log(dir: &Path, args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (_store, backing) = open_root(dir, &args.root)?;
    let mut infos = match &args.branch {
        Some(name) => {
            let branch = find_branch(&backing, name)?;
            let mut options = RevisionInfoOptions::new().with_limit(args.limit);
            if args.merges {
                options = options.with_merge_parents();
            }
            backing.revision_infos(branch.id, branch.head, options)?
        }
        None => {
            let mut all = backing.all_revision_infos()?;
            all.reverse();
            all.truncate(args.limit);
            all
        }
    };
    if args.reverse {
        infos.reverse();
    }

    if format == OutputFormat::Json {
        return print_json(&infos);
    }
    let branches = backing.branches()?;
    for info in &infos {
        if args.oneline {
            println!(
                "{} {} {}",
                format!("r{}", info.number).yellow(),
                info.uuid.short_id().dimmed(),
                info.short_description().unwrap_or("")
            );
        } else {
            print_info(info, &branches);
        }
    }
    Ok(())
}

fn print_info(info: &RevisionInfo, branches: &[Branch]) {
    let heads: Vec<String> = branches
        .iter()
        .filter(|b| b.head == info.number)
        .map(Branch::label)
        .collect();
    let heads = if heads.is_empty() {
        String::new()
    } else {
        format!("  ({})", heads.join(", ")).green().to_string()
    };
    println!(
        "{}  {}{}",
        format!("r{}", info.number).yellow().bold(),
        info.uuid.to_string().dimmed(),
        heads
    );
    let lineage = match (info.parent, info.merge_parent) {
        (Some(p), Some(m)) => format!("parents r{p} r{m}"),
        (Some(p), None) => format!("parent r{p}"),
        _ => "genesis".to_string(),
    };
    println!("  {} | {} | {}", info.commit_type, lineage, info.timestamp);
    if let Some(short) = info.short_description().filter(|s| !s.is_empty()) {
        println!("  {short}");
    }
    if let Some(long) = info.long_description().filter(|s| !s.is_empty()) {
        println!("\n  {long}");
    }
    println!();
}

#[derive(Serialize)]
struct ShowReport {
    info: RevisionInfo,
    changes: GraphDiff,
}

fn cmd_show(dir: &Path, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (_store, backing) = open_root(dir, &args.root)?;
    let number = parse_revision(&backing, &args.revision)?;
    let revision = backing.revision(number)?;
    let changes = GraphDiff {
        items: revision
            .changed_object_uuids()
            .iter()
            .filter_map(|uuid| revision.item_diff(uuid))
            .filter(|diff| !diff.is_empty())
            .collect(),
    };

    if format == OutputFormat::Json {
        return print_json(&ShowReport {
            info: revision.info().clone(),
            changes,
        });
    }
    print_info(revision.info(), &backing.branches()?);
    print_changes(&changes);
    Ok(())
}

// ----- graph / diff -----

fn cmd_graph(dir: &Path, args: GraphArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (_store, backing) = open_root(dir, &args.root)?;
    let number = parse_revision(&backing, &args.revision)?;
    let graph = backing.item_graph(number)?;

    if format == OutputFormat::Json {
        return print_json(&graph);
    }
    println!(
        "Graph at r{} ({} items, root {})",
        number,
        graph.len(),
        graph.root().short_id().cyan()
    );
    for item in graph.items() {
        let marker = if item.uuid() == graph.root() { "*" } else { " " };
        println!("{} {}", marker, item.uuid().to_string().yellow());
        for (property, value) in item.properties() {
            println!("    {property} = {value:?}");
        }
    }
    let dangling = graph.dangling_references();
    if !dangling.is_empty() {
        println!("{} dangling references:", dangling.len().to_string().red());
        for id in dangling {
            println!("    {id}");
        }
    }
    Ok(())
}

fn cmd_diff(dir: &Path, args: DiffArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (_store, backing) = open_root(dir, &args.root)?;
    let from = parse_revision(&backing, &args.from)?;
    let to = parse_revision(&backing, &args.to)?;
    let diff = diff_graphs(&backing.item_graph(from)?, &backing.item_graph(to)?);

    if format == OutputFormat::Json {
        return print_json(&diff);
    }
    if diff.is_empty() {
        println!("No changes between r{from} and r{to}.");
        return Ok(());
    }
    println!(
        "r{from}..r{to}: {} added, {} removed, {} modified",
        diff.additions().to_string().green(),
        diff.removals().to_string().red(),
        diff.modifications().to_string().yellow()
    );
    print_changes(&diff);
    Ok(())
}

fn print_changes(diff: &GraphDiff) {
    for item in &diff.items {
        println!("{} {:?}", item.uuid.to_string().bold(), item.kind);
        for change in &item.changes {
            match change {
                PropertyChange::Added { property, value } => {
                    println!("  {} {property} = {value:?}", "+".green())
                }
                PropertyChange::Removed { property, value } => {
                    println!("  {} {property} = {value:?}", "-".red())
                }
                PropertyChange::Modified { property, old, new } => {
                    println!("  {} {property}: {old:?} -> {new:?}", "~".yellow())
                }
            }
        }
    }
}

// ----- heads / delete / stats -----

fn cmd_heads(dir: &Path, args: RootArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (_store, backing) = open_root(dir, &args)?;
    let branches = backing.branches()?;
    if format == OutputFormat::Json {
        return print_json(&branches);
    }
    for branch in &branches {
        println!(
            "{}  r{}  {}",
            branch.label().yellow().bold(),
            branch.head,
            branch.id.to_string().dimmed()
        );
    }
    Ok(())
}

fn cmd_delete(dir: &Path, args: DeleteArgs) -> anyhow::Result<()> {
    let (store, backing) = open_root(dir, &args.root)?;
    let revisions = args
        .revisions
        .iter()
        .map(|text| parse_revision(&backing, text))
        .collect::<anyhow::Result<BTreeSet<_>>>()?;
    backing.delete_revisions(&revisions)?;
    store.close()?;
    println!(
        "{} Deleted {} revision(s)",
        "✓".green().bold(),
        revisions.len()
    );
    Ok(())
}

#[derive(Serialize)]
struct Stats {
    root: PersistentRootId,
    revisions: usize,
    first_revision: Option<RevisionNumber>,
    last_revision: Option<RevisionNumber>,
    branches: usize,
    storage_bytes: u64,
    snapshot_interval: u64,
}

fn cmd_stats(dir: &Path, args: RootArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (store, backing) = open_root(dir, &args)?;
    let range = backing.used_revision_range()?;
    let stats = Stats {
        root: backing.persistent_root(),
        revisions: backing.revision_count()?,
        first_revision: range.as_ref().map(|r| *r.start()),
        last_revision: range.as_ref().map(|r| *r.end()),
        branches: backing.branches()?.len(),
        storage_bytes: backing.storage_size_in_bytes()?,
        snapshot_interval: store.config().snapshot_interval,
    };

    if format == OutputFormat::Json {
        return print_json(&stats);
    }
    println!("Persistent root: {}", stats.root.to_string().cyan());
    println!("  Revisions: {}", stats.revisions.to_string().bold());
    if let (Some(first), Some(last)) = (stats.first_revision, stats.last_revision) {
        println!("  Range:     r{first}..=r{last}");
    }
    println!("  Branches:  {}", stats.branches);
    println!("  Storage:   {} bytes", stats.storage_bytes);
    println!("  Snapshots: every {} revisions", stats.snapshot_interval);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(dir: &Path, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["strata", "-C"];
        let dir = dir.to_str().unwrap();
        argv.push(dir);
        argv.extend_from_slice(args);
        run_command(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn init_then_inspect() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init"]).unwrap();
        assert!(dir.path().join(CONFIG_FILE_NAME).is_file());

        run(dir.path(), &["roots"]).unwrap();
        run(dir.path(), &["log", "-b", "main"]).unwrap();
        run(dir.path(), &["show", "0"]).unwrap();
        run(dir.path(), &["graph", "0", "--format", "json"]).unwrap();
        run(dir.path(), &["heads"]).unwrap();
        run(dir.path(), &["stats"]).unwrap();
    }

    #[test]
    fn unknown_revision_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init"]).unwrap();
        assert!(run(dir.path(), &["show", "42"]).is_err());
        assert!(run(dir.path(), &["diff", "0", "nope"]).is_err());
    }

    #[test]
    fn second_root_requires_selection() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["init"]).unwrap();
        run(dir.path(), &["init"]).unwrap();
        assert!(run(dir.path(), &["stats"]).is_err());

        let store = open_store(dir.path()).unwrap();
        let first = store.persistent_roots().unwrap()[0].to_string();
        drop(store);
        run(dir.path(), &["stats", "--root", &first[..8]]).unwrap();
    }

    #[test]
    fn missing_store_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(run(&missing, &["roots"]).is_err());
    }

    #[test]
    fn find_root_by_prefix() {
        let a = PersistentRootId::from_u128(0x1111_0000_0000_0000_0000_0000_0000_0000);
        let b = PersistentRootId::from_u128(0x2222_0000_0000_0000_0000_0000_0000_0000);
        assert_eq!(find_root(&[a, b], "1111").unwrap(), a);
        assert!(find_root(&[a, b], "3").is_err());
        assert!(find_root(&[a, b], "").is_err());
    }
}
