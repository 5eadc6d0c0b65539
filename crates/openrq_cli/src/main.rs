//! Command-line front end for OpenRQ projects.
//!
//! # Responsibility
//! - Parse one command, run it against the project engine, print the result.
//! - Surface every engine error to the operator with a non-zero exit.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use openrq_core::{
    init_logging, EngineConfig, ForestNode, GraphEngine, ItemKind, Link, PersistenceGateway,
    Point, Project,
};

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config `{}`", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.log_dir {
        config.log.dir = Some(dir.clone());
    }
    if config.log.dir.is_some() {
        init_logging(&config.log).map_err(anyhow::Error::msg)?;
    }

    let project = Project::open(&cli.project)
        .with_context(|| format!("failed to open project `{}`", cli.project.display()))?;
    let mut engine = project.engine(config)?;
    info!("event=cli_command module=cli status=start command={:?}", cli.command);

    match cli.command {
        Command::Info => {
            let store = project.store()?;
            println!("name: {}", project.name());
            println!("path: {}", project.path().display());
            println!(
                "requirements: {}",
                store.count_items(ItemKind::Requirement)?
            );
            println!("solutions: {}", store.count_items(ItemKind::Solution)?);
            println!("links: {}", engine.index().link_count());
        }
        Command::Roots => {
            let mut roots: Vec<_> = engine.roots().into_iter().collect();
            roots.sort();
            for root in roots {
                println!("{root}");
            }
        }
        Command::Tree => {
            for node in engine.forest() {
                print_node(&engine, &node, 0)?;
            }
        }
        Command::New { kind, x, y } => {
            let id = engine.create_item(kind, Point::new(x, y))?;
            println!("created {id}");
        }
        Command::Link { parent, child } => {
            let link = engine.add_link(parent, child)?;
            println!("linked {link}");
        }
        Command::Unlink { parent, child } => {
            engine.remove_link(Link::new(parent, child))?;
            println!("unlinked {parent} -> {child}");
        }
        Command::Move { id, x, y } => {
            for line in engine.move_item(id, x, y)? {
                println!(
                    "{}: ({:.1}, {:.1}) -> ({:.1}, {:.1})",
                    line.link, line.start.x, line.start.y, line.end.x, line.end.y
                );
            }
        }
        Command::Describe { id, text } => {
            engine.set_description(id, &text)?;
            println!("{id}: {}", engine.item_label(id)?);
        }
        Command::Delete { id } => {
            let report = engine.delete_item(id)?;
            println!("deleted {id} ({} links)", report.removed_links.len());
            for failure in &report.failures {
                eprintln!(
                    "warning: {} failed during cleanup: {}",
                    failure.operation, failure.error
                );
            }
        }
        Command::Member {
            solution,
            member,
            remove,
        } => {
            if remove {
                let removed = engine.remove_member(solution, member)?;
                println!("{member} removed from {solution}: {removed}");
            } else {
                engine.add_member(solution, member)?;
                println!("{member} added to {solution}");
            }
        }
    }

    Ok(())
}

fn print_node<G: PersistenceGateway>(
    engine: &GraphEngine<G>,
    node: &ForestNode,
    depth: usize,
) -> Result<()> {
    println!(
        "{}{} {}",
        "  ".repeat(depth),
        node.identity,
        engine.item_label(node.identity)?
    );
    for child in &node.children {
        print_node(engine, child, depth + 1)?;
    }
    Ok(())
}
