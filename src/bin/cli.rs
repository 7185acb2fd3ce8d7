use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use homehub_groceries::{
    config::Config, server, ApiClient, GroceryItem, GroceryListView, ItemUpdate,
};

#[derive(Parser)]
#[command(name = "groceries")]
#[command(
    about = "Live-synchronized grocery list: snapshot over HTTP, updates over WebSocket",
    version
)]
struct Cli {
    /// Backend origin, e.g. http://localhost:5000
    #[arg(long, global = true, value_name = "URL")]
    origin: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the groceries server
    Serve {
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// SQLite database path
        #[arg(long, default_value = "groceries.db")]
        db: PathBuf,
    },

    /// Print the current list once
    List,

    /// Add an item (prompts for a name when omitted)
    Add {
        name: Option<String>,

        #[arg(short, long)]
        quantity: Option<u32>,
    },

    /// Toggle an item's checked flag
    Check { id: i64 },

    /// Remove an item
    Remove { id: i64 },

    /// Live view: render the list and re-render on every pushed change
    Watch,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Watch);

    match command {
        Commands::Serve { port, db } => {
            println!(
                "{}",
                format!("🌐 Starting groceries server on port {}...", port)
                    .cyan()
                    .bold()
            );
            server::start(port, db).await?;
        }

        Commands::List => {
            let api = ApiClient::new(Config::resolve(cli.origin.as_deref())?)?;
            let items = api.fetch_snapshot().await?;
            render_list(&items);
        }

        Commands::Add { name, quantity } => {
            let name = match name {
                Some(name) => name,
                None => prompt_name()?,
            };
            let name = name.trim().to_string();
            if name.is_empty() {
                println!("{}", "Nothing to add.".yellow());
                return Ok(());
            }

            let api = ApiClient::new(Config::resolve(cli.origin.as_deref())?)?;
            let item = api.create_item(&name, quantity).await?;
            println!(
                "{} Added {} {}",
                "✓".green(),
                item.label().bright_cyan().bold(),
                format!("(id {})", item.id).bright_black()
            );
        }

        Commands::Check { id } => {
            let api = ApiClient::new(Config::resolve(cli.origin.as_deref())?)?;
            let snapshot = api.fetch_snapshot().await?;
            let Some(item) = snapshot.into_iter().find(|item| item.id == id) else {
                println!("{}", format!("No item with id {}", id).yellow());
                return Ok(());
            };

            let update = ItemUpdate {
                checked: Some(!item.checked),
                ..Default::default()
            };
            let updated = api.update_item(id, &update).await?;
            let mark = if updated.checked { "☑" } else { "☐" };
            println!("{} {} {}", "✓".green(), mark, updated.label());
        }

        Commands::Remove { id } => {
            let api = ApiClient::new(Config::resolve(cli.origin.as_deref())?)?;
            api.delete_item(id).await?;
            println!(
                "{} Removed item {}",
                "✓".green(),
                id.to_string().bright_yellow()
            );
        }

        Commands::Watch => {
            let config = Config::resolve(cli.origin.as_deref())?;
            println!(
                "{} {}",
                "👀 Watching".cyan().bold(),
                config.origin().as_str().bright_blue()
            );
            println!("{}", "Ctrl-C to stop.".bright_black());

            let view = GroceryListView::attach(config).await?;
            let mut rx = view.watch();
            render_list(rx.borrow().items());

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = rx.borrow().clone();
                        render_list(state.items());
                    }
                }
            }

            view.close().await;
            println!("{}", "✓ Channel closed".green());
        }
    }

    Ok(())
}

fn prompt_name() -> Result<String> {
    print!("Item name: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line)
}

fn render_list(items: &[GroceryItem]) {
    println!("{}", "🛒 Groceries".cyan().bold());
    println!("{}", "─".repeat(40).bright_black());

    if items.is_empty() {
        println!("{}", "No items yet.".yellow());
        println!(
            "  {} {}",
            "Add one with".bright_black(),
            "groceries-cli add <name>".bright_white()
        );
        return;
    }

    for item in items {
        let id = format!("(id {})", item.id).bright_black();
        if item.checked {
            println!(
                "{} {} {}",
                "✔".green(),
                item.label().bright_black().strikethrough(),
                id
            );
        } else {
            println!("{} {} {}", "●".bright_green(), item.label(), id);
        }
    }
}
