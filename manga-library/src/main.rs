use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::path::PathBuf;

use manga_library::{BackendKind, CollectionService, StorageConfig};
use shared::{ItemQuery, ItemStatus, LibraryItem, SortOrder, WishlistItem};

/// Manga library and wishlist manager
#[derive(Debug, Parser)]
#[command(name = "manga-library", version, about)]
struct Cli {
    /// Storage backend: text (csv) or relational (sqlite)
    #[arg(long, global = true, env = "MANGA_STORAGE")]
    storage: Option<String>,

    /// Directory holding the collection files [default: ~/.manga_library]
    #[arg(long, global = true, env = "MANGA_LIBRARY_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List library items, or the wishlist with --wishlist
    List {
        #[arg(long)]
        wishlist: bool,
        /// Case-insensitive part of the title
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        /// Library only
        #[arg(long)]
        status: Option<ItemStatus>,
        #[arg(long, value_enum, default_value_t = Order::Title)]
        order: Order,
    },
    /// Add an item to the library
    Add {
        title: String,
        #[command(flatten)]
        details: Details,
        #[arg(long, default_value = "owned")]
        status: ItemStatus,
    },
    /// Add an item to the wishlist
    Wish {
        title: String,
        #[command(flatten)]
        details: Details,
        /// Lower values are wanted sooner
        #[arg(long, default_value_t = 0)]
        priority: u32,
    },
    /// Change fields of an existing library or wishlist item
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        details: Details,
        #[arg(long)]
        status: Option<ItemStatus>,
        #[arg(long)]
        priority: Option<u32>,
    },
    /// Remove a library or wishlist item
    Remove { id: String },
    /// Move a wishlist item into the library
    Move {
        id: String,
        #[arg(long, default_value = "owned")]
        status: ItemStatus,
    },
    /// Print both collections as JSON
    Export,
    /// Copy every record into another backend
    Migrate {
        /// Target backend: text (csv) or relational (sqlite)
        #[arg(long)]
        to: BackendKind,
        /// Target directory, defaults to the current data directory
        #[arg(long)]
        target_dir: Option<PathBuf>,
    },
}

/// Optional descriptive fields shared by add, wish and edit
#[derive(Debug, clap::Args)]
struct Details {
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    genre: Option<String>,
    #[arg(long)]
    volume: Option<u32>,
    /// Publication year
    #[arg(long)]
    year: Option<u32>,
    #[arg(long)]
    notes: Option<String>,
    /// Path or key of the cover image
    #[arg(long)]
    cover: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Order {
    Title,
    CreatedAt,
    Priority,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::Title => SortOrder::Title,
            Order::CreatedAt => SortOrder::CreatedAt,
            Order::Priority => SortOrder::Priority,
        }
    }
}

impl Details {
    fn apply_to_library(self, mut item: LibraryItem) -> LibraryItem {
        if let Some(author) = self.author {
            item.author = author;
        }
        if let Some(genre) = self.genre {
            item.genre = genre;
        }
        if let Some(volume) = self.volume {
            item.volume = Some(volume);
        }
        if let Some(year) = self.year {
            item.year = Some(year);
        }
        if let Some(notes) = self.notes {
            item.notes = notes;
        }
        if let Some(cover) = self.cover {
            item.cover_image_ref = Some(cover);
        }
        item
    }

    fn apply_to_wishlist(self, mut item: WishlistItem) -> WishlistItem {
        if let Some(author) = self.author {
            item.author = author;
        }
        if let Some(genre) = self.genre {
            item.genre = genre;
        }
        if let Some(volume) = self.volume {
            item.volume = Some(volume);
        }
        if let Some(year) = self.year {
            item.year = Some(year);
        }
        if let Some(notes) = self.notes {
            item.notes = notes;
        }
        if let Some(cover) = self.cover {
            item.cover_image_ref = Some(cover);
        }
        item
    }
}

fn print_library(items: &[LibraryItem]) {
    for item in items {
        println!(
            "{}\t{}{}\t{}\t{}\t{}",
            item.id,
            item.title,
            year_suffix(item.year),
            item.author,
            item.volume.map(|v| v.to_string()).unwrap_or_default(),
            item.status
        );
    }
}

fn print_wishlist(items: &[WishlistItem]) {
    for item in items {
        println!(
            "{}\t{}{}\t{}\t{}\tpriority {}",
            item.id,
            item.title,
            year_suffix(item.year),
            item.author,
            item.volume.map(|v| v.to_string()).unwrap_or_default(),
            item.priority
        );
    }
}

fn year_suffix(year: Option<u32>) -> String {
    year.map(|y| format!(" ({})", y)).unwrap_or_default()
}

fn is_wishlist_id(id: &str) -> bool {
    id.starts_with("wishlist::")
}

/// `--status` belongs to library items and `--priority` to wishlist items
fn check_edit_flags(id: &str, status: Option<ItemStatus>, priority: Option<u32>) -> Result<()> {
    if is_wishlist_id(id) {
        if status.is_some() {
            bail!("--status only applies to library items, {} is on the wishlist", id);
        }
    } else if priority.is_some() {
        bail!("--priority only applies to wishlist items, {} is in the library", id);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = StorageConfig::resolve(cli.storage.as_deref(), cli.data_dir)
        .context("invalid storage configuration")?;
    let service = CollectionService::open(config).await?;

    match cli.command {
        Command::List {
            wishlist,
            title,
            genre,
            status,
            order,
        } => {
            let query = ItemQuery {
                title_contains: title,
                genre,
                status,
                order: order.into(),
            };
            if wishlist {
                print_wishlist(&service.wishlist().query(&query).await?);
            } else {
                print_library(&service.library().query(&query).await?);
            }
        }
        Command::Add {
            title,
            details,
            status,
        } => {
            let item = details.apply_to_library(LibraryItem::new(title).with_status(status));
            service.library().add(&item).await?;
            println!("{}", item.id);
        }
        Command::Wish {
            title,
            details,
            priority,
        } => {
            let item = details.apply_to_wishlist(WishlistItem::new(title).with_priority(priority));
            service.wishlist().add(&item).await?;
            println!("{}", item.id);
        }
        Command::Edit {
            id,
            title,
            details,
            status,
            priority,
        } => {
            check_edit_flags(&id, status, priority)?;
            if is_wishlist_id(&id) {
                let mut item = service.wishlist().get(&id).await?;
                if let Some(title) = title {
                    item.title = title;
                }
                if let Some(priority) = priority {
                    item.priority = priority;
                }
                service.wishlist().update(&details.apply_to_wishlist(item)).await?;
            } else {
                let mut item = service.library().get(&id).await?;
                if let Some(title) = title {
                    item.title = title;
                }
                if let Some(status) = status {
                    item.status = status;
                }
                service.library().update(&details.apply_to_library(item)).await?;
            }
        }
        Command::Remove { id } => {
            if is_wishlist_id(&id) {
                service.wishlist().delete(&id).await?;
            } else {
                service.library().delete(&id).await?;
            }
        }
        Command::Move { id, status } => {
            let item = service.move_wishlist_to_library(&id, status).await?;
            println!("{}", item.id);
        }
        Command::Export => {
            let snapshot = service.export_snapshot().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Migrate { to, target_dir } => {
            let data_dir = target_dir.unwrap_or_else(|| service.config().data_dir.clone());
            let report = service.migrate_to(StorageConfig::new(to, data_dir)).await?;
            info!("Migration finished: {:?}", report);
            println!(
                "Copied {} library and {} wishlist items from {} to {}",
                report.library, report.wishlist, report.source, report.target
            );
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_rejects_flags_of_the_other_collection() {
        assert!(check_edit_flags("wishlist::1", Some(ItemStatus::Reading), None).is_err());
        assert!(check_edit_flags("library::1", None, Some(2)).is_err());

        assert!(check_edit_flags("wishlist::1", None, Some(2)).is_ok());
        assert!(check_edit_flags("library::1", Some(ItemStatus::Reading), None).is_ok());
    }

    #[test]
    fn test_edit_flags_parse() {
        let cli = Cli::try_parse_from([
            "manga-library",
            "edit",
            "wishlist::1",
            "--priority",
            "3",
            "--year",
            "1994",
        ])
        .unwrap();

        match cli.command {
            Command::Edit {
                priority, details, ..
            } => {
                assert_eq!(priority, Some(3));
                assert_eq!(details.year, Some(1994));
            }
            other => panic!("expected edit, got {:?}", other),
        }
    }
}
