use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::path::PathBuf;
use tracing::info;

use storefront::config::StorefrontConfig;
use storefront::logging::init_tracing;
use storefront::Storefront;
use storefront_api::{Category, CategorySortField, SearchContents, UserShopItem};
use storefront_network::create_catalog_source;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Sync,
    Categories,
    Feed,
    Bookmarks,
    Search(String),
    Follow(i64),
    Unfollow(i64),
    Bookmark(i64),
}

#[derive(Debug, PartialEq, Eq)]
struct Args {
    config_path: Option<PathBuf>,
    command: Command,
}

const USAGE: &str = "usage: storefront [--config <path>] <sync | categories | feed | bookmarks | search <query> | follow <id> | unfollow <id> | bookmark <id>>";

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--config" || arg == "-c" {
            match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => bail!("--config needs a path\n{}", USAGE),
            }
        } else {
            positional.push(arg);
        }
    }

    let id_arg = |rest: &[String]| -> Result<i64> {
        let raw = rest.first().with_context(|| format!("missing id\n{}", USAGE))?;
        raw.parse()
            .with_context(|| format!("'{}' is not a valid id", raw))
    };

    let command = match positional.split_first() {
        Some((cmd, rest)) => match cmd.as_str() {
            "sync" => Command::Sync,
            "categories" => Command::Categories,
            "feed" => Command::Feed,
            "bookmarks" => Command::Bookmarks,
            "search" if !rest.is_empty() => Command::Search(rest.join(" ")),
            "follow" => Command::Follow(id_arg(rest)?),
            "unfollow" => Command::Unfollow(id_arg(rest)?),
            "bookmark" => Command::Bookmark(id_arg(rest)?),
            other => bail!("unknown command '{}'\n{}", other, USAGE),
        },
        None => bail!("{}", USAGE),
    };

    Ok(Args {
        config_path,
        command,
    })
}

/// Shell categories have no name until their own sync arrives.
fn category_label(category: &Category) -> String {
    if category.is_shell() {
        format!("#{} (pending)", category.id)
    } else {
        category.name.clone()
    }
}

fn print_items(items: &[UserShopItem]) {
    if items.is_empty() {
        println!("(no items)");
    }
    for item in items {
        let marker = if item.is_saved { "*" } else { " " };
        let categories = item
            .followable_categories
            .iter()
            .map(|c| category_label(&c.category))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{} {:>5}  {}  {:.2}  [{}]",
            marker,
            item.id,
            item.title,
            item.price,
            categories
        );
    }
}

async fn run(storefront: &Storefront, command: Command) -> Result<()> {
    let use_cases = storefront.use_cases();
    match command {
        Command::Sync => {
            if !storefront.sync_and_index().await {
                bail!("sync did not complete");
            }
            let versions = storefront.tracker().get_change_list_versions().await?;
            println!(
                "synced: categories at v{}, shop items at v{}",
                versions.category_version, versions.shop_item_version
            );
        }
        Command::Categories => {
            let categories = use_cases
                .get_followable_categories(CategorySortField::Name)
                .next()
                .await
                .context("category stream ended")??;
            for followable in categories {
                let marker = if followable.is_followed { "+" } else { " " };
                println!(
                    "{} {:>3}  {}",
                    marker,
                    followable.category.id,
                    category_label(&followable.category)
                );
            }
        }
        Command::Feed => {
            let items = use_cases
                .observe_followed_feed()
                .next()
                .await
                .context("feed stream ended")??;
            print_items(&items);
        }
        Command::Bookmarks => {
            let items = use_cases
                .observe_bookmarked()
                .next()
                .await
                .context("bookmark stream ended")??;
            print_items(&items);
        }
        Command::Search(query) => {
            use_cases.insert_or_replace_recent_search(&query).await?;
            let contents = use_cases
                .search_contents(query.as_str())
                .next()
                .await
                .context("search stream ended")??;
            match contents {
                SearchContents::NotReady => println!("search index not ready; run `sync` first"),
                SearchContents::Ready(result) => {
                    for followable in &result.categories {
                        println!(
                            "category {:>3}  {}",
                            followable.category.id,
                            category_label(&followable.category)
                        );
                    }
                    print_items(&result.items);
                }
            }
        }
        Command::Follow(id) => storefront.tracker().set_followed_category(id, true).await,
        Command::Unfollow(id) => storefront.tracker().set_followed_category(id, false).await,
        Command::Bookmark(id) => storefront.tracker().set_item_bookmarked(id, true).await,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    let config = match &args.config_path {
        Some(path) => StorefrontConfig::load_from_file(path)?,
        None => {
            let mut config = StorefrontConfig::default();
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config
        }
    };
    init_tracing(config.log_filter.as_deref())?;
    info!("[Main] Running {:?}", args.command);

    let source = create_catalog_source(&config.source)?;
    let storefront = Storefront::open(&config, source).await?;
    let result = run(&storefront, args.command).await;
    storefront.store().close().await;
    result
}
