//! List command for the vodka CLI.
//!
//! Displays the versions catalog grouped by category, with installed and
//! default markers. `vodka component list` shares the rendering.
//!
//! ## Usage
//!
//! ```bash
//! vodka list
//! vodka list --filter staging --page 2
//! vodka list --installed
//! vodka list --json
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Wine versions (page 1 of 1):
//!
//! Wine Stable:
//!   [✓] [*] Wine 9.0 (stable-9.0)
//!   [ ] [ ] Wine 8.0 (stable-8.0)
//!
//! ✓ = installed, * = default
//! ```

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use clap::Args;

use crate::manager::{EntryStatus, Manager};

/// Rows shown per page.
const PAGE_SIZE: usize = 10;

/// Arguments shared by `list` and `component list`.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only show entries whose name or title contains this text (case-insensitive).
    #[clap(long, short)]
    pub filter: Option<String>,

    /// Page to show, starting at 1.
    #[clap(long, short, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub page: u64,

    /// Only show installed entries.
    #[clap(long, short)]
    pub installed: bool,

    /// Print every matching entry as JSON instead of a page of text.
    #[clap(long)]
    pub json: bool,
}

/// How a listing is labelled.
pub(crate) struct Listing<'a> {
    /// Heading above the page, e.g. "Wine versions".
    pub heading: &'a str,
    /// Subcommand that produced the listing, used in the next-page hint.
    pub command: &'a str,
    /// Whether rows carry a default marker column.
    pub show_default: bool,
}

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the versions catalog cannot be loaded or the page
/// is out of range.
pub fn execute(args: &ListArgs) -> Result<()> {
    let manager = Manager::open(!args.json)?;
    let catalog = manager
        .versions_catalog()
        .context("Failed to load the versions catalog")?;
    let rows = manager.list_versions(&catalog);

    show(
        rows,
        args,
        &Listing {
            heading: "Wine versions",
            command: "list",
            show_default: true,
        },
    )
}

/// Filters, sorts and prints `rows`.
///
/// # Errors
///
/// Returns an error if the requested page does not exist or JSON encoding fails.
pub(crate) fn show(rows: Vec<EntryStatus>, args: &ListArgs, listing: &Listing<'_>) -> Result<()> {
    let rows = select(rows, args);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No entries found.");
        if args.filter.is_some() || args.installed {
            println!("Run 'vodka {}' without filters to see the whole catalog.", listing.command);
        }
        return Ok(());
    }

    let pages = rows.len().div_ceil(PAGE_SIZE);
    let page = usize::try_from(args.page).unwrap_or(usize::MAX);
    if page > pages {
        bail!("Page {page} does not exist; there are {pages} page(s).");
    }

    print!("{}", render_page(&rows, page, pages, listing));
    Ok(())
}

/// Applies `--filter` and `--installed`, then sorts by category and name.
fn select(rows: Vec<EntryStatus>, args: &ListArgs) -> Vec<EntryStatus> {
    let needle = args.filter.as_deref().map(str::to_lowercase);
    let mut rows: Vec<EntryStatus> = rows
        .into_iter()
        .filter(|row| !args.installed || row.installed)
        .filter(|row| match &needle {
            Some(needle) => {
                row.name.to_lowercase().contains(needle) || row.title.to_lowercase().contains(needle)
            }
            None => true,
        })
        .collect();
    rows.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
    rows
}

/// Renders page `page` (1-based) of `rows`.
fn render_page(rows: &[EntryStatus], page: usize, pages: usize, listing: &Listing<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (page {page} of {pages}):", listing.heading);

    let mut current_category: Option<&str> = None;
    for row in rows.iter().skip((page - 1) * PAGE_SIZE).take(PAGE_SIZE) {
        if current_category != Some(row.category.as_str()) {
            current_category = Some(row.category.as_str());
            let _ = writeln!(out);
            let _ = writeln!(out, "{}:", row.category_name);
        }

        let installed = if row.installed { "✓" } else { " " };
        if listing.show_default {
            let default = if row.is_default { "*" } else { " " };
            let _ = writeln!(out, "  [{installed}] [{default}] {} ({})", row.title, row.name);
        } else {
            let _ = writeln!(out, "  [{installed}] {} ({})", row.title, row.name);
        }
    }

    let _ = writeln!(out);
    if listing.show_default {
        let _ = writeln!(out, "✓ = installed, * = default");
    } else {
        let _ = writeln!(out, "✓ = installed");
    }
    if page < pages {
        let _ = writeln!(
            out,
            "Run 'vodka {} --page {}' to see more.",
            listing.command,
            page + 1
        );
    }
    out
}
