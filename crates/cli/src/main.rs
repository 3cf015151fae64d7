//! Loka CLI - migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! loka migrate
//! loka seed crates/cli/seed/catalog.yaml
//! loka catalog add-product -c 1 -n "Kopi Toraja 250g" -p 95000 -s 40
//! loka orders list --status paid
//! loka orders mark-paid LOKA-<uuid>
//! loka dashboard
//! loka login-history purge --days 30
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Create categories and products from YAML
//! - `catalog` - Edit categories, products and stock
//! - `orders` - List orders and apply staff actions
//! - `dashboard` - Store metrics
//! - `login-history` - List or purge login records

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CommandError;
use commands::catalog::ProductArgs;
use commands::orders::OrderAction;

#[derive(Parser)]
#[command(name = "loka")]
#[command(author, version, about = "Loka operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed the catalog from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
    /// Edit the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Manage orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Show store metrics
    Dashboard {
        /// Local timezone for "today" and "this month", in hours from UTC
        #[arg(long, default_value_t = 8, allow_negative_numbers = true)]
        utc_offset_hours: i32,
    },
    /// Login history
    LoginHistory {
        #[command(subcommand)]
        action: LoginHistoryAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List categories and products
    List,
    /// Create a category
    AddCategory {
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Create a product
    AddProduct {
        /// Category ID
        #[arg(short, long)]
        category: i32,
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Price in rupiah
        #[arg(short, long)]
        price: String,
        #[arg(short, long, default_value_t = 0)]
        stock: i32,
        /// Image path
        #[arg(short, long)]
        image: Option<String>,
        /// Hide from the storefront
        #[arg(long)]
        inactive: bool,
    },
    /// Set a product's stock
    SetStock {
        /// Product ID
        #[arg(short, long)]
        product: i32,
        #[arg(short, long)]
        stock: i32,
    },
    /// Delete a category and its products
    DeleteCategory {
        /// Category ID
        #[arg(short, long)]
        id: i32,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders, newest first
    List {
        /// pending, paid, completed or cancelled
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show an order and its items
    Show { order_id: String },
    /// Confirm payment (takes stock)
    MarkPaid { order_id: String },
    /// Mark a paid order as completed
    Complete { order_id: String },
    /// Cancel an order (returns stock)
    Cancel { order_id: String },
}

#[derive(Subcommand)]
enum LoginHistoryAction {
    /// List recent logins
    List {
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Delete old records
    Purge {
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed { file } => commands::seed::catalog(&file).await,
        Commands::Catalog { action } => match action {
            CatalogAction::List => commands::catalog::list().await,
            CatalogAction::AddCategory { name, description } => {
                commands::catalog::add_category(&name, &description).await
            }
            CatalogAction::AddProduct {
                category,
                name,
                description,
                price,
                stock,
                image,
                inactive,
            } => {
                commands::catalog::add_product(ProductArgs {
                    category_id: category,
                    name,
                    description,
                    price,
                    stock,
                    image,
                    inactive,
                })
                .await
            }
            CatalogAction::SetStock { product, stock } => {
                commands::catalog::set_stock(product, stock).await
            }
            CatalogAction::DeleteCategory { id } => commands::catalog::delete_category(id).await,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List { status, limit } => {
                commands::orders::list(status.as_deref(), limit).await
            }
            OrdersAction::Show { order_id } => commands::orders::show(&order_id).await,
            OrdersAction::MarkPaid { order_id } => {
                commands::orders::apply(&order_id, OrderAction::MarkPaid).await
            }
            OrdersAction::Complete { order_id } => {
                commands::orders::apply(&order_id, OrderAction::Complete).await
            }
            OrdersAction::Cancel { order_id } => {
                commands::orders::apply(&order_id, OrderAction::Cancel).await
            }
        },
        Commands::Dashboard { utc_offset_hours } => {
            commands::dashboard::show(utc_offset_hours).await
        }
        Commands::LoginHistory { action } => match action {
            LoginHistoryAction::List { limit } => commands::login_history::list(limit).await,
            LoginHistoryAction::Purge { days } => commands::login_history::purge(days).await,
        },
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
