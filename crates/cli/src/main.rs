//! Storefront CLI - exercise the storefront backend from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the session is saved to STOREFRONT_SESSION_FILE)
//! sf-cli login -e shopper@example.com -p hunter22
//!
//! # Validate the saved session and show the user
//! sf-cli whoami
//!
//! # Work with the cart
//! sf-cli cart show
//! sf-cli cart add -p prod_123 -q 2
//!
//! # Browse the catalog
//! sf-cli products list --search mug
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_API_URL` - Backend base URL (required)
//! - `STOREFRONT_SESSION_FILE` - Session file (default: `.storefront-session.json`)
//! - `RUST_LOG` - Log filter (default: `storefront_client=info`)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(author, version, about = "Storefront command-line client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Create an account
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// Confirm an email address with the emailed token
    Verify {
        /// Verification token from the email
        token: String,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Validate the saved session and show the current user
    Whoami,
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// View and cancel orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add a product
    Add {
        #[arg(short, long)]
        product_id: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Change a line's quantity
    Update {
        /// Cart line ID
        line_id: String,

        #[arg(short, long)]
        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Cart line ID
        line_id: String,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders
    List,
    /// Show one order
    Show { id: String },
    /// Cancel an order
    Cancel { id: String },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List products
    List {
        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,

        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one product
    Show { id: String },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront_client=info")),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Login { email, password } => commands::auth::login(&email, &password).await?,
        Commands::Register {
            name,
            email,
            password,
        } => commands::auth::register(&name, &email, &password).await?,
        Commands::Verify { token } => commands::auth::verify(&token).await?,
        Commands::Logout => commands::auth::logout().await?,
        Commands::Whoami => commands::auth::whoami().await?,
        Commands::Cart { action } => match action {
            CartAction::Show => commands::shop::cart_show().await?,
            CartAction::Add {
                product_id,
                quantity,
            } => commands::shop::cart_add(&product_id, quantity).await?,
            CartAction::Update { line_id, quantity } => {
                commands::shop::cart_update(&line_id, quantity).await?;
            }
            CartAction::Remove { line_id } => commands::shop::cart_remove(&line_id).await?,
            CartAction::Clear => commands::shop::cart_clear().await?,
        },
        Commands::Orders { action } => match action {
            OrdersAction::List => commands::shop::orders_list().await?,
            OrdersAction::Show { id } => commands::shop::orders_show(&id).await?,
            OrdersAction::Cancel { id } => commands::shop::orders_cancel(&id).await?,
        },
        Commands::Products { action } => match action {
            ProductsAction::List {
                page,
                limit,
                search,
            } => commands::shop::products_list(page, limit, search).await?,
            ProductsAction::Show { id } => commands::shop::products_show(&id).await?,
        },
    }
    Ok(())
}
