//! Aura storefront CLI.
//!
//! # Usage
//!
//! ```bash
//! aura products
//! aura login -e ada@example.com
//! aura cart add 65f1c0ab --qty 2
//! aura quote
//! aura checkout --name "Ada Obi" --phone "0803 123 4567" \
//!     --address "12 Allen Avenue" --city Ikeja --state Lagos
//! aura orders
//! aura retry-order          # place an order that was paid but not saved
//! ```
//!
//! State (tokens, cart, favorites, theme, unplaced orders) is kept in the platform data
//! directory, so it survives between invocations.

#![cfg_attr(not(test), forbid(unsafe_code))]

mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use aura_client::{
    AppContext, CheckoutError, CheckoutFlow, CheckoutOutcome, ClientConfig, ClientError,
};
use aura_core::{
    CartItem, DailyUsage, DeliveryInfo, NewReview, Order, OrderStatus, Theme, User,
};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing::error;
use tracing_subscriber::EnvFilter;

use terminal::{prompt, ConsoleNavigator, ConsoleNotifier, TerminalGateway};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "aura")]
#[command(author, version, about = "Aura storefront client")]
struct Cli {
    /// Path to client.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the catalog
    Products,
    /// Show one product with its reviews
    Product { id: String },
    /// Sign in
    Login {
        #[arg(short, long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign out and clear the cart and favorites
    Logout,
    /// Show the signed-in user
    Me,
    /// Inspect or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Inspect or change favorites
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Price the cart for the signed-in user
    Quote,
    /// Pay for the cart and place the order
    Checkout {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        state: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Place the order for a payment that went through but was not saved
    RetryOrder {
        /// Forget the unplaced order instead of retrying it
        #[arg(long)]
        discard: bool,
    },
    /// List your orders
    Orders,
    /// Cancel one of your orders
    Cancel { id: String },
    /// Review a product
    Review {
        product_id: String,
        #[arg(short, long)]
        rating: u8,
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// Vote for a new mix
    Vote {
        product_id: String,
        #[arg(short, long)]
        comment: Option<String>,
    },
    /// List notifications
    Notifications,
    /// Show or set the colour theme
    Theme { value: Option<String> },
    /// Back-office commands
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    Show,
    Add {
        product_id: String,
        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    Remove {
        product_id: String,
    },
    Set {
        product_id: String,
        /// Zero or less removes the line
        #[arg(allow_negative_numbers = true)]
        qty: i64,
    },
    Clear,
}

#[derive(Subcommand)]
enum FavoritesAction {
    Show,
    Toggle { product_id: String },
}

#[derive(Subcommand)]
enum AdminAction {
    Stats,
    Users,
    Orders,
    /// Move an order to another status
    Status { id: String, status: String },
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Command failed: {e}");
        if let Some(client_error) = e.downcast_ref::<ClientError>() {
            eprintln!("{}", client_error.user_message());
            if client_error.is_transient() {
                eprintln!("This is usually temporary; run the command again.");
            }
        } else if let Some(checkout_error) = e.downcast_ref::<CheckoutError>() {
            eprintln!("{}", checkout_error.user_message());
            if matches!(
                checkout_error,
                CheckoutError::OrderPending { .. } | CheckoutError::OrderCreation { .. }
            ) {
                eprintln!("Run `aura retry-order` to place it.");
            }
        } else {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}

/// Logs go to stderr so command output stays pipeable.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - Default: `info,aura=debug,reqwest=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,aura=debug,reqwest=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = ClientConfig::load_or_default(cli.config);
    let mut ctx = AppContext::open(config, Arc::new(ConsoleNavigator))?;

    match cli.command {
        Commands::Products => {
            for product in ctx.api().list_products().await? {
                let stock = if product.in_stock() { "" } else { "  (out of stock)" };
                println!("{:<26} {:<32} {:>14}{}", product.id, product.name, product.price, stock);
            }
        }
        Commands::Product { id } => {
            let product = ctx.api().get_product(&id).await?;
            println!("{}  {}", product.name, product.price);
            if let Some(description) = &product.description {
                println!("{}", description);
            }
            for review in ctx.api().list_reviews(&product.id).await? {
                println!(
                    "  {}/5  {}  {}",
                    review.rating,
                    review.user_name.as_deref().unwrap_or("anonymous"),
                    review.comment.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt("Password: ")?,
            };
            let user = ctx.login(&email, &SecretString::from(password)).await?;
            println!("Signed in as {} ({})", user.name, user.role);
        }
        Commands::Logout => {
            ctx.logout().await;
            println!("Signed out");
        }
        Commands::Me => {
            let user = require_session(&mut ctx).await?;
            println!("{} <{}>  role: {}", user.name, user.email, user.role);
            if let Some(code) = &user.referral.code {
                println!("referral code {} used {} times", code, user.referral.count);
            }
        }
        Commands::Cart { action } => cart(&mut ctx, action).await?,
        Commands::Favorites { action } => match action {
            FavoritesAction::Show => {
                for id in ctx.favorites().favorites().iter() {
                    println!("{}", id);
                }
            }
            FavoritesAction::Toggle { product_id } => {
                if ctx.favorites_mut().toggle(&product_id) {
                    println!("Added {} to favorites", product_id);
                } else {
                    println!("Removed {} from favorites", product_id);
                }
            }
        },
        Commands::Quote => {
            let usage = todays_usage(&mut ctx).await?;
            let quote = ctx.quote(usage);
            println!("bottles   {} ({} bundles)", quote.bottles, quote.bundles);
            println!("subtotal  {}", quote.subtotal);
            println!("delivery  {}", quote.delivery_fee);
            println!("total     {}", quote.total);
            if let Some(violation) = &quote.limit_violation {
                println!();
                println!("{}", violation);
            }
        }
        Commands::Checkout {
            name,
            phone,
            address,
            city,
            state,
            notes,
        } => {
            let usage = todays_usage(&mut ctx).await?;
            let delivery = DeliveryInfo {
                full_name: name,
                phone,
                address,
                city,
                state,
                notes,
                location: None,
            };
            let mut flow = CheckoutFlow::new(Arc::new(TerminalGateway), Arc::new(ConsoleNotifier));
            match flow.run(&mut ctx, delivery, usage).await? {
                CheckoutOutcome::Placed(order) => print_order(&order),
                CheckoutOutcome::Cancelled => println!("Checkout cancelled"),
            }
        }
        Commands::RetryOrder { discard } => {
            let reference = match ctx.pending_order() {
                Some(order) => order.payment_reference.clone(),
                None => {
                    println!("No unplaced order");
                    return Ok(());
                }
            };
            let mut flow = CheckoutFlow::new(Arc::new(TerminalGateway), Arc::new(ConsoleNotifier));
            if discard {
                flow.reset(&mut ctx)?;
                println!("Discarded the order for payment {}", reference);
            } else if let CheckoutOutcome::Placed(order) = flow.retry_order(&mut ctx).await? {
                print_order(&order);
            }
        }
        Commands::Orders => {
            for order in ctx.api().my_orders().await? {
                print_order(&order);
            }
        }
        Commands::Cancel { id } => {
            ctx.cancel_order(&id).await?;
            println!("Order {} cancelled", id);
        }
        Commands::Review {
            product_id,
            rating,
            comment,
        } => {
            let review = NewReview {
                product_id,
                rating,
                comment,
            };
            ctx.api().create_review(&review).await?;
            println!("Thanks for your review");
        }
        Commands::Vote {
            product_id,
            comment,
        } => {
            let user = require_session(&mut ctx).await?.clone();
            if let Some(vote) = ctx.api().my_vote(&user.id).await? {
                println!("You already voted for {}", vote.mix_name);
                return Ok(());
            }
            ctx.api()
                .vote_for_product(&product_id, comment.as_deref())
                .await?;
            println!("Vote recorded");
        }
        Commands::Notifications => {
            for notification in ctx.api().list_notifications().await? {
                let marker = if notification.read { " " } else { "*" };
                println!("{} {}  {}", marker, notification.title, notification.message);
            }
        }
        Commands::Theme { value } => {
            if let Some(value) = value {
                let theme: Theme = value.parse()?;
                ctx.preferences_mut().set_theme(theme);
            }
            println!("{:?}", ctx.preferences().theme());
        }
        Commands::Admin { action } => admin(&ctx, action).await?,
    }

    Ok(())
}

async fn cart(ctx: &mut AppContext, action: CartAction) -> CliResult<()> {
    match action {
        CartAction::Show => {}
        CartAction::Add { product_id, qty } => {
            let product = ctx.api().get_product(&product_id).await?;
            if !product.in_stock() {
                return Err(format!("{} is out of stock", product.name).into());
            }
            ctx.cart_mut().add(CartItem::from_product(&product, qty))?;
        }
        CartAction::Remove { product_id } => {
            if !ctx.cart_mut().remove(&product_id) {
                println!("{} was not in the cart", product_id);
            }
        }
        CartAction::Set { product_id, qty } => ctx.cart_mut().set_quantity(&product_id, qty)?,
        CartAction::Clear => ctx.cart_mut().clear(),
    }

    let cart = ctx.cart().cart();
    if cart.is_empty() {
        println!("Your cart is empty");
        return Ok(());
    }
    for item in cart.items() {
        println!(
            "{:<26} {:<32} {:>3} × {:>12} = {:>14}",
            item.id,
            item.name,
            item.quantity,
            item.price,
            item.line_total()
        );
    }
    println!("{} items, {}", cart.count(), cart.total());
    Ok(())
}

async fn admin(ctx: &AppContext, action: AdminAction) -> CliResult<()> {
    let api = ctx.api();
    match action {
        AdminAction::Stats => {
            let stats = api.admin_stats().await?;
            println!("users           {}", stats.total_users);
            println!("orders          {}", stats.total_orders);
            println!("pending orders  {}", stats.pending_orders);
            println!("revenue         {}", stats.revenue);
        }
        AdminAction::Users => {
            for user in api.admin_users().await? {
                println!("{:<26} {:<24} {:<32} {}", user.id, user.name, user.email, user.role);
            }
        }
        AdminAction::Orders => {
            for order in api.admin_orders().await? {
                print_order(&order);
            }
        }
        AdminAction::Status { id, status } => {
            let status: OrderStatus =
                serde_json::from_value(serde_json::Value::String(status.to_lowercase()))?;
            api.update_order_status(&id, status).await?;
            println!("Order {} is now {}", id, status);
        }
    }
    Ok(())
}

/// Restores the session from stored tokens or fails with a login hint.
async fn require_session(ctx: &mut AppContext) -> CliResult<&User> {
    match ctx.bootstrap().await? {
        Some(user) => Ok(user),
        None => Err(ClientError::SessionExpired.into()),
    }
}

/// Today's usage for signed-in users; nothing for guests.
async fn todays_usage(ctx: &mut AppContext) -> CliResult<DailyUsage> {
    if ctx.bootstrap().await?.is_none() {
        return Ok(DailyUsage::default());
    }
    Ok(ctx.daily_usage().await?)
}

/// Units across all lines of an order as the server reported them.
fn unit_count(order: &Order) -> u32 {
    order
        .items
        .iter()
        .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
}

fn print_order(order: &Order) {
    let lines = unit_count(order);
    println!(
        "{:<26} {:<11} {:>3} items  {:>14}  {}",
        order.id,
        order.status,
        lines,
        order.total,
        order.created_at.format("%Y-%m-%d %H:%M")
    );
}
