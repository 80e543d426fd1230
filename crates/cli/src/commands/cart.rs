//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! woodmoon cart add --id 12 --name "Teak Stool" --price 4500 --size M -q 2
//! woodmoon cart remove --id 12 --size M
//! woodmoon cart list
//! woodmoon cart clear
//! ```

use clap::Subcommand;
use rust_decimal::Decimal;
use woodmoon_core::{Price, ProductId};
use woodmoon_storefront::error::{AppError, Result};
use woodmoon_storefront::state::AppState;
use woodmoon_storefront::stores::CartLineItem;

#[derive(Subcommand)]
pub enum CartAction {
    /// Add a product to the cart (merges with a matching line)
    Add {
        /// Product ID
        #[arg(long)]
        id: ProductId,

        /// Product name
        #[arg(short, long)]
        name: String,

        /// Unit price in LKR
        #[arg(short, long)]
        price: Decimal,

        /// Selected size
        #[arg(short, long)]
        size: Option<String>,

        /// Selected color
        #[arg(short, long)]
        color: Option<String>,

        /// Quantity to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Image URL shown for the line
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Remove the line matching product, size and color
    Remove {
        /// Product ID
        #[arg(long)]
        id: ProductId,

        /// Selected size
        #[arg(short, long)]
        size: Option<String>,

        /// Selected color
        #[arg(short, long)]
        color: Option<String>,
    },
    /// List the cart contents
    List,
    /// Remove every line from the cart
    Clear,
}

/// Run a cart subcommand against the resolved cart.
///
/// # Errors
///
/// Returns an error if the arguments describe an invalid line.
pub fn run(state: &AppState, action: CartAction) -> Result<()> {
    let resolver = state.user_cart();
    let cart = resolver.resolve();

    match action {
        CartAction::Add {
            id,
            name,
            price,
            size,
            color,
            quantity,
            image_url,
        } => {
            if price.is_sign_negative() {
                return Err(AppError::BadRequest(format!("price must not be negative: {price}")));
            }
            let mut item = line(id, name, price, size, color).with_quantity(quantity);
            if let Some(url) = image_url {
                item = item.with_image_url(url);
            }
            tracing::info!("Adding {} x {} to cart", item.quantity.max(1), item.name);
            cart.add_to_cart(item);
            list(state);
        }
        CartAction::Remove { id, size, color } => {
            let target = line(id, String::new(), Decimal::ZERO, size, color);
            let before = cart.line_count();
            cart.remove_from_cart(&target);
            if cart.line_count() == before {
                tracing::info!("No matching line in cart");
            } else {
                tracing::info!("Removed product {} from cart", id);
            }
        }
        CartAction::List => list(state),
        CartAction::Clear => {
            cart.clear_cart();
            tracing::info!("Cart cleared");
        }
    }
    Ok(())
}

fn line(
    id: ProductId,
    name: String,
    price: Decimal,
    size: Option<String>,
    color: Option<String>,
) -> CartLineItem {
    let mut item = CartLineItem::new(id, name, price);
    item.selected_size = size;
    item.selected_color = color;
    item
}

fn list(state: &AppState) {
    let cart = state.cart();
    if cart.is_empty() {
        tracing::info!("Cart is empty");
        return;
    }

    for item in cart.items() {
        let variant = [item.selected_size.as_deref(), item.selected_color.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(
            "  [{}] {}{} x{} = {}",
            item.id,
            item.name,
            if variant.is_empty() {
                String::new()
            } else {
                format!(" ({variant})")
            },
            item.quantity,
            Price::lkr(item.line_total())
        );
    }
    tracing::info!(
        "{} item(s), subtotal {}",
        cart.item_count(),
        cart.subtotal()
    );
}
