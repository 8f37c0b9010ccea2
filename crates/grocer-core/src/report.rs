//! # Sales Report
//!
//! Owner totals over DELIVERED orders. Pending, selected and cancelled
//! orders never count as sales.
//!
//! ```text
//! delivered orders ──► summary     Σ subtotal, Σ discount, Σ VAT, Σ total
//!                  └─► by product  Σ grams, Σ line totals, highest revenue first
//! ```
//!
//! Per-product revenue is the sum of line totals, before order-level
//! discounts and VAT.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::quantity::Quantity;
use crate::types::{Order, OrderStatus};

/// Sales of one product across delivered orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSales {
    pub product_id: String,
    pub product_name: String,
    pub quantity: Quantity,
    pub revenue: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesReport {
    pub delivered_orders: u32,
    pub subtotal: Money,
    pub discount: Money,
    pub vat: Money,
    /// What customers paid, VAT included.
    pub total: Money,
    /// Highest revenue first; ties by name.
    pub by_product: Vec<ProductSales>,
}

impl SalesReport {
    /// Builds the report from orders, skipping any that are not DELIVERED.
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut report = SalesReport::default();
        let mut products: HashMap<&str, ProductSales> = HashMap::new();

        for order in orders {
            if order.status != OrderStatus::Delivered {
                continue;
            }
            report.delivered_orders += 1;
            report.subtotal += order.subtotal();
            report.discount += order.discount();
            report.vat += order.vat();
            report.total += order.total();

            for line in &order.lines {
                let entry = products
                    .entry(line.product_id.as_str())
                    .or_insert_with(|| ProductSales {
                        product_id: line.product_id.clone(),
                        product_name: line.product_name.clone(),
                        quantity: Quantity::zero(),
                        revenue: Money::zero(),
                    });
                entry.quantity += line.quantity;
                entry.revenue += line.line_total;
                // Same name choice as the SQL report: MAX(product_name).
                if line.product_name > entry.product_name {
                    entry.product_name = line.product_name.clone();
                }
            }
        }

        report.by_product = products.into_values().collect();
        sort_by_revenue(&mut report.by_product);
        report
    }

    /// The `n` best-selling products.
    pub fn top_products(&self, n: usize) -> &[ProductSales] {
        &self.by_product[..n.min(self.by_product.len())]
    }

    pub fn is_empty(&self) -> bool {
        self.delivered_orders == 0
    }
}

pub fn sort_by_revenue(products: &mut [ProductSales]) {
    products.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{AppliedDiscounts, PriceBreakdown};
    use crate::types::{OrderLine, Rate};
    use chrono::{TimeZone, Utc};

    fn line(id: &str, kilos: i64, cents: i64) -> OrderLine {
        let quantity = Quantity::from_kilograms(kilos);
        let unit_price = Money::from_cents(cents);
        OrderLine {
            product_id: id.to_string(),
            product_name: id.to_string(),
            quantity,
            unit_price,
            line_total: unit_price.times_quantity(quantity),
        }
    }

    fn order(id: &str, status: OrderStatus, lines: Vec<OrderLine>) -> Order {
        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
        let vat = subtotal.apply_rate(Rate::from_percent(18));
        let at = Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap();
        Order {
            id: id.to_string(),
            customer_id: "alice".to_string(),
            carrier_id: Some("carrier-a".to_string()),
            status,
            order_time: at,
            requested_delivery: at,
            delivery_time: None,
            pricing: PriceBreakdown {
                subtotal,
                discount_percent: Rate::zero(),
                discount: Money::zero(),
                after_discount: subtotal,
                vat,
                total: subtotal + vat,
            },
            discounts: AppliedDiscounts::default(),
            lines,
        }
    }

    #[test]
    fn test_only_delivered_orders_count() {
        let orders = vec![
            order("o-1", OrderStatus::Delivered, vec![line("potato", 4, 500), line("onion", 2, 250)]),
            order("o-2", OrderStatus::Delivered, vec![line("onion", 6, 250)]),
            order("o-3", OrderStatus::Cancelled, vec![line("garlic", 1, 1000)]),
            order("o-4", OrderStatus::Pending, vec![line("potato", 10, 500)]),
        ];

        let report = SalesReport::from_orders(&orders);

        assert_eq!(report.delivered_orders, 2);
        assert_eq!(report.subtotal, Money::from_cents(4000));
        assert_eq!(report.vat, Money::from_cents(720));
        assert_eq!(report.total, Money::from_cents(4720));

        let names: Vec<&str> = report.by_product.iter().map(|p| p.product_name.as_str()).collect();
        assert_eq!(names, vec!["onion", "potato"]);
        assert_eq!(report.by_product[0].quantity, Quantity::from_kilograms(8));
        assert_eq!(report.by_product[0].revenue, Money::from_cents(2000));
        assert_eq!(report.by_product[1].revenue, Money::from_cents(2000));
        assert_eq!(report.top_products(1).len(), 1);
        assert_eq!(report.top_products(10).len(), 2);
    }

    #[test]
    fn test_no_sales() {
        let none: Vec<Order> = Vec::new();
        let report = SalesReport::from_orders(&none);
        assert!(report.is_empty());
        assert_eq!(report.total, Money::zero());
        assert!(report.by_product.is_empty());
    }
}
