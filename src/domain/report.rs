//! Sales report aggregation and spreadsheet export.

use std::collections::{BTreeMap, HashMap};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::aggregates::order::{Order, PaymentMethod};
use crate::domain::value_objects::Money;

const TOP_PRODUCTS: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportPeriod {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom { from: NaiveDate, to: NaiveDate },
}

impl ReportPeriod {
    pub fn parse(period: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, ReportError> {
        match period {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "custom" => match (from, to) {
                (Some(from), Some(to)) => Ok(Self::Custom { from, to }),
                _ => Err(ReportError::MissingDates),
            },
            other => Err(ReportError::UnknownPeriod(other.to_string())),
        }
    }

    /// Inclusive day range ending today for the rolling periods.
    pub fn range(&self, today: NaiveDate) -> Result<DateRange, ReportError> {
        let back = |days: u64| today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
        let (from, to) = match *self {
            Self::Daily => (today, today),
            Self::Weekly => (back(6), today),
            Self::Monthly => (back(29), today),
            Self::Yearly => (back(364), today),
            Self::Custom { from, to } => (from, to),
        };
        if from > to { return Err(ReportError::InvertedRange); }
        Ok(DateRange { from, to })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn starts_at(&self) -> DateTime<Utc> { self.from.and_time(chrono::NaiveTime::MIN).and_utc() }

    /// First instant after the range.
    pub fn ends_before(&self) -> DateTime<Utc> {
        self.to.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX).and_time(chrono::NaiveTime::MIN).and_utc()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool { self.starts_at() <= at && at < self.ends_before() }
}

#[derive(Clone, Debug, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub orders: u32,
    pub net: Money,
}

#[derive(Clone, Debug, Serialize)]
pub struct MethodTotal {
    pub payment_method: PaymentMethod,
    pub orders: u32,
    pub net: Money,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProductSales {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub revenue: Money,
}

#[derive(Clone, Debug, Serialize)]
pub struct SalesReport {
    pub range: DateRange,
    pub order_count: u32,
    pub items_sold: u32,
    pub gross: Money,
    pub coupon_discounts: Money,
    pub offer_savings: Money,
    pub shipping: Money,
    pub tax: Money,
    pub refunds: Money,
    pub net: Money,
    pub daily: Vec<DailySales>,
    pub by_payment_method: Vec<MethodTotal>,
    pub top_products: Vec<ProductSales>,
}

/// Online orders only count once the gateway has captured the payment.
pub fn counts_as_sale(order: &Order) -> bool {
    order.payment_method() != PaymentMethod::Online || order.payment_status().is_captured()
}

impl SalesReport {
    pub fn build(range: DateRange, orders: &[Order]) -> Self {
        let mut report = Self {
            range, order_count: 0, items_sold: 0, gross: Money::ZERO, coupon_discounts: Money::ZERO,
            offer_savings: Money::ZERO, shipping: Money::ZERO, tax: Money::ZERO, refunds: Money::ZERO, net: Money::ZERO,
            daily: vec![], by_payment_method: vec![], top_products: vec![],
        };
        let mut daily: BTreeMap<NaiveDate, DailySales> = BTreeMap::new();
        let mut methods: Vec<MethodTotal> = vec![];
        let mut products: HashMap<Uuid, ProductSales> = HashMap::new();

        for order in orders.iter().filter(|o| range.contains(o.created_at()) && counts_as_sale(o)) {
            let net = order.final_amount() - order.refunded_amount();
            report.order_count += 1;
            report.gross += order.subtotal();
            report.coupon_discounts += order.coupon_discount();
            report.shipping += order.shipping_fee();
            report.tax += order.tax();
            report.refunds += order.refunded_amount();
            report.net += net;

            let day = daily.entry(order.created_at().date_naive()).or_insert_with(|| DailySales { date: order.created_at().date_naive(), orders: 0, net: Money::ZERO });
            day.orders += 1;
            day.net += net;

            match methods.iter_mut().find(|m| m.payment_method == order.payment_method()) {
                Some(m) => { m.orders += 1; m.net += net; }
                None => methods.push(MethodTotal { payment_method: order.payment_method(), orders: 1, net }),
            }

            for item in order.items().iter().filter(|i| !i.status.is_inactive()) {
                report.items_sold += item.quantity;
                report.offer_savings += item.offer_savings();
                let entry = products.entry(item.product_id).or_insert_with(|| ProductSales { product_id: item.product_id, name: item.product_name.clone(), quantity: 0, revenue: Money::ZERO });
                entry.quantity += item.quantity;
                entry.revenue += item.line_total();
            }
        }

        let mut top: Vec<ProductSales> = products.into_values().collect();
        top.sort_by(|a, b| b.quantity.cmp(&a.quantity).then(b.revenue.cmp(&a.revenue)));
        top.truncate(TOP_PRODUCTS);

        report.daily = daily.into_values().collect();
        report.by_payment_method = methods;
        report.top_products = top;
        report
    }

    /// Spreadsheet export: a summary block followed by the daily breakdown.
    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(vec![]);
        let (from, to) = (self.range.from.to_string(), self.range.to.to_string());
        wtr.write_record(["Sales report", from.as_str(), to.as_str()])?;
        for (label, value) in [
            ("Orders", self.order_count.to_string()),
            ("Items sold", self.items_sold.to_string()),
            ("Gross", self.gross.to_string()),
            ("Coupon discounts", self.coupon_discounts.to_string()),
            ("Offer savings", self.offer_savings.to_string()),
            ("Shipping", self.shipping.to_string()),
            ("Tax", self.tax.to_string()),
            ("Refunds", self.refunds.to_string()),
            ("Net", self.net.to_string()),
        ] {
            wtr.write_record([label, value.as_str()])?;
        }
        wtr.write_record([""])?;
        wtr.write_record(["Date", "Orders", "Net"])?;
        for day in &self.daily {
            wtr.write_record([day.date.to_string(), day.orders.to_string(), day.net.to_string()])?;
        }
        wtr.write_record([""])?;
        wtr.write_record(["Product", "Quantity", "Revenue"])?;
        for p in &self.top_products {
            wtr.write_record([p.name.clone(), p.quantity.to_string(), p.revenue.to_string()])?;
        }
        wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("unknown report period: {0}")]
    UnknownPeriod(String),
    #[error("custom reports need both from and to dates")]
    MissingDates,
    #[error("report start date is after its end date")]
    InvertedRange,
}
