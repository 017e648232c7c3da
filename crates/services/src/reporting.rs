//! Reporting over processed orders.
//!
//! `export_csv` is registered loggable; whether it logs depends on
//! `logged_scopes` covering `forgeerp_services::reporting`.

use anyhow::{Context, bail};

use forgeerp_observability::{
    Interceptor, InvocationPolicy, Marker, MethodSignature, checked_method_signature,
};

use crate::order::Order;

const EXPORT_CSV: MethodSignature = checked_method_signature!(ReportingService::export_csv);

#[derive(Debug, Clone)]
pub struct ReportingService {
    export_csv: Interceptor,
}

impl ReportingService {
    pub fn new(policy: &InvocationPolicy) -> Self {
        Self {
            export_csv: policy.register(EXPORT_CSV, Marker::Loggable),
        }
    }

    /// One `order_id,lines,total` row per order, with a header.
    pub fn export_csv(&self, orders: &[Order]) -> anyhow::Result<String> {
        self.export_csv.invoke(|| {
            if orders.is_empty() {
                bail!("nothing to export");
            }

            let mut csv = String::from("order_id,lines,total\n");
            for order in orders {
                let total = order
                    .total()
                    .with_context(|| format!("order {} total overflows", order.id))?;
                csv.push_str(&format!("{},{},{}\n", order.id, order.lines.len(), total));
            }
            Ok(csv)
        })
    }
}
