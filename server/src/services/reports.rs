use std::sync::Arc;

use serde::Serialize;

use crate::models::{Page, Paginated, SalesTotals, Ticket, TicketFilter, TicketStatus};
use crate::store::TicketStore;
use crate::utils::error::AppError;

/// Global totals plus one page of the purchased tickets behind them. The
/// totals never depend on the page.
#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub event_id: Option<i64>,
    #[serde(flatten)]
    pub totals: SalesTotals,
    pub tickets: Paginated<Ticket>,
}

/// Read-only rollups over purchased tickets. Cancelled tickets never count.
pub struct ReportAggregator {
    tickets: Arc<dyn TicketStore>,
}

impl ReportAggregator {
    pub fn new(tickets: Arc<dyn TicketStore>) -> Self {
        Self { tickets }
    }

    pub async fn summary(&self, page: Page) -> Result<SalesReport, AppError> {
        self.report(None, page).await
    }

    pub async fn event_report(&self, event_id: i64, page: Page) -> Result<SalesReport, AppError> {
        self.report(Some(event_id), page).await
    }

    async fn report(&self, event_id: Option<i64>, page: Page) -> Result<SalesReport, AppError> {
        let totals = self.tickets.sales_totals(event_id).await?;
        let filter = TicketFilter {
            event_id,
            status: Some(TicketStatus::Purchased),
            ..Default::default()
        };
        let (tickets, total_items) = self.tickets.list(&filter, page).await?;

        Ok(SalesReport {
            event_id,
            totals,
            tickets: Paginated::new(tickets, total_items, page),
        })
    }
}
