use std::sync::Arc;

use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;
use uuid::Uuid;

use foodiehub_core::catalog::CustomerProfile;
use foodiehub_core::money::Money;
use foodiehub_core::order::{Order, OrderCursor, OrderLine, OrderStats, StatusFilter};
use foodiehub_core::repository::{CatalogRepository, OrderRepository, ProfileRepository, StoreError};

/// A stored line as shown to administrators. Name and price are the values
/// captured at checkout.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderLineView {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl TryFrom<OrderLine> for OrderLineView {
    type Error = QueryError;

    fn try_from(line: OrderLine) -> Result<Self, Self::Error> {
        let line_total = line.line_total().ok_or(QueryError::LineTotalOverflow(line.id))?;
        Ok(Self {
            menu_item_id: line.menu_item_id,
            name: line.name,
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLineView>,
    /// `None` once the vendor has been removed from the catalog.
    pub vendor_name: Option<String>,
    pub customer: Option<CustomerProfile>,
}

struct Sources {
    orders: Arc<dyn OrderRepository>,
    catalog: Arc<dyn CatalogRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl Sources {
    async fn hydrate(&self, order: Order) -> Result<OrderDetails, QueryError> {
        let lines = self
            .orders
            .get_order_lines(order.id)
            .await?
            .into_iter()
            .map(OrderLineView::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let vendor_name = self.catalog.get_vendor(order.vendor_id).await?.map(|v| v.name);
        let customer = self.profiles.get_profile(order.customer_id).await?;

        Ok(OrderDetails {
            order,
            lines,
            vendor_name,
            customer,
        })
    }
}

/// Read side for the admin console and order lookups.
pub struct OrderQueryService {
    sources: Arc<Sources>,
    page_size: usize,
}

impl OrderQueryService {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalog: Arc<dyn CatalogRepository>,
        profiles: Arc<dyn ProfileRepository>,
        page_size: usize,
    ) -> Self {
        Self {
            sources: Arc::new(Sources {
                orders,
                catalog,
                profiles,
            }),
            page_size: page_size.max(1),
        }
    }

    pub fn list_orders(&self, filter: StatusFilter) -> OrderListing {
        OrderListing {
            sources: self.sources.clone(),
            filter,
            page_size: self.page_size,
        }
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderDetails>, QueryError> {
        match self.sources.orders.get_order(order_id).await? {
            Some(order) => Ok(Some(self.sources.hydrate(order).await?)),
            None => Ok(None),
        }
    }

    /// Dashboard figures: every order counts, only delivered ones add revenue.
    pub async fn order_stats(&self) -> Result<OrderStats, QueryError> {
        Ok(self.sources.orders.order_stats().await?)
    }
}

/// Handle to a filtered, newest-first listing. Nothing is read until the
/// stream is polled.
pub struct OrderListing {
    sources: Arc<Sources>,
    filter: StatusFilter,
    page_size: usize,
}

enum Page {
    Next(Option<OrderCursor>),
    Done,
}

impl OrderListing {
    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    /// Pages through the repository with a (created_at, id) cursor. Each call
    /// starts again from the newest order.
    pub fn stream(&self) -> BoxStream<'static, Result<OrderDetails, QueryError>> {
        let sources = self.sources.clone();
        let filter = self.filter;
        let page_size = self.page_size;

        stream::try_unfold(Page::Next(None), move |page| {
            let sources = sources.clone();
            async move { next_page(&sources, filter, page, page_size).await }
        })
        .map_ok(|details| stream::iter(details.into_iter().map(Ok::<_, QueryError>)))
        .try_flatten()
        .boxed()
    }
}

async fn next_page(
    sources: &Sources,
    filter: StatusFilter,
    page: Page,
    page_size: usize,
) -> Result<Option<(Vec<OrderDetails>, Page)>, QueryError> {
    let cursor = match page {
        Page::Next(cursor) => cursor,
        Page::Done => return Ok(None),
    };

    let orders = sources.orders.list_orders_page(filter, cursor, page_size).await?;
    let Some(last) = orders.last() else {
        return Ok(None);
    };
    let next = if orders.len() < page_size {
        Page::Done
    } else {
        Page::Next(Some(last.cursor()))
    };

    let mut details = Vec::with_capacity(orders.len());
    for order in orders {
        details.push(sources.hydrate(order).await?);
    }
    Ok(Some((details, next)))
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Line {0} total overflows")]
    LineTotalOverflow(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}
