use std::{fmt::Debug, sync::Arc, time::Duration};

use chrono::Utc;
use log::*;

use crate::{
    db_types::{Order, OrderId, OrderMetadata, OrderStatusType, PaymentMethod},
    helpers::{is_valid_email, new_provider_reference, normalize_phone, ReferenceGenerator},
    keys::KeySchema,
    pricing::{PriceTable, Quote},
    providers::{PaymentRequest, ProviderAdapterError, ProviderAdapters},
    records::{indices, orders},
    spg_api::{
        errors::{OrderFlowError, ValidationError},
        order_objects::NewOrderRequest,
    },
    traits::{Expiry, KeyValueStore, StoreError},
};

pub const DEFAULT_ORDER_TTL: Duration = Duration::from_secs(900);
/// How many times the whole creation flow is retried when a write loses a uniqueness race.
const MAX_ORDER_ATTEMPTS: usize = 3;
/// How many candidate references are tried before giving up on a rail.
const MAX_REFERENCE_ATTEMPTS: usize = 8;

/// The checked, derived parts of a [`NewOrderRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub quote: Quote,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// `OrderFlowApi` is the order factory. It validates a request, asks the rail's provider to open a payment and
/// persists the pending order together with the indices that let callbacks find it again.
pub struct OrderFlowApi<S> {
    store: S,
    keys: KeySchema,
    prices: PriceTable,
    adapters: ProviderAdapters,
    order_ttl: Duration,
    references: ReferenceGenerator,
}

impl<S> Debug for OrderFlowApi<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi (ttl {:?})", self.order_ttl)
    }
}

impl<S> OrderFlowApi<S> {
    pub fn new(store: S, keys: KeySchema, prices: PriceTable, adapters: ProviderAdapters) -> Self {
        Self { store, keys, prices, adapters, order_ttl: DEFAULT_ORDER_TTL, references: Arc::new(new_provider_reference) }
    }

    pub fn with_order_ttl(mut self, ttl: Duration) -> Self {
        self.order_ttl = ttl;
        self
    }

    pub fn with_reference_generator(mut self, generator: ReferenceGenerator) -> Self {
        self.references = generator;
        self
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    pub fn order_ttl(&self) -> Duration {
        self.order_ttl
    }

    /// Checks everything that can be checked without I/O: the user id, that the rail is priced for the tier and region,
    /// and the contact details the rail needs.
    pub fn validate(&self, request: &NewOrderRequest) -> Result<ValidatedOrder, ValidationError> {
        if request.user_id.value() <= 0 {
            return Err(ValidationError::InvalidUserId(request.user_id.to_string()));
        }
        let quote = self.prices.quote(request.tier, request.region, request.method)?;
        let phone = request
            .context
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| normalize_phone(p, request.region))
            .transpose()?;
        if request.method == PaymentMethod::MobileMoneyTill && phone.is_none() {
            return Err(ValidationError::PhoneRequired(request.method));
        }
        let email = request.context.email.as_deref().map(str::trim).filter(|e| !e.is_empty()).map(str::to_string);
        if let Some(email) = &email {
            if !is_valid_email(email) {
                return Err(ValidationError::InvalidEmail(email.clone()));
            }
        }
        if request.method == PaymentMethod::CardCheckout && email.is_none() {
            return Err(ValidationError::EmailRequired(request.method));
        }
        Ok(ValidatedOrder { quote, phone, email })
    }
}

impl<S> OrderFlowApi<S>
where S: KeyValueStore
{
    /// Creates a pending order and returns it with its customer-facing payment instructions.
    ///
    /// Validation failures and provider errors leave nothing behind in the store. If the order and its reference index
    /// cannot both be written, whatever was written is removed again before the error is returned.
    pub async fn create_order(&self, request: NewOrderRequest) -> Result<Order, OrderFlowError> {
        let validated = self.validate(&request)?;
        if !self.adapters.is_configured(request.method) {
            return Err(ProviderAdapterError::NotConfigured(request.method).into());
        }
        for attempt in 1..=MAX_ORDER_ATTEMPTS {
            let reference = self.fresh_reference(request.method).await?;
            let order_id = OrderId::random();
            let payment = PaymentRequest {
                order_id: &order_id,
                user_id: request.user_id,
                tier: request.tier,
                reference: &reference,
                quote: &validated.quote,
                phone: validated.phone.as_deref(),
                email: validated.email.as_deref(),
            };
            let metadata = self.adapters.open_payment(request.method, &payment).await?;
            let order = self.build_order(&request, &validated, order_id, reference, metadata);
            if self.persist(&order, validated.phone.as_deref()).await? {
                info!("🛒️ Created {order}");
                return Ok(order);
            }
            warn!("🛒️ Order {} lost a uniqueness race (attempt {attempt}/{MAX_ORDER_ATTEMPTS}). Retrying.", order.order_id);
        }
        Err(OrderFlowError::ReferenceExhausted(request.method))
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(orders::fetch_order(&self.store, &self.keys, order_id).await?.map(|v| v.order))
    }

    /// All orders still awaiting payment, oldest first.
    pub async fn fetch_pending_orders(&self) -> Result<Vec<Order>, StoreError> {
        let now = Utc::now();
        let mut pending = orders::scan_orders(&self.store, &self.keys)
            .await?
            .into_iter()
            .filter(|o| o.effective_status(now) == OrderStatusType::Pending)
            .collect::<Vec<_>>();
        pending.sort_by_key(|o| o.created_at);
        Ok(pending)
    }

    async fn fresh_reference(&self, method: PaymentMethod) -> Result<String, OrderFlowError> {
        for _ in 0..MAX_REFERENCE_ATTEMPTS {
            let candidate = (self.references)(method);
            if !indices::provider_ref_exists(&self.store, &self.keys, method, &candidate).await? {
                return Ok(candidate);
            }
            debug!("🛒️ Reference {candidate} is already in use on {method}. Generating another.");
        }
        Err(OrderFlowError::ReferenceExhausted(method))
    }

    fn build_order(
        &self,
        request: &NewOrderRequest,
        validated: &ValidatedOrder,
        order_id: OrderId,
        provider_ref: String,
        mut metadata: OrderMetadata,
    ) -> Order {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.order_ttl).unwrap_or_else(|_| chrono::Duration::seconds(900));
        metadata.phone = validated.phone.clone();
        metadata.email = validated.email.clone();
        Order {
            order_id,
            user_id: request.user_id,
            tier: request.tier,
            payment_method: request.method,
            region: request.region,
            base_amount: validated.quote.base,
            fee: validated.quote.fee,
            total_amount: validated.quote.total,
            currency: validated.quote.currency.clone(),
            status: OrderStatusType::Pending,
            provider_ref,
            metadata,
            created_at: now,
            expires_at: now + ttl,
            completed_at: None,
            transaction_ref: None,
            updated_at: now,
        }
    }

    /// Writes the order, its provider reference index and, if there is one, the phone index. Returns false if the
    /// order id or reference was claimed concurrently, in which case nothing of this order remains in the store.
    async fn persist(&self, order: &Order, phone: Option<&str>) -> Result<bool, OrderFlowError> {
        let expiry = Expiry::After(self.order_ttl);
        if !orders::insert_order(&self.store, &self.keys, order, expiry).await? {
            warn!("🛒️ Order id {} is already taken", order.order_id);
            return Ok(false);
        }
        let method = order.payment_method;
        match indices::claim_provider_ref(&self.store, &self.keys, method, &order.provider_ref, &order.order_id, expiry)
            .await
        {
            Ok(true) => {},
            Ok(false) => {
                debug!("🛒️ Reference {} was claimed by another order while {} was created", order.provider_ref, order.order_id);
                self.discard(order, false).await;
                return Ok(false);
            },
            Err(e) => {
                self.discard(order, false).await;
                return Err(e.into());
            },
        }
        if let Some(phone) = phone {
            if let Err(e) = indices::save_phone(&self.store, &self.keys, phone, &order.order_id, expiry).await {
                self.discard(order, true).await;
                return Err(e.into());
            }
        }
        Ok(true)
    }

    async fn discard(&self, order: &Order, release_reference: bool) {
        if release_reference {
            let method = order.payment_method;
            if let Err(e) = indices::delete_provider_ref(&self.store, &self.keys, method, &order.provider_ref).await {
                error!("🛒️ Could not release reference {} of abandoned order {}. {e}", order.provider_ref, order.order_id);
            }
        }
        if let Err(e) = orders::delete_order(&self.store, &self.keys, &order.order_id).await {
            error!("🛒️ Could not remove abandoned order {}. It will expire on its own. {e}", order.order_id);
        }
    }
}
