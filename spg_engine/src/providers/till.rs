use crate::{
    db_types::{OrderMetadata, PaymentInstructions, TillInstructions},
    providers::{PaymentRequest, TillConfig},
};

/// Mobile money till payments are customer-initiated. The customer pays the till from their handset and types the
/// provider reference into the account number field, so all we hand back are the instructions.
#[derive(Debug, Clone)]
pub struct TillAdapter {
    config: TillConfig,
}

impl TillAdapter {
    pub fn new(config: TillConfig) -> Self {
        Self { config }
    }

    pub fn open_payment(&self, request: &PaymentRequest<'_>) -> OrderMetadata {
        let instructions = TillInstructions {
            till_number: self.config.till_number.clone(),
            business_name: self.config.business_name.clone(),
            account_reference: request.reference.to_string(),
            amount: request.quote.total.to_string(),
            currency: request.quote.currency.clone(),
        };
        OrderMetadata { instructions: Some(PaymentInstructions::Till(instructions)), ..Default::default() }
    }
}
