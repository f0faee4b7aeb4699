use crate::{
    db_types::{CryptoInstructions, OrderMetadata, PaymentInstructions},
    providers::{CryptoConfig, PaymentRequest},
};

/// Crypto invoices are paid to a shared deposit address. The provider reference travels as the transfer memo and is
/// how the invoice processor ties the deposit back to the order.
#[derive(Debug, Clone)]
pub struct CryptoInvoiceAdapter {
    config: CryptoConfig,
}

impl CryptoInvoiceAdapter {
    pub fn new(config: CryptoConfig) -> Self {
        Self { config }
    }

    pub fn open_payment(&self, request: &PaymentRequest<'_>) -> OrderMetadata {
        let instructions = CryptoInstructions {
            address: self.config.deposit_address.clone(),
            network: self.config.network.clone(),
            memo: request.reference.to_string(),
            amount: request.quote.total.to_string(),
            currency: request.quote.currency.clone(),
        };
        OrderMetadata { instructions: Some(PaymentInstructions::CryptoTransfer(instructions)), ..Default::default() }
    }
}
