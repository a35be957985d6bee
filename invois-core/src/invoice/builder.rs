use super::{
    Buyer, DocumentBuilder, DocumentType, InvoiceData, InvoiceError, InvoiceTotalsData, LineItems,
    Supplier,
};
use crate::config::{DocumentFamily, SigningConfig};
use crate::credentials::SigningCredentials;
use crate::document::CleanDocument;
use crate::signing::{DocumentSigner, SignedArtifact};
use chrono::{DateTime, Utc};
use iso_currency::Currency;

/// Invoice whose line items and totals have been checked.
#[derive(Debug, Clone)]
pub struct FinalizedInvoice {
    data: InvoiceData,
    totals: InvoiceTotalsData,
}

pub struct InvoiceBuilder {
    invoice: InvoiceData,
}

impl InvoiceBuilder {
    pub fn new(
        document_type: DocumentType,
        id: impl Into<String>,
        issue_datetime: DateTime<Utc>,
        currency: Currency,
        supplier: Supplier,
        buyer: Buyer,
        line_items: LineItems,
    ) -> Self {
        Self {
            invoice: InvoiceData {
                document_type,
                id: id.into(),
                issue_datetime,
                currency,
                supplier,
                buyer,
                line_items,
                invoice_level_charge: 0.0,
                invoice_level_discount: 0.0,
                allowance_reason: None,
            },
        }
    }

    pub fn invoice_level_charge(mut self, charge: f64) -> Self {
        self.invoice.invoice_level_charge = charge;
        self
    }

    pub fn invoice_level_discount(mut self, discount: f64) -> Self {
        self.invoice.invoice_level_discount = discount;
        self
    }

    pub fn allowance_reason(mut self, reason: impl Into<String>) -> Self {
        self.invoice.allowance_reason = Some(reason.into());
        self
    }

    pub fn build(self) -> Result<FinalizedInvoice, InvoiceError> {
        FinalizedInvoice::new(self.invoice)
    }
}

impl FinalizedInvoice {
    /// Check a record that did not come through [`InvoiceBuilder`], such as one read from disk.
    pub fn new(data: InvoiceData) -> Result<Self, InvoiceError> {
        if data.line_items.is_empty() {
            return Err(InvoiceError::MissingLineItems);
        }
        check_amount("invoice_level_charge", data.invoice_level_charge)?;
        check_amount("invoice_level_discount", data.invoice_level_discount)?;
        for item in &data.line_items {
            check_amount("quantity", item.quantity())?;
            check_amount("unit_price", item.unit_price())?;
            check_amount("tax_rate", item.tax_rate())?;
        }

        Ok(Self {
            totals: InvoiceTotalsData::from_data(&data),
            data,
        })
    }

    pub fn data(&self) -> &InvoiceData {
        &self.data
    }

    pub fn totals(&self) -> &InvoiceTotalsData {
        &self.totals
    }

    pub fn to_document(&self, family: DocumentFamily) -> Result<CleanDocument, InvoiceError> {
        DocumentBuilder::new(family).build(&self.data)
    }

    /// Build the document for the configured family and run it through the signing pipeline.
    pub fn sign(
        &self,
        credentials: &SigningCredentials,
        config: SigningConfig,
    ) -> crate::Result<SignedArtifact> {
        let document = self.to_document(config.family())?;
        DocumentSigner::new(credentials, config)?.sign(document)
    }
}

fn check_amount(field: &'static str, value: f64) -> Result<(), InvoiceError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(InvoiceError::InvalidAmount { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{
        Address, Billing, IdScheme, LineItem, LineItemFields, PartyId, TaxType,
    };
    use chrono::TimeZone;
    use isocountry::CountryCode;

    fn address() -> Address {
        Address {
            country_code: CountryCode::MYS,
            state_code: "14".into(),
            city: "Kuala Lumpur".into(),
            postal_code: "50480".into(),
            lines: vec!["Lot 66".into()],
        }
    }

    fn item(unit_price: f64) -> LineItem {
        LineItem::new(LineItemFields {
            description: "Consulting".into(),
            classification: "022".into(),
            quantity: 4.0,
            unit_code: "HUR".into(),
            unit_price,
            tax_rate: 8.0,
            tax_type: TaxType::ServiceTax,
        })
    }

    fn builder(line_items: LineItems) -> InvoiceBuilder {
        InvoiceBuilder::new(
            DocumentType::Invoice(Billing::Standard),
            "INV-1",
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap(),
            Currency::MYR,
            Supplier::new("Supplier", address(), "C1234567890", PartyId::new(IdScheme::Brn, "201901"))
                .unwrap(),
            Buyer::new("Buyer", address(), "IG1234567890", PartyId::new(IdScheme::Nric, "900101"))
                .unwrap(),
            line_items,
        )
    }

    #[test]
    fn build_requires_line_items() {
        let err = builder(Vec::new()).build().expect_err("no items");
        assert_eq!(err, InvoiceError::MissingLineItems);
    }

    #[test]
    fn totals_include_invoice_level_adjustments() {
        let invoice = builder(vec![item(25.0)])
            .invoice_level_discount(10.0)
            .invoice_level_charge(5.0)
            .build()
            .expect("build");
        let totals = invoice.totals();
        assert_eq!(totals.line_extension(), 100.0);
        assert_eq!(totals.tax_amount(), 8.0);
        assert_eq!(totals.tax_exclusive_amount(), 95.0);
        assert_eq!(totals.tax_inclusive_amount(), 103.0);
    }

    #[test]
    fn rejects_non_finite_amounts() {
        let err = builder(vec![item(f64::NAN)]).build().expect_err("nan");
        assert!(matches!(
            err,
            InvoiceError::InvalidAmount {
                field: "unit_price",
                ..
            }
        ));
    }
}
